pub mod analysis;
pub mod email;

pub use analysis::{AnalysisFailure, AnalysisResult, CategoryProposal};
pub use email::EmailRecord;
