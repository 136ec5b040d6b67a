pub mod email_data;

pub use email_data::{EmailDataService, SortOutcome};
