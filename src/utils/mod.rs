// The `utils` module provides authentication and templating helpers.

pub mod context_hub;
pub mod google_auth;
pub mod template;

pub use crate::utils::template::{TEngine, TEngineError};
