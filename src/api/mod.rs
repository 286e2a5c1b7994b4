pub mod error;
pub mod pickem_api;

pub use error::{ApiError, ErrorCategory};
pub use pickem_api::PickemApiClient;
