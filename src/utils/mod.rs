//! Shared utilities: duration parsing and instance set validation.

pub mod duration;
pub mod validation;

pub use duration::parse_duration;
pub use validation::{validate_instance_set, ValidationError};
