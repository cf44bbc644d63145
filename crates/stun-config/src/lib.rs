//! # stun-config
//!
//! Configuration file handling for stun: TOML loading with `${VAR}`
//! substitution, the configuration schema and validation.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
