//! # Waymark Config
//!
//! Configuration for the background process. The configuration is an explicit
//! object: loaded once at start, handed to every handler through
//! [`ConfigStore`], and written back to disk whenever it changes.

mod error;
mod loader;
mod schema;
mod store;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use store::ConfigStore;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
