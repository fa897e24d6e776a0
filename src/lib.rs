#![deny(unreachable_pub)]

// Core modules
pub mod consts;
mod errors;

pub mod config;
pub mod experiment;
pub mod infra;
pub mod types;

// Re-exports
pub use config::{AppConfig, DisplayConfig};
pub use errors::{ConfigError, Error, Result};
pub use experiment::*;
pub use infra::logging::{init_logging, LogConfig, LogFormat};
pub use types::*;
