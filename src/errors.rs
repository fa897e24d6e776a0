use thiserror::Error;

/// Rejected parameter values.
///
/// A `configure()` call that fails with one of these leaves the previous
/// parameter set in effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be strictly between {min} and {max}, got {value}")]
    OutOfOpenRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("Unsupported confidence level {0} (expected one of 0.80, 0.85, 0.90, 0.95, 0.99)")]
    UnsupportedConfidence(f64),
    #[error("turbo_speed_multiplier must be positive")]
    ZeroTurboMultiplier,
    #[error("Required sample size of {per_arm:e} per arm is too large; raise base_click_rate or minimum_detectable_effect")]
    SampleSizeTooLarge { per_arm: f64 },
}

/// Main crate error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid experiment parameters
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The simulation task is gone (shut down or panicked)
    #[error("Simulation task is no longer running")]
    RuntimeClosed,

    /// Config file could not be parsed or serialized
    #[error("Config file error: {0}")]
    ConfigFile(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigFile(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::ConfigFile(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
