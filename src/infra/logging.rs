//! Structured logging setup.
//!
//! - Component targets for filtering
//! - Optional daily-rotated log file via tracing-appender
//!
//! # Component Targets
//!
//! | Target | Description |
//! |--------|-------------|
//! | `ab_simulator::driver` | Run lifecycle, turbo chunks, runtime commands |
//! | `ab_simulator::stats` | Sample size and significance calculations |
//! | `ab_simulator::config` | Parameter validation and config files |
//!
//! # Example Usage
//!
//! ```bash
//! # Chunk-level detail for the driver only
//! RUST_LOG=info,ab_simulator::driver=debug cargo run --bin ab_simulator
//!
//! # Per-impression click probabilities
//! RUST_LOG=ab_simulator=trace cargo run --bin ab_simulator -- run --turbo
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON format (for log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}' (pretty, json, compact)")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Format for stdout logging
    #[serde(default)]
    pub format: LogFormat,

    /// Enable stdout logging (default: true)
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,

    /// Directory for the rolling log file; no file when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Level for the rolling log file
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_level() -> String {
    "debug".to_string()
}

fn default_enable_stdout() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            enable_stdout: default_enable_stdout(),
            log_dir: None,
            file_level: default_file_level(),
        }
    }
}

impl LogConfig {
    /// JSON stdout plus a daily log file in `log_dir`.
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            format: LogFormat::Json,
            log_dir: Some(log_dir),
            ..Default::default()
        }
    }
}

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "ab-simulator.log";

/// Initialize logging based on configuration.
///
/// Returns the `WorkerGuard`s of the non-blocking writers; keep them alive
/// for the duration of the program so buffered lines are flushed.
///
/// ```ignore
/// let _guards = init_logging(&LogConfig::default(), None)?;
/// ```
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Vec<WorkerGuard>, Box<dyn std::error::Error>> {
    let mut guards = Vec::new();

    let base_filter = match env_filter_override {
        Some(filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?,
    };

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let filter = EnvFilter::try_new(&config.file_level)?;
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .json()
                    .with_filter(filter),
            )
        }
        None => None,
    };

    let stdout_layer = config.enable_stdout.then(|| match config.format {
        LogFormat::Json => fmt::layer().json().with_filter(base_filter).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_filter(base_filter).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_filter(base_filter)
            .boxed(),
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    if let Some(dir) = &config.log_dir {
        eprintln!("Logging to {}", dir.join(LOG_FILE_PREFIX).display());
    }

    Ok(guards)
}

/// Log target constants for component-specific logging.
///
/// ```ignore
/// tracing::debug!(target: targets::STATS, required = total, "Required population recomputed");
/// ```
pub mod targets {
    /// Run lifecycle, turbo chunks, runtime commands
    pub const DRIVER: &str = "ab_simulator::driver";
    /// Sample size and significance calculations
    pub const STATS: &str = "ab_simulator::stats";
    /// Parameter validation and config files
    pub const CONFIG: &str = "ab_simulator::config";
}
