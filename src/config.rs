//! Application configuration loaded from TOML.
//!
//! ```toml
//! [population]
//! base_click_rate = 0.3
//! minimum_detectable_effect = 0.1
//!
//! [display.a]
//! primary_color_probability = 0.5
//!
//! [driver]
//! significance_mode = "match_confidence"
//!
//! [logging]
//! format = "compact"
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{ConfigError, Result};
use crate::experiment::{DisplayOdds, DriverConfig, ParameterSet, RandomizedDisplay};
use crate::infra::logging::{targets, LogConfig};

/// Per-arm display odds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub a: DisplayOdds,
    pub b: DisplayOdds,
}

impl DisplayConfig {
    /// Attribute source for these odds.
    pub fn build(&self) -> std::result::Result<RandomizedDisplay, ConfigError> {
        RandomizedDisplay::new(self.a, self.b)
    }
}

/// Top-level application config.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub population: ParameterSet,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// Check the experiment parameters and display odds.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.population.validate()?;
        self.display.a.validate()?;
        self.display.b.validate()?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(target: targets::CONFIG, path = %path.display(), "No config file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(target: targets::CONFIG, path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write a commented sample config with all defaults.
    pub fn write_sample(path: impl AsRef<Path>) -> Result<()> {
        let content = AppConfig::default().to_toml_string()?;
        let with_comments = format!(
            r#"# A/B Test Simulator Configuration
# See: cargo run --bin ab_simulator -- --help
#
# [population]   statistical inputs and behaviour model
#                confidence_level must be one of 0.80, 0.85, 0.90, 0.95, 0.99
#                impacts are in [-0.5, 0.5], preferences in [0, 1]
# [display.a/b]  odds that each arm shows its favourable colour, alignment, spelling
# [driver]       significance_mode = "match_confidence" | "fixed95"
#                seed = 42 for reproducible runs

{}"#,
            content
        );
        std::fs::write(path.as_ref(), with_comments)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::experiment::SignificanceMode;
    use crate::infra::logging::LogFormat;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_sample_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ab.toml");
        AppConfig::write_sample(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# A/B Test Simulator Configuration"));

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [population]
            base_click_rate = 0.2
            turbo_mode = true

            [display.b]
            spelling_probability = 0.25

            [driver]
            significance_mode = "fixed95"
            seed = 42

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.population.base_click_rate, 0.2);
        assert!(config.population.turbo_mode);
        assert_eq!(config.population.minimum_detectable_effect, 0.1);
        assert_eq!(config.display.a, DisplayOdds::default());
        assert_eq!(config.display.b.spelling_probability, 0.25);
        assert_eq!(config.display.b.center_probability, 1.0);
        assert_eq!(config.driver.significance_mode, SignificanceMode::Fixed95);
        assert_eq!(config.driver.seed, Some(42));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_toml_str("[population]\nconfidence_level = 0.5\n").unwrap_err();
        assert_eq!(err, Error::Config(ConfigError::UnsupportedConfidence(0.5)));

        let err = AppConfig::from_toml_str("[display.a]\ncenter_probability = 2.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_malformed_toml() {
        let err = AppConfig::from_toml_str("[population\n").unwrap_err();
        assert!(matches!(err, Error::ConfigFile(_)));
    }

    #[test]
    fn test_build_display() {
        let config = AppConfig::default();
        let display = config.display.build().unwrap();
        assert_eq!(display.odds(crate::types::Arm::B), &DisplayOdds::default());
    }
}
