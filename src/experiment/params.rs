//! Experiment parameters and partial updates.

use serde::{Deserialize, Serialize};

use crate::consts::{EPSILON, MAX_TICK_RATE_HZ, MIN_TICK_RATE_HZ, TURBO_SPEED_MULTIPLIER, Z_TABLE};
use crate::errors::ConfigError;

use super::sample_size::{bounded_per_arm, per_arm_requirement};

/// Population and statistical configuration for one experiment.
///
/// Owned by the driver; mutated only through [`ParameterPatch`] merges so a
/// rejected update never leaves a half-applied set behind.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Baseline click probability before attribute modifiers, in (0, 1)
    pub base_click_rate: f64,
    /// Fraction of users who care about the button colour, in [0, 1]
    pub color_preference: f64,
    /// Fraction of users who care about centred text, in [0, 1]
    pub center_preference: f64,
    /// Fraction of users who care about correct spelling, in [0, 1]
    pub spelling_preference: f64,
    /// Relative boost when the colour matches and the user cares, in [-0.5, 0.5]
    pub color_impact: f64,
    /// Relative boost when the text is centred and the user cares, in [-0.5, 0.5]
    pub center_impact: f64,
    /// Relative boost when the spelling is correct and the user cares, in [-0.5, 0.5]
    pub spelling_impact: f64,
    /// One of 0.80, 0.85, 0.90, 0.95, 0.99
    pub confidence_level: f64,
    /// Relative effect the sample must be able to detect, in (0, 1)
    pub minimum_detectable_effect: f64,
    /// Live-mode ticks per second, in [1, 30]
    pub tick_rate_hz: u32,
    /// Run in chunked batch mode instead of live ticking
    pub turbo_mode: bool,
    /// Impressions per turbo chunk
    pub turbo_speed_multiplier: u32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            base_click_rate: 0.3,
            color_preference: 0.3,
            center_preference: 0.4,
            spelling_preference: 0.6,
            color_impact: 0.0,
            center_impact: 0.0,
            spelling_impact: 0.0,
            confidence_level: 0.95,
            minimum_detectable_effect: 0.1,
            tick_rate_hz: 3,
            turbo_mode: false,
            turbo_speed_multiplier: TURBO_SPEED_MULTIPLIER,
        }
    }
}

impl ParameterSet {
    /// Check every field against its documented range.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        open_unit("base_click_rate", self.base_click_rate)?;
        closed("color_preference", self.color_preference, 0.0, 1.0)?;
        closed("center_preference", self.center_preference, 0.0, 1.0)?;
        closed("spelling_preference", self.spelling_preference, 0.0, 1.0)?;
        closed("color_impact", self.color_impact, -0.5, 0.5)?;
        closed("center_impact", self.center_impact, -0.5, 0.5)?;
        closed("spelling_impact", self.spelling_impact, -0.5, 0.5)?;
        open_unit("minimum_detectable_effect", self.minimum_detectable_effect)?;

        if !self.confidence_level.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "confidence_level",
            });
        }
        if !Z_TABLE
            .iter()
            .any(|(level, _)| (level - self.confidence_level).abs() < EPSILON)
        {
            return Err(ConfigError::UnsupportedConfidence(self.confidence_level));
        }

        if let Some(per_arm) = per_arm_requirement(
            self.confidence_level,
            self.base_click_rate,
            self.minimum_detectable_effect,
        ) {
            if bounded_per_arm(per_arm).is_none() {
                return Err(ConfigError::SampleSizeTooLarge { per_arm });
            }
        }

        if !(MIN_TICK_RATE_HZ..=MAX_TICK_RATE_HZ).contains(&self.tick_rate_hz) {
            return Err(ConfigError::OutOfRange {
                field: "tick_rate_hz",
                value: self.tick_rate_hz as f64,
                min: MIN_TICK_RATE_HZ as f64,
                max: MAX_TICK_RATE_HZ as f64,
            });
        }
        if self.turbo_speed_multiplier == 0 {
            return Err(ConfigError::ZeroTurboMultiplier);
        }
        Ok(())
    }

    /// Preference/impact pairs in colour, centre, spelling order.
    pub(crate) fn attribute_terms(&self) -> [(f64, f64); 3] {
        [
            (self.color_preference, self.color_impact),
            (self.center_preference, self.center_impact),
            (self.spelling_preference, self.spelling_impact),
        ]
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

fn closed(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn open_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value <= 0.0 || value >= 1.0 {
        return Err(ConfigError::OutOfOpenRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

/// Partial update merged into the current [`ParameterSet`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_click_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_preference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_preference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spelling_preference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spelling_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_detectable_effect: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_rate_hz: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbo_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbo_speed_multiplier: Option<u32>,
}

impl ParameterPatch {
    /// Produce the merged parameter set without touching `base`.
    pub fn apply_to(&self, base: &ParameterSet) -> ParameterSet {
        ParameterSet {
            base_click_rate: self.base_click_rate.unwrap_or(base.base_click_rate),
            color_preference: self.color_preference.unwrap_or(base.color_preference),
            center_preference: self.center_preference.unwrap_or(base.center_preference),
            spelling_preference: self.spelling_preference.unwrap_or(base.spelling_preference),
            color_impact: self.color_impact.unwrap_or(base.color_impact),
            center_impact: self.center_impact.unwrap_or(base.center_impact),
            spelling_impact: self.spelling_impact.unwrap_or(base.spelling_impact),
            confidence_level: self.confidence_level.unwrap_or(base.confidence_level),
            minimum_detectable_effect: self
                .minimum_detectable_effect
                .unwrap_or(base.minimum_detectable_effect),
            tick_rate_hz: self.tick_rate_hz.unwrap_or(base.tick_rate_hz),
            turbo_mode: self.turbo_mode.unwrap_or(base.turbo_mode),
            turbo_speed_multiplier: self
                .turbo_speed_multiplier
                .unwrap_or(base.turbo_speed_multiplier),
        }
    }

    /// Whether the patch sets any input of the sample-size calculation.
    pub fn touches_sample_size(&self) -> bool {
        self.confidence_level.is_some()
            || self.base_click_rate.is_some()
            || self.minimum_detectable_effect.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
