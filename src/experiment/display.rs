//! Rendered state of each arm's call-to-action.
//!
//! The click model only needs to know whether an impression saw the primary
//! colour, centred text and correct spelling. An [`AttributeSource`] supplies
//! that per impression; [`RandomizedDisplay`] re-rolls the look of the button
//! with per-arm odds, [`FixedDisplay`] always shows the same thing.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::Arm;

use super::click_model::Attributes;
use super::rng::RandomSource;

/// Label shown when the spelling is correct.
pub const CORRECT_LABEL: &str = "Click Me!";

/// Labels shown when the spelling is wrong.
pub const MISSPELLED_LABELS: [&str; 8] = [
    "Clik Me!",
    "Click Mee!",
    "Clikc Me!",
    "Clck Me!",
    "Click M!",
    "Klik Me!",
    "Click mei!",
    "Clik Meh!",
];

/// Produces the attributes shown for the next impression of an arm.
pub trait AttributeSource {
    fn render<R: RandomSource + ?Sized>(&mut self, arm: Arm, rng: &mut R) -> Attributes;
}

/// Odds that an arm's button is shown in each favorable state.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayOdds {
    /// Probability the button has the primary colour
    pub primary_color_probability: f64,
    /// Probability the label is centred
    pub center_probability: f64,
    /// Probability the label is spelled correctly
    pub spelling_probability: f64,
}

impl Default for DisplayOdds {
    fn default() -> Self {
        Self {
            primary_color_probability: 0.5,
            center_probability: 1.0,
            spelling_probability: 1.0,
        }
    }
}

impl DisplayOdds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("primary_color_probability", self.primary_color_probability),
            ("center_probability", self.center_probability),
            ("spelling_probability", self.spelling_probability),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

/// Re-rolls each arm's look on every impression.
#[derive(Debug, Clone)]
pub struct RandomizedDisplay {
    odds_a: DisplayOdds,
    odds_b: DisplayOdds,
    labels: [&'static str; 2],
}

impl RandomizedDisplay {
    pub fn new(odds_a: DisplayOdds, odds_b: DisplayOdds) -> Result<Self, ConfigError> {
        odds_a.validate()?;
        odds_b.validate()?;
        Ok(Self {
            odds_a,
            odds_b,
            labels: [CORRECT_LABEL; 2],
        })
    }

    pub fn odds(&self, arm: Arm) -> &DisplayOdds {
        match arm {
            Arm::A => &self.odds_a,
            Arm::B => &self.odds_b,
        }
    }

    /// Label most recently rendered for `arm`.
    pub fn label(&self, arm: Arm) -> &'static str {
        self.labels[arm_index(arm)]
    }
}

impl Default for RandomizedDisplay {
    fn default() -> Self {
        Self {
            odds_a: DisplayOdds::default(),
            odds_b: DisplayOdds::default(),
            labels: [CORRECT_LABEL; 2],
        }
    }
}

impl AttributeSource for RandomizedDisplay {
    fn render<R: RandomSource + ?Sized>(&mut self, arm: Arm, rng: &mut R) -> Attributes {
        let odds = *self.odds(arm);
        let attributes = Attributes {
            color_matches: rng.next_unit() < odds.primary_color_probability,
            text_centered: rng.next_unit() < odds.center_probability,
            spelling_correct: rng.next_unit() < odds.spelling_probability,
        };

        self.labels[arm_index(arm)] = if attributes.spelling_correct {
            CORRECT_LABEL
        } else {
            let idx = (rng.next_unit() * MISSPELLED_LABELS.len() as f64) as usize;
            MISSPELLED_LABELS[idx.min(MISSPELLED_LABELS.len() - 1)]
        };

        attributes
    }
}

/// Always renders the same attributes per arm. Takes no draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedDisplay {
    pub a: Attributes,
    pub b: Attributes,
}

impl FixedDisplay {
    pub fn new(a: Attributes, b: Attributes) -> Self {
        Self { a, b }
    }

    /// Both arms shown in the fully favorable state.
    pub fn favorable() -> Self {
        Self::new(Attributes::FAVORABLE, Attributes::FAVORABLE)
    }
}

impl AttributeSource for FixedDisplay {
    fn render<R: RandomSource + ?Sized>(&mut self, arm: Arm, _rng: &mut R) -> Attributes {
        match arm {
            Arm::A => self.a,
            Arm::B => self.b,
        }
    }
}

fn arm_index(arm: Arm) -> usize {
    match arm {
        Arm::A => 0,
        Arm::B => 1,
    }
}
