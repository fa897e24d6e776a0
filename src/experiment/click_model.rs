//! Click model
//!
//! Each simulated user independently decides whether they care about the
//! button colour, the text alignment and the spelling. Attributes the user
//! cares about and that are shown in their favorable state multiply the base
//! rate by `(1 + impact)`:
//!
//! ```text
//! P(click) = clamp(base_rate × Π (1 + impact_i), 0, 1)
//!            over attributes i with u_i < preference_i and attribute_i favorable
//! ```
//!
//! Draw order per impression is fixed: colour, centre, spelling, click.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::params::ParameterSet;
use super::rng::RandomSource;

/// How the call-to-action was rendered for one impression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Button shows the primary colour
    pub color_matches: bool,
    /// Label is centred
    pub text_centered: bool,
    /// Label is spelled correctly
    pub spelling_correct: bool,
}

impl Attributes {
    pub const FAVORABLE: Attributes = Attributes {
        color_matches: true,
        text_centered: true,
        spelling_correct: true,
    };

    pub const UNFAVORABLE: Attributes = Attributes {
        color_matches: false,
        text_centered: false,
        spelling_correct: false,
    };

    fn flags(&self) -> [bool; 3] {
        [self.color_matches, self.text_centered, self.spelling_correct]
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::FAVORABLE
    }
}

/// Result of evaluating one impression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickOutcome {
    pub probability: f64,
    pub clicked: bool,
}

/// Per-impression click probability and Bernoulli outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickModel;

impl ClickModel {
    pub fn new() -> Self {
        Self
    }

    /// Click probability for one user. Takes three draws from `rng`.
    pub fn probability<R: RandomSource + ?Sized>(
        &self,
        attributes: &Attributes,
        params: &ParameterSet,
        rng: &mut R,
    ) -> f64 {
        let mut multiplier = 1.0;

        for ((preference, impact), favorable) in params
            .attribute_terms()
            .into_iter()
            .zip(attributes.flags())
        {
            let cares = rng.next_unit() < preference;
            if cares && favorable {
                multiplier *= 1.0 + impact;
            }
        }

        let probability = (params.base_click_rate * multiplier).clamp(0.0, 1.0);

        trace!(
            base = params.base_click_rate,
            multiplier,
            probability,
            "Click probability calculation"
        );

        probability
    }

    /// Probability plus the click draw. Takes four draws from `rng`.
    pub fn evaluate<R: RandomSource + ?Sized>(
        &self,
        attributes: &Attributes,
        params: &ParameterSet,
        rng: &mut R,
    ) -> ClickOutcome {
        let probability = self.probability(attributes, params, rng);
        let clicked = rng.next_unit() < probability;
        ClickOutcome {
            probability,
            clicked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::rng::{seeded_rng, SequenceRng};

    fn params_with_impacts(color: f64, center: f64, spelling: f64) -> ParameterSet {
        ParameterSet {
            base_click_rate: 0.3,
            color_preference: 0.5,
            center_preference: 0.5,
            spelling_preference: 0.5,
            color_impact: color,
            center_impact: center,
            spelling_impact: spelling,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_one_cares_keeps_base_rate() {
        let params = params_with_impacts(0.5, 0.5, 0.5);
        // Preference draws all 0.9 >= 0.5: nobody cares
        let mut rng = SequenceRng::new(vec![0.9, 0.9, 0.9, 0.0]);
        let outcome = ClickModel::new().evaluate(&Attributes::FAVORABLE, &params, &mut rng);

        assert!((outcome.probability - 0.3).abs() < 1e-12);
        assert!(outcome.clicked);
        assert_eq!(rng.draws(), 4);
    }

    #[test]
    fn test_boosts_multiply() {
        let params = params_with_impacts(0.5, 0.2, -0.5);
        let mut rng = SequenceRng::new(vec![0.1, 0.1, 0.1, 0.99]);
        let outcome = ClickModel::new().evaluate(&Attributes::FAVORABLE, &params, &mut rng);

        // 0.3 × 1.5 × 1.2 × 0.5 = 0.27
        assert!((outcome.probability - 0.27).abs() < 1e-12);
        assert!(!outcome.clicked);
    }

    #[test]
    fn test_unfavorable_attribute_has_no_penalty() {
        let params = params_with_impacts(0.5, 0.5, 0.5);
        let mut rng = SequenceRng::new(vec![0.1, 0.1, 0.1, 0.5]);
        let outcome = ClickModel::new().evaluate(&Attributes::UNFAVORABLE, &params, &mut rng);

        assert!((outcome.probability - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_only_caring_attributes_apply() {
        let params = params_with_impacts(0.5, 0.5, 0.5);
        // Cares about colour only
        let mut rng = SequenceRng::new(vec![0.1, 0.7, 0.7, 0.5]);
        let p = ClickModel::new().probability(&Attributes::FAVORABLE, &params, &mut rng);
        assert!((p - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_probability_clamped_to_one() {
        let params = ParameterSet {
            base_click_rate: 0.9,
            color_preference: 1.0,
            center_preference: 1.0,
            spelling_preference: 1.0,
            color_impact: 0.5,
            center_impact: 0.5,
            spelling_impact: 0.5,
            ..Default::default()
        };
        let mut rng = SequenceRng::constant(0.5);
        let outcome = ClickModel::new().evaluate(&Attributes::FAVORABLE, &params, &mut rng);
        assert_eq!(outcome.probability, 1.0);
        assert!(outcome.clicked);
    }

    #[test]
    fn test_click_rate_matches_probability() {
        let params = ParameterSet {
            base_click_rate: 0.2,
            color_preference: 0.0,
            center_preference: 0.0,
            spelling_preference: 0.0,
            ..Default::default()
        };
        let mut rng = seeded_rng(Some(42));
        let model = ClickModel::new();
        let n = 20_000;
        let clicks = (0..n)
            .filter(|_| model.evaluate(&Attributes::FAVORABLE, &params, &mut rng).clicked)
            .count();
        let rate = clicks as f64 / n as f64;

        // 0.2 ± ~4.5 standard errors
        assert!((rate - 0.2).abs() < 0.013, "rate {rate}");
    }

    #[test]
    fn test_expected_boost_with_partial_preference() {
        // E[P] = 0.3 × (1 + 0.4 × 0.5) = 0.36 when only colour matters
        let params = ParameterSet {
            base_click_rate: 0.3,
            color_preference: 0.4,
            center_preference: 0.0,
            spelling_preference: 0.0,
            color_impact: 0.5,
            ..Default::default()
        };
        let mut rng = seeded_rng(Some(9));
        let model = ClickModel::new();
        let n = 20_000;
        let mean = (0..n)
            .map(|_| model.probability(&Attributes::FAVORABLE, &params, &mut rng))
            .sum::<f64>()
            / n as f64;
        assert!((mean - 0.36).abs() < 0.01, "mean {mean}");
    }
}
