//! Lift and two-proportion z-test between the arms.
//!
//! Lift is relative to the baseline arm, so comparing A against B and B
//! against A do not give mirrored values:
//!
//! ```text
//! lift(A vs B) = (cr_A − cr_B) / cr_B × 100
//! ```
//!
//! Significance uses the pooled proportion:
//!
//! ```text
//! p̂  = (clicks_A + clicks_B) / (n_A + n_B)
//! SE = sqrt(p̂ (1 − p̂) (1/n_A + 1/n_B))
//! z  = |cr_A − cr_B| / SE
//! ```

use serde::{Deserialize, Serialize};

use crate::consts::{FIXED_SIGNIFICANCE_Z, MIN_SIGNIFICANCE_FRACTION, MIN_SIGNIFICANCE_SAMPLE};
use crate::types::VariationState;

use super::params::ParameterSet;
use super::sample_size::{estimate_for, z_score_for};

/// Where the z cutoff for `significant` comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceMode {
    /// Always 1.96, whatever confidence level is configured
    Fixed95,
    /// Same table lookup as the sample size calculation
    #[default]
    MatchConfidence,
}

/// Outcome of comparing a treatment arm against a baseline arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignificanceVerdict {
    /// Relative lift in percent; `None` without data or with a zero baseline rate
    pub lift: Option<f64>,
    /// Both arms exceed the minimum sample
    pub has_enough_data: bool,
    pub significant: bool,
    pub z_score: Option<f64>,
    /// Two-sided p-value of `z_score`
    pub p_value: Option<f64>,
    pub treatment_rate: f64,
    pub baseline_rate: f64,
}

/// Computes lift and significance for a given required sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceEngine {
    required_per_arm: u64,
    z_threshold: f64,
}

impl SignificanceEngine {
    pub fn new(required_per_arm: u64, z_threshold: f64) -> Self {
        Self {
            required_per_arm,
            z_threshold,
        }
    }

    /// Engine matching the current parameters.
    pub fn for_params(params: &ParameterSet, mode: SignificanceMode) -> Self {
        let z_threshold = match mode {
            SignificanceMode::Fixed95 => FIXED_SIGNIFICANCE_Z,
            SignificanceMode::MatchConfidence => z_score_for(params.confidence_level),
        };
        Self::new(estimate_for(params).per_arm, z_threshold)
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    /// Impressions each arm must exceed before significance is evaluated.
    pub fn min_sample(&self) -> f64 {
        MIN_SIGNIFICANCE_SAMPLE.max(self.required_per_arm as f64 * MIN_SIGNIFICANCE_FRACTION)
    }

    /// Compare `treatment` against `baseline`.
    pub fn evaluate(
        &self,
        treatment: &VariationState,
        baseline: &VariationState,
    ) -> SignificanceVerdict {
        if treatment.impressions == 0 || baseline.impressions == 0 {
            return SignificanceVerdict::default();
        }

        let n_t = treatment.impressions as f64;
        let n_b = baseline.impressions as f64;
        let cr_t = treatment.clicks as f64 / n_t;
        let cr_b = baseline.clicks as f64 / n_b;

        let min_sample = self.min_sample();
        let has_enough_data = n_t > min_sample && n_b > min_sample;

        let lift = (cr_b > 0.0).then(|| (cr_t - cr_b) / cr_b * 100.0);

        let mut verdict = SignificanceVerdict {
            lift,
            has_enough_data,
            significant: false,
            z_score: None,
            p_value: None,
            treatment_rate: cr_t,
            baseline_rate: cr_b,
        };

        if !has_enough_data || lift.is_none() {
            return verdict;
        }

        let pooled = (treatment.clicks + baseline.clicks) as f64 / (n_t + n_b);
        let std_error = (pooled * (1.0 - pooled) * (1.0 / n_t + 1.0 / n_b)).sqrt();
        if !(std_error.is_finite() && std_error > 0.0) {
            return verdict;
        }

        let z = (cr_t - cr_b).abs() / std_error;
        verdict.z_score = Some(z);
        verdict.p_value = Some((2.0 * normal_sf(z)).min(1.0));
        verdict.significant = z > self.z_threshold;
        verdict
    }
}

/// P(Z > z) for the standard normal distribution, `z >= 0`.
///
/// Abramowitz & Stegun 26.2.17, |error| < 7.5e-8.
pub fn normal_sf(z: f64) -> f64 {
    debug_assert!(z >= 0.0, "normal_sf requires z >= 0, got {}", z);

    let t = 1.0 / (1.0 + 0.2316419 * z);
    let d = 0.398_942_280_401_432_7; // 1/sqrt(2π)
    let p = d * (-z * z / 2.0).exp();

    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));

    p * poly
}
