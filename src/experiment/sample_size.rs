//! Required sample size for detecting a relative lift.
//!
//! ```text
//! per_arm = ceil( z² · p · (1 − p) · 2 / (p · mde)² )
//! total   = 2 · per_arm
//! ```
//!
//! `z` comes from a fixed two-sided table keyed by confidence level.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_Z, EPSILON, MAX_PER_ARM_SAMPLE, Z_TABLE};

use super::params::ParameterSet;

/// Result of a sample size calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSizeEstimate {
    /// z-score used
    pub z: f64,
    /// Impressions needed in each arm
    pub per_arm: u64,
    /// Impressions needed across both arms
    pub total: u64,
}

/// Look up the z-score for a confidence level, falling back to 1.96.
pub fn z_score_for(confidence_level: f64) -> f64 {
    Z_TABLE
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < EPSILON)
        .map(|&(_, z)| z)
        .unwrap_or(DEFAULT_Z)
}

/// Unrounded per-arm requirement, or `None` when `p` or `mde` is not a
/// strictly positive finite number.
///
/// May be infinite or far beyond `u64` for tiny `p · mde`.
pub fn per_arm_requirement(
    confidence_level: f64,
    base_click_rate: f64,
    minimum_detectable_effect: f64,
) -> Option<f64> {
    let z = z_score_for(confidence_level);
    let p = base_click_rate;
    let mde = minimum_detectable_effect;

    if !(p.is_finite() && mde.is_finite()) || p <= 0.0 || mde <= 0.0 {
        return None;
    }

    let variance = z * z * p * (1.0 - p).max(0.0) * 2.0;
    let delta = p * mde;
    Some((variance / (delta * delta)).max(0.0))
}

/// Rounded per-arm size, or `None` when it exceeds [`MAX_PER_ARM_SAMPLE`].
pub(crate) fn bounded_per_arm(requirement: f64) -> Option<u64> {
    let rounded = requirement.ceil();
    // MAX_PER_ARM_SAMPLE as f64 rounds up to 2^63, so compare strictly
    if rounded.is_finite() && rounded < MAX_PER_ARM_SAMPLE as f64 {
        Some(rounded as u64)
    } else {
        None
    }
}

/// Sample size needed to detect a relative effect `mde` on a base rate `p`.
///
/// Degenerate inputs (`p` or `mde` not strictly positive, or not finite)
/// yield an all-zero estimate instead of NaN or infinity. Requirements
/// beyond [`MAX_PER_ARM_SAMPLE`] are clamped to it; `ParameterSet::validate`
/// rejects such inputs before a driver ever sees them.
pub fn required_sample_size(
    confidence_level: f64,
    base_click_rate: f64,
    minimum_detectable_effect: f64,
) -> SampleSizeEstimate {
    let z = z_score_for(confidence_level);
    let per_arm =
        match per_arm_requirement(confidence_level, base_click_rate, minimum_detectable_effect) {
            None => 0,
            Some(requirement) => bounded_per_arm(requirement).unwrap_or(MAX_PER_ARM_SAMPLE),
        };

    SampleSizeEstimate {
        z,
        per_arm,
        total: per_arm.saturating_mul(2),
    }
}

/// Total required population (both arms combined).
pub fn required_size(
    confidence_level: f64,
    base_click_rate: f64,
    minimum_detectable_effect: f64,
) -> u64 {
    required_sample_size(confidence_level, base_click_rate, minimum_detectable_effect).total
}

/// Sample size for the statistical inputs of a parameter set.
pub fn estimate_for(params: &ParameterSet) -> SampleSizeEstimate {
    required_sample_size(
        params.confidence_level,
        params.base_click_rate,
        params.minimum_detectable_effect,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_table_lookup() {
        assert_eq!(z_score_for(0.80), 1.28);
        assert_eq!(z_score_for(0.85), 1.44);
        assert_eq!(z_score_for(0.90), 1.65);
        assert_eq!(z_score_for(0.95), 1.96);
        assert_eq!(z_score_for(0.99), 2.58);
    }

    #[test]
    fn test_unknown_confidence_defaults() {
        assert_eq!(z_score_for(0.5), 1.96);
        assert_eq!(z_score_for(f64::NAN), 1.96);
    }

    #[test]
    fn test_default_parameters_scenario() {
        // (1.96² × 0.3 × 0.7 × 2) / (0.3 × 0.1)² = 1792.75 → 1793
        let est = required_sample_size(0.95, 0.3, 0.1);
        assert_eq!(est.per_arm, 1793);
        assert_eq!(est.total, 3586);
        assert_eq!(required_size(0.95, 0.3, 0.1), 3586);
    }

    #[test]
    fn test_degenerate_inputs_return_zero() {
        assert_eq!(required_size(0.95, 0.0, 0.1), 0);
        assert_eq!(required_size(0.95, 0.3, 0.0), 0);
        assert_eq!(required_size(0.95, -0.1, 0.1), 0);
        assert_eq!(required_size(0.95, 0.3, f64::INFINITY), 0);
        assert_eq!(required_size(0.95, 1.0, 0.1), 0);
    }

    #[test]
    fn test_tiny_effect_is_clamped() {
        // ≈ 7.7e20 per arm, well past u64
        let requirement = per_arm_requirement(0.95, 1e-10, 1e-5).unwrap();
        assert!(requirement > u64::MAX as f64);
        assert_eq!(bounded_per_arm(requirement), None);

        let est = required_sample_size(0.95, 1e-10, 1e-5);
        assert_eq!(est.per_arm, MAX_PER_ARM_SAMPLE);
        assert_eq!(est.total, MAX_PER_ARM_SAMPLE * 2);

        // Underflowing delta gives an infinite requirement
        let est = required_sample_size(0.95, 1e-200, 1e-200);
        assert_eq!(est.per_arm, MAX_PER_ARM_SAMPLE);
    }

    #[test]
    fn test_bounded_per_arm_edges() {
        assert_eq!(bounded_per_arm(1792.75), Some(1793));
        assert_eq!(bounded_per_arm(0.0), Some(0));
        assert_eq!(bounded_per_arm(f64::INFINITY), None);
        assert_eq!(bounded_per_arm(MAX_PER_ARM_SAMPLE as f64), None);
    }

    #[test]
    fn test_smaller_mde_needs_more_samples() {
        let mut previous = 0;
        for mde in [0.5, 0.3, 0.2, 0.1, 0.05, 0.02] {
            let size = required_size(0.95, 0.3, mde);
            assert!(size > previous, "mde {mde}: {size} <= {previous}");
            previous = size;
        }
    }

    #[test]
    fn test_higher_confidence_needs_more_samples() {
        let low = required_size(0.80, 0.3, 0.1);
        let high = required_size(0.99, 0.3, 0.1);
        assert!(high > low);
    }

    #[test]
    fn test_deterministic() {
        let a = required_sample_size(0.9, 0.12, 0.07);
        let b = required_sample_size(0.9, 0.12, 0.07);
        assert_eq!(a, b);
    }

    #[test]
    fn test_estimate_for_defaults() {
        let est = estimate_for(&ParameterSet::default());
        assert_eq!(est.total, 3586);
    }
}
