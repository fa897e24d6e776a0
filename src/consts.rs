/// Two-sided z-scores for the supported confidence levels.
pub const Z_TABLE: [(f64, f64); 5] = [
    (0.80, 1.28),
    (0.85, 1.44),
    (0.90, 1.65),
    (0.95, 1.96),
    (0.99, 2.58),
];

/// z used when a confidence level is not in [`Z_TABLE`].
pub const DEFAULT_Z: f64 = 1.96;

/// Significance cutoff for `SignificanceMode::Fixed95` (95%, two-sided).
pub const FIXED_SIGNIFICANCE_Z: f64 = 1.96;

/// Floor on the per-arm sample before significance is evaluated.
pub const MIN_SIGNIFICANCE_SAMPLE: f64 = 30.0;

/// Fraction of the required per-arm size that must be observed before
/// significance is evaluated.
pub const MIN_SIGNIFICANCE_FRACTION: f64 = 0.05;

/// Default impressions per turbo chunk.
pub const TURBO_SPEED_MULTIPLIER: u32 = 100;

/// Live tick rate bounds (Hz).
pub const MIN_TICK_RATE_HZ: u32 = 1;
pub const MAX_TICK_RATE_HZ: u32 = 30;

/// Tolerance used when matching a configured confidence level against [`Z_TABLE`].
pub const EPSILON: f64 = 1e-9;

/// Largest per-arm sample the driver accepts; keeps `2 · per_arm` within `u64`.
pub const MAX_PER_ARM_SAMPLE: u64 = u64::MAX / 2;
