use serde::{Deserialize, Serialize};

use super::Arm;

/// Counters for a single arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationState {
    /// Impressions served to this arm
    pub impressions: u64,
    /// Clicks received (never exceeds `impressions`)
    pub clicks: u64,
    /// Click probability computed for the most recent impression
    pub current_probability: f64,
}

impl VariationState {
    /// Record one evaluated impression.
    pub fn record(&mut self, probability: f64, clicked: bool) {
        self.impressions += 1;
        if clicked {
            self.clicks += 1;
        }
        self.current_probability = probability;
    }

    /// Observed click-through rate, 0 when nothing has been served yet.
    pub fn click_through_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

/// Progress of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub is_running: bool,
    /// Turbo completion percentage in [0, 100]
    pub turbo_progress: u8,
    /// Sum of both arms' impressions
    pub total_impressions: u64,
    /// True iff `total_impressions >= required_population_size`
    pub sample_size_reached: bool,
    /// Impressions needed across both arms (derived from the statistical parameters)
    pub required_population_size: u64,
}

impl RunState {
    /// Per-arm impression cap: half the required population, rounded up.
    pub fn capacity_per_arm(&self) -> u64 {
        self.required_population_size.div_ceil(2)
    }
}

/// Point-in-time view handed to the display layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub arm_a: VariationState,
    pub arm_b: VariationState,
    pub run: RunState,
    /// Whether turbo mode is currently selected
    pub turbo_mode: bool,
}

impl Snapshot {
    pub fn arm(&self, arm: Arm) -> &VariationState {
        match arm {
            Arm::A => &self.arm_a,
            Arm::B => &self.arm_b,
        }
    }

    /// Overall completion relative to the required population, rounded.
    pub fn percent_complete(&self) -> u64 {
        if self.run.required_population_size == 0 {
            return 100;
        }
        let pct = self.run.total_impressions as f64 / self.run.required_population_size as f64;
        (pct * 100.0).round() as u64
    }

    /// Status line shown while a chunked run is in flight.
    pub fn progress_message(&self) -> String {
        format!(
            "Processing simulation: {} of {} impressions ({}% complete)",
            format_count(self.run.total_impressions),
            format_count(self.run.required_population_size),
            self.percent_complete()
        )
    }
}

/// Format an integer with thousands separators (`12345` -> `12,345`).
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_ctr() {
        let mut state = VariationState::default();
        assert_eq!(state.click_through_rate(), 0.0);

        state.record(0.4, true);
        state.record(0.2, false);
        state.record(0.3, false);
        state.record(0.5, true);

        assert_eq!(state.impressions, 4);
        assert_eq!(state.clicks, 2);
        assert!((state.click_through_rate() - 0.5).abs() < 1e-12);
        assert!((state.current_probability - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_rounds_up() {
        let run = RunState {
            required_population_size: 3587,
            ..Default::default()
        };
        assert_eq!(run.capacity_per_arm(), 1794);

        let run = RunState {
            required_population_size: 3586,
            ..Default::default()
        };
        assert_eq!(run.capacity_per_arm(), 1793);
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(3586), "3,586");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_progress_message() {
        let snapshot = Snapshot {
            run: RunState {
                total_impressions: 1793,
                required_population_size: 3586,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            snapshot.progress_message(),
            "Processing simulation: 1,793 of 3,586 impressions (50% complete)"
        );
    }
}
