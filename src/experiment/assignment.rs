//! Capacity-constrained random assignment.
//!
//! A fair coin picks the arm; if that arm has already received its half of
//! the required population the impression goes to the other arm instead.

use tracing::trace;

use crate::types::{Arm, VariationState};

use super::rng::RandomSource;

/// Picks the arm for the next impression.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentScheduler {
    /// Probability of tentatively choosing arm A
    split: f64,
}

impl Default for AssignmentScheduler {
    fn default() -> Self {
        Self { split: 0.5 }
    }
}

impl AssignmentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign one impression. Takes one draw from `rng`.
    ///
    /// # Panics
    /// If both arms are already at `capacity_per_arm`; callers must stop
    /// once the required sample size is reached.
    pub fn assign<R: RandomSource + ?Sized>(
        &self,
        state_a: &VariationState,
        state_b: &VariationState,
        capacity_per_arm: u64,
        rng: &mut R,
    ) -> Arm {
        let a_full = state_a.impressions >= capacity_per_arm;
        let b_full = state_b.impressions >= capacity_per_arm;
        assert!(
            !(a_full && b_full),
            "assignment requested with both arms at capacity {capacity_per_arm}"
        );

        let tentative = if rng.next_unit() < self.split {
            Arm::A
        } else {
            Arm::B
        };

        let full = match tentative {
            Arm::A => a_full,
            Arm::B => b_full,
        };

        if full {
            trace!(from = %tentative, to = %tentative.other(), "Arm at capacity, redirecting");
            tentative.other()
        } else {
            tentative
        }
    }
}
