use serde::{Deserialize, Serialize};

use crate::experiment::significance::SignificanceMode;

/// Run policy for the simulation driver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Start a new run right after `reset()` when turbo mode is selected
    pub restart_turbo_on_reset: bool,
    /// Source of the z cutoff for significance verdicts
    pub significance_mode: SignificanceMode,
    /// RNG seed; `None` draws from OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Capacity of the command queue
    pub command_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            restart_turbo_on_reset: false,
            significance_mode: SignificanceMode::default(),
            seed: None,
            event_capacity: 1024,
            command_capacity: 64,
        }
    }
}
