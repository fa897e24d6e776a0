//! A/B experiment engine.
//!
//! Per impression, the pipeline is:
//!
//! ```text
//! AssignmentScheduler ─► AttributeSource ─► ClickModel ─► VariationState
//!     (which arm)          (what is shown)    (p, click)     (counters)
//! ```
//!
//! [`SimulationDriver`] runs that pipeline in live or turbo mode and is the
//! only writer of run state. [`spawn_simulation`] moves it onto a tokio task
//! and hands back a [`SimulationHandle`]. Statistics live in
//! [`sample_size`] and [`significance`].

pub mod assignment;
pub mod click_model;
pub mod display;
pub mod driver;
pub mod events;
pub mod params;
pub mod rng;
pub mod sample_size;
pub mod significance;

#[cfg(test)]
mod tests;

pub use assignment::AssignmentScheduler;
pub use click_model::{Attributes, ClickModel, ClickOutcome};
pub use display::{AttributeSource, DisplayOdds, FixedDisplay, RandomizedDisplay};
pub use driver::{
    spawn_simulation, ChunkOutcome, Command, DriverConfig, Impression, Phase, RunMode,
    SimulationDriver, SimulationHandle,
};
pub use events::{BroadcastSink, EventSink, NullSink, SimulationEvent};
pub use params::{ParameterPatch, ParameterSet};
pub use rng::{seeded_rng, RandomSource, SequenceRng};
pub use sample_size::{
    estimate_for, per_arm_requirement, required_sample_size, required_size, z_score_for,
    SampleSizeEstimate,
};
pub use significance::{normal_sf, SignificanceEngine, SignificanceMode, SignificanceVerdict};
