//! Simulation driver
//!
//! Owns all run state and is its only writer. Two execution modes share the
//! same per-impression pipeline:
//!
//! ```text
//! AssignmentScheduler → AttributeSource → ClickModel → counters → events
//! ```
//!
//! - **Live**: [`SimulationDriver::tick`] serves exactly one impression and
//!   emits per-impression events. The async runtime calls it on a fixed
//!   period of `1000 / tick_rate_hz` ms.
//! - **Turbo**: [`SimulationDriver::run_chunk`] serves up to
//!   `turbo_speed_multiplier` impressions and reports only aggregate
//!   progress. The runtime yields between chunks.
//!
//! The mode is latched when a run starts; toggling `turbo_mode` mid-run only
//! affects the next run.

mod config;
pub mod runtime;

pub use config::DriverConfig;
pub use runtime::{spawn_simulation, Command, SimulationHandle};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::infra::logging::targets;
use crate::types::{Arm, RunState, Snapshot, VariationState};

use super::assignment::AssignmentScheduler;
use super::click_model::{Attributes, ClickModel, ClickOutcome};
use super::display::{AttributeSource, RandomizedDisplay};
use super::events::{EventSink, NullSink, SimulationEvent};
use super::params::{ParameterPatch, ParameterSet};
use super::rng::RandomSource;
use super::sample_size::{estimate_for, SampleSizeEstimate};
use super::significance::{SignificanceEngine, SignificanceVerdict};

/// Execution mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Turbo,
}

/// Driver state as seen by the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Live,
    Turbo,
}

/// One served impression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impression {
    pub arm: Arm,
    pub attributes: Attributes,
    pub outcome: ClickOutcome,
}

/// Result of one turbo chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Impressions served in this chunk
    pub processed: u64,
    /// Turbo progress after the chunk
    pub progress: u8,
    /// The turbo run is over
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct TurboRun {
    processed: u64,
    total_needed: u64,
}

impl TurboRun {
    fn progress(&self) -> u8 {
        if self.total_needed == 0 {
            return 100;
        }
        (self.processed.saturating_mul(100) / self.total_needed).min(100) as u8
    }
}

/// Single-owner state machine for an A/B run.
pub struct SimulationDriver<R, D = RandomizedDisplay, S = NullSink> {
    params: ParameterSet,
    config: DriverConfig,
    sample_size: SampleSizeEstimate,
    arm_a: VariationState,
    arm_b: VariationState,
    run: RunState,
    mode: Option<RunMode>,
    turbo: TurboRun,
    rng: R,
    display: D,
    sink: S,
    click_model: ClickModel,
    scheduler: AssignmentScheduler,
}

impl<R: RandomSource> SimulationDriver<R> {
    /// Driver with the default randomized display and no event sink.
    pub fn new(params: ParameterSet, config: DriverConfig, rng: R) -> Result<Self, ConfigError> {
        params.validate()?;
        let sample_size = estimate_for(&params);
        let run = RunState {
            required_population_size: sample_size.total,
            sample_size_reached: sample_size.total == 0,
            ..Default::default()
        };

        info!(
            target: targets::DRIVER,
            required = sample_size.total,
            per_arm = sample_size.per_arm,
            z = sample_size.z,
            "Simulation driver created"
        );

        Ok(Self {
            params,
            config,
            sample_size,
            arm_a: VariationState::default(),
            arm_b: VariationState::default(),
            run,
            mode: None,
            turbo: TurboRun::default(),
            rng,
            display: RandomizedDisplay::default(),
            sink: NullSink,
            click_model: ClickModel::new(),
            scheduler: AssignmentScheduler::new(),
        })
    }
}

impl<R, D, S> SimulationDriver<R, D, S>
where
    R: RandomSource,
    D: AttributeSource,
    S: EventSink,
{
    /// Replace the attribute source.
    pub fn with_display<D2: AttributeSource>(self, display: D2) -> SimulationDriver<R, D2, S> {
        SimulationDriver {
            params: self.params,
            config: self.config,
            sample_size: self.sample_size,
            arm_a: self.arm_a,
            arm_b: self.arm_b,
            run: self.run,
            mode: self.mode,
            turbo: self.turbo,
            rng: self.rng,
            display,
            sink: self.sink,
            click_model: self.click_model,
            scheduler: self.scheduler,
        }
    }

    /// Replace the event sink.
    pub fn with_sink<S2: EventSink>(self, sink: S2) -> SimulationDriver<R, D, S2> {
        SimulationDriver {
            params: self.params,
            config: self.config,
            sample_size: self.sample_size,
            arm_a: self.arm_a,
            arm_b: self.arm_b,
            run: self.run,
            mode: self.mode,
            turbo: self.turbo,
            rng: self.rng,
            display: self.display,
            sink,
            click_model: self.click_model,
            scheduler: self.scheduler,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn sample_size(&self) -> &SampleSizeEstimate {
        &self.sample_size
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn arm(&self, arm: Arm) -> &VariationState {
        match arm {
            Arm::A => &self.arm_a,
            Arm::B => &self.arm_b,
        }
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn phase(&self) -> Phase {
        match (self.run.is_running, self.mode) {
            (true, Some(RunMode::Live)) => Phase::Live,
            (true, Some(RunMode::Turbo)) => Phase::Turbo,
            _ => Phase::Idle,
        }
    }

    /// Live-mode tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.params.tick_rate_hz.max(1)))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            arm_a: self.arm_a,
            arm_b: self.arm_b,
            run: self.run,
            turbo_mode: self.params.turbo_mode,
        }
    }

    /// Lift and significance of A against B.
    pub fn verdict(&self) -> SignificanceVerdict {
        self.verdict_for(Arm::A)
    }

    /// Lift and significance of `treatment` against the other arm.
    pub fn verdict_for(&self, treatment: Arm) -> SignificanceVerdict {
        SignificanceEngine::for_params(&self.params, self.config.significance_mode)
            .evaluate(self.arm(treatment), self.arm(treatment.other()))
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Merge `patch` into the parameters.
    ///
    /// The merged set is validated as a whole; on error nothing changes.
    /// Once the sample size is reached `turbo_mode` stays off until reset.
    pub fn configure(&mut self, patch: &ParameterPatch) -> Result<(), ConfigError> {
        let candidate = patch.apply_to(&self.params);
        if let Err(e) = candidate.validate() {
            warn!(target: targets::CONFIG, error = %e, "Rejected parameter update");
            return Err(e);
        }

        self.params = candidate;
        if patch.touches_sample_size() {
            self.refresh_sample_size();
        }
        if self.run.sample_size_reached && self.params.turbo_mode {
            debug!(target: targets::CONFIG, "Sample size reached, turbo_mode forced off");
            self.params.turbo_mode = false;
        }
        Ok(())
    }

    /// Start a run in the currently selected mode.
    ///
    /// Returns false if a run is already active or the sample size has been
    /// reached (reset first).
    pub fn start(&mut self) -> bool {
        if self.run.sample_size_reached {
            info!(target: targets::DRIVER, "Sample size reached, reset to run again");
            return false;
        }
        if self.run.is_running {
            return false;
        }

        let mode = if self.params.turbo_mode {
            RunMode::Turbo
        } else {
            RunMode::Live
        };
        self.mode = Some(mode);
        self.run.is_running = true;

        if mode == RunMode::Turbo {
            self.turbo = TurboRun {
                processed: 0,
                total_needed: self.remaining(),
            };
            self.run.turbo_progress = 0;
        }

        info!(
            target: targets::DRIVER,
            mode = ?mode,
            total = self.run.total_impressions,
            required = self.run.required_population_size,
            "Run started"
        );
        self.sink.emit(SimulationEvent::RunStateChanged { running: true });
        true
    }

    /// Pause the active run, keeping counters.
    pub fn stop(&mut self) {
        if !self.run.is_running {
            return;
        }
        self.run.is_running = false;
        self.mode = None;
        info!(target: targets::DRIVER, total = self.run.total_impressions, "Run stopped");
        self.sink.emit(SimulationEvent::RunStateChanged { running: false });
    }

    /// Stop and zero all counters.
    ///
    /// With `restart_turbo_on_reset` set and turbo mode selected, a fresh
    /// turbo run starts immediately.
    pub fn reset(&mut self) {
        self.stop();

        self.arm_a = VariationState::default();
        self.arm_b = VariationState::default();
        self.run = RunState {
            required_population_size: self.sample_size.total,
            sample_size_reached: self.sample_size.total == 0,
            ..Default::default()
        };
        self.turbo = TurboRun::default();

        info!(target: targets::DRIVER, "Simulation reset");
        self.sink.emit(SimulationEvent::Reset);

        if self.config.restart_turbo_on_reset && self.params.turbo_mode {
            self.start();
        }
    }

    /// Flip turbo mode.
    ///
    /// Enabling is refused once the sample size is reached. Enabling clears
    /// turbo progress and starts a run if none is active. Returns the new
    /// `turbo_mode`.
    pub fn toggle_turbo(&mut self) -> bool {
        if self.run.sample_size_reached && !self.params.turbo_mode {
            return false;
        }

        self.params.turbo_mode = !self.params.turbo_mode;
        if self.params.turbo_mode {
            self.run.turbo_progress = 0;
            if !self.run.is_running {
                self.start();
            }
        }
        self.params.turbo_mode
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Serve one live-mode impression.
    ///
    /// Does nothing unless a live run is active.
    pub fn tick(&mut self) -> Option<Impression> {
        if self.phase() != Phase::Live || self.run.sample_size_reached {
            return None;
        }

        let impression = self.serve()?;
        let arm = impression.arm;

        self.sink.emit(SimulationEvent::Impression { arm });
        self.sink.emit(SimulationEvent::ProbabilityChange {
            arm,
            probability: impression.outcome.probability,
        });
        if impression.outcome.clicked {
            let count = self.arm(arm).clicks;
            self.sink.emit(SimulationEvent::Click { arm, count });
        }

        if self.run.sample_size_reached {
            self.finish_run();
        }
        Some(impression)
    }

    /// Serve one turbo chunk of up to `turbo_speed_multiplier` impressions.
    ///
    /// Stop and sample-size checks run between impressions, so the run never
    /// overshoots by more than one impression.
    pub fn run_chunk(&mut self) -> ChunkOutcome {
        if self.phase() != Phase::Turbo {
            return ChunkOutcome {
                processed: 0,
                progress: self.run.turbo_progress,
                finished: true,
            };
        }

        let chunk = u64::from(self.params.turbo_speed_multiplier);
        let mut processed = 0;

        while processed < chunk && self.turbo.processed < self.turbo.total_needed {
            if !self.run.is_running || self.run.sample_size_reached {
                break;
            }
            if self.serve().is_none() {
                break;
            }
            processed += 1;
            self.turbo.processed += 1;
        }

        let progress = self.turbo.progress();
        self.run.turbo_progress = progress;
        self.sink.emit(SimulationEvent::Progress { percent: progress });

        debug!(
            target: targets::DRIVER,
            processed,
            done = self.turbo.processed,
            needed = self.turbo.total_needed,
            progress,
            "Turbo chunk complete"
        );

        let finished =
            self.turbo.processed >= self.turbo.total_needed || self.run.sample_size_reached;
        if finished {
            self.run.turbo_progress = 100;
            self.params.turbo_mode = false;
            self.finish_run();
        }

        ChunkOutcome {
            processed,
            progress: self.run.turbo_progress,
            finished,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn remaining(&self) -> u64 {
        self.run
            .required_population_size
            .saturating_sub(self.run.total_impressions)
    }

    /// Assign, render, evaluate and record one impression.
    fn serve(&mut self) -> Option<Impression> {
        if self.run.sample_size_reached {
            return None;
        }

        let capacity = self.run.capacity_per_arm();
        let arm = self
            .scheduler
            .assign(&self.arm_a, &self.arm_b, capacity, &mut self.rng);
        let attributes = self.display.render(arm, &mut self.rng);
        let outcome = self
            .click_model
            .evaluate(&attributes, &self.params, &mut self.rng);

        let state = match arm {
            Arm::A => &mut self.arm_a,
            Arm::B => &mut self.arm_b,
        };
        state.record(outcome.probability, outcome.clicked);
        assert!(
            state.clicks <= state.impressions,
            "arm {arm}: clicks {} exceed impressions {}",
            state.clicks,
            state.impressions
        );
        assert!(
            state.impressions <= capacity,
            "arm {arm}: impressions {} exceed capacity {capacity}",
            state.impressions
        );

        self.run.total_impressions += 1;
        debug_assert_eq!(
            self.run.total_impressions,
            self.arm_a.impressions + self.arm_b.impressions
        );

        if self.run.total_impressions >= self.run.required_population_size {
            self.run.sample_size_reached = true;
        }

        Some(Impression {
            arm,
            attributes,
            outcome,
        })
    }

    /// Stop after the required sample is in, clearing turbo mode.
    fn finish_run(&mut self) {
        let reached = self.run.sample_size_reached;
        if reached {
            self.params.turbo_mode = false;
        }
        self.stop();
        if reached {
            info!(
                target: targets::DRIVER,
                total = self.run.total_impressions,
                a = self.arm_a.impressions,
                b = self.arm_b.impressions,
                "Sample size reached"
            );
            self.sink.emit(SimulationEvent::SampleReached {
                total_impressions: self.run.total_impressions,
            });
        }
    }

    /// Recompute the required population after a statistical input changed.
    fn refresh_sample_size(&mut self) {
        self.sample_size = estimate_for(&self.params);
        self.run.required_population_size = self.sample_size.total;

        debug!(
            target: targets::STATS,
            required = self.sample_size.total,
            per_arm = self.sample_size.per_arm,
            "Required population recomputed"
        );

        if self.phase() == Phase::Turbo {
            self.turbo.total_needed = self.turbo.processed + self.remaining();
        }

        let reached = self.run.total_impressions >= self.run.required_population_size;
        if reached == self.run.sample_size_reached {
            return;
        }
        self.run.sample_size_reached = reached;
        if reached && self.run.is_running {
            if self.mode == Some(RunMode::Turbo) {
                self.run.turbo_progress = 100;
            }
            self.finish_run();
        } else if reached {
            self.params.turbo_mode = false;
        }
    }
}
