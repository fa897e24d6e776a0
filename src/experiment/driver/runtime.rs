//! Async actor around [`SimulationDriver`].
//!
//! One task owns the driver. Commands arrive over an mpsc queue and are
//! applied between impressions (live) or between chunks (turbo), so a stop
//! or reset never interleaves with a half-recorded impression.
//!
//! Outputs:
//! - `watch` channel with the latest [`Snapshot`], replaced after every
//!   tick, chunk and command
//! - `broadcast` channel with [`SimulationEvent`]s

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, Error, Result};
use crate::experiment::display::AttributeSource;
use crate::experiment::events::{BroadcastSink, SimulationEvent};
use crate::experiment::params::ParameterPatch;
use crate::experiment::rng::RandomSource;
use crate::experiment::significance::SignificanceVerdict;
use crate::infra::logging::targets;
use crate::types::{Arm, Snapshot};

use super::{Phase, SimulationDriver};

/// Request to the simulation task.
#[derive(Debug)]
pub enum Command {
    Configure {
        patch: ParameterPatch,
        reply: oneshot::Sender<std::result::Result<(), ConfigError>>,
    },
    Start {
        reply: oneshot::Sender<bool>,
    },
    Stop,
    Reset,
    ToggleTurbo {
        reply: oneshot::Sender<bool>,
    },
    Verdict {
        treatment: Arm,
        reply: oneshot::Sender<SignificanceVerdict>,
    },
    Shutdown,
}

/// Cloneable front end of a running simulation.
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    events: broadcast::Sender<SimulationEvent>,
}

impl SimulationHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::RuntimeClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| Error::RuntimeClosed)
    }

    /// Merge a parameter patch. Rejected patches change nothing.
    pub async fn configure(&self, patch: ParameterPatch) -> Result<()> {
        self.request(|reply| Command::Configure { patch, reply })
            .await?
            .map_err(Error::from)
    }

    /// Start a run; `false` if one is active or the sample is complete.
    pub async fn start(&self) -> Result<bool> {
        self.request(|reply| Command::Start { reply }).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    /// Flip turbo mode, returning the new setting.
    pub async fn toggle_turbo(&self) -> Result<bool> {
        self.request(|reply| Command::ToggleTurbo { reply }).await
    }

    /// Lift and significance of `treatment` against the other arm.
    pub async fn verdict(&self, treatment: Arm) -> Result<SignificanceVerdict> {
        self.request(|reply| Command::Verdict { treatment, reply })
            .await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshots.borrow()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SimulationEvent> {
        self.events.subscribe()
    }

    /// Wait until the required population has been served.
    pub async fn wait_until_reached(&self) -> Result<Snapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| s.run.sample_size_reached)
            .await
            .map_err(|_| Error::RuntimeClosed)?;
        Ok(*snapshot)
    }

    /// Ask the task to exit. The join handle yields the driver.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

/// Move `driver` onto its own task.
///
/// Events are fanned out over a broadcast channel sized by
/// `DriverConfig::event_capacity`.
pub fn spawn_simulation<R, D>(
    driver: SimulationDriver<R, D>,
) -> (
    SimulationHandle,
    JoinHandle<SimulationDriver<R, D, BroadcastSink>>,
)
where
    R: RandomSource + Send + 'static,
    D: AttributeSource + Send + 'static,
{
    let config = driver.config().clone();
    let sink = BroadcastSink::new(config.event_capacity);
    let events = sink.sender();
    let driver = driver.with_sink(sink);

    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
    let (snap_tx, snap_rx) = watch::channel(driver.snapshot());

    let task = tokio::spawn(run_loop(driver, cmd_rx, snap_tx));

    let handle = SimulationHandle {
        commands: cmd_tx,
        snapshots: snap_rx,
        events,
    };
    (handle, task)
}

enum Flow {
    Continue,
    Exit,
}

async fn run_loop<R, D>(
    mut driver: SimulationDriver<R, D, BroadcastSink>,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
) -> SimulationDriver<R, D, BroadcastSink>
where
    R: RandomSource,
    D: AttributeSource,
{
    info!(target: targets::DRIVER, "Simulation task started");

    'outer: loop {
        match driver.phase() {
            Phase::Idle => match commands.recv().await {
                Some(command) => {
                    let flow = apply(&mut driver, command);
                    snapshots.send_replace(driver.snapshot());
                    if let Flow::Exit = flow {
                        break 'outer;
                    }
                }
                None => break 'outer,
            },

            Phase::Live => {
                let mut period = driver.tick_interval();
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                while driver.phase() == Phase::Live {
                    tokio::select! {
                        _ = ticker.tick() => {
                            driver.tick();
                            snapshots.send_replace(driver.snapshot());
                        }
                        command = commands.recv() => {
                            let Some(command) = command else {
                                break 'outer;
                            };
                            let flow = apply(&mut driver, command);
                            snapshots.send_replace(driver.snapshot());
                            if let Flow::Exit = flow {
                                break 'outer;
                            }

                            // Tick rate changed mid-run
                            if driver.tick_interval() != period {
                                period = driver.tick_interval();
                                ticker = interval_at(Instant::now() + period, period);
                                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            }
                        }
                    }
                }
            }

            Phase::Turbo => {
                driver.run_chunk();
                snapshots.send_replace(driver.snapshot());

                loop {
                    match commands.try_recv() {
                        Ok(command) => {
                            let flow = apply(&mut driver, command);
                            snapshots.send_replace(driver.snapshot());
                            if let Flow::Exit = flow {
                                break 'outer;
                            }
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => break 'outer,
                    }
                }

                tokio::task::yield_now().await;
            }
        }
    }

    driver.stop();
    snapshots.send_replace(driver.snapshot());
    info!(
        target: targets::DRIVER,
        total = driver.run_state().total_impressions,
        "Simulation task stopped"
    );
    driver
}

fn apply<R, D>(driver: &mut SimulationDriver<R, D, BroadcastSink>, command: Command) -> Flow
where
    R: RandomSource,
    D: AttributeSource,
{
    debug!(target: targets::DRIVER, command = ?command, "Command received");

    match command {
        Command::Configure { patch, reply } => {
            let _ = reply.send(driver.configure(&patch));
        }
        Command::Start { reply } => {
            let _ = reply.send(driver.start());
        }
        Command::Stop => driver.stop(),
        Command::Reset => driver.reset(),
        Command::ToggleTurbo { reply } => {
            let _ = reply.send(driver.toggle_turbo());
        }
        Command::Verdict { treatment, reply } => {
            if reply.send(driver.verdict_for(treatment)).is_err() {
                warn!(target: targets::DRIVER, "Verdict requester went away");
            }
        }
        Command::Shutdown => return Flow::Exit,
    }
    Flow::Continue
}
