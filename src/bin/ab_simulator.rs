//! A/B Test Simulator
//!
//! Runs a two-arm click-through experiment until the required sample size
//! is reached, then reports lift and significance.
//! - CLI arguments and TOML config file support
//! - Live (ticked) or turbo (chunked) execution
//! - Structured logging with tracing

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use ab_simulator::{
    init_logging, seeded_rng, spawn_simulation, AppConfig, Arm, LogFormat, ParameterPatch,
    SignificanceVerdict, SimulationDriver, SimulationEvent, SimulationHandle, Snapshot,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "ab_simulator")]
#[command(version, about = "A/B test simulation and statistics engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ab_simulator.toml")]
    config: String,

    /// Override baseline click probability
    #[arg(long)]
    base_click_rate: Option<f64>,

    /// Override minimum detectable effect (relative, e.g. 0.1 = 10%)
    #[arg(long)]
    mde: Option<f64>,

    /// Override confidence level (0.80, 0.85, 0.90, 0.95, 0.99)
    #[arg(long)]
    confidence: Option<f64>,

    /// Override live-mode impressions per second
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Run in turbo mode
    #[arg(long)]
    turbo: bool,

    /// RNG seed for reproducible runs
    #[arg(long, env = "AB_SIMULATOR_SEED")]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "ab_simulator.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the simulation (default)
    Run,
}

impl Cli {
    fn parameter_patch(&self) -> ParameterPatch {
        ParameterPatch {
            base_click_rate: self.base_click_rate,
            minimum_detectable_effect: self.mde,
            confidence_level: self.confidence,
            tick_rate_hz: self.tick_rate,
            turbo_mode: self.turbo.then_some(true),
            ..Default::default()
        }
    }
}

/// Final readout.
#[derive(Serialize)]
struct Report {
    snapshot: Snapshot,
    a_vs_b: SignificanceVerdict,
    b_vs_a: SignificanceVerdict,
    completed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            AppConfig::write_sample(output)?;
            println!("Sample config written to: {}", output);
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let mut config = load_config(&cli)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _guards = init_logging(&config.logging, None)?;

    let display = config.display.build()?;
    let driver = SimulationDriver::new(
        config.population.clone(),
        config.driver.clone(),
        seeded_rng(config.driver.seed),
    )?
    .with_display(display);

    print_startup_banner(&config);

    let (handle, task) = spawn_simulation(driver);
    let reporter = tokio::spawn(report_progress(handle.clone()));

    if !handle.start().await? {
        warn!("Simulation did not start");
    }

    let completed = tokio::select! {
        result = handle.wait_until_reached() => {
            result?;
            true
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received (SIGINT/Ctrl+C)");
            handle.stop().await?;
            false
        }
    };

    let report = Report {
        a_vs_b: handle.verdict(Arm::A).await?,
        b_vs_a: handle.verdict(Arm::B).await?,
        snapshot: handle.snapshot(),
        completed,
    };

    handle.shutdown().await?;
    task.await?;
    reporter.abort();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(&cli.config)?;
    let patch = cli.parameter_patch();
    if !patch.is_empty() {
        debug!(?patch, "Applying command-line overrides");
        config.population = patch.apply_to(&config.population);
    }
    if cli.seed.is_some() {
        config.driver.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

/// Log turbo progress and sample completion as they happen.
async fn report_progress(handle: SimulationHandle) {
    let mut events = handle.subscribe_events();
    loop {
        match events.recv().await {
            Ok(SimulationEvent::Progress { percent }) => {
                info!(percent, "{}", handle.snapshot().progress_message());
            }
            Ok(SimulationEvent::Click { arm, count }) => {
                debug!(%arm, clicks = count, "Click");
            }
            Ok(SimulationEvent::SampleReached { total_impressions }) => {
                info!(total_impressions, "Required sample size reached");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress reporter lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_startup_banner(config: &AppConfig) {
    let version = env!("CARGO_PKG_VERSION");
    let params = &config.population;
    let estimate = ab_simulator::estimate_for(params);
    let mode = if params.turbo_mode { "turbo" } else { "live" };

    eprintln!();
    eprintln!("A/B Test Simulator v{version}");
    eprintln!(
        "  base rate {:.3}  MDE {:.1}%  confidence {:.0}%  mode {}",
        params.base_click_rate,
        params.minimum_detectable_effect * 100.0,
        params.confidence_level * 100.0,
        mode
    );
    eprintln!(
        "  required population {} ({} per arm)",
        ab_simulator::format_count(estimate.total),
        ab_simulator::format_count(estimate.per_arm)
    );
    eprintln!();
}

fn print_report(report: &Report) {
    let snap = &report.snapshot;

    println!();
    println!("═══════════════════════════════════════════════════════════");
    if report.completed {
        println!("  Results");
    } else {
        println!("  Results (interrupted)");
    }
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("  {}", snap.progress_message());
    println!();
    for arm in Arm::ALL {
        let state = snap.arm(arm);
        println!(
            "  {}:  {:>8} impressions  {:>8} clicks  CTR {:>6.2}%",
            arm.label(),
            ab_simulator::format_count(state.impressions),
            ab_simulator::format_count(state.clicks),
            state.click_through_rate() * 100.0
        );
    }
    println!();

    let verdict = &report.a_vs_b;
    match verdict.lift {
        Some(lift) => println!("  Lift (A vs B):   {:+.2}%", lift),
        None => println!("  Lift (A vs B):   n/a"),
    }
    if let Some(lift) = report.b_vs_a.lift {
        println!("  Lift (B vs A):   {:+.2}%", lift);
    }
    if !verdict.has_enough_data {
        println!("  Not enough data for a significance test");
    } else if let (Some(z), Some(p)) = (verdict.z_score, verdict.p_value) {
        println!("  z = {:.3}, p = {:.4}", z, p);
        if verdict.significant {
            println!("  Statistically significant");
        } else {
            println!("  Not statistically significant");
        }
    }
    println!();
}
