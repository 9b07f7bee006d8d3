//! Past/Present timeline simulator CLI
//!
//! Runs deterministic timeline scenarios, or paces one world against the
//! wall clock with `--realtime`.

use clap::Parser;
use ppf_env::TokioContext;
use ppf_sim::scenarios::ScenarioId;
use ppf_sim::{ScenarioResult, ScenarioRunner, SimError, SimExport, SimWorld};
use ppf_timeline::{Role, SessionConfig};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Past/Present timeline deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "ppf-sim")]
#[command(about = "Run deterministic simulation tests for the Past/Present timeline", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, role_flip, spawn_churn, stall, late_join, overflow, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulation duration in seconds (scenarios extend it to cover their checks)
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Session configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Past view delay in seconds (overrides the config file)
    #[arg(long)]
    delay: Option<f64>,

    /// Samples per second (overrides the config file)
    #[arg(long)]
    rate: Option<u32>,

    /// Seconds of history kept per entity (overrides the config file)
    #[arg(long)]
    history: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export frames with present and past poses to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Pace ticks against the wall clock and log the debug HUD
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every scenario run passed.
async fn run(args: &Args) -> Result<bool, SimError> {
    if !args.json {
        info!("Past/Present timeline simulator v{}", env!("CARGO_PKG_VERSION"));
    }

    let session = load_session(args)?;
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse()?]
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed)
        .with_duration(args.duration)
        .with_session(session);

    if args.realtime {
        return run_realtime(&runner, scenarios[0], args.duration).await;
    }

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            error!("--export only supports a single scenario, not 'all'");
            return Ok(false);
        }
        let scenario = scenarios[0];
        let mut export = SimExport::new(scenario.name(), seed);
        let result = runner.run_exported(scenario, &mut export);
        export.write_to_file(export_path)?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);
        report(args, &[result])?;
        return Ok(export.passed);
    }

    let results: Vec<ScenarioResult> = scenarios.iter().map(|s| runner.run(*s)).collect();
    report(args, &results)?;
    Ok(results.iter().all(|r| r.passed))
}

/// Reads `--config` (or defaults) and applies the flag overrides.
fn load_session(args: &Args) -> Result<SessionConfig, SimError> {
    let mut session = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };

    if let Some(delay) = args.delay {
        session.timeline.past_delay_seconds = delay;
    }
    if let Some(rate) = args.rate {
        session.timeline.samples_per_second = rate;
    }
    if let Some(history) = args.history {
        session.timeline.history_seconds = history;
    }

    session.validate()?;
    debug!("Session config: {:?}", session);
    Ok(session)
}

fn report(args: &Args, results: &[ScenarioResult]) -> Result<(), SimError> {
    let total = results.len();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "entities": r.final_entity_count,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for result in results {
        if result.passed {
            info!(
                "PASS {} (seed={}) max proxy error {:.3}m over {} comparisons",
                result.scenario,
                result.seed,
                result.metrics.max_proxy_error,
                result.metrics.error_samples
            );
        } else {
            error!(
                "FAIL {} (seed={}): {}",
                result.scenario,
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    if failed == 0 {
        info!("All {} scenario runs passed", total);
    } else {
        error!("{}/{} scenario runs failed", failed, total);
    }
    Ok(())
}

/// Ticks one world at wall-clock pace with a Past viewer, logging the HUD.
async fn run_realtime(
    runner: &ScenarioRunner,
    scenario: ScenarioId,
    duration: f64,
) -> Result<bool, SimError> {
    if scenario != ScenarioId::Baseline {
        warn!("--realtime drives a plain world; {} checks are skipped", scenario);
    }

    let mut world = SimWorld::new(runner.sim_config(scenario))?;
    world.populate();
    world.start_recorder()?;
    world.join_as(Role::Past);

    let pacer = TokioContext::new();
    let dt = world.config.dt();
    let ticks = (duration * world.config.tick_rate_hz as f64).round() as u64;
    info!("Realtime run: {} ticks at {} Hz", ticks, world.config.tick_rate_hz);

    for i in 1..=ticks {
        let tick = world.tick();
        if let Some(text) = &tick.report.hud {
            debug!("{}", text.replace('\n', " | "));
        }

        // Sleep off whatever is left of this tick's wall-clock slot
        pacer.sleep_until(Duration::from_secs_f64(i as f64 * dt)).await;
    }

    let tracked = world.tracked_count();
    info!(
        "Realtime run finished at t={:.2}s, {} entities tracked, {} proxies",
        world.time(),
        tracked,
        world.runtime().projector().proxy_count()
    );
    Ok(tracked == world.oracle.entity_count())
}
