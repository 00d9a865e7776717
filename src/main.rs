//! Command-line interface for mqtt-loadgen
//!
//! # Usage Examples
//!
//! ## Run
//! ```bash
//! # Settings from mqtt_config.txt, points from points.txt
//! mqtt-loadgen run
//!
//! # Explicit files, with the broker overridden
//! mqtt-loadgen run --config loadgen.json --points-file points.txt \
//!   --broker 10.0.0.5 --port 1883
//!
//! # No files at all
//! mqtt-loadgen run --broker localhost --topic plant/points \
//!   --points P1,P2 --duration 5m --interval 1s
//! ```
//!
//! ## Generate
//! ```bash
//! mqtt-loadgen generate --point Boiler1 --seed 42 --pretty
//! ```
//!
//! Set `RUST_LOG` (e.g. `RUST_LOG=debug`) to change log verbosity.

use anyhow::Context;
use clap::{Parser, Subcommand};
use loadgen_engine::{RunController, RunState, RunStatus};
use loadgen_mqtt::MqttTransport;
use loadgen_payload::PayloadGenerator;
use mqtt_loadgen::{config, GenerateOpts, RunOpts};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mqtt-loadgen")]
#[command(about = "Synthetic MQTT load generator: periodic JSON records per point")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and publish for every point until the run ends
    Run {
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Print sample records without connecting to a broker
    Generate {
        #[command(flatten)]
        opts: GenerateOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { opts } => run_loadgen(opts).await,
        Commands::Generate { opts } => run_generate(opts),
    }
}

async fn run_loadgen(opts: RunOpts) -> anyhow::Result<()> {
    let file = config::load_file_config(&opts).context("Failed to load configuration file")?;
    let run_config = config::resolve_run_config(file, &opts).context("Invalid configuration")?;
    let points = config::resolve_points(&opts).context("Failed to load points")?;

    info!(
        "Broker {}:{}, topic '{}', client '{}', {} points",
        run_config.broker_address,
        run_config.broker_port,
        run_config.topic,
        run_config.client_id,
        points.len()
    );

    let controller = RunController::new(Arc::new(MqttTransport::new()));
    let interrupt_handler = spawn_interrupt_handler(controller.clone());

    let state = controller.start_run(run_config, points).await;
    let state = match state {
        Ok(state) => state,
        Err(e) => {
            interrupt_handler.abort();
            return Err(e).context("Failed to start run");
        }
    };

    if state == RunState::Stopped {
        interrupt_handler.abort();
        info!("Run stopped before publishing started");
        return Ok(());
    }

    let report = if opts.status_interval.is_zero() {
        controller.wait().await
    } else {
        let mut ticker = tokio::time::interval(opts.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        let wait = controller.wait();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                report = &mut wait => break report,
                _ = ticker.tick() => log_status(&controller.status().await),
            }
        }
    };

    interrupt_handler.abort();

    match report {
        Some(report) => {
            println!("{}", report.summary());
            if !report.unclean_workers.is_empty() {
                warn!(
                    "{} worker(s) did not stop cleanly",
                    report.unclean_workers.len()
                );
            }
        }
        None => info!("Run ended without a report"),
    }

    Ok(())
}

/// Route Ctrl-C to the controller so the run shuts down cleanly.
fn spawn_interrupt_handler(controller: RunController) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal (Ctrl+C)");
                controller.interrupt().await;
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    })
}

fn log_status(status: &RunStatus) {
    let elapsed = status.elapsed.unwrap_or_default();
    info!(
        "Status: {} ({}), {:.0}s elapsed, {} messages sent across {} points",
        status.state,
        status.connection,
        elapsed.as_secs_f64(),
        status.total_sent(),
        status.counts.len()
    );
}

fn run_generate(opts: GenerateOpts) -> anyhow::Result<()> {
    let mut generator = match opts.seed {
        Some(seed) => PayloadGenerator::with_seed(seed),
        None => PayloadGenerator::new(),
    };

    for _ in 0..opts.count {
        let record = generator.generate(&opts.point);
        let json = if opts.pretty {
            serde_json::to_string_pretty(&record)
        } else {
            serde_json::to_string(&record)
        }
        .context("Failed to encode record")?;
        println!("{json}");
    }

    Ok(())
}
