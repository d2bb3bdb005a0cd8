//! Connected Ops - fleet telemetry risk engine server
//!
//! # Usage
//!
//! ```bash
//! # Serve the API with built-in defaults
//! cargo run --release
//!
//! # Serve and feed it from an in-process emulated fleet
//! cargo run --release -- --simulate --vehicles 5 --interval-ms 500 --seed 7
//!
//! # Use a specific config file
//! cargo run --release -- --config ./connected_ops.toml
//! ```
//!
//! # Environment Variables
//!
//! - `CONNECTED_OPS_CONFIG`: Path to the TOML config file
//! - `CONNECTED_OPS_ADDR`: Override the bind address
//! - `CONNECTED_OPS_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use connected_ops::api::{create_app, ApiState};
use connected_ops::config::{defaults, EmulatorConfig, EngineConfig};
use connected_ops::{RiskEngine, TelemetryEmulator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "connected-ops")]
#[command(about = "Connected Ops fleet telemetry risk engine")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides CONNECTED_OPS_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the server address from the config file
    #[arg(short, long, env = "CONNECTED_OPS_ADDR", value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Run an in-process emulated fleet that feeds the engine
    #[arg(long)]
    simulate: bool,

    /// Number of emulated vehicles (with --simulate)
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=500))]
    vehicles: u32,

    /// Delay between emulated samples per vehicle, in milliseconds
    #[arg(long, default_value_t = defaults::EMULATOR_INTERVAL_MS)]
    interval_ms: u64,

    /// Random seed for reproducible emulation
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Emulator,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Emulator => write!(f, "Emulator"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn one emulator task per vehicle, each ingesting straight into the engine.
fn spawn_emulated_fleet(
    task_set: &mut JoinSet<Result<TaskName>>,
    engine: &Arc<RiskEngine>,
    emulator: &EmulatorConfig,
    args: &CliArgs,
    cancel_token: &CancellationToken,
) {
    let start = Utc::now();
    for i in 0..args.vehicles {
        let asset_id = format!("vehicle-{:02}", i + 1);
        let seed = args.seed.map(|s| s.wrapping_add(u64::from(i)));
        let mut emu = TelemetryEmulator::new(asset_id, emulator.clone(), seed, start).live_clock();
        let engine = Arc::clone(engine);
        let cancel = cancel_token.clone();
        let period = Duration::from_millis(args.interval_ms.max(1));

        task_set.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Rejections are logged and counted by the engine.
                        let _ = engine.ingest(&emu.next_raw());
                    }
                }
            }
            Ok(TaskName::Emulator)
        });
    }
    info!(
        vehicles = args.vehicles,
        interval_ms = args.interval_ms,
        "Emulated fleet started"
    );
}

async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the server drain in-flight requests.
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            warn!("Task ended with error during shutdown: {}", e);
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load engine config")?;
    let server_addr = args.addr.clone().unwrap_or_else(|| config.server.addr.clone());
    let emulator_config = config.emulator.clone();

    info!("Connected Ops - fleet telemetry risk engine");
    let engine = Arc::new(RiskEngine::new(config));

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;
    info!(addr = %server_addr, "API listening");

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    let app = create_app(ApiState::new(Arc::clone(&engine)));
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    if args.simulate {
        spawn_emulated_fleet(&mut task_set, &engine, &emulator_config, &args, &cancel_token);
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    let stats = engine.stats();
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected.total(),
        assets = stats.assets,
        "Connected Ops shutdown complete"
    );
    Ok(())
}
