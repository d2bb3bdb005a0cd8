//! Telemetry Emulator - streams synthetic vehicle telemetry to a running
//! Connected Ops server over HTTP.
//!
//! # Usage
//! ```bash
//! ./emulator --api-url http://127.0.0.1:8000 --vehicle corolla_2019 --vehicle van_07
//! ./emulator --interval-ms 200 --seed 42 --steps 600
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use connected_ops::config::{defaults, EngineConfig};
use connected_ops::{RawSample, TelemetryEmulator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "emulator")]
#[command(about = "Stream emulated vehicle telemetry to a Connected Ops server")]
#[command(version)]
struct Args {
    /// Base URL of the Connected Ops API
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Vehicle id to emulate (repeat for several vehicles)
    #[arg(long = "vehicle", env = "VEHICLE_ID", value_delimiter = ',', default_value = "corolla_2019")]
    vehicles: Vec<String>,

    /// Delay between samples, in milliseconds
    #[arg(long, default_value_t = defaults::EMULATOR_INTERVAL_MS)]
    interval_ms: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many steps (runs until Ctrl-C when omitted)
    #[arg(long)]
    steps: Option<u64>,

    /// TOML config to read `[emulator]` tuning from
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Transport
// ============================================================================

/// Back-off after a transport failure, giving the API time to come back.
const RETRY_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug)]
enum PostOutcome {
    Accepted,
    Rejected(String),
    Failed,
}

async fn post_sample(http: &reqwest::Client, url: &str, raw: &RawSample) -> PostOutcome {
    match http.post(url).json(raw).send().await {
        Ok(resp) if resp.status().is_success() => PostOutcome::Accepted,
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            PostOutcome::Rejected(format!("{status}: {body}"))
        }
        Err(e) => {
            warn!(error = %e, "Failed to send sample");
            PostOutcome::Failed
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .context("Failed to build HTTP client")?;
    let url = format!("{}/api/v1/telemetry", args.api_url.trim_end_matches('/'));

    let start = Utc::now();
    let mut fleet: Vec<TelemetryEmulator> = args
        .vehicles
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let seed = args.seed.map(|s| s.wrapping_add(i as u64));
            TelemetryEmulator::new(id.clone(), config.emulator.clone(), seed, start).live_clock()
        })
        .collect();

    info!(url = %url, vehicles = ?args.vehicles, "Sending telemetry");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping");
        shutdown.cancel();
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut step: u64 = 0;
    let (mut accepted, mut rejected) = (0u64, 0u64);

    while args.steps.map_or(true, |max| step < max) {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        step += 1;

        let mut failed = false;
        for emu in &mut fleet {
            let raw = emu.next_raw();
            match post_sample(&http, &url, &raw).await {
                PostOutcome::Accepted => {
                    accepted += 1;
                    debug!(asset = %emu.asset_id(), step, fault = emu.in_fault(), "Sample sent");
                }
                PostOutcome::Rejected(detail) => {
                    rejected += 1;
                    warn!(asset = %emu.asset_id(), detail = %detail, "Sample rejected by server");
                }
                PostOutcome::Failed => failed = true,
            }
        }

        if failed {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(RETRY_BACKOFF) => {}
            }
        }
    }

    info!(steps = step, accepted, rejected, "Emulator finished");
    Ok(())
}
