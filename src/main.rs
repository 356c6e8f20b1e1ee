use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use influx_sample_listener::{logging, BackendListener, ListenerConfig};

mod load_generator;

/// Drive a synthetic load through the listener and into InfluxDB.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON listener config (camelCase engine parameter names)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    influx_host: Option<String>,

    #[arg(long)]
    influx_port: Option<u16>,

    /// Defaults to a fresh random id
    #[arg(long)]
    run_id: Option<String>,

    /// Concurrent simulated users
    #[arg(long, default_value_t = 10)]
    concurrency: u32,

    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Delay between starting consecutive users
    #[arg(long, default_value_t = 200)]
    ramp_up_ms: u64,

    /// Percentage of simulated requests that fail (0–100)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=100))]
    error_pct: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    // ── 1. Resolve listener config ───────────────────────────────
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<ListenerConfig>(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => ListenerConfig::default(),
    };
    if let Some(host) = args.influx_host {
        config.influx.host = host;
    }
    if let Some(port) = args.influx_port {
        config.influx.port = port;
    }
    config.run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()[..8].to_owned());

    // ── 2. Set up the listener ───────────────────────────────────
    tracing::info!(url = %config.influx.url(), database = %config.influx.database, "connecting to InfluxDB");
    let threads = Arc::new(load_generator::EngineThreads::default());
    let listener = BackendListener::setup_with_config(config, threads.clone())
        .await
        .context("setting up backend listener")?;
    let listener = Arc::new(listener);

    // ── 3. Run the load ──────────────────────────────────────────
    tracing::info!(
        concurrency = args.concurrency,
        duration_secs = args.duration_secs,
        "starting synthetic load",
    );
    let running = Arc::new(AtomicBool::new(true));
    {
        // Ctrl-C ends the load early; teardown still runs
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, stopping load");
                running.store(false, Ordering::SeqCst);
            }
        });
    }
    load_generator::run(
        running,
        listener.clone(),
        threads,
        args.concurrency,
        args.duration_secs,
        args.ramp_up_ms,
        args.error_pct,
    )
    .await;

    // ── 4. Tear down ─────────────────────────────────────────────
    let listener = Arc::try_unwrap(listener)
        .map_err(|_| anyhow::anyhow!("listener still referenced after load finished"))?;
    listener.teardown_test().await;

    tracing::info!("done");
    Ok(())
}
