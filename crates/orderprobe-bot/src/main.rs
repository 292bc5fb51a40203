//! orderprobe - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Synthetic order-latency probe
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ORDERPROBE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Stop after this many probes
    #[arg(long)]
    max_probes: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    orderprobe_telemetry::init_logging()?;

    info!("Starting orderprobe v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ORDERPROBE_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("ORDERPROBE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = orderprobe_bot::AppConfig::from_file(&config_path)?;
    info!(
        mode = ?config.mode,
        symbol = %config.order.symbol,
        broker = %config.report.broker_name,
        "Configuration loaded"
    );

    let app = orderprobe_bot::Application::new(config)?.with_max_probes(args.max_probes);
    let summary = app.run().await?;

    info!(probes = summary.probes, reason = ?summary.stop_reason, "orderprobe stopped");
    Ok(())
}
