use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::info;

use sensor_relay::broker::build_connections;
use sensor_relay::config::loader::load_config;
use sensor_relay::config::settings::DEFAULT_PUBLISH_TIMEOUT_SECS;
use sensor_relay::cycle::DeliveryCycle;
use sensor_relay::measurement::Measurement;
use sensor_relay::pending::PendingStore;
use sensor_relay::publish::Orchestrator;
use sensor_relay::utils::logging;
use sensor_relay::utils::logging::LogLevel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "sensor-relay.yaml")]
    config: String,
    /// Measurement JSON produced by the sensing collaborator; "-" reads stdin.
    #[arg(short, long, default_value = "-")]
    input: String,
    /// Override the configured pending directory.
    #[arg(long)]
    pending_dir: Option<PathBuf>,
    /// Log the measurement instead of publishing it.
    #[arg(long)]
    dry_run: bool,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

async fn read_measurement(input: &str) -> Result<Measurement> {
    let raw = if input == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read measurement from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read measurement file {input}"))?
    };

    serde_json::from_str(&raw).context("failed to parse measurement JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let service_config = load_config(&args.config)
        .with_context(|| format!("invalid config {}", args.config))?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Read the measurement
    // -------------------------------

    let measurement = read_measurement(&args.input).await?;
    measurement.validate()?;

    if args.dry_run {
        info!("dry run: {}", measurement.summary());
        return Ok(());
    }

    // -------------------------------
    // 3. Build connections and run one delivery cycle
    // -------------------------------

    let connections = build_connections(&service_config)?;

    let pending_dir = args
        .pending_dir
        .unwrap_or_else(|| service_config.pending_dir.clone());
    let store = PendingStore::new(pending_dir);

    let timeout = Duration::from_secs(
        service_config
            .publish_timeout_seconds
            .unwrap_or(DEFAULT_PUBLISH_TIMEOUT_SECS),
    );
    let orchestrator = Orchestrator::with_timeout(timeout);

    let cycle = DeliveryCycle::new(orchestrator, store);
    cycle.run(&measurement, &connections).await?;

    Ok(())
}
