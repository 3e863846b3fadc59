use anyhow::Context;
use clap::Parser;
use creature_client::{
    config::{CliArgs, ClientConfig},
    driver,
};
use creature_core::{telemetry::init_telemetry, types::CLIENT_SERVICE_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    // Flushes exporters when dropped at the end of main.
    let _telemetry = init_telemetry(CLIENT_SERVICE_NAME)?;

    let report = driver::run(&config)
        .await
        .inspect_err(|e| tracing::error!("{e}"))
        .with_context(|| format!("talking to {}", config.addr()))?;

    tracing::info!(
        "Done: {:?} and {} streamed creatures",
        report.creature,
        report.creatures.len()
    );
    Ok(())
}
