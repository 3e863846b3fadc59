use anyhow::Context;
use clap::Parser;
use creature_core::{telemetry::init_telemetry, types::SERVER_SERVICE_NAME};
use creature_server::server::{
    config::{CliArgs, ServerConfig},
    serve::{bind_listener, run_server_with_incoming},
    service::handler::CreatureService,
    store,
};
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    // Flushes exporters when dropped at the end of main.
    let _telemetry = init_telemetry(SERVER_SERVICE_NAME)?;

    let listener = bind_listener(config.listen_addr).await?;
    let store = store::connect(&config.store_uri)
        .await
        .with_context(|| format!("failed to connect to store at {}", config.store_uri))?;

    log_startup_info(&config);

    let service = CreatureService::new(config, store.clone());
    let res = run_server_with_incoming(
        TcpListenerStream::new(listener),
        service,
        shutdown_signal(),
    )
    .await;

    store.shutdown().await;
    res
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting creature service on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting creature service on {} (store {}, lookup {})",
            config.listen_addr,
            config.store_uri,
            config.lookup.namespace
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
