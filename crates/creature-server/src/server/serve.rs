//! Transport wiring: listener setup, the tonic router, and shutdown ordering.

use crate::server::service::handler::CreatureService;
use anyhow::Context;
use core::future::Future;
use creature_core::{
    proto::{FILE_DESCRIPTOR_SET, creature_server_server::CreatureServerServer},
    telemetry::RemoteTraceContext,
};
use futures::Stream;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tonic::{
    codec::CompressionEncoding,
    service::interceptor::InterceptedService,
    transport::{Server, server::Connected},
};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;

/// Binds the TCP listener for the gRPC server.
///
/// # Errors
///
/// Fails if the address is in use or cannot be bound.
pub async fn bind_listener(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))
}

/// Serves `service` on `incoming` until `signal` resolves.
///
/// Once `signal` fires the health service reports `NOT_SERVING`, the service
/// drains its in-flight streams, and the transport stops.
pub async fn run_server_with_incoming<I, IO, IE, F>(
    incoming: I,
    service: CreatureService,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CreatureServerServer<CreatureService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(InterceptedService::new(
            build_creature_service(service.clone()),
            RemoteTraceContext,
        ))
        .serve_with_incoming_shutdown(incoming, shutdown(signal, service, health_reporter))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn build_creature_service(service: CreatureService) -> CreatureServerServer<CreatureService> {
    CreatureServerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn shutdown<F>(signal: F, service: CreatureService, health_reporter: HealthReporter)
where
    F: Future<Output = ()>,
{
    signal.await;
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<CreatureServerServer<CreatureService>>()
        .await;

    // 2. Drain in-flight streams
    service.shutdown().await;
}
