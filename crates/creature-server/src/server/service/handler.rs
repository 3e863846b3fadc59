//! gRPC service implementation for creature records.
//!
//! This module defines [`CreatureService`], the concrete implementation of the
//! [`CreatureServer`] gRPC service defined in `creatures.proto`.
//!
//! ## Responsibilities
//!
//! - Search the creature collection by name for `GetCreature`.
//! - Run the configured store lookup for `GetCreatures` and stream the
//!   matches back via [`feed_creatures`], within the caller's deadline.
//! - Surface store failures to the caller instead of swallowing them.
//! - Refuse new streams and drain in-flight ones on shutdown.

use crate::server::{
    config::ServerConfig,
    store::{Filter, SharedStore, document::creature_from_document},
    streaming::{deadline::caller_deadline, feeder::feed_creatures},
};
use core::pin::Pin;
use creature_core::{
    Error,
    proto::{Creature, CreatureName, GetCreaturesRequest, creature_server_server::CreatureServer},
    telemetry::{
        continue_remote_trace, decrement_streams_inflight, increment_lookup_misses,
        increment_requests, increment_stream_errors, increment_streams_inflight,
        record_stream_duration,
    },
};
use futures::StreamExt;
use std::{sync::Arc, time::Instant};
use tokio::{sync::mpsc, time::timeout};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// gRPC service for creature records.
///
/// Cloning is cheap: clones share the store handle, the shutdown token and
/// the tracker of in-flight streams.
#[derive(Clone)]
pub struct CreatureService {
    config: Arc<ServerConfig>,
    store: SharedStore,
    streams: TaskTracker,
    shutdown_token: CancellationToken,
}

impl CreatureService {
    /// Creates a service backed by an already connected store.
    pub fn new(config: ServerConfig, store: SharedStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
            streams: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Number of `GetCreatures` streams still being fed.
    pub fn streams_inflight(&self) -> usize {
        self.streams.len()
    }

    /// Gracefully stops the service.
    ///
    /// New streams are refused immediately. In-flight streams get the
    /// configured shutdown timeout to finish; whatever is left is then
    /// cancelled and the caller sees `UNAVAILABLE`.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new streams ===
        tracing::info!("Refusing new streams");
        self.streams.close();

        // === Phase 1: Wait for in-flight streams to drain ===
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        if timeout(self.config.shutdown_timeout, self.streams.wait())
            .await
            .is_ok()
        {
            tracing::debug!("All in-flight streams drained successfully");
            return;
        }

        // === Phase 2: Cancel any remaining work ===
        tracing::warn!(
            "Graceful drain timed out ({} streams still active)",
            self.streams_inflight()
        );
        self.shutdown_token.cancel();
        self.streams.wait().await;
        tracing::info!("Stream shutdown complete");
    }
}

#[tonic::async_trait]
impl CreatureServer for CreatureService {
    type GetCreaturesStream = Pin<Box<dyn Stream<Item = Result<Creature, Status>> + Send>>;

    /// Looks up a creature by exact name.
    ///
    /// The first document in the creature collection whose `name` matches is
    /// returned. An empty name is `INVALID_ARGUMENT`, no match is
    /// `NOT_FOUND`, and a store failure is `UNAVAILABLE`.
    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn get_creature(
        &self,
        req: Request<CreatureName>,
    ) -> Result<Response<Creature>, Status> {
        continue_remote_trace(&req);
        increment_requests("GetCreature");

        let name = req.into_inner().name;
        tracing::info!("Received: {name}");

        if name.is_empty() {
            tracing::info!("Refusing to search for an empty name");
            return Err(Error::InvalidRequest {
                reason: "a creature name must be supplied".to_string(),
            }
            .into());
        }

        let namespace = &self.config.creatures;
        let mut cursor = self
            .store
            .find(namespace, &Filter::eq("name", name.as_str()))
            .await
            .inspect_err(|e| tracing::warn!("Search in {namespace} failed: {e}"))?;

        match cursor.next().await {
            Some(Ok(document)) => {
                tracing::debug!("Creature {name} found in {namespace}");
                Ok(Response::new(creature_from_document(&document)))
            }
            Some(Err(e)) => {
                tracing::warn!("Search in {namespace} failed: {e}");
                Err(e.into())
            }
            None => {
                increment_lookup_misses();
                tracing::info!("No creatures named '{name}' found");
                Err(Error::NotFound {
                    what: format!("creature named '{name}'"),
                }
                .into())
            }
        }
    }

    /// Streams every creature matching the configured lookup.
    ///
    /// The lookup is fixed by configuration and does not depend on the
    /// request. A lookup with no match is logged and yields an empty stream;
    /// a store failure is returned to the caller as `UNAVAILABLE`. If the
    /// caller sent a `grpc-timeout`, the stream ends with `DEADLINE_EXCEEDED`
    /// once it elapses.
    #[tracing::instrument(skip_all)]
    async fn get_creatures(
        &self,
        req: Request<GetCreaturesRequest>,
    ) -> Result<Response<Self::GetCreaturesStream>, Status> {
        continue_remote_trace(&req);
        let deadline = caller_deadline(req.metadata());

        if self.streams.is_closed() {
            increment_stream_errors();
            return Err(Error::ServiceShutdown.into());
        }

        increment_requests("GetCreatures");
        tracing::info!("Getting all creatures");

        let start = Instant::now();
        let lookup = &self.config.lookup;

        let cursor = match self.store.find(&lookup.namespace, &lookup.filter).await {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::warn!("Lookup in {} failed: {e}", lookup.namespace);
                increment_stream_errors();
                return Err(e.into());
            }
        };

        increment_streams_inflight();

        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<Creature, Status>>(self.config.stream_buffer_size);
        let shutdown = self.shutdown_token.clone();
        let filter = lookup.filter.clone();

        let fut = async move {
            let outcome = feed_creatures(cursor, resp_tx, deadline, shutdown).await;
            decrement_streams_inflight();
            record_stream_duration(start.elapsed().as_millis() as f64);

            match outcome {
                Ok(0) => {
                    increment_lookup_misses();
                    tracing::info!(
                        "No document was found with the {} {}",
                        filter.field,
                        filter.value
                    );
                }
                Ok(count) => tracing::debug!("Streamed {count} creatures"),
                Err(e) => {
                    increment_stream_errors();
                    tracing::warn!("Stream ended early: {e}");
                }
            }
        };

        self.streams
            .spawn(fut.instrument(tracing::info_span!("streaming")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
