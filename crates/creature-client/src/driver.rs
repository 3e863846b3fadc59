//! Client call sequence.
//!
//! [`run`] connects, then makes both calls under one [`Deadline`]: the unary
//! `GetCreature` followed by a fully drained `GetCreatures` stream. A creature
//! that does not exist is only logged; any other failure ends the run.

use crate::{CallError, config::ClientConfig};
use core::time::Duration;
use creature_core::{
    proto::{
        Creature, CreatureName, GetCreaturesRequest, creature_server_client::CreatureServerClient,
    },
    telemetry::InjectTraceContext,
};
use tokio::time::{Instant, timeout_at};
use tonic::{
    Request, Status,
    codec::CompressionEncoding,
    service::interceptor::InterceptedService,
    transport::Channel,
};

/// A connected client that forwards the caller's trace context.
pub type CreatureClient = CreatureServerClient<InterceptedService<Channel, InjectTraceContext>>;

/// Opens a plaintext HTTP/2 connection to the configured server.
///
/// # Errors
///
/// Returns [`CallError::Connect`] if the server cannot be reached.
pub async fn connect(config: &ClientConfig) -> Result<CreatureClient, CallError> {
    let channel = config
        .endpoint
        .connect()
        .await
        .map_err(|source| CallError::Connect {
            addr: config.addr(),
            source,
        })?;

    Ok(
        CreatureServerClient::with_interceptor(channel, InjectTraceContext)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip),
    )
}

/// A point in time shared by a sequence of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.0.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}

/// Looks up `name`.
///
/// The remaining budget is sent as the call's gRPC timeout and also bounds
/// the call locally.
///
/// # Errors
///
/// [`CallError::Timeout`] if the deadline has already passed or elapses
/// mid-call; otherwise the classified server status.
#[tracing::instrument(skip(client, deadline))]
pub async fn get_creature(
    client: &mut CreatureClient,
    name: &str,
    deadline: Deadline,
) -> Result<Creature, CallError> {
    const CALL: &str = "GetCreature";

    let request = with_budget(
        CALL,
        CreatureName {
            name: name.to_string(),
        },
        deadline,
    )?;

    match timeout_at(deadline.instant(), client.get_creature(request)).await {
        Ok(Ok(response)) => Ok(response.into_inner()),
        Ok(Err(status)) => Err(CallError::from_status(CALL, status)),
        Err(_) => Err(CallError::Timeout { call: CALL }),
    }
}

/// Opens the `GetCreatures` stream and collects every creature on it.
///
/// # Errors
///
/// Same as [`get_creature`]. An error item on the stream fails the whole
/// call, even after some creatures were received.
#[tracing::instrument(skip_all)]
pub async fn get_creatures(
    client: &mut CreatureClient,
    deadline: Deadline,
) -> Result<Vec<Creature>, CallError> {
    const CALL: &str = "GetCreatures";

    let request = with_budget(CALL, GetCreaturesRequest {}, deadline)?;

    let drain = async {
        let mut stream = client.get_creatures(request).await?.into_inner();
        let mut creatures = Vec::new();
        while let Some(creature) = stream.message().await? {
            tracing::debug!("Received creature {creature:?}");
            creatures.push(creature);
        }
        Ok::<_, Status>(creatures)
    };

    match timeout_at(deadline.instant(), drain).await {
        Ok(Ok(creatures)) => Ok(creatures),
        Ok(Err(status)) => Err(CallError::from_status(CALL, status)),
        Err(_) => Err(CallError::Timeout { call: CALL }),
    }
}

fn with_budget<T>(
    call: &'static str,
    message: T,
    deadline: Deadline,
) -> Result<Request<T>, CallError> {
    let budget = deadline.remaining().ok_or(CallError::Timeout { call })?;
    let mut request = Request::new(message);
    request.set_timeout(budget);
    Ok(request)
}

/// What a successful run saw.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverReport {
    /// The named creature, or `None` if the server has none by that name.
    pub creature: Option<Creature>,
    pub creatures: Vec<Creature>,
}

/// Connects and performs both calls under the configured deadline.
///
/// The connection itself is not counted against the deadline.
///
/// # Errors
///
/// The first [`CallError`] encountered.
#[tracing::instrument(skip_all, fields(addr = %config.addr(), name = %config.name))]
pub async fn run(config: &ClientConfig) -> Result<DriverReport, CallError> {
    let mut client = connect(config).await?;
    let deadline = Deadline::after(config.timeout);

    let creature = match get_creature(&mut client, &config.name, deadline).await {
        Ok(creature) => {
            tracing::info!("Creature: {creature:?}");
            Some(creature)
        }
        Err(CallError::NotFound { message, .. }) => {
            tracing::info!("No creature named {}: {message}", config.name);
            None
        }
        Err(e) => return Err(e),
    };

    tracing::info!("Getting all of them");
    let creatures = get_creatures(&mut client, deadline).await?;
    tracing::info!("Streamed {} creatures", creatures.len());

    Ok(DriverReport {
        creature,
        creatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_counts_down_to_none() {
        let deadline = Deadline::after(Duration::from_millis(100));
        assert_eq!(deadline.remaining(), Some(Duration::from_millis(100)));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(deadline.remaining(), Some(Duration::from_millis(40)));

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(deadline.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_refuses_to_build_a_request() {
        let deadline = Deadline::after(Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(5)).await;

        let err = with_budget("GetCreatures", GetCreaturesRequest {}, deadline).unwrap_err();
        assert!(matches!(err, CallError::Timeout { call: "GetCreatures" }));
    }

    #[tokio::test]
    async fn request_carries_the_remaining_budget() {
        let deadline = Deadline::after(Duration::from_secs(30));

        let request = with_budget(
            "GetCreature",
            CreatureName {
                name: "April".to_string(),
            },
            deadline,
        )
        .unwrap();

        assert!(request.metadata().get("grpc-timeout").is_some());
        assert_eq!(request.get_ref().name, "April");
    }

    #[tokio::test]
    async fn connect_to_a_closed_port_fails() {
        let config =
            ClientConfig::new("127.0.0.1:1", "April", Duration::from_millis(200)).unwrap();

        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, CallError::Connect { .. }));
    }
}
