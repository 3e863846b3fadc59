use crate::server::store::{Cursor, document::creature_from_document};
use creature_core::{Error, proto::Creature, telemetry::increment_creatures_streamed};
use futures::StreamExt;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Drains a store cursor into a gRPC response stream, one [`Creature`] per
/// document.
///
/// Returns the number of creatures delivered. The stream is finite: it ends
/// when the cursor is exhausted, the caller disconnects, the caller's
/// deadline elapses, or the service shuts down.
///
/// # Arguments
///
/// - `cursor`: Open store cursor for the lookup.
/// - `resp_tx`: Channel feeding the response stream returned to tonic.
/// - `deadline`: When the caller gives up, if it sent a `grpc-timeout`.
/// - `shutdown`: Cancelled when the service is terminating.
///
/// # Errors
///
/// - [`Error::RequestCancelled`] if the receiving side went away.
/// - [`Error::DeadlineExceeded`] if `deadline` passed first. The caller is
///   sent `DEADLINE_EXCEEDED`.
/// - [`Error::ServiceShutdown`] if `shutdown` fired mid-stream. The caller is
///   told with a best-effort `UNAVAILABLE`.
/// - The store's error if the cursor fails. It is forwarded to the caller
///   before returning.
pub async fn feed_creatures(
    mut cursor: Cursor,
    resp_tx: mpsc::Sender<Result<Creature, Status>>,
    deadline: Option<Instant>,
    shutdown: CancellationToken,
) -> creature_core::Result<usize> {
    let expired = async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => core::future::pending().await,
        }
    };
    tokio::pin!(expired);

    let mut sent = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Err(notify_shutdown(&resp_tx)),
            () = resp_tx.closed() => return Err(Error::RequestCancelled),
            () = &mut expired => return Err(notify_deadline(&resp_tx, &shutdown).await),
            next = cursor.next() => next,
        };

        match next {
            Some(Ok(document)) => {
                let creature = creature_from_document(&document);
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => return Err(notify_shutdown(&resp_tx)),
                    () = &mut expired => return Err(notify_deadline(&resp_tx, &shutdown).await),
                    res = resp_tx.send(Ok(creature)) => {
                        if res.is_err() {
                            return Err(Error::RequestCancelled);
                        }
                    }
                }
                increment_creatures_streamed();
                sent += 1;
            }
            Some(Err(e)) => {
                // The caller may already be gone; the original error is what
                // gets reported upstream either way.
                if let Err(send_err) = resp_tx.send(Err(e.clone().into())).await {
                    tracing::debug!("Failed to forward store error: {send_err}");
                }
                return Err(e);
            }
            None => return Ok(sent),
        }
    }
}

fn notify_shutdown(resp_tx: &mpsc::Sender<Result<Creature, Status>>) -> Error {
    // Never wait on a full channel during shutdown.
    if let Err(err) = resp_tx.try_send(Err(Error::ServiceShutdown.into())) {
        tracing::debug!("Could not notify caller of shutdown: {err}");
    }
    Error::ServiceShutdown
}

async fn notify_deadline(
    resp_tx: &mpsc::Sender<Result<Creature, Status>>,
    shutdown: &CancellationToken,
) -> Error {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => {}
        res = resp_tx.send(Err(Error::DeadlineExceeded.into())) => {
            if let Err(err) = res {
                tracing::debug!("Could not notify caller of deadline: {err}");
            }
        }
    }
    Error::DeadlineExceeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::Document;
    use futures::stream;
    use serde_json::json;
    use tonic::Code;

    fn named(name: &str) -> Document {
        let mut document = Document::new();
        document.insert("name".to_string(), json!(name));
        document
    }

    #[tokio::test]
    async fn delivers_every_document_then_closes() {
        let cursor = stream::iter(vec![Ok(named("April")), Ok(named("Beaky"))]).boxed();
        let (tx, mut rx) = mpsc::channel(4);

        let sent = feed_creatures(cursor, tx, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(rx.recv().await.unwrap().unwrap().name, "April");
        assert_eq!(rx.recv().await.unwrap().unwrap().name, "Beaky");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_cursor_is_a_clean_miss() {
        let (tx, mut rx) = mpsc::channel(1);

        let sent = feed_creatures(stream::empty().boxed(), tx, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn store_errors_are_forwarded_to_the_caller() {
        let cursor = stream::iter(vec![
            Ok(named("April")),
            Err(Error::store("cursor killed")),
            Ok(named("never sent")),
        ])
        .boxed();
        let (tx, mut rx) = mpsc::channel(4);

        let err = feed_creatures(cursor, tx, None, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, Error::store("cursor killed"));
        assert!(rx.recv().await.unwrap().is_ok());
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_the_caller_disconnects() {
        let cursor = stream::iter((0..).map(|i| Ok(named(&format!("creature-{i}"))))).boxed();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = feed_creatures(cursor, tx, None, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, Error::RequestCancelled);
    }

    #[tokio::test]
    async fn stops_on_shutdown_while_waiting_for_the_store() {
        let (tx, mut rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = feed_creatures(stream::pending().boxed(), tx, None, shutdown)
            .await
            .unwrap_err();

        assert_eq!(err, Error::ServiceShutdown);
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_cursor_stops_at_the_callers_deadline() {
        let (tx, mut rx) = mpsc::channel(1);
        let deadline = Instant::now() + core::time::Duration::from_millis(200);

        let err = feed_creatures(
            stream::pending().boxed(),
            tx,
            Some(deadline),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err, Error::DeadlineExceeded);
        assert!(Instant::now() >= deadline);
        let status = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn creatures_sent_before_the_deadline_are_kept() {
        let cursor = stream::iter(vec![Ok(named("April"))])
            .chain(stream::pending())
            .boxed();
        let (tx, mut rx) = mpsc::channel(4);
        let deadline = Instant::now() + core::time::Duration::from_secs(1);

        let err = feed_creatures(cursor, tx, Some(deadline), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, Error::DeadlineExceeded);
        assert_eq!(rx.recv().await.unwrap().unwrap().name, "April");
        assert_eq!(
            rx.recv().await.unwrap().unwrap_err().code(),
            Code::DeadlineExceeded
        );
    }
}
