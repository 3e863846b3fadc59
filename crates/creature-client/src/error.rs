use tonic::{Code, Status};

/// Why a client call failed.
///
/// Every server status is classified as a timeout, a miss, or a transport
/// failure; the original [`Status`] is kept for the latter.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("invalid server address `{addr}`")]
    InvalidAddress {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("{call} did not complete before the deadline")]
    Timeout { call: &'static str },
    #[error("{call} found nothing: {message}")]
    NotFound { call: &'static str, message: String },
    #[error("{call} failed: {status}")]
    Transport {
        call: &'static str,
        status: Box<Status>,
    },
}

impl CallError {
    /// Classifies a status returned by `call`.
    ///
    /// tonic reports a locally elapsed `grpc-timeout` as `CANCELLED` with the
    /// message `Timeout expired`, so that counts as a timeout as well.
    pub fn from_status(call: &'static str, status: Status) -> Self {
        match status.code() {
            Code::DeadlineExceeded => Self::Timeout { call },
            Code::Cancelled if status.message() == "Timeout expired" => Self::Timeout { call },
            Code::NotFound => Self::NotFound {
                call,
                message: status.message().to_string(),
            },
            _ => Self::Transport {
                call,
                status: Box::new(status),
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
