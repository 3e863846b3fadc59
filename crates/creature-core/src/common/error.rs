//! Error types for the creature service.
//!
//! This module defines the central `Error` enum shared by the server and its
//! backing-store adapters. It implements `From<Error>` for `tonic::Status` so
//! handlers can propagate failures to callers with `?` and an appropriate
//! status code.
//!
//! ## Error Cases
//! - `Store`: The backing document store failed (connect, query, or cursor).
//! - `NotFound`: A lookup by key matched nothing.
//! - `InvalidRequest`: The request itself was rejected (e.g. an empty name).
//! - `RequestCancelled`: The caller went away.
//! - `DeadlineExceeded`: The caller's deadline elapsed mid-stream.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.
//! - `InvalidConfig`: Startup configuration was rejected.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the creature service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The backing store could not serve the request.
    #[error("Store error: {context}")]
    Store { context: String },

    /// Nothing matched the requested key.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The request was malformed.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The caller aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The caller's `grpc-timeout` elapsed before the stream completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A configuration value was rejected at startup.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    pub fn store(context: impl core::fmt::Display) -> Self {
        Self::Store {
            context: context.to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Store { context } => Status::unavailable(format!("Store error: {context}")),
            Error::NotFound { what } => Status::not_found(format!("{what} not found")),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("Deadline exceeded"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::InvalidConfig { reason } => Status::invalid_argument(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn store_errors_surface_as_unavailable() {
        let status: Status = Error::store("connection reset").into();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(status.message().contains("connection reset"));
    }

    #[test]
    fn lifecycle_errors_map_to_expected_codes() {
        assert_eq!(Status::from(Error::RequestCancelled).code(), Code::Cancelled);
        assert_eq!(Status::from(Error::ServiceShutdown).code(), Code::Unavailable);
        let status = Status::from(Error::InvalidConfig {
            reason: "port out of range".to_string(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "port out of range");
    }

    #[test]
    fn request_errors_map_to_expected_codes() {
        let status = Status::from(Error::NotFound {
            what: "creature named 'Beaky'".to_string(),
        });
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "creature named 'Beaky' not found");

        let status = Status::from(Error::InvalidRequest {
            reason: "a creature name must be supplied".to_string(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);

        assert_eq!(
            Status::from(Error::DeadlineExceeded).code(),
            Code::DeadlineExceeded
        );
    }
}
