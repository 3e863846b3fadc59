//! Stream coordination between the store cursor and the gRPC response.
//!
//! - [`feeder`] - Drains a cursor into a response channel.
//! - [`deadline`] - Reads the caller's `grpc-timeout`.

pub mod deadline;
pub mod feeder;
