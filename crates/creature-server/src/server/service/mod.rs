//! gRPC service implementation.
//!
//! This module contains the logic for handling client-facing gRPC requests:
//! answering name lookups, running the configured store query, and
//! coordinating shutdown of in-flight streams.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`CreatureService`).

pub mod handler;
