#![doc = include_str!("../README.md")]

mod common;
pub mod telemetry;

pub use common::*;

/// Generated protobuf messages and the `CreatureServer` client/server stubs.
pub mod proto {
    tonic::include_proto!("server");

    /// Encoded file descriptor set for `creatures.proto`, used to register
    /// gRPC server reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("creatures_descriptor");
}
