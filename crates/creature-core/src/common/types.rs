//! Shared names and defaults used by both ends of the creature protocol.

/// Service name reported by the server process in exported telemetry.
pub const SERVER_SERVICE_NAME: &str = "creature-server";

/// Service name reported by the client process in exported telemetry.
pub const CLIENT_SERVICE_NAME: &str = "creature-client";

/// Port the server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 50051;

/// Address the client dials unless configured otherwise.
pub const DEFAULT_ADDR: &str = "localhost:50051";

/// Creature name the client asks for unless configured otherwise.
pub const DEFAULT_CREATURE_NAME: &str = "April";

/// Shared deadline, in milliseconds, covering every call the client makes.
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;
