use crate::CallError;
use clap::Parser;
use core::time::Duration;
use creature_core::types::{DEFAULT_ADDR, DEFAULT_CREATURE_NAME, DEFAULT_TIMEOUT_MS};
use tonic::transport::Endpoint;

/// Runtime configuration for the `creature-client` binary.
///
/// Values come from CLI arguments or environment variables (a `.env` file is
/// loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "creature-client",
    version,
    about = "Looks up creatures on a creature-server"
)]
pub struct CliArgs {
    /// The address to connect to.
    ///
    /// A bare `host:port` is dialed over plaintext HTTP/2.
    ///
    /// Environment variable: `CREATURE_ADDR`
    #[arg(long, env = "CREATURE_ADDR", default_value_t = String::from(DEFAULT_ADDR))]
    pub addr: String,

    /// Name of the creature to look up.
    ///
    /// Environment variable: `CREATURE_NAME`
    #[arg(long, env = "CREATURE_NAME", default_value_t = String::from(DEFAULT_CREATURE_NAME))]
    pub name: String,

    /// Deadline shared by every call, in milliseconds.
    ///
    /// Environment variable: `CREATURE_TIMEOUT_MS`
    #[arg(long, env = "CREATURE_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub name: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Builds a configuration for `addr`, adding `http://` when no scheme is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::InvalidAddress`] if `addr` is not a valid URI.
    pub fn new(addr: &str, name: impl Into<String>, timeout: Duration) -> Result<Self, CallError> {
        let addr = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };
        let endpoint =
            Endpoint::from_shared(addr.clone()).map_err(|source| CallError::InvalidAddress {
                addr,
                source,
            })?;

        Ok(Self {
            endpoint,
            name: name.into(),
            timeout,
        })
    }

    pub fn addr(&self) -> String {
        self.endpoint.uri().to_string()
    }
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.timeout_ms == 0 {
            anyhow::bail!("CREATURE_TIMEOUT_MS must be greater than 0");
        }
        Ok(Self::new(
            &args.addr,
            args.name,
            Duration::from_millis(args.timeout_ms),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> anyhow::Result<ClientConfig> {
        let base = [
            "creature-client",
            "--addr",
            DEFAULT_ADDR,
            "--name",
            DEFAULT_CREATURE_NAME,
            "--timeout-ms",
            "1000",
        ];
        let mut args = CliArgs::try_parse_from(base)?;
        for pair in argv.chunks(2) {
            match pair {
                ["--addr", value] => args.addr = value.to_string(),
                ["--name", value] => args.name = value.to_string(),
                ["--timeout-ms", value] => args.timeout_ms = value.parse()?,
                _ => anyhow::bail!("unexpected flag {pair:?}"),
            }
        }
        ClientConfig::try_from(args)
    }

    #[test]
    fn defaults_dial_localhost_with_a_one_second_deadline() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.addr(), "http://localhost:50051/");
        assert_eq!(config.name, "April");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let config = parse(&["--addr", "https://creatures.example.net:443"]).unwrap();
        assert_eq!(config.addr(), "https://creatures.example.net:443/");
    }

    #[test]
    fn rejects_garbage_addresses() {
        let err = parse(&["--addr", "not a host"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CallError>(),
            Some(CallError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn rejects_zero_deadline() {
        let err = parse(&["--timeout-ms", "0"]).unwrap_err();
        assert!(err.to_string().contains("CREATURE_TIMEOUT_MS"));
    }
}
