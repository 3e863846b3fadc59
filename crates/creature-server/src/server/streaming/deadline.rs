//! Caller deadlines carried in the `grpc-timeout` request header.
//!
//! tonic enforces `grpc-timeout` only until a handler returns its
//! `Response`. A streaming body outlives that, so the feeder enforces the
//! remainder itself.

use core::time::Duration;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Reads the caller's timeout from `grpc-timeout`.
///
/// The value is at most eight ASCII digits followed by a unit (`H`, `M`, `S`,
/// `m`, `u`, `n`). A missing or malformed header means no deadline.
pub fn grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let value = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    if value.len() < 2 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// The instant the caller gives up, measured from now.
pub fn caller_deadline(metadata: &MetadataMap) -> Option<Instant> {
    grpc_timeout(metadata).map(|timeout| Instant::now() + timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Request;

    fn with_header(value: &'static str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(GRPC_TIMEOUT_HEADER, value.parse().unwrap());
        metadata
    }

    #[test]
    fn reads_the_timeout_tonic_clients_send() {
        let mut request = Request::new(());
        request.set_timeout(Duration::from_millis(250));

        assert_eq!(
            grpc_timeout(request.metadata()),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn every_unit_is_understood() {
        assert_eq!(grpc_timeout(&with_header("2H")), Some(Duration::from_secs(7200)));
        assert_eq!(grpc_timeout(&with_header("3M")), Some(Duration::from_secs(180)));
        assert_eq!(grpc_timeout(&with_header("1S")), Some(Duration::from_secs(1)));
        assert_eq!(grpc_timeout(&with_header("20m")), Some(Duration::from_millis(20)));
        assert_eq!(grpc_timeout(&with_header("7u")), Some(Duration::from_micros(7)));
        assert_eq!(grpc_timeout(&with_header("9n")), Some(Duration::from_nanos(9)));
    }

    #[test]
    fn malformed_headers_mean_no_deadline() {
        assert_eq!(grpc_timeout(&MetadataMap::new()), None);
        assert_eq!(grpc_timeout(&with_header("m")), None);
        assert_eq!(grpc_timeout(&with_header("100")), None);
        assert_eq!(grpc_timeout(&with_header("10x")), None);
        assert_eq!(grpc_timeout(&with_header("-5S")), None);
        assert_eq!(grpc_timeout(&with_header("123456789m")), None);
    }
}
