//! W3C trace-context propagation over gRPC metadata.
//!
//! [`InjectTraceContext`] is installed on the client channel and
//! [`RemoteTraceContext`] on the server service. Interceptors run for unary
//! and streaming calls alike, so both RPCs carry the caller's trace. Without
//! the `otel-tracing` feature both interceptors pass requests through untouched.

use tonic::{Request, Status, service::Interceptor};

#[cfg(feature = "otel-tracing")]
use opentelemetry::propagation::{Extractor, Injector};
#[cfg(feature = "otel-tracing")]
use tonic::metadata::{KeyRef, MetadataKey, MetadataMap, MetadataValue};
#[cfg(feature = "otel-tracing")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Client-side interceptor writing the current span context into the outgoing
/// request metadata (`traceparent`, `tracestate`).
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectTraceContext;

impl Interceptor for InjectTraceContext {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        #[cfg(feature = "otel-tracing")]
        let request = {
            let mut request = request;
            let cx = tracing::Span::current().context();
            opentelemetry::global::get_text_map_propagator(|propagator| {
                propagator.inject_context(&cx, &mut MetadataInjector(request.metadata_mut()));
            });
            request
        };
        Ok(request)
    }
}

/// Server-side interceptor reading the caller's trace context from incoming
/// metadata and stashing it in the request extensions.
///
/// Handlers pick it up with [`continue_remote_trace`] once their own span is
/// entered.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoteTraceContext;

#[cfg(feature = "otel-tracing")]
#[derive(Clone)]
struct ParentContext(opentelemetry::Context);

impl Interceptor for RemoteTraceContext {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        #[cfg(feature = "otel-tracing")]
        let request = {
            let mut request = request;
            let parent = opentelemetry::global::get_text_map_propagator(|propagator| {
                propagator.extract(&MetadataExtractor(request.metadata()))
            });
            request.extensions_mut().insert(ParentContext(parent));
            request
        };
        Ok(request)
    }
}

/// Parents the current span on the trace context captured by
/// [`RemoteTraceContext`], if any.
pub fn continue_remote_trace<T>(_request: &Request<T>) {
    #[cfg(feature = "otel-tracing")]
    if let Some(ParentContext(parent)) = _request.extensions().get::<ParentContext>() {
        let _ = tracing::Span::current().set_parent(parent.clone());
    }
}

#[cfg(feature = "otel-tracing")]
struct MetadataInjector<'a>(&'a mut MetadataMap);

#[cfg(feature = "otel-tracing")]
impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(key), Ok(value)) = (
            MetadataKey::from_bytes(key.as_bytes()),
            MetadataValue::try_from(value.as_str()),
        ) {
            self.0.insert(key, value);
        }
    }
}

#[cfg(feature = "otel-tracing")]
struct MetadataExtractor<'a>(&'a MetadataMap);

#[cfg(feature = "otel-tracing")]
impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(|key| match key {
                KeyRef::Ascii(key) => key.as_str(),
                KeyRef::Binary(key) => key.as_str(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interceptors_keep_existing_metadata() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("x-creature", "april".parse().unwrap());

        let request = InjectTraceContext.call(request).unwrap();
        let request = RemoteTraceContext.call(request).unwrap();
        continue_remote_trace(&request);

        assert_eq!(
            request.metadata().get("x-creature").unwrap().to_str().unwrap(),
            "april"
        );
    }

    #[cfg(feature = "otel-tracing")]
    #[test]
    fn extractor_reads_injected_keys() {
        let mut map = MetadataMap::new();
        MetadataInjector(&mut map).set("traceparent", "00-abc-def-01".to_string());

        let extractor = MetadataExtractor(&map);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }
}
