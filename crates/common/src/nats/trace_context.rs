use async_nats::HeaderMap;
use opentelemetry::{global, propagation::Extractor, Context};

/// W3C Trace Context header names
const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// Extractor implementation for NATS HeaderMap
struct NatsHeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for NatsHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        vec![TRACEPARENT, TRACESTATE]
    }
}

/// Extract the publisher's trace context from NATS headers.
///
/// Returns an empty context when the message carries no headers or no
/// propagator has been installed.
pub fn extract_trace_context(headers: Option<&HeaderMap>) -> Context {
    match headers {
        Some(headers) => global::get_text_map_propagator(|propagator| {
            propagator.extract(&NatsHeaderExtractor(headers))
        }),
        None => Context::new(),
    }
}
