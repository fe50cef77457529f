use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use opentelemetry::propagation::{Extractor, Injector};

/// Writes trace context (`traceparent`, `tracestate`) into outgoing headers.
pub struct HyperHeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HyperHeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(header_name), Ok(header_value)) =
            (key.parse::<HeaderName>(), HeaderValue::from_str(&value))
        {
            self.0.insert(header_name, header_value);
        }
    }
}

/// Reads trace context from inbound request headers.
pub struct HyperHeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HyperHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}
