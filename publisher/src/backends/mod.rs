use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, PublishError};
use crate::uri::PublisherSpec;

pub mod kafka;
pub mod log;
pub mod memory;

pub use memory::MemoryBackend;

/// Transport-specific delivery of one wire-ready batch to one destination.
///
/// Implementations are opaque to the policy engine: success is `Ok(())`,
/// anything else is a delivery failure the configured policy absorbs or
/// propagates. Backends own their timeouts; the engine just awaits.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(&self, destination: &str, batch: &[Value]) -> Result<(), BackendError>;
}

/// Resolve a backend for a parsed target URI.
///
/// Explicit scheme table rather than any runtime plugin discovery; adding a
/// backend means adding an arm here.
pub fn for_scheme(spec: &PublisherSpec) -> Result<Arc<dyn Backend>, PublishError> {
    match spec.scheme.as_str() {
        "kafka" => Ok(Arc::new(kafka::KafkaBackend::new(spec)?)),
        "log" => Ok(Arc::new(log::LogBackend)),
        "test" => Ok(Arc::new(MemoryBackend::new())),
        other => Err(PublishError::invalid_target(
            spec.url.as_str(),
            format!("unsupported publisher scheme: {other}"),
        )),
    }
}
