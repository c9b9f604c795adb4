use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use tracing::info;

use crate::backends::Backend;
use crate::error::BackendError;

/// Writes each record to the log. Useful for smoke-testing a pipeline
/// without any transport configured.
pub struct LogBackend;

#[async_trait]
impl Backend for LogBackend {
    async fn send(&self, destination: &str, batch: &[Value]) -> Result<(), BackendError> {
        counter!("publisher_records_sent_total", "backend" => "log")
            .increment(batch.len() as u64);
        for record in batch {
            info!(destination, "record: {record}");
        }
        Ok(())
    }
}
