use common_types::Event;
use metrics::counter;
use pipeline::PipelineSet;
use tracing::warn;

use crate::errors::DeliveryError;
use crate::metrics_consts::{EVENTS_DISPATCHED, EVENTS_REQUEUED};

/// Route a decoded notification batch through every event pipeline.
///
/// Pipelines match and deliver independently; if any of them reports a
/// fail-fast delivery failure the whole inbound message is flagged for
/// redelivery. Sinks that did deliver are not undone, so redelivered events
/// may reach some targets twice; `drop` and `queue` policies exist for
/// consumers that prefer loss or buffering over duplicates.
pub async fn dispatch_events(
    pipelines: &PipelineSet,
    events: &[Event],
) -> Result<(), DeliveryError> {
    if events.is_empty() {
        return Ok(());
    }
    counter!(EVENTS_DISPATCHED).increment(events.len() as u64);
    match pipelines.publish_events(events).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, count = events.len(),
                "event delivery failed, requesting redelivery");
            counter!(EVENTS_REQUEUED).increment(events.len() as u64);
            Err(DeliveryError::RequeueRequested)
        }
    }
}
