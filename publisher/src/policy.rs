use std::collections::VecDeque;
use std::sync::Arc;

use common_types::{Event, Sample};
use metrics::counter;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::backends::{self, Backend};
use crate::error::PublishError;
use crate::uri::{DeliveryPolicy, PublisherSpec};

type Entry = (String, Vec<Value>);

struct QueueState {
    pending: VecDeque<Entry>,
    /// Consecutive failed flush attempts since the last successful send.
    /// Crossing `max_retry` escalates the queue policy to fail-fast.
    consecutive_failures: usize,
}

/// One publisher target with its delivery policy.
///
/// All three policies share the `publish_*` call shape; they differ only in
/// what happens when the backend refuses a batch. The local queue, its
/// failure counter and eviction all live under one mutex so a concurrent
/// publish and a bound check never interleave inconsistently.
pub struct Publisher {
    spec: PublisherSpec,
    backend: Arc<dyn Backend>,
    queue: Mutex<QueueState>,
}

impl Publisher {
    pub fn new(spec: PublisherSpec, backend: Arc<dyn Backend>) -> Publisher {
        Publisher {
            spec,
            backend,
            queue: Mutex::new(QueueState {
                pending: VecDeque::new(),
                consecutive_failures: 0,
            }),
        }
    }

    /// Parse a target URI and resolve its backend from the scheme table.
    pub fn from_uri(uri: &str) -> Result<Publisher, PublishError> {
        let spec = PublisherSpec::parse(uri)?;
        let backend = backends::for_scheme(&spec)?;
        Ok(Publisher::new(spec, backend))
    }

    pub fn spec(&self) -> &PublisherSpec {
        &self.spec
    }

    pub async fn publish_samples(&self, samples: &[Sample]) -> Result<(), PublishError> {
        if samples.is_empty() {
            return Ok(());
        }
        let entries = self.sample_entries(samples);
        self.deliver(entries).await
    }

    pub async fn publish_events(&self, events: &[Event]) -> Result<(), PublishError> {
        if events.is_empty() {
            return Ok(());
        }
        let records = events.iter().map(Event::as_record).collect();
        self.deliver(vec![(self.spec.destination.clone(), records)]).await
    }

    /// Attempt to drain any locally queued batches without new input.
    /// A no-op on an empty queue: the backend is not called at all.
    pub async fn flush(&self) -> Result<(), PublishError> {
        if self.spec.policy != DeliveryPolicy::Queue {
            return Ok(());
        }
        self.deliver_queued(Vec::new()).await
    }

    /// The global topic first, then one `<topic>.<meter>` pair per distinct
    /// sample name when per-meter topics are enabled, in first-seen order.
    fn sample_entries(&self, samples: &[Sample]) -> Vec<Entry> {
        let records: Vec<Value> = samples.iter().map(Sample::as_record).collect();
        let mut entries = vec![(self.spec.destination.clone(), records)];
        if self.spec.per_meter_topic {
            let mut per_meter: Vec<Entry> = Vec::new();
            for sample in samples {
                let topic = format!("{}.{}", self.spec.destination, sample.name);
                match per_meter.iter_mut().find(|(t, _)| *t == topic) {
                    Some((_, batch)) => batch.push(sample.as_record()),
                    None => per_meter.push((topic, vec![sample.as_record()])),
                }
            }
            entries.extend(per_meter);
        }
        entries
    }

    async fn deliver(&self, entries: Vec<Entry>) -> Result<(), PublishError> {
        match self.spec.policy {
            DeliveryPolicy::Default => self.deliver_fail_fast(entries).await,
            DeliveryPolicy::Drop => self.deliver_drop(entries).await,
            DeliveryPolicy::Queue => self.deliver_queued(entries).await,
        }
    }

    /// Send once per pair; a failing pair never blocks the remaining pairs,
    /// and the caller hears about the failure only after all were attempted.
    async fn deliver_fail_fast(&self, entries: Vec<Entry>) -> Result<(), PublishError> {
        let attempted = entries.len();
        let mut failed = 0;
        for (destination, batch) in &entries {
            if let Err(e) = self.backend.send(destination, batch).await {
                warn!(destination = %destination, error = %e, "failed to deliver batch");
                failed += 1;
            }
        }
        if failed > 0 {
            counter!("publisher_delivery_failures_total", "policy" => "default")
                .increment(failed as u64);
            return Err(PublishError::Delivery { failed, attempted });
        }
        Ok(())
    }

    async fn deliver_drop(&self, entries: Vec<Entry>) -> Result<(), PublishError> {
        for (destination, batch) in &entries {
            if let Err(e) = self.backend.send(destination, batch).await {
                info!(destination = %destination, count = batch.len(), error = %e,
                    "dropping batch after failed delivery");
                counter!("publisher_batches_dropped_total", "reason" => "drop_policy")
                    .increment(1);
            }
        }
        Ok(())
    }

    async fn deliver_queued(&self, entries: Vec<Entry>) -> Result<(), PublishError> {
        let mut state = self.queue.lock().await;
        state.pending.extend(entries);

        // Oldest first. On failure the failing entry and everything behind it
        // stay queued, in order.
        while let Some((destination, batch)) = state.pending.front() {
            match self.backend.send(destination, batch).await {
                Ok(()) => {
                    state.consecutive_failures = 0;
                    state.pending.pop_front();
                }
                Err(e) => {
                    state.consecutive_failures += 1;
                    if self.spec.max_retry > 0 && state.consecutive_failures > self.spec.max_retry {
                        let dropped = state.pending.len();
                        state.pending.clear();
                        state.consecutive_failures = 0;
                        error!(dropped, error = %e,
                            "delivery retries exhausted, dropping local queue");
                        counter!("publisher_batches_dropped_total", "reason" => "retries_exhausted")
                            .increment(dropped as u64);
                        return Err(PublishError::RetriesExhausted { dropped });
                    }
                    warn!(queued = state.pending.len(), error = %e,
                        "delivery failed, keeping batches queued for the next attempt");
                    break;
                }
            }
        }

        let over = state.pending.len().saturating_sub(self.spec.max_queue_length);
        if over > 0 {
            state.pending.drain(..over);
            warn!(evicted = over, "local queue over capacity, evicted oldest batches");
            counter!("publisher_batches_dropped_total", "reason" => "queue_full")
                .increment(over as u64);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn queued_batches(&self) -> Vec<Entry> {
        self.queue.lock().await.pending.iter().cloned().collect()
    }
}
