use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common_types::{Event, Sample};
use metrics::counter;
use publisher::{PublishError, Publisher};
use tracing::{debug, warn};

use crate::config::{PipelineFile, SinkConfig, SourceConfig};
use crate::error::ConfigError;
use crate::matcher::SourceMatcher;
use crate::transformers::TransformChain;

/// A named group of publisher targets with an optional transform chain,
/// shared (via `Arc`) by every pipeline that references it.
pub struct Sink {
    name: String,
    // Transform work is pure and quick; the lock is never held across a
    // suspension point.
    chain: Mutex<TransformChain>,
    publishers: Vec<Publisher>,
}

impl Sink {
    pub fn new(name: impl Into<String>, chain: TransformChain, publishers: Vec<Publisher>) -> Sink {
        Sink {
            name: name.into(),
            chain: Mutex::new(chain),
            publishers,
        }
    }

    pub fn build(config: &SinkConfig) -> Result<Sink, ConfigError> {
        let chain = TransformChain::build(&config.transformers)?;
        let publishers = config
            .publishers
            .iter()
            .map(|uri| Publisher::from_uri(uri))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Sink {
            name: config.name.clone(),
            chain: Mutex::new(chain),
            publishers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn publish_samples(&self, samples: Vec<Sample>) -> Result<(), PublishError> {
        let transformed = {
            let mut chain = self.chain.lock().expect("transform chain lock poisoned");
            if chain.is_empty() {
                samples
            } else {
                samples.into_iter().flat_map(|s| chain.apply(s)).collect()
            }
        };
        if transformed.is_empty() {
            return Ok(());
        }
        self.fan_out(&transformed, &[]).await
    }

    pub async fn publish_events(&self, events: &[Event]) -> Result<(), PublishError> {
        if events.is_empty() {
            return Ok(());
        }
        self.fan_out(&[], events).await
    }

    /// Drain stateful transformers and any locally queued publisher batches.
    pub async fn flush(&self) -> Result<(), PublishError> {
        let remainder = {
            let mut chain = self.chain.lock().expect("transform chain lock poisoned");
            chain.flush()
        };
        let mut result = Ok(());
        if !remainder.is_empty() {
            result = self.fan_out(&remainder, &[]).await;
        }
        for publisher in &self.publishers {
            if let Err(e) = publisher.flush().await {
                warn!(sink = %self.name, error = %e, "failed to flush publisher queue");
                result = Err(e);
            }
        }
        result
    }

    /// Every publisher is attempted regardless of earlier failures; the
    /// caller hears about a failure only once all have had their chance, so
    /// it can decide to request redelivery without undoing the successes.
    async fn fan_out(&self, samples: &[Sample], events: &[Event]) -> Result<(), PublishError> {
        let attempted = self.publishers.len();
        let mut failed = 0;
        for publisher in &self.publishers {
            let result = if events.is_empty() {
                publisher.publish_samples(samples).await
            } else {
                publisher.publish_events(events).await
            };
            if let Err(e) = result {
                warn!(sink = %self.name, target = %publisher.spec().url, error = %e,
                    "publisher failed");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(PublishError::Delivery { failed, attempted });
        }
        Ok(())
    }
}

/// A named rule pairing a match predicate with the sinks it feeds.
///
/// Pipelines evaluate independently: an item one pipeline rejects may still
/// be accepted by another, and a delivery failure in one pipeline's sinks
/// says nothing about the others.
pub struct Pipeline {
    pub name: String,
    pub source: SourceConfig,
    matcher: SourceMatcher,
    sinks: Vec<Arc<Sink>>,
}

impl Pipeline {
    pub fn new(source: SourceConfig, matcher: SourceMatcher, sinks: Vec<Arc<Sink>>) -> Pipeline {
        Pipeline {
            name: source.name.clone(),
            source,
            matcher,
            sinks,
        }
    }

    pub fn supports(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    pub fn matcher(&self) -> &SourceMatcher {
        &self.matcher
    }

    pub async fn publish_samples(&self, samples: &[Sample]) -> Result<(), PublishError> {
        let accepted: Vec<Sample> = samples
            .iter()
            .filter(|s| {
                let matched = self.matcher.matches(&s.name);
                if !matched {
                    debug!(pipeline = %self.name, meter = %s.name, "sample not matched");
                }
                matched
            })
            .filter(|s| self.volume_is_publishable(s))
            .cloned()
            .collect();
        if accepted.is_empty() {
            return Ok(());
        }

        let attempted = self.sinks.len();
        let mut failed = 0;
        for sink in &self.sinks {
            if sink.publish_samples(accepted.clone()).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(PublishError::Delivery { failed, attempted });
        }
        Ok(())
    }

    pub async fn publish_events(&self, events: &[Event]) -> Result<(), PublishError> {
        let accepted: Vec<Event> = events
            .iter()
            .filter(|e| self.matcher.matches(&e.event_type))
            .cloned()
            .collect();
        if accepted.is_empty() {
            return Ok(());
        }

        let attempted = self.sinks.len();
        let mut failed = 0;
        for sink in &self.sinks {
            if sink.publish_events(&accepted).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(PublishError::Delivery { failed, attempted });
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), PublishError> {
        let mut result = Ok(());
        for sink in &self.sinks {
            if let Err(e) = sink.flush().await {
                result = Err(e);
            }
        }
        result
    }

    fn volume_is_publishable(&self, sample: &Sample) -> bool {
        if sample.volume.is_null() {
            warn!(pipeline = %self.name, meter = %sample.name,
                "dropping sample with no volume");
            counter!("pipeline_samples_dropped_total", "reason" => "missing_volume").increment(1);
            return false;
        }
        if sample.volume_as_f64().is_none() {
            warn!(pipeline = %self.name, meter = %sample.name, volume = %sample.volume,
                "dropping sample with non-numeric volume");
            counter!("pipeline_samples_dropped_total", "reason" => "invalid_volume").increment(1);
            return false;
        }
        true
    }
}

/// Every pipeline parsed from one definition file. Reload builds a whole new
/// set and swaps it in, or fails leaving the old set untouched.
pub struct PipelineSet {
    pub pipelines: Vec<Arc<Pipeline>>,
    pub event_pipelines: Vec<Arc<Pipeline>>,
}

impl PipelineSet {
    /// Route events to every event pipeline; each matches and fails
    /// independently. An error here means at least one delivery failed
    /// fail-fast and the upstream consumer may request redelivery.
    pub async fn publish_events(&self, events: &[Event]) -> Result<(), PublishError> {
        let attempted = self.event_pipelines.len();
        let mut failed = 0;
        for pipeline in &self.event_pipelines {
            if pipeline.publish_events(events).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(PublishError::Delivery { failed, attempted });
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), PublishError> {
        let mut result = Ok(());
        for pipeline in self.pipelines.iter().chain(&self.event_pipelines) {
            if let Err(e) = pipeline.flush().await {
                result = Err(e);
            }
        }
        result
    }
}

/// Compile a validated [`PipelineFile`] into its runtime form. Sinks are
/// built once and shared across the pipelines that name them.
pub fn setup_pipelines(file: &PipelineFile) -> Result<PipelineSet, ConfigError> {
    let mut sinks: HashMap<&str, Arc<Sink>> = HashMap::new();
    for sink_config in &file.sinks {
        sinks.insert(&sink_config.name, Arc::new(Sink::build(sink_config)?));
    }

    let mut pipelines = Vec::new();
    let mut event_pipelines = Vec::new();
    for source in &file.sources {
        let matcher = SourceMatcher::compile(&source.name, source.patterns())?;
        let pipeline = Arc::new(Pipeline {
            name: source.name.clone(),
            source: source.clone(),
            matcher,
            sinks: source
                .sinks
                .iter()
                .map(|name| {
                    sinks
                        .get(name.as_str())
                        .expect("validated source references only defined sinks")
                        .clone()
                })
                .collect(),
        });
        if source.is_event_source() {
            event_pipelines.push(pipeline);
        } else {
            pipelines.push(pipeline);
        }
    }
    Ok(PipelineSet {
        pipelines,
        event_pipelines,
    })
}
