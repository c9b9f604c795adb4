use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use common_types::{Resource, Sample};
use metrics::{counter, histogram};
use partitioning::PartitionCoordinator;
use pipeline::{Pipeline, PipelineSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CycleCache, DiscoveryCache};
use crate::config::AgentConfig;
use crate::errors::PollsterError;
use crate::metrics_consts::{
    BATCHES_PUBLISHED, BATCH_PUBLISH_FAILURES, POLLSTERS_DISABLED, POLLSTER_TRANSIENT_FAILURES,
    POLLS_SKIPPED_NOT_OWNED, POLLS_SKIPPED_NO_RESOURCES, POLL_CYCLES, POLL_DURATION_MS,
    RESOURCES_FILTERED_BY_PARTITION, SAMPLES_COLLECTED,
};
use crate::plugin::Pollster;
use crate::registry::PollsterRegistry;

/// One (pipeline, pollster) pairing inside a polling task.
struct TaskEntry {
    pipeline: Arc<Pipeline>,
    pollster_name: String,
    pollster: Arc<dyn Pollster>,
    /// `"<source>-<pollster>"`, the unit of resource isolation, failure
    /// accounting and disablement.
    key: String,
}

/// All sources sharing one polling interval.
///
/// Static resource lists are keyed per `"<source>-<pollster>"` pair, so two
/// sources coalesced into the same task never see each other's resources
/// even when they share a pollster.
pub struct PollingTask {
    interval: Duration,
    entries: Vec<TaskEntry>,
    resources: HashMap<String, Vec<Resource>>,
    consecutive_permanent: HashMap<String, usize>,
    disabled: HashSet<String>,
}

impl PollingTask {
    fn new(interval: Duration) -> PollingTask {
        PollingTask {
            interval,
            entries: Vec::new(),
            resources: HashMap::new(),
            consecutive_permanent: HashMap::new(),
            disabled: HashSet::new(),
        }
    }

    fn add_entry(&mut self, pipeline: Arc<Pipeline>, name: &str, pollster: Arc<dyn Pollster>) {
        let key = format!("{}-{}", pipeline.source.name, name);
        self.resources.insert(
            key.clone(),
            pipeline
                .source
                .resources
                .iter()
                .map(|r| Resource::from_key(r.clone()))
                .collect(),
        );
        self.entries.push(TaskEntry {
            pipeline,
            pollster_name: name.to_string(),
            pollster,
            key,
        });
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// What happened to one (pollster, source) pair in one cycle. The two skip
/// variants are distinct on purpose: "nothing configured or discovered" and
/// "resources exist but a peer owns them all" produce different log lines
/// and tests assert on which one fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Polled { samples: usize },
    NoResources,
    NoneOwned,
    TransientFailure,
    PermanentFailure,
    Disabled,
}

/// Owns the periodic polling loops and drives discovery, partition
/// filtering, polling, batching and pipeline hand-off for every cycle.
pub struct AgentManager {
    config: AgentConfig,
    registry: Arc<PollsterRegistry>,
    coordinator: Arc<PartitionCoordinator>,
    pipelines: Arc<PipelineSet>,
    discovery_cache: DiscoveryCache,
}

impl AgentManager {
    pub fn new(
        config: AgentConfig,
        registry: Arc<PollsterRegistry>,
        coordinator: Arc<PartitionCoordinator>,
        pipelines: Arc<PipelineSet>,
    ) -> AgentManager {
        let discovery_cache = DiscoveryCache::new(config.discovery_cache_ttl());
        AgentManager {
            config,
            registry,
            coordinator,
            pipelines,
            discovery_cache,
        }
    }

    pub fn pipelines(&self) -> &Arc<PipelineSet> {
        &self.pipelines
    }

    /// Group polling sources by interval: one task per distinct interval,
    /// one entry per (source, matching pollster) pair.
    pub fn setup_polling_tasks(&self) -> BTreeMap<u64, PollingTask> {
        let mut tasks: BTreeMap<u64, PollingTask> = BTreeMap::new();
        for pipeline in &self.pipelines.pipelines {
            let source = &pipeline.source;
            let Some(interval) = source.interval else {
                continue;
            };
            let task = tasks
                .entry(interval)
                .or_insert_with(|| PollingTask::new(Duration::from_secs(interval)));
            let mut matched = 0;
            for (name, pollster) in self.registry.pollsters() {
                if !pipeline.supports(name) {
                    continue;
                }
                matched += 1;
                task.add_entry(pipeline.clone(), name, pollster.clone());
            }
            if matched == 0 {
                warn!(source = %source.name, "no pollsters match this source's meter patterns");
            }
        }
        tasks
    }

    /// One polling cycle for one task. Runs each entry in configuration
    /// order with a cycle cache shared across all of them.
    pub async fn poll_and_notify(&self, task: &mut PollingTask) -> Vec<(String, PollOutcome)> {
        let started = std::time::Instant::now();
        counter!(POLL_CYCLES).increment(1);
        let cache = CycleCache::default();
        let mut outcomes = Vec::with_capacity(task.entries.len());

        for i in 0..task.entries.len() {
            let entry = &task.entries[i];
            if task.disabled.contains(&entry.key) {
                outcomes.push((entry.key.clone(), PollOutcome::Disabled));
                continue;
            }
            let static_resources = task
                .resources
                .get(&entry.key)
                .map_or(&[][..], Vec::as_slice);
            let outcome = self.poll_entry(entry, static_resources, &cache).await;

            match &outcome {
                PollOutcome::PermanentFailure => {
                    let count = task
                        .consecutive_permanent
                        .entry(entry.key.clone())
                        .or_insert(0);
                    *count += 1;
                    if *count >= self.config.permanent_failure_threshold {
                        task.consecutive_permanent.remove(&entry.key);
                        task.disabled.insert(entry.key.clone());
                        // The one and only log line for this pair.
                        error!(
                            pollster = %entry.pollster_name,
                            source = %entry.pipeline.source.name,
                            failures = self.config.permanent_failure_threshold,
                            "pollster keeps failing permanently, disabling it for this source"
                        );
                        counter!(POLLSTERS_DISABLED).increment(1);
                    }
                }
                PollOutcome::Polled { .. } | PollOutcome::TransientFailure => {
                    task.consecutive_permanent.remove(&entry.key);
                }
                _ => {}
            }
            outcomes.push((entry.key.clone(), outcome));
        }

        histogram!(POLL_DURATION_MS).record(started.elapsed().as_millis() as f64);
        outcomes
    }

    async fn poll_entry(
        &self,
        entry: &TaskEntry,
        static_resources: &[Resource],
        cache: &CycleCache,
    ) -> PollOutcome {
        let source = &entry.pipeline.source;

        // Static resources first, then each discovery listing, deduplicated
        // by canonical key in arrival order.
        let mut seen: HashSet<String> = HashSet::new();
        let mut resources: Vec<Resource> = Vec::new();
        for resource in static_resources {
            if seen.insert(resource.key()) {
                resources.push(resource.clone());
            }
        }

        let discovery_specs: Vec<String> = if !source.discovery.is_empty() {
            source.discovery.clone()
        } else if resources.is_empty() {
            entry
                .pollster
                .default_discovery()
                .map(|name| vec![name.to_string()])
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        for spec in &discovery_specs {
            let (name, param) = split_discovery(spec);
            let Some(plugin) = self.registry.discovery(name) else {
                warn!(discovery = %name, source = %source.name, "unknown discovery plugin");
                continue;
            };
            for resource in self.discovery_cache.discover(name, plugin, param).await {
                if seen.insert(resource.key()) {
                    resources.push(resource);
                }
            }
        }

        if resources.is_empty() {
            info!(pollster = %entry.pollster_name, source = %source.name,
                "nothing to poll, no resources configured or discovered");
            counter!(POLLS_SKIPPED_NO_RESOURCES).increment(1);
            return PollOutcome::NoResources;
        }

        let total = resources.len();
        let owned: Vec<Resource> = resources
            .into_iter()
            .filter(|r| self.coordinator.belongs_to_self(&r.key()))
            .collect();
        if owned.is_empty() {
            info!(pollster = %entry.pollster_name, source = %source.name, resources = total,
                "resources exist but none are owned by this agent, skipping");
            counter!(POLLS_SKIPPED_NOT_OWNED).increment(1);
            return PollOutcome::NoneOwned;
        }
        if owned.len() < total {
            counter!(RESOURCES_FILTERED_BY_PARTITION).increment((total - owned.len()) as u64);
        }

        match entry.pollster.get_samples(cache, &owned).await {
            Ok(samples) => {
                let collected = samples.len();
                counter!(SAMPLES_COLLECTED, "pollster" => entry.pollster_name.clone())
                    .increment(collected as u64);
                self.publish(entry, samples).await;
                PollOutcome::Polled { samples: collected }
            }
            Err(PollsterError::Permanent { resources }) => {
                debug!(pollster = %entry.pollster_name, source = %source.name,
                    resources = resources.len(), "permanent pollster failure");
                PollOutcome::PermanentFailure
            }
            Err(PollsterError::Transient(e)) => {
                warn!(pollster = %entry.pollster_name, source = %source.name, error = %e,
                    "pollster failed, skipping this cycle");
                counter!(POLLSTER_TRANSIENT_FAILURES, "pollster" => entry.pollster_name.clone())
                    .increment(1);
                PollOutcome::TransientFailure
            }
        }
    }

    /// Hand a cycle's samples to the entry's pipeline, chunked by
    /// `batch_size` when one is configured. On the polling path a delivery
    /// failure costs the batch for this cycle; there is no inbound message
    /// to requeue.
    async fn publish(&self, entry: &TaskEntry, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        let chunks: Vec<&[Sample]> = if self.config.batch_size == 0 {
            vec![&samples[..]]
        } else {
            samples.chunks(self.config.batch_size).collect()
        };
        for chunk in chunks {
            match entry.pipeline.publish_samples(chunk).await {
                Ok(()) => counter!(BATCHES_PUBLISHED).increment(1),
                Err(e) => {
                    error!(pipeline = %entry.pipeline.name, error = %e,
                        "failed to publish batch, lost for this cycle");
                    counter!(BATCH_PUBLISH_FAILURES).increment(1);
                }
            }
        }
    }

    /// Spawn one periodic loop per interval and run until cancelled.
    ///
    /// Ticks for one interval never overlap: the loop awaits the whole cycle
    /// before asking the ticker again, and missed ticks are delayed rather
    /// than bursted. Different intervals run as independent tasks.
    pub async fn run(self: Arc<AgentManager>, cancel: CancellationToken) {
        let tasks = self.setup_polling_tasks();
        if tasks.is_empty() {
            warn!("no polling tasks configured, nothing to schedule");
        }
        let mut handles = Vec::new();
        for (interval_secs, mut task) in tasks {
            let manager = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                info!(
                    interval = interval_secs,
                    pollsters = task.entry_count(),
                    "starting polling loop"
                );
                let mut ticker = tokio::time::interval(task.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            manager.poll_and_notify(&mut task).await;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            drop(handle.await);
        }
        if let Err(e) = self.pipelines.flush().await {
            warn!(error = %e, "final pipeline flush failed");
        }
    }
}

/// `"name"` or `"name://param"`.
fn split_discovery(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once("://") {
        Some((name, param)) if !param.is_empty() => (name, Some(param)),
        Some((name, _)) => (name, None),
        None => (spec, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common_types::SampleKind;
    use pipeline::{SourceConfig, SourceMatcher, Sink, TransformChain};
    use publisher::{MemoryBackend, Publisher, PublisherSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::plugin::Discovery;

    struct RecordingPollster {
        meter: String,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingPollster {
        fn new(meter: &str) -> Arc<RecordingPollster> {
            Arc::new(RecordingPollster {
                meter: meter.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Pollster for RecordingPollster {
        async fn get_samples(
            &self,
            _cache: &CycleCache,
            resources: &[Resource],
        ) -> Result<Vec<Sample>, PollsterError> {
            self.calls
                .lock()
                .unwrap()
                .push(resources.iter().map(Resource::key).collect());
            Ok(resources
                .iter()
                .map(|r| Sample::new(&self.meter, SampleKind::Gauge, "u", 1.0, r.key()))
                .collect())
        }
    }

    enum FailureMode {
        Permanent,
        Transient,
    }

    struct FailingPollster {
        mode: FailureMode,
        calls: AtomicUsize,
    }

    impl FailingPollster {
        fn new(mode: FailureMode) -> Arc<FailingPollster> {
            Arc::new(FailingPollster {
                mode,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Pollster for FailingPollster {
        async fn get_samples(
            &self,
            _cache: &CycleCache,
            resources: &[Resource],
        ) -> Result<Vec<Sample>, PollsterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                FailureMode::Permanent => Err(PollsterError::permanent(resources)),
                FailureMode::Transient => Err(anyhow::anyhow!("inspector timed out").into()),
            }
        }
    }

    struct FixedDiscovery {
        resources: Vec<&'static str>,
    }

    #[async_trait]
    impl Discovery for FixedDiscovery {
        async fn discover(&self, _param: Option<&str>) -> anyhow::Result<Vec<Resource>> {
            Ok(self.resources.iter().map(|r| Resource::from_key(*r)).collect())
        }
    }

    fn test_config(batch_size: usize, threshold: usize) -> AgentConfig {
        AgentConfig {
            pipeline_file: "unused.yaml".to_string(),
            member_id: Some("agent-test".to_string()),
            partitioning_group: "central".to_string(),
            etcd_endpoints: None,
            etcd_prefix: "/meterd/groups".to_string(),
            coordination_lease_ttl: 10,
            coordination_heartbeat_secs: 3,
            coordination_retry_secs: 5,
            batch_size,
            permanent_failure_threshold: threshold,
            discovery_cache_ttl_secs: 0,
            polling_namespaces: String::new(),
            pollster_list: None,
        }
    }

    fn test_pipeline(
        name: &str,
        interval: u64,
        meters: &[&str],
        resources: &[&str],
        discovery: Vec<String>,
        backend: Arc<MemoryBackend>,
    ) -> Arc<Pipeline> {
        let meters: Vec<String> = meters.iter().map(|m| m.to_string()).collect();
        let source = SourceConfig {
            name: name.to_string(),
            interval: Some(interval),
            meters: meters.clone(),
            events: Vec::new(),
            discovery,
            resources: resources.iter().map(|r| r.to_string()).collect(),
            sinks: vec!["default".to_string()],
        };
        let matcher = SourceMatcher::compile(name, &meters).unwrap();
        let publisher = Publisher::new(
            PublisherSpec::parse("test://local/metering").unwrap(),
            backend,
        );
        let sink = Arc::new(Sink::new(
            "default",
            TransformChain::build(&[]).unwrap(),
            vec![publisher],
        ));
        Arc::new(Pipeline::new(source, matcher, vec![sink]))
    }

    fn manager_with(
        config: AgentConfig,
        registry: PollsterRegistry,
        coordinator: Arc<PartitionCoordinator>,
        pipelines: Vec<Arc<Pipeline>>,
    ) -> AgentManager {
        AgentManager::new(
            config,
            Arc::new(registry),
            coordinator,
            Arc::new(PipelineSet {
                pipelines,
                event_pipelines: Vec::new(),
            }),
        )
    }

    #[tokio::test]
    async fn sources_on_one_interval_keep_their_resources_apart() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .discovery("fixed", Arc::new(FixedDiscovery { resources: vec!["discovered://a"] }))
            .build()
            .unwrap();

        let backend = Arc::new(MemoryBackend::new());
        let source_a = test_pipeline(
            "source_a",
            60,
            &["test.meter"],
            &["test://"],
            vec!["fixed".to_string()],
            backend.clone(),
        );
        let source_b = test_pipeline(
            "source_b",
            60,
            &["test.meter"],
            &["another://"],
            Vec::new(),
            backend,
        );
        let manager = manager_with(
            test_config(0, 3),
            registry,
            PartitionCoordinator::new("agent-test"),
            vec![source_a, source_b],
        );

        let mut tasks = manager.setup_polling_tasks();
        assert_eq!(tasks.len(), 1, "one task per distinct interval");
        let task = tasks.get_mut(&60).unwrap();
        assert_eq!(task.entry_count(), 2);

        manager.poll_and_notify(task).await;

        let calls = pollster.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["test://", "discovered://a"]);
        assert_eq!(calls[1], vec!["another://"]);
    }

    #[tokio::test]
    async fn healthy_pollster_keeps_flowing_across_cycles() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .build()
            .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let pipeline = test_pipeline(
            "s",
            60,
            &["test.meter"],
            &["test://"],
            Vec::new(),
            backend.clone(),
        );
        let manager = manager_with(
            test_config(0, 3),
            registry,
            PartitionCoordinator::new("agent-test"),
            vec![pipeline],
        );

        let mut tasks = manager.setup_polling_tasks();
        let task = tasks.get_mut(&60).unwrap();
        for _ in 0..4 {
            let outcomes = manager.poll_and_notify(task).await;
            assert_eq!(outcomes[0].1, PollOutcome::Polled { samples: 1 });
        }
        assert_eq!(pollster.calls().len(), 4);
        assert_eq!(backend.sent_count(), 4);
    }

    #[tokio::test]
    async fn permanent_failures_disable_the_pair_after_the_threshold() {
        let pollster = FailingPollster::new(FailureMode::Permanent);
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .build()
            .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let pipeline = test_pipeline("s", 60, &["test.meter"], &["test://"], Vec::new(), backend);
        let manager = manager_with(
            test_config(0, 3),
            registry,
            PartitionCoordinator::new("agent-test"),
            vec![pipeline],
        );

        let mut tasks = manager.setup_polling_tasks();
        let task = tasks.get_mut(&60).unwrap();
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(manager.poll_and_notify(task).await.remove(0).1);
        }

        assert_eq!(
            outcomes,
            vec![
                PollOutcome::PermanentFailure,
                PollOutcome::PermanentFailure,
                PollOutcome::PermanentFailure,
                PollOutcome::Disabled,
                PollOutcome::Disabled,
            ]
        );
        // Once disabled, the pollster is never invoked again.
        assert_eq!(pollster.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_failures_never_disable() {
        let pollster = FailingPollster::new(FailureMode::Transient);
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .build()
            .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let pipeline = test_pipeline("s", 60, &["test.meter"], &["test://"], Vec::new(), backend);
        let manager = manager_with(
            test_config(0, 2),
            registry,
            PartitionCoordinator::new("agent-test"),
            vec![pipeline],
        );

        let mut tasks = manager.setup_polling_tasks();
        let task = tasks.get_mut(&60).unwrap();
        for _ in 0..5 {
            let outcomes = manager.poll_and_notify(task).await;
            assert_eq!(outcomes[0].1, PollOutcome::TransientFailure);
        }
        assert_eq!(pollster.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn batching_chunks_pipeline_handoff() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster)
            .build()
            .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let resources = ["r://0", "r://1", "r://2", "r://3", "r://4"];
        let pipeline = test_pipeline(
            "s",
            60,
            &["test.meter"],
            &resources,
            Vec::new(),
            backend.clone(),
        );
        let manager = manager_with(
            test_config(2, 3),
            registry,
            PartitionCoordinator::new("agent-test"),
            vec![pipeline],
        );

        let mut tasks = manager.setup_polling_tasks();
        manager.poll_and_notify(tasks.get_mut(&60).unwrap()).await;

        let sizes: Vec<usize> = backend.sent().iter().map(|(_, batch)| batch.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn skip_outcomes_distinguish_empty_from_unowned() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .build()
            .unwrap();

        // Two members; pick resources the peer owns so nothing is local.
        let coordinator = PartitionCoordinator::new("agent-test");
        coordinator.install_members(vec!["agent-test".to_string(), "peer".to_string()]);
        let ring = coordinator.ring();
        let peer_owned: Vec<String> = (0..1000)
            .map(|i| format!("res://{i}"))
            .filter(|key| ring.belongs_to(key, "peer"))
            .take(3)
            .collect();
        assert_eq!(peer_owned.len(), 3, "ring must give the peer some keys");
        let peer_owned: Vec<&str> = peer_owned.iter().map(String::as_str).collect();

        let backend = Arc::new(MemoryBackend::new());
        let unowned = test_pipeline(
            "unowned_source",
            60,
            &["test.meter"],
            &peer_owned,
            Vec::new(),
            backend.clone(),
        );
        let empty = test_pipeline(
            "empty_source",
            60,
            &["test.meter"],
            &[],
            Vec::new(),
            backend,
        );
        let manager = manager_with(
            test_config(0, 3),
            registry,
            coordinator,
            vec![unowned, empty],
        );

        let mut tasks = manager.setup_polling_tasks();
        let outcomes = manager.poll_and_notify(tasks.get_mut(&60).unwrap()).await;

        assert_eq!(outcomes[0].1, PollOutcome::NoneOwned);
        assert_eq!(outcomes[1].1, PollOutcome::NoResources);
        // Neither skip issued an empty pollster call.
        assert!(pollster.calls().is_empty());
    }

    #[tokio::test]
    async fn partition_filter_polls_only_owned_resources() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster.clone())
            .build()
            .unwrap();

        let coordinator = PartitionCoordinator::new("agent-test");
        coordinator.install_members(vec!["agent-test".to_string(), "peer".to_string()]);
        let ring = coordinator.ring();
        let all: Vec<String> = (0..40).map(|i| format!("res://{i}")).collect();
        let mine: Vec<String> = all
            .iter()
            .filter(|key| ring.belongs_to(key, "agent-test"))
            .cloned()
            .collect();
        assert!(!mine.is_empty() && mine.len() < all.len());
        let all_refs: Vec<&str> = all.iter().map(String::as_str).collect();

        let backend = Arc::new(MemoryBackend::new());
        let pipeline = test_pipeline("s", 60, &["test.meter"], &all_refs, Vec::new(), backend);
        let manager = manager_with(test_config(0, 3), registry, coordinator, vec![pipeline]);

        let mut tasks = manager.setup_polling_tasks();
        manager.poll_and_notify(tasks.get_mut(&60).unwrap()).await;

        assert_eq!(pollster.calls(), vec![mine]);
    }

    #[test]
    fn tasks_group_by_interval() {
        let pollster = RecordingPollster::new("test.meter");
        let registry = PollsterRegistry::builder()
            .pollster("test", "test.meter", pollster)
            .build()
            .unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let pipelines = vec![
            test_pipeline("a", 60, &["test.meter"], &[], Vec::new(), backend.clone()),
            test_pipeline("b", 60, &["test.meter"], &[], Vec::new(), backend.clone()),
            test_pipeline("c", 120, &["test.meter"], &[], Vec::new(), backend),
        ];
        let manager = manager_with(
            test_config(0, 3),
            registry,
            PartitionCoordinator::new("agent-test"),
            pipelines,
        );

        let tasks = manager.setup_polling_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[&60].entry_count(), 2);
        assert_eq!(tasks[&120].entry_count(), 1);
    }

    #[test]
    fn discovery_spec_splitting() {
        assert_eq!(split_discovery("local-node"), ("local-node", None));
        assert_eq!(
            split_discovery("endpoint://region-one"),
            ("endpoint", Some("region-one"))
        );
        assert_eq!(split_discovery("endpoint://"), ("endpoint", None));
    }
}
