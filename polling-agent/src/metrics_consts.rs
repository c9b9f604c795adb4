pub const SAMPLES_COLLECTED: &str = "meterd_samples_collected";
pub const POLL_CYCLES: &str = "meterd_poll_cycles";
pub const POLL_DURATION_MS: &str = "meterd_poll_duration_ms";
pub const POLLS_SKIPPED_NO_RESOURCES: &str = "meterd_polls_skipped_no_resources";
pub const POLLS_SKIPPED_NOT_OWNED: &str = "meterd_polls_skipped_not_owned";
pub const POLLSTER_TRANSIENT_FAILURES: &str = "meterd_pollster_transient_failures";
pub const POLLSTERS_DISABLED: &str = "meterd_pollsters_disabled";
pub const RESOURCES_FILTERED_BY_PARTITION: &str = "meterd_resources_filtered_by_partition";
pub const BATCHES_PUBLISHED: &str = "meterd_batches_published";
pub const BATCH_PUBLISH_FAILURES: &str = "meterd_batch_publish_failures";
pub const DISCOVERY_FAILURES: &str = "meterd_discovery_failures";
pub const EVENTS_DISPATCHED: &str = "meterd_events_dispatched";
pub const EVENTS_REQUEUED: &str = "meterd_events_requeued";
