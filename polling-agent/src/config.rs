use std::time::Duration;

use envconfig::Envconfig;
use partitioning::CoordinationConfig;

#[derive(Envconfig, Clone)]
pub struct AgentConfig {
    #[envconfig(default = "meterd-pipeline.yaml")]
    pub pipeline_file: String,

    /// Identity within the polling group. Defaults to "<hostname>-<pid>".
    pub member_id: Option<String>,

    #[envconfig(default = "central")]
    pub partitioning_group: String,

    /// Comma-separated etcd endpoints. Unset runs the agent standalone,
    /// owning every resource.
    pub etcd_endpoints: Option<String>,

    #[envconfig(default = "/meterd/groups")]
    pub etcd_prefix: String,

    #[envconfig(default = "10")]
    pub coordination_lease_ttl: i64,

    #[envconfig(default = "3")]
    pub coordination_heartbeat_secs: u64,

    #[envconfig(default = "5")]
    pub coordination_retry_secs: u64,

    /// Samples per pipeline hand-off. 0 publishes a whole cycle at once.
    #[envconfig(default = "0")]
    pub batch_size: usize,

    /// Consecutive permanent pollster failures before a (pollster, source)
    /// pair is disabled for the process lifetime.
    #[envconfig(default = "3")]
    pub permanent_failure_threshold: usize,

    /// How long a discovery listing is reused before the plugin is asked
    /// again. 0 re-discovers every cycle.
    #[envconfig(default = "600")]
    pub discovery_cache_ttl_secs: u64,

    /// Comma-separated pollster namespaces to load; empty loads all.
    #[envconfig(default = "")]
    pub polling_namespaces: String,

    /// Comma-separated pollster allow-list; unset loads every pollster in
    /// the selected namespaces.
    pub pollster_list: Option<String>,
}

impl AgentConfig {
    pub fn member_id(&self) -> String {
        match &self.member_id {
            Some(id) => id.clone(),
            None => {
                let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "agent".to_string());
                format!("{hostname}-{}", std::process::id())
            }
        }
    }

    pub fn namespaces(&self) -> Vec<String> {
        split_csv(&self.polling_namespaces)
    }

    pub fn allow_list(&self) -> Option<Vec<String>> {
        self.pollster_list.as_deref().map(split_csv)
    }

    pub fn coordination(&self) -> Option<CoordinationConfig> {
        let endpoints = split_csv(self.etcd_endpoints.as_deref()?);
        if endpoints.is_empty() {
            return None;
        }
        Some(CoordinationConfig {
            endpoints,
            prefix: self.etcd_prefix.clone(),
            lease_ttl: self.coordination_lease_ttl,
            keepalive_interval: Duration::from_secs(self.coordination_heartbeat_secs),
            retry_interval: Duration::from_secs(self.coordination_retry_secs),
        })
    }

    pub fn discovery_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_cache_ttl_secs)
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
