use std::sync::{Arc, RwLock};
use std::time::Duration;

use etcd_client::{Client, GetOptions, PutOptions, WatchOptions};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hashring::HashRing;

#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    pub endpoints: Vec<String>,
    /// Key prefix for all group state, e.g. "/meterd/groups".
    pub prefix: String,
    /// TTL for this member's lease. If the agent dies, its membership key
    /// expires after this many seconds and peers take over its resources.
    pub lease_ttl: i64,
    /// How often to send lease keepalive pings.
    pub keepalive_interval: Duration,
    /// How long to wait before reconnecting after losing the backend.
    pub retry_interval: Duration,
}

/// Group membership and resource ownership for one agent instance.
///
/// Holds the current [`HashRing`] snapshot behind an `RwLock<Arc<_>>`: writers
/// build a complete replacement ring and swap the `Arc`, readers clone it, so
/// an ownership query observes either the old or the new ring and never a
/// rebuild in progress.
///
/// Without a coordination backend the ring contains only this member and
/// every resource belongs to it; multi-agent and single-agent operation share
/// the same query path.
pub struct PartitionCoordinator {
    member_id: String,
    ring: RwLock<Arc<HashRing>>,
}

impl PartitionCoordinator {
    pub fn new(member_id: impl Into<String>) -> Arc<PartitionCoordinator> {
        let member_id = member_id.into();
        let ring = Arc::new(HashRing::new(vec![member_id.clone()]));
        Arc::new(PartitionCoordinator {
            member_id,
            ring: RwLock::new(ring),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Current ring snapshot.
    pub fn ring(&self) -> Arc<HashRing> {
        self.ring.read().expect("ring lock poisoned").clone()
    }

    pub fn belongs_to_self(&self, key: &str) -> bool {
        self.ring().belongs_to(key, &self.member_id)
    }

    /// Swap in a ring built from `members`. This member is always included,
    /// so a degraded or empty listing falls back to own-everything rather
    /// than own-nothing.
    pub fn install_members(&self, mut members: Vec<String>) {
        if !members.iter().any(|m| m == &self.member_id) {
            members.push(self.member_id.clone());
        }
        let ring = Arc::new(HashRing::new(members));
        tracing::debug!(members = ring.len(), "installed partition ring");
        *self.ring.write().expect("ring lock poisoned") = ring;
    }

    /// Maintain membership for `group` against etcd until cancelled.
    ///
    /// Registers this member under a lease, heartbeats the lease, and watches
    /// the group prefix, rebuilding the ring on every membership delta. Any
    /// backend failure degrades to a self-only ring (fails open: a telemetry
    /// gap on peers beats fleet-wide silence) and reconnects after
    /// `retry_interval`.
    pub async fn run(
        self: Arc<PartitionCoordinator>,
        group: String,
        config: CoordinationConfig,
        cancel: CancellationToken,
    ) {
        if let Err(e) = validate_member_id(&self.member_id) {
            tracing::error!(error = %e, "refusing to join group, staying standalone");
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.serve(&group, &config, &cancel) => {
                    match result {
                        Ok(()) => return,
                        Err(e) => {
                            tracing::warn!(group = %group, error = %e,
                                "coordination backend lost, owning all resources until it returns");
                            self.install_members(Vec::new());
                        }
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(config.retry_interval) => {}
                    }
                }
            }
        }
    }

    async fn serve(
        &self,
        group: &str,
        config: &CoordinationConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let client = Client::connect(&config.endpoints, None).await?;
        let prefix = format!("{}/{}/", config.prefix, group);
        let member_key = format!("{prefix}{}", self.member_id);

        let lease_id = client.clone().lease_grant(config.lease_ttl, None).await?.id();
        client
            .clone()
            .put(
                member_key,
                self.member_id.clone(),
                Some(PutOptions::new().with_lease(lease_id)),
            )
            .await?;
        tracing::info!(group = %group, member = %self.member_id, "joined polling group");

        self.install_members(list_members(&client, &prefix).await?);

        let (mut keeper, mut keeper_stream) = client.clone().lease_keep_alive(lease_id).await?;
        let mut watch_stream = client
            .clone()
            .watch(prefix.clone(), Some(WatchOptions::new().with_prefix()))
            .await?;
        let mut heartbeat = tokio::time::interval(config.keepalive_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Best-effort revoke so peers rebalance promptly
                    drop(client.clone().lease_revoke(lease_id).await);
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    keeper.keep_alive().await?;
                    if keeper_stream.message().await?.is_none() {
                        return Err(Error::LeaseLost);
                    }
                }
                msg = watch_stream.message() => {
                    match msg? {
                        Some(_) => {
                            self.install_members(list_members(&client, &prefix).await?);
                        }
                        None => return Err(Error::LeaseLost),
                    }
                }
            }
        }
    }
}

async fn list_members(client: &Client, prefix: &str) -> Result<Vec<String>> {
    let resp = client
        .clone()
        .get(prefix, Some(GetOptions::new().with_prefix()))
        .await?;
    Ok(resp
        .kvs()
        .iter()
        .filter_map(|kv| kv.key_str().ok())
        .filter_map(|key| key.strip_prefix(prefix))
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect())
}

/// Member ids are interpolated into etcd key paths; reject anything that
/// could escape the group prefix.
fn validate_member_id(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(Error::InvalidMember(
            "member id must be 1-128 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(Error::InvalidMember(format!(
            "member id {name:?} contains characters other than alphanumeric, dash, underscore, dot"
        )));
    }
    Ok(())
}
