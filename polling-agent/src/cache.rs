use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common_types::Resource;
use metrics::counter;
use serde_json::Value;
use tracing::warn;

use crate::metrics_consts::DISCOVERY_FAILURES;
use crate::plugin::Discovery;

/// Per-cycle memoization shared by every pollster in one tick.
///
/// Created fresh at the start of a tick and dropped at the end; nothing in
/// it survives to the next cycle, so no cross-tick locking discipline is
/// needed beyond this mutex.
#[derive(Default)]
pub struct CycleCache {
    inner: Mutex<HashMap<String, Value>>,
}

impl CycleCache {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().expect("cycle cache poisoned").get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.inner
            .lock()
            .expect("cycle cache poisoned")
            .insert(key.into(), value);
    }
}

struct CachedListing {
    refreshed: Instant,
    resources: Vec<Resource>,
}

/// Cross-tick discovery results, refreshed once the configured age elapses.
///
/// The whole read-check-refresh sequence runs under one async mutex so two
/// overlapping ticks from different intervals cannot both decide to refresh
/// the same listing.
pub struct DiscoveryCache {
    ttl: Duration,
    inner: tokio::sync::Mutex<HashMap<String, CachedListing>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> DiscoveryCache {
        DiscoveryCache {
            ttl,
            inner: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Resources for `plugin`, from cache when fresh enough. A failing
    /// discovery logs once and falls back to the last known listing rather
    /// than wiping it.
    pub async fn discover(
        &self,
        name: &str,
        plugin: &Arc<dyn Discovery>,
        param: Option<&str>,
    ) -> Vec<Resource> {
        let key = match param {
            Some(param) => format!("{name}://{param}"),
            None => name.to_string(),
        };

        let mut listings = self.inner.lock().await;
        if let Some(cached) = listings.get(&key) {
            if !self.ttl.is_zero() && cached.refreshed.elapsed() < self.ttl {
                return cached.resources.clone();
            }
        }

        match plugin.discover(param).await {
            Ok(resources) => {
                listings.insert(
                    key,
                    CachedListing {
                        refreshed: Instant::now(),
                        resources: resources.clone(),
                    },
                );
                resources
            }
            Err(e) => {
                warn!(discovery = %name, error = %e, "discovery failed, reusing last listing");
                counter!(DISCOVERY_FAILURES, "discovery" => name.to_string()).increment(1);
                listings
                    .get(&key)
                    .map(|cached| cached.resources.clone())
                    .unwrap_or_default()
            }
        }
    }
}
