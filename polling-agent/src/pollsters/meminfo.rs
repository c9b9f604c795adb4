use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use common_types::{Resource, Sample, SampleKind};

use crate::cache::CycleCache;
use crate::errors::PollsterError;
use crate::plugin::Pollster;

const CYCLE_CACHE_KEY: &str = "meminfo";

/// Reads and parses `/proc/meminfo`.
///
/// One inspector instance is shared by every memory pollster; the raw read
/// itself is memoized per cycle through the [`CycleCache`], so a tick with
/// several memory meters costs one file read.
pub struct MeminfoInspector {
    path: PathBuf,
}

impl MeminfoInspector {
    pub fn new(path: impl Into<PathBuf>) -> MeminfoInspector {
        MeminfoInspector { path: path.into() }
    }

    /// Field values in kB, keyed by field name.
    pub async fn read(&self) -> anyhow::Result<HashMap<String, u64>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(parse_meminfo(&raw))
    }

    async fn read_cached(&self, cache: &CycleCache) -> anyhow::Result<HashMap<String, u64>> {
        if let Some(cached) = cache.get(CYCLE_CACHE_KEY) {
            return Ok(serde_json::from_value(cached)?);
        }
        let fields = self.read().await?;
        cache.insert(CYCLE_CACHE_KEY, serde_json::to_value(&fields)?);
        Ok(fields)
    }
}

impl Default for MeminfoInspector {
    fn default() -> MeminfoInspector {
        MeminfoInspector::new("/proc/meminfo")
    }
}

fn parse_meminfo(raw: &str) -> HashMap<String, u64> {
    raw.lines()
        .filter_map(|line| {
            let (field, rest) = line.split_once(':')?;
            let value = rest.split_whitespace().next()?.parse().ok()?;
            Some((field.to_string(), value))
        })
        .collect()
}

/// Emits `memory.available` per resource.
pub struct MemAvailablePollster {
    inspector: Arc<MeminfoInspector>,
}

impl MemAvailablePollster {
    pub fn new(inspector: Arc<MeminfoInspector>) -> MemAvailablePollster {
        MemAvailablePollster { inspector }
    }
}

#[async_trait]
impl Pollster for MemAvailablePollster {
    fn default_discovery(&self) -> Option<&str> {
        Some("local-node")
    }

    async fn get_samples(
        &self,
        cache: &CycleCache,
        resources: &[Resource],
    ) -> Result<Vec<Sample>, PollsterError> {
        let fields = self.inspector.read_cached(cache).await?;
        // A kernel without MemAvailable will never grow one; that is a
        // capability gap, not a transient hiccup.
        let Some(available_kb) = fields.get("MemAvailable") else {
            return Err(PollsterError::permanent(resources));
        };
        Ok(resources
            .iter()
            .map(|r| {
                Sample::new(
                    "memory.available",
                    SampleKind::Gauge,
                    "KB",
                    *available_kb as f64,
                    r.key(),
                )
            })
            .collect())
    }
}

/// Emits `memory.used` (total minus free) per resource.
pub struct MemUsedPollster {
    inspector: Arc<MeminfoInspector>,
}

impl MemUsedPollster {
    pub fn new(inspector: Arc<MeminfoInspector>) -> MemUsedPollster {
        MemUsedPollster { inspector }
    }
}

#[async_trait]
impl Pollster for MemUsedPollster {
    fn default_discovery(&self) -> Option<&str> {
        Some("local-node")
    }

    async fn get_samples(
        &self,
        cache: &CycleCache,
        resources: &[Resource],
    ) -> Result<Vec<Sample>, PollsterError> {
        let fields = self.inspector.read_cached(cache).await?;
        let (Some(total), Some(free)) = (fields.get("MemTotal"), fields.get("MemFree")) else {
            return Err(PollsterError::permanent(resources));
        };
        let used_kb = total.saturating_sub(*free);
        Ok(resources
            .iter()
            .map(|r| Sample::new("memory.used", SampleKind::Gauge, "KB", used_kb as f64, r.key()))
            .collect())
    }
}
