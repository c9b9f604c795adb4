use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use common_types::{Resource, Sample, SampleKind};

use crate::cache::CycleCache;
use crate::errors::PollsterError;
use crate::plugin::Pollster;

/// Emits `system.load` (one-minute load average) per resource.
pub struct LoadAvgPollster {
    path: PathBuf,
}

impl LoadAvgPollster {
    pub fn new(path: impl Into<PathBuf>) -> LoadAvgPollster {
        LoadAvgPollster { path: path.into() }
    }
}

impl Default for LoadAvgPollster {
    fn default() -> LoadAvgPollster {
        LoadAvgPollster::new("/proc/loadavg")
    }
}

#[async_trait]
impl Pollster for LoadAvgPollster {
    fn default_discovery(&self) -> Option<&str> {
        Some("local-node")
    }

    async fn get_samples(
        &self,
        _cache: &CycleCache,
        resources: &[Resource],
    ) -> Result<Vec<Sample>, PollsterError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(anyhow::Error::from)?;
        let load: f64 = raw
            .split_whitespace()
            .next()
            .ok_or_else(|| anyhow!("empty loadavg"))?
            .parse()
            .map_err(|e| anyhow!("malformed loadavg: {e}"))?;
        Ok(resources
            .iter()
            .map(|r| Sample::new("system.load", SampleKind::Gauge, "process", load, r.key()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_first_loadavg_field() {
        let path = std::env::temp_dir().join(format!("meterd-loadavg-test-{}", std::process::id()));
        std::fs::write(&path, "0.42 0.36 0.25 2/1024 4242\n").unwrap();

        let pollster = LoadAvgPollster::new(&path);
        let samples = pollster
            .get_samples(&CycleCache::default(), &[Resource::from_key("node://w")])
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "system.load");
        assert_eq!(samples[0].volume_as_f64(), Some(0.42));
        std::fs::remove_file(&path).unwrap();
    }
}
