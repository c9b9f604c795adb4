use async_trait::async_trait;
use common_types::{Resource, Sample};

use crate::cache::CycleCache;
use crate::errors::PollsterError;

/// Produces measurements for a set of resources.
///
/// A pollster's registered name is the meter name it produces; pipeline
/// source patterns select pollsters by matching against it. The `cache` is
/// shared by every pollster invoked in the same cycle and discarded after,
/// so expensive raw reads (an inspector call, a remote listing) are paid
/// once per tick no matter how many pollsters consume them.
#[async_trait]
pub trait Pollster: Send + Sync {
    /// Discovery plugin to fall back on when the source configures neither
    /// static resources nor a discovery list.
    fn default_discovery(&self) -> Option<&str> {
        None
    }

    async fn get_samples(
        &self,
        cache: &CycleCache,
        resources: &[Resource],
    ) -> Result<Vec<Sample>, PollsterError>;
}

/// Enumerates the current resource population.
///
/// The returned resources are opaque to the scheduler; it only relies on
/// their stable string keys for deduplication and ring placement.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, param: Option<&str>) -> anyhow::Result<Vec<Resource>>;
}
