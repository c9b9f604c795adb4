use std::sync::Arc;

use crate::config::AgentConfig;
use crate::discovery::LocalNodeDiscovery;
use crate::errors::AgentError;
use crate::registry::PollsterRegistry;

pub mod loadavg;
pub mod meminfo;

pub use loadavg::LoadAvgPollster;
pub use meminfo::{MemAvailablePollster, MemUsedPollster, MeminfoInspector};

/// Register the built-in plugins under the configured filters.
///
/// The meminfo inspector is built once here and handed to both memory
/// pollsters; shared handles are plain constructor arguments, not hidden
/// process-wide state.
pub fn default_registry(config: &AgentConfig) -> Result<PollsterRegistry, AgentError> {
    let inspector = Arc::new(MeminfoInspector::default());
    PollsterRegistry::builder()
        .namespaces(config.namespaces())
        .allow_list(config.allow_list())
        .pollster(
            "system",
            "memory.available",
            Arc::new(MemAvailablePollster::new(inspector.clone())),
        )
        .pollster(
            "system",
            "memory.used",
            Arc::new(MemUsedPollster::new(inspector)),
        )
        .pollster("system", "system.load", Arc::new(LoadAvgPollster::default()))
        .discovery("local-node", Arc::new(LocalNodeDiscovery::new()))
        .build()
}
