use async_trait::async_trait;
use common_types::Resource;

use crate::plugin::Discovery;

/// Yields a single resource for the host the agent runs on, for node-local
/// pollsters that measure the machine itself.
pub struct LocalNodeDiscovery {
    hostname: String,
}

impl LocalNodeDiscovery {
    pub fn new() -> LocalNodeDiscovery {
        LocalNodeDiscovery {
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        }
    }
}

impl Default for LocalNodeDiscovery {
    fn default() -> LocalNodeDiscovery {
        LocalNodeDiscovery::new()
    }
}

#[async_trait]
impl Discovery for LocalNodeDiscovery {
    async fn discover(&self, _param: Option<&str>) -> anyhow::Result<Vec<Resource>> {
        Ok(vec![Resource::from_key(format!("node://{}", self.hostname))])
    }
}
