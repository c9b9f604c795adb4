use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::AgentError;
use crate::plugin::{Discovery, Pollster};

/// Loaded pollster and discovery plugins, indexed by name.
///
/// Registration is an explicit compile-time table: callers list every plugin
/// they ship, and namespace/allow-list filters decide what survives into the
/// built registry. `BTreeMap` keeps iteration (and therefore task layout)
/// deterministic.
pub struct PollsterRegistry {
    pollsters: BTreeMap<String, Arc<dyn Pollster>>,
    discoveries: BTreeMap<String, Arc<dyn Discovery>>,
}

impl PollsterRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            namespaces: Vec::new(),
            allow_list: None,
            pollsters: Vec::new(),
            discoveries: BTreeMap::new(),
        }
    }

    pub fn pollster(&self, name: &str) -> Option<&Arc<dyn Pollster>> {
        self.pollsters.get(name)
    }

    pub fn pollsters(&self) -> impl Iterator<Item = (&str, &Arc<dyn Pollster>)> {
        self.pollsters.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn discovery(&self, name: &str) -> Option<&Arc<dyn Discovery>> {
        self.discoveries.get(name)
    }

    pub fn len(&self) -> usize {
        self.pollsters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pollsters.is_empty()
    }
}

pub struct RegistryBuilder {
    namespaces: Vec<String>,
    allow_list: Option<Vec<String>>,
    pollsters: Vec<(String, String, Arc<dyn Pollster>)>,
    discoveries: BTreeMap<String, Arc<dyn Discovery>>,
}

impl RegistryBuilder {
    /// Namespaces to load; empty loads everything.
    pub fn namespaces(mut self, namespaces: Vec<String>) -> RegistryBuilder {
        self.namespaces = namespaces;
        self
    }

    /// Pollster names to keep; `None` keeps every registered pollster.
    pub fn allow_list(mut self, allow_list: Option<Vec<String>>) -> RegistryBuilder {
        self.allow_list = allow_list;
        self
    }

    pub fn pollster(
        mut self,
        namespace: &str,
        name: &str,
        pollster: Arc<dyn Pollster>,
    ) -> RegistryBuilder {
        self.pollsters
            .push((namespace.to_string(), name.to_string(), pollster));
        self
    }

    pub fn discovery(mut self, name: &str, discovery: Arc<dyn Discovery>) -> RegistryBuilder {
        self.discoveries.insert(name.to_string(), discovery);
        self
    }

    /// Apply the filters. Ending up with zero pollsters is fatal: an agent
    /// with nothing to poll is a misconfiguration, not a quiet success.
    pub fn build(self) -> Result<PollsterRegistry, AgentError> {
        let mut pollsters = BTreeMap::new();
        for (namespace, name, pollster) in self.pollsters {
            if !self.namespaces.is_empty() && !self.namespaces.contains(&namespace) {
                debug!(pollster = %name, namespace = %namespace, "skipped by namespace filter");
                continue;
            }
            if let Some(allowed) = &self.allow_list {
                if !allowed.contains(&name) {
                    debug!(pollster = %name, "skipped by pollster list filter");
                    continue;
                }
            }
            pollsters.insert(name, pollster);
        }
        if pollsters.is_empty() {
            return Err(AgentError::NoPollsters);
        }
        info!(
            pollsters = pollsters.len(),
            discoveries = self.discoveries.len(),
            "plugin registry loaded"
        );
        Ok(PollsterRegistry {
            pollsters,
            discoveries: self.discoveries,
        })
    }
}
