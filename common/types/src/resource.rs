use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque resource identity produced by a discovery plugin.
///
/// The core never looks inside a resource; the only operation it relies on is
/// [`Resource::key`], a stable textual form used for deduplication and hash
/// ring placement. Plain strings pass through untouched, structured values
/// canonicalize to compact JSON so two structurally equal resources always
/// map to the same key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Value);

impl Resource {
    pub fn new(value: Value) -> Resource {
        Resource(value)
    }

    pub fn from_key(key: impl Into<String>) -> Resource {
        Resource(Value::String(key.into()))
    }

    /// Stable string key for hashing and deduplication.
    pub fn key(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Resource) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl From<&str> for Resource {
    fn from(key: &str) -> Resource {
        Resource::from_key(key)
    }
}
