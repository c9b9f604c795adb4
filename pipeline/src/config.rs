use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

/// Top-level pipeline definition, deserialized from YAML.
///
/// ```yaml
/// sources:
///   - name: cpu_source
///     interval: 60
///     meters: ["cpu.*"]
///     discovery: ["local-node"]
///     sinks: [default]
/// sinks:
///   - name: default
///     transformers:
///       - name: unit_conversion
///         parameters: {unit: "MB", scale: 0.000001}
///     publishers: ["kafka://broker:9092/metering"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    pub sources: Vec<SourceConfig>,
    pub sinks: Vec<SinkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Polling interval in seconds. Required (and positive) for meter
    /// sources; meaningless for event sources.
    pub interval: Option<u64>,
    #[serde(default)]
    pub meters: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub discovery: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    pub sinks: Vec<String>,
}

impl SourceConfig {
    pub fn is_event_source(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        if self.is_event_source() {
            &self.events
        } else {
            &self.meters
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub name: String,
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
    pub publishers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerSpec {
    pub name: String,
    #[serde(default)]
    pub parameters: Value,
}

impl PipelineFile {
    pub fn from_yaml(raw: &str) -> Result<PipelineFile, ConfigError> {
        let file: PipelineFile = serde_yaml::from_str(raw)?;
        file.validate()?;
        Ok(file)
    }

    pub fn from_path(path: &Path) -> Result<PipelineFile, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        PipelineFile::from_yaml(&raw)
    }

    /// Structural validation. Pattern-level contradictions are caught when
    /// the matchers compile in `setup_pipelines`; everything here is about
    /// required fields and referential integrity.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut source_names = HashSet::new();
        let mut sink_names = HashSet::new();

        for sink in &self.sinks {
            if !sink_names.insert(sink.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "sink",
                    name: sink.name.clone(),
                });
            }
            if sink.publishers.is_empty() {
                return Err(ConfigError::InvalidSink {
                    name: sink.name.clone(),
                    reason: "at least one publisher is required".to_string(),
                });
            }
        }

        for source in &self.sources {
            if !source_names.insert(source.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "source",
                    name: source.name.clone(),
                });
            }
            let invalid = |reason: &str| ConfigError::InvalidSource {
                name: source.name.clone(),
                reason: reason.to_string(),
            };
            match (source.meters.is_empty(), source.events.is_empty()) {
                (true, true) => {
                    return Err(invalid("a meters or events pattern list is required"))
                }
                (false, false) => {
                    return Err(invalid("meters and events are mutually exclusive"))
                }
                _ => {}
            }
            if !source.is_event_source() {
                match source.interval {
                    None => return Err(invalid("a polling interval is required")),
                    Some(0) => return Err(invalid("the polling interval must be positive")),
                    Some(_) => {}
                }
            }
            if source.sinks.is_empty() {
                return Err(invalid("at least one sink is required"));
            }
            for sink in &source.sinks {
                if !sink_names.contains(sink.as_str()) {
                    return Err(invalid(&format!("references undefined sink {sink:?}")));
                }
            }
        }
        Ok(())
    }
}
