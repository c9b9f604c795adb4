use publisher::PublishError;
use thiserror::Error;

/// Fatal at load time. No partial pipeline set is ever constructed from an
/// invalid definition; a reload either parses completely or changes nothing.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read pipeline file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse pipeline definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("source {name}: {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("sink {name}: {reason}")]
    InvalidSink { name: String, reason: String },

    #[error("{owner}: pattern {pattern:?} is both included and excluded")]
    ContradictoryPattern { owner: String, pattern: String },

    #[error("{owner}: wildcard '*' combined with {pattern:?} is ambiguous")]
    AmbiguousWildcard { owner: String, pattern: String },

    #[error("{owner}: invalid pattern {pattern:?}: {source}")]
    Pattern {
        owner: String,
        pattern: String,
        source: regex::Error,
    },

    #[error("unknown transformer: {0}")]
    UnknownTransformer(String),

    #[error("transformer {name}: invalid parameters: {reason}")]
    TransformerParameters { name: String, reason: String },

    #[error(transparent)]
    Publisher(#[from] PublishError),
}
