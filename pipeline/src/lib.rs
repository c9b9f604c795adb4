pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod transformers;

pub use config::{PipelineFile, SinkConfig, SourceConfig, TransformerSpec};
pub use error::ConfigError;
pub use matcher::SourceMatcher;
pub use pipeline::{setup_pipelines, Pipeline, PipelineSet, Sink};
pub use transformers::{TransformChain, Transformer};
