use common_types::Resource;
use thiserror::Error;

/// Returned by a pollster's `get_samples`.
///
/// A permanent failure is a typed value, not an exception dressed up as
/// control flow: it carries the resource set the pollster can never serve,
/// and the scheduler disables the (pollster, source) pair after enough
/// consecutive occurrences. Everything else is transient and retried on the
/// next cycle.
#[derive(Error, Debug)]
pub enum PollsterError {
    #[error("pollster can never serve {} resource(s)", resources.len())]
    Permanent { resources: Vec<Resource> },

    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

impl PollsterError {
    pub fn permanent(resources: &[Resource]) -> PollsterError {
        PollsterError::Permanent {
            resources: resources.to_vec(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("no pollsters remain after namespace and name filtering")]
    NoPollsters,

    #[error(transparent)]
    Config(#[from] pipeline::ConfigError),
}

/// Surfaced on the notification path when at least one fail-fast sink could
/// not deliver, so the upstream bus consumer can request redelivery.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("event delivery failed, redelivery requested")]
    RequeueRequested,
}
