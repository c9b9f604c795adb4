use thiserror::Error;

/// Raised by a transport backend's `send`.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("batch rejected by backend: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("invalid publisher target {uri}: {reason}")]
    InvalidTarget { uri: String, reason: String },

    /// At least one destination could not be delivered to under the
    /// fail-fast policy. The notification path maps this to a redelivery
    /// request; the polling path logs it and loses the batch for the cycle.
    #[error("delivery failed for {failed} of {attempted} destinations")]
    Delivery { failed: usize, attempted: usize },

    #[error("delivery retries exhausted, dropped {dropped} queued batches")]
    RetriesExhausted { dropped: usize },
}

impl PublishError {
    pub fn invalid_target(uri: &str, reason: impl ToString) -> PublishError {
        PublishError::InvalidTarget {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}
