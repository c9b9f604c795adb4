use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::backends::Backend;
use crate::error::BackendError;

/// In-memory backend for the `test://` scheme.
///
/// Records every delivered batch and can be scripted to fail: either the
/// next N sends or unconditionally. Used by unit tests across the workspace
/// and handy for wiring a pipeline in integration environments.
#[derive(Default)]
pub struct MemoryBackend {
    sent: Mutex<Vec<(String, Vec<Value>)>>,
    attempts: AtomicUsize,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    /// Fail the next `count` sends, then recover.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self, enabled: bool) {
        self.fail_always.store(enabled, Ordering::SeqCst);
    }

    /// Every successfully delivered (destination, batch) pair, in order.
    pub fn sent(&self) -> Vec<(String, Vec<Value>)> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent lock poisoned").len()
    }

    /// Total `send` calls, successes and scripted failures alike.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn send(&self, destination: &str, batch: &[Value]) -> Result<(), BackendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("scripted failure".to_string()));
        }
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Unavailable("scripted failure".to_string()));
        }
        self.sent
            .lock()
            .expect("sent lock poisoned")
            .push((destination.to_string(), batch.to_vec()));
        Ok(())
    }
}
