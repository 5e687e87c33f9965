//! Cooperative cancellation for in-flight rate requests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::RateError;

/// Shared flag telling a request that its result is no longer wanted.
///
/// Clones observe the same flag, so the holder of the original can cancel a
/// request running in another task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Checkpoint for request code: returns `RateError::Cancelled` once cancelled.
    pub fn check_cancelled(&self) -> Result<(), RateError> {
        if self.is_cancelled() {
            Err(RateError::Cancelled)
        } else {
            Ok(())
        }
    }
}
