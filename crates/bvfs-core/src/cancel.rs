//! Cooperative cancellation for blocking catalog operations.
//!
//! Operations never interrupt an in-flight catalog statement; they check the
//! token between round-trips. A cache refresh cancelled mid-protocol can
//! leave a job claimed (`HasCache = -1`); clearing the cache resets it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{BvfsError, BvfsResult};

/// Cloneable cancellation flag shared between a caller and an operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; never un-cancels.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`BvfsError::Cancelled`] if cancellation was requested.
    ///
    /// `phase` names the round-trip boundary for the error message.
    pub fn check(&self, phase: &'static str) -> BvfsResult<()> {
        if self.is_cancelled() {
            return Err(BvfsError::Cancelled { phase });
        }
        Ok(())
    }
}
