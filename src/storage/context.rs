use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use crate::core::error::{Error, Result};

/// Cooperative cancellation flag shared between a caller and store calls
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-call deadline and cancellation signal.
///
/// An operation whose context is cancelled or past its deadline fails with
/// `StoreUnavailable` before touching any counter.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl OpContext {
    /// No deadline, no cancellation.
    pub fn background() -> Self {
        OpContext::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn check(&self) -> Result<()> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(Error::unavailable("operation cancelled"));
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::unavailable("operation deadline exceeded"));
            }
        }
        Ok(())
    }

    /// Instant by which a store lock must be acquired: the earlier of the
    /// caller's deadline and `now + lock_timeout`.
    pub fn lock_deadline(&self, lock_timeout: Duration) -> Instant {
        let bound = Instant::now() + lock_timeout;
        match self.deadline {
            Some(deadline) if deadline < bound => deadline,
            _ => bound,
        }
    }
}
