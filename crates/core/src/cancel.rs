//! Cooperative cancellation for graph traversals.
//!
//! Traversals call [`CancelToken::check`] every time they pop a frontier
//! entry, so a cancelled or timed-out query stops expanding promptly.

use crate::error::{GraphError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken { flag: Arc::new(AtomicBool::new(false)), deadline: Some(Instant::now() + timeout) }
    }

    /// Cancel this token and every clone of it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(matches!(clone.check(), Err(GraphError::Cancelled)));
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        let generous = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!generous.is_cancelled());
    }
}
