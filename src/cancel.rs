//! Caller-initiated cancellation for long-running polls.
//!
//! A [`CancelToken`] is cheap to clone; every clone observes the same flag.
//! The poller races each sleep and each request against
//! [`CancelToken::cancelled`], so a stuck extraction can be abandoned without
//! waiting out the full attempt budget.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // The sender lives as long as `self`, so this cannot happen
                // while we are awaiting; park forever rather than fire.
                std::future::pending::<()>().await;
            }
        }
    }
}
