//! Cooperative cancellation flag shared between the orchestrator, a stage
//! worker and the generation client.
//!
//! Nothing is aborted forcibly: the worker polls [`CancelSignal::is_cancelled`]
//! at its suspension points, and long awaits race [`CancelSignal::cancelled`]
//! in a `select!`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag and wake every pending [`CancelSignal::cancelled`] call.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is cancelled. Returns immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.notify.notified();
            // Re-check after registering so a cancel between the loop test
            // and the await is not missed.
            if self.is_cancelled() {
                break;
            }
            notified.await;
        }
    }
}
