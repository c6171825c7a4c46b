//! Run-wide cancellation signal.
//!
//! A single [`Cancellation`] is created by the caller of the pipeline and
//! cloned into every fetch task. Cancelling it stops pending retries and
//! in-flight requests; results already collected stay valid.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cloneable cancellation handle shared by every task of a run.
///
/// Cancellation is sticky: once [`cancel`](Self::cancel) has been called,
/// [`is_cancelled`](Self::is_cancelled) stays `true` and every current and
/// future [`cancelled`](Self::cancelled) future resolves immediately.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signals cancellation to every clone of this handle.
    pub fn cancel(&self) {
        // send_replace succeeds even when no receiver is currently subscribed
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the run has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so wait_for cannot observe a closed channel here
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancels the run once `after` has elapsed.
    ///
    /// Returns the timer task so the caller can abort it when the run
    /// finishes first.
    pub fn cancel_after(&self, after: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracing::warn!(
                deadline_secs = after.as_secs(),
                "Run deadline reached, cancelling outstanding fetches"
            );
            this.cancel();
        })
    }
}
