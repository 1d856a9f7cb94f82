//! Cancellable delayed events

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Delivers an event into a queue after a delay.
///
/// Every scheduled event gets a child of the scheduler's token, so
/// cancelling the scheduler drops everything still pending.
pub struct Scheduler<T> {
    tx: mpsc::UnboundedSender<T>,
    cancel: CancellationToken,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> {
    pub fn new(tx: mpsc::UnboundedSender<T>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Send `event` after `delay`. Cancel the returned token to drop it.
    pub fn schedule(&self, delay: Duration, event: T) -> CancellationToken {
        let token = self.cancel.child_token();
        let pending = token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if tx.send(event).is_err() {
                        tracing::trace!("Timer fired after its queue closed");
                    }
                }
                _ = pending.cancelled() => {}
            }
        });
        token
    }
}
