//! Test-triggered cancellation

use async_trait::async_trait;
use heisei_core::CancellationToken;
use tokio::sync::watch;

/// Cancellation token fired by calling [`TriggerCancel::cancel`]
#[derive(Debug)]
pub struct TriggerCancel {
    tx: watch::Sender<bool>,
}

impl TriggerCancel {
    /// Create an untriggered token
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for TriggerCancel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancellationToken for TriggerCancel {
    async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}
