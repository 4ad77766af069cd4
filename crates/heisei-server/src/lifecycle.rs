//! Server lifecycle.
//!
//! A [`ShutdownSignal`] fires once, when the server starts draining. Create-post
//! requests race their transaction against its token, so a write still in
//! flight at that point rolls back instead of committing, and the idle-visitor
//! reclaimer exits on it.

use heisei_core::CancellationToken;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// One-shot drain signal shared by the listener, requests, and background work
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    draining: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// A signal that has not fired
    pub fn new() -> Self {
        let (draining, _) = watch::channel(false);
        Self {
            draining: Arc::new(draining),
        }
    }

    /// Start draining. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.draining.send_replace(true) {
            info!("Draining; in-flight writes will be cancelled");
        }
    }

    /// Whether draining has started
    pub fn is_triggered(&self) -> bool {
        *self.draining.borrow()
    }

    /// Token that fires once [`ShutdownSignal::trigger`] is called.
    pub fn token(&self) -> Arc<dyn CancellationToken> {
        Arc::new(DrainToken {
            draining: self.draining.subscribe(),
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct DrainToken {
    draining: watch::Receiver<bool>,
}

#[async_trait::async_trait]
impl CancellationToken for DrainToken {
    async fn cancelled(&self) {
        // A closed channel means the owning server is gone.
        let mut draining = self.draining.clone();
        let _ = draining.wait_for(|draining| *draining).await;
    }

    fn is_cancelled(&self) -> bool {
        *self.draining.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiting_tokens() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        assert!(!token.is_cancelled());

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            token.is_cancelled()
        });
        tokio::task::yield_now().await;

        signal.trigger();
        signal.trigger();
        assert!(waiter.await.unwrap());
        assert!(signal.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn untriggered_token_stays_pending() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        let waited = tokio::time::timeout(Duration::from_secs(5), token.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn tokens_taken_after_trigger_are_already_cancelled() {
        let signal = ShutdownSignal::new();
        signal.clone().trigger();
        let token = signal.token();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
