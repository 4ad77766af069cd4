//! Runtime-agnostic cancellation.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Cooperative cancellation token.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves when cancellation is requested.
    async fn cancelled(&self);

    /// Non-blocking cancellation check.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Cancellation token that never triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancellationToken for NeverCancel {
    async fn cancelled(&self) {
        futures::future::pending::<()>().await;
    }
}

/// Cancellation token that fires once a deadline passes.
///
/// Measured on the Tokio clock, so paused-time tests can drive it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Fire at `at`.
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Fire `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// The instant this deadline fires.
    pub fn instant(&self) -> Instant {
        self.at
    }
}

#[async_trait]
impl CancellationToken for Deadline {
    async fn cancelled(&self) {
        tokio::time::sleep_until(self.at).await;
    }

    fn is_cancelled(&self) -> bool {
        Instant::now() >= self.at
    }
}
