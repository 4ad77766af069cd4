//! Transaction coordination.
//!
//! [`TransactionCoordinator::run_in_transaction`] opens a scope, runs caller
//! supplied work inside it, and guarantees the scope ends in exactly one of
//! commit or rollback:
//!
//! | work outcome          | action   | caller sees                                  |
//! |-----------------------|----------|----------------------------------------------|
//! | `Ok(value)`           | commit   | `Ok(value)`, or a commit-phase failure        |
//! | `Err(e)`              | rollback | `e`, or `RollbackFailed { cause: e, .. }`     |
//! | panic                 | rollback | the same panic, resumed                      |
//! | cancelled before commit | rollback | `Cancelled`                                |
//!
//! Work closures receive the scope by mutable reference and return a boxed
//! future borrowing it, so they must own everything else they use.

use futures::future::BoxFuture;
use futures::FutureExt;
use heisei_core::{
    CancellationToken, ForumError, ForumStorage, Result, TransactionPhase, TransactionScope,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

enum WorkOutcome<T> {
    Done(T),
    Failed(ForumError),
    Panicked(Box<dyn Any + Send>),
    Cancelled,
}

/// Tracks whether a scope reached commit or rollback.
struct ScopeGuard {
    scope: Box<dyn TransactionScope>,
    finished: bool,
}

impl ScopeGuard {
    fn new(scope: Box<dyn TransactionScope>) -> Self {
        Self {
            scope,
            finished: false,
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.finished = true;
        self.scope
            .commit()
            .await
            .map_err(|e| ForumError::transaction(TransactionPhase::Commit, e.to_string()))
    }

    /// Roll back, folding a rollback failure into `cause`.
    async fn abort(&mut self, cause: ForumError) -> ForumError {
        self.finished = true;
        match self.scope.rollback().await {
            Ok(()) => cause,
            Err(rollback) => {
                error!(
                    error = %cause,
                    rollback_error = %rollback,
                    "Rollback failed; transaction state is indeterminate"
                );
                ForumError::rollback_failed(cause, rollback.to_string())
            }
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Transaction scope dropped before commit or rollback; storage discards it");
        }
    }
}

/// Runs units of work inside storage transaction scopes
#[derive(Clone)]
pub struct TransactionCoordinator {
    storage: Arc<dyn ForumStorage>,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator").finish_non_exhaustive()
    }
}

impl TransactionCoordinator {
    /// Create a coordinator over `storage`
    pub fn new(storage: Arc<dyn ForumStorage>) -> Self {
        Self { storage }
    }

    /// Run `work` inside a fresh transaction scope.
    ///
    /// `cancel` is checked before the scope opens, raced against the work, and
    /// checked again immediately before commit. A cancelled unit of work is
    /// always rolled back.
    pub async fn run_in_transaction<T, F>(&self, cancel: &dyn CancellationToken, work: F) -> Result<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut dyn TransactionScope) -> BoxFuture<'s, Result<T>> + Send,
    {
        if cancel.is_cancelled() {
            return Err(ForumError::Cancelled);
        }

        let started = Instant::now();
        let scope = self
            .storage
            .begin_scope()
            .await
            .map_err(|e| ForumError::transaction(TransactionPhase::Begin, e.to_string()))?;
        let mut guard = ScopeGuard::new(scope);

        let outcome = {
            let work = AssertUnwindSafe(work(guard.scope.as_mut())).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => WorkOutcome::Cancelled,
                result = work => match result {
                    Ok(Ok(value)) => WorkOutcome::Done(value),
                    Ok(Err(err)) => WorkOutcome::Failed(err),
                    Err(payload) => WorkOutcome::Panicked(payload),
                },
            }
        };

        match outcome {
            WorkOutcome::Done(value) => {
                if cancel.is_cancelled() {
                    debug!("Cancellation observed before commit; rolling back");
                    return Err(guard.abort(ForumError::Cancelled).await);
                }
                guard.commit().await?;
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Transaction committed");
                Ok(value)
            }
            WorkOutcome::Failed(err) => {
                debug!(error = %err, "Transaction work failed; rolling back");
                Err(guard.abort(err).await)
            }
            WorkOutcome::Cancelled => {
                debug!("Transaction cancelled; rolling back");
                Err(guard.abort(ForumError::Cancelled).await)
            }
            WorkOutcome::Panicked(payload) => {
                let err = guard
                    .abort(ForumError::transaction(
                        TransactionPhase::Statement,
                        "work panicked",
                    ))
                    .await;
                warn!(error = %err, "Transaction work panicked; resuming unwind");
                std::panic::resume_unwind(payload)
            }
        }
    }
}
