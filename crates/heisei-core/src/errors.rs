//! Unified error system for the forum core
//!
//! One error type covers admission, validation, lookups, and transaction
//! infrastructure. Callers branch on the variant (or on [`ForumError::code`]) and
//! leave status/display mapping to the outer surface.

use crate::effects::StorageError;
use std::fmt;
use std::time::Duration;

/// Stage of a transaction at which an infrastructure failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionPhase {
    /// Opening the scope
    Begin,
    /// A statement issued inside the scope
    Statement,
    /// Committing the scope
    Commit,
    /// Rolling the scope back
    Rollback,
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Statement => "statement",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Unified error type for all forum operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForumError {
    /// Admission denied; retry after the hinted delay
    #[error("Too many requests from {identity}; retry after {}ms", retry_after.as_millis())]
    RateLimited {
        /// Client identity that was refused
        identity: String,
        /// Earliest point at which a retry can be admitted
        retry_after: Duration,
    },

    /// Input failed validation and is not retryable as-is
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The thread a write targeted does not exist
    #[error("Thread not found: {thread_id}")]
    ThreadNotFound {
        /// Raw thread identifier
        thread_id: u64,
    },

    /// A looked-up row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row
        entity: &'static str,
        /// Raw identifier
        id: u64,
    },

    /// A uniqueness constraint was violated
    #[error("Duplicate {field}: {value}")]
    Conflict {
        /// Constrained field
        field: &'static str,
        /// Value that already exists
        value: String,
    },

    /// Begin/statement/commit/rollback infrastructure failure (transient)
    #[error("Transaction failure during {phase}: {reason}")]
    Transaction {
        /// Where it failed
        phase: TransactionPhase,
        /// Underlying cause
        reason: String,
    },

    /// Work failed and the rollback that followed failed too
    #[error("Rollback failed ({rollback}) after: {cause}")]
    RollbackFailed {
        /// The original failure
        cause: Box<ForumError>,
        /// Why the rollback failed
        rollback: String,
    },

    /// Cancellation or deadline observed before commit
    #[error("Operation cancelled before commit")]
    Cancelled,
}

impl ForumError {
    /// Create an invalid input error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a transaction infrastructure error
    pub fn transaction(phase: TransactionPhase, reason: impl Into<String>) -> Self {
        Self::Transaction {
            phase,
            reason: reason.into(),
        }
    }

    /// Combine a failure with the rollback error that followed it
    pub fn rollback_failed(cause: ForumError, rollback: impl Into<String>) -> Self {
        Self::RollbackFailed {
            cause: Box::new(cause),
            rollback: rollback.into(),
        }
    }

    /// Map a storage failure raised at `phase` into the taxonomy
    pub fn from_storage(phase: TransactionPhase, err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => Self::NotFound { entity, id },
            StorageError::Duplicate { field, value } => Self::Conflict { field, value },
            other => Self::transaction(phase, other.to_string()),
        }
    }

    /// Stable machine-readable code, distinct per variant
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidInput { .. } => "invalid_input",
            Self::ThreadNotFound { .. } => "thread_not_found",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Transaction { .. } => "transaction_failure",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transaction { .. } | Self::Cancelled
        )
    }

    /// Whether this is an infrastructure failure of the transaction machinery
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, Self::Transaction { .. } | Self::RollbackFailed { .. })
    }
}

impl From<StorageError> for ForumError {
    fn from(err: StorageError) -> Self {
        Self::from_storage(TransactionPhase::Statement, err)
    }
}

/// Standard Result type for forum operations
pub type Result<T> = std::result::Result<T, ForumError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn error_codes_are_unique() {
        let errors = vec![
            ForumError::RateLimited {
                identity: "1.2.3.4".into(),
                retry_after: Duration::from_millis(200),
            },
            ForumError::invalid("content", "empty"),
            ForumError::ThreadNotFound { thread_id: 9 },
            ForumError::not_found("post", 1),
            ForumError::Conflict {
                field: "slug",
                value: "tech".into(),
            },
            ForumError::transaction(TransactionPhase::Commit, "disk full"),
            ForumError::rollback_failed(ForumError::Cancelled, "connection reset"),
            ForumError::Cancelled,
        ];

        let codes: HashSet<_> = errors.iter().map(ForumError::code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn rollback_failure_reports_both_causes() {
        let err = ForumError::rollback_failed(
            ForumError::ThreadNotFound { thread_id: 5 },
            "connection reset",
        );
        let text = err.to_string();
        assert!(text.contains("connection reset"));
        assert!(text.contains("Thread not found: 5"));
        assert!(err.is_transaction_failure());
    }

    #[test]
    fn storage_errors_map_by_kind() {
        let missing = ForumError::from(StorageError::NotFound {
            entity: "thread",
            id: 3,
        });
        assert_eq!(missing, ForumError::not_found("thread", 3));

        let backend = ForumError::from_storage(
            TransactionPhase::Begin,
            StorageError::backend("pool exhausted"),
        );
        assert!(matches!(
            backend,
            ForumError::Transaction {
                phase: TransactionPhase::Begin,
                ..
            }
        ));
        assert!(backend.is_retryable());
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!ForumError::invalid("content", "too long").is_retryable());
        assert!(!ForumError::ThreadNotFound { thread_id: 1 }.is_retryable());
    }
}
