//! Collaborator contracts
//!
//! Everything the write path needs from outside the process boundary or from the
//! environment is reached through one of these traits:
//! - [`Clock`]: monotonic instants for rate limiting, wall-clock timestamps for rows
//! - [`CancellationToken`]: caller deadlines and shutdown signals
//! - [`ForumStorage`] / [`TransactionScope`]: the storage engine

pub mod storage;
pub mod task;
pub mod time;

pub use storage::{ForumStorage, StorageError, StorageResult, TransactionScope};
pub use task::{CancellationToken, Deadline, NeverCancel};
pub use time::{Clock, SystemClock};
