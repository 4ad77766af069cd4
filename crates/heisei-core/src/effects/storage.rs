//! Storage collaborator contract
//!
//! The forum core never talks to a storage engine directly. It consumes:
//! - [`ForumStorage`]: keyed create/read/update/delete for each table, plus
//!   [`ForumStorage::begin_scope`] for multi-row writes
//! - [`TransactionScope`]: a single-use session that ends in exactly one of
//!   commit or rollback
//!
//! # Scope contract
//!
//! - Statements issued through a scope are invisible to every other reader until
//!   [`TransactionScope::commit`] returns `Ok`.
//! - After `commit` or `rollback` has been called (successfully or not) every
//!   further call returns [`StorageError::ScopeClosed`].
//! - Dropping a scope that is still open discards its work, exactly like a
//!   rollback.
//! - Counter increments are evaluated by the storage layer
//!   (`post_count = post_count + 1`), never as a read-modify-write in the caller.

use crate::models::{
    Category, CategoryUpdate, NewCategory, NewPost, NewThread, Post, Thread,
};
use crate::types::{CategoryId, PostId, ThreadId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Engine-level failure (connection, I/O, pool)
    #[error("Storage backend error: {message}")]
    Backend {
        /// Description from the engine
        message: String,
    },

    /// Keyed row does not exist
    #[error("{entity} {id} does not exist")]
    NotFound {
        /// Kind of row
        entity: &'static str,
        /// Raw key
        id: u64,
    },

    /// Unique constraint violation
    #[error("Duplicate {field}: {value}")]
    Duplicate {
        /// Constrained column
        field: &'static str,
        /// Rejected value
        value: String,
    },

    /// Commit could not be applied because committed state moved underneath it
    #[error("Write conflict: {reason}")]
    Conflict {
        /// What conflicted
        reason: String,
    },

    /// The scope was already committed or rolled back
    #[error("Transaction scope already closed")]
    ScopeClosed,
}

impl StorageError {
    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Result type for storage calls
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A single-use transaction session
#[async_trait]
pub trait TransactionScope: Send {
    /// Stage a post row for `post.thread_id`; returns the id the row will carry.
    async fn insert_post(&mut self, post: &NewPost, now: DateTime<Utc>) -> StorageResult<PostId>;

    /// Stage `post_count = post_count + 1, last_post_at = now` for the thread.
    ///
    /// Returns the number of rows matched: `0` when the thread does not exist.
    async fn increment_thread_counters(
        &mut self,
        thread_id: ThreadId,
        now: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Make every staged statement visible atomically.
    async fn commit(&mut self) -> StorageResult<()>;

    /// Discard every staged statement.
    async fn rollback(&mut self) -> StorageResult<()>;
}

/// Keyed table access plus transaction scopes
#[async_trait]
pub trait ForumStorage: Send + Sync {
    /// Open a new transaction scope.
    async fn begin_scope(&self) -> StorageResult<Box<dyn TransactionScope>>;

    /// Insert a category; slugs are unique.
    async fn create_category(
        &self,
        category: &NewCategory,
        now: DateTime<Utc>,
    ) -> StorageResult<Category>;

    /// All categories ordered by id.
    async fn list_categories(&self) -> StorageResult<Vec<Category>>;

    /// Category by id.
    async fn get_category(&self, id: CategoryId) -> StorageResult<Option<Category>>;

    /// Replace name and slug.
    async fn update_category(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
        now: DateTime<Utc>,
    ) -> StorageResult<Category>;

    /// Delete a category together with its threads and their posts.
    async fn delete_category(&self, id: CategoryId) -> StorageResult<()>;

    /// Insert a thread with zeroed counters; the category must exist.
    async fn create_thread(&self, thread: &NewThread, now: DateTime<Utc>) -> StorageResult<Thread>;

    /// All threads ordered by id.
    async fn list_threads(&self) -> StorageResult<Vec<Thread>>;

    /// Threads of one category ordered by id.
    async fn threads_by_category(&self, category_id: CategoryId) -> StorageResult<Vec<Thread>>;

    /// Thread by id.
    async fn get_thread(&self, id: ThreadId) -> StorageResult<Option<Thread>>;

    /// Replace the title.
    async fn update_thread_title(
        &self,
        id: ThreadId,
        title: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Thread>;

    /// Delete a thread together with its posts.
    async fn delete_thread(&self, id: ThreadId) -> StorageResult<()>;

    /// Post by id.
    async fn get_post(&self, id: PostId) -> StorageResult<Option<Post>>;

    /// A page of a thread's posts ordered by id.
    async fn posts_by_thread(
        &self,
        thread_id: ThreadId,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<Post>>;

    /// Replace the body of a post.
    async fn update_post_content(
        &self,
        id: PostId,
        content: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Post>;

    /// Set the soft-delete flag.
    async fn soft_delete_post(&self, id: PostId, now: DateTime<Utc>) -> StorageResult<()>;

    /// Number of post rows stored for a thread.
    async fn count_posts(&self, thread_id: ThreadId) -> StorageResult<u64>;

    /// Most recently created post of a thread.
    async fn latest_post(&self, thread_id: ThreadId) -> StorageResult<Option<Post>>;
}
