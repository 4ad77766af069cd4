//! # Heisei Core - Domain Foundation
//!
//! **Purpose**: Define the forum domain types, the unified error taxonomy, and the
//! contracts the write path consumes from its collaborators.
//!
//! # Architecture Constraints
//!
//! - YES Domain types (categories, threads, posts) and their validation rules
//! - YES Unified error type shared by every layer above
//! - YES Storage, clock, and cancellation traits
//! - NO storage engine (that's `heisei-store`)
//! - NO admission control or transaction coordination (that's `heisei-server`)
//!
//! ## Core Concepts
//!
//! - **Transaction scope**: a single-use handle to a storage session that ends in
//!   exactly one of commit or rollback
//! - **Aggregate counters**: `post_count` and `last_post_at` on a thread, kept in
//!   step with its posts
//! - **Effects**: time and cancellation are injected so tests can drive them

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Unified error types
pub mod errors;

/// Strongly typed identifiers
pub mod types;

/// Domain models, write requests, and DTOs
pub mod models;

/// Offset/limit pagination
pub mod pagination;

/// Injected collaborators: clock, cancellation, storage
pub mod effects;

pub use effects::{
    CancellationToken, Clock, Deadline, ForumStorage, NeverCancel, StorageError, StorageResult,
    SystemClock, TransactionScope,
};
pub use errors::{ForumError, Result, TransactionPhase};
pub use models::{
    Category, CategoryDto, CategoryUpdate, NewCategory, NewPost, NewThread, Post, PostDto,
    Thread, ThreadDto, ThreadUpdate, POST_CONTENT_MAX_CHARS,
};
pub use pagination::Pagination;
pub use types::{CategoryId, PostId, ThreadId};
