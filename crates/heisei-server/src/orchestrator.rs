//! Post creation.
//!
//! Creating a post is the one multi-row write in the forum. The post row and
//! the owning thread's aggregate counters must land together or not at all.

use crate::coordinator::TransactionCoordinator;
use heisei_core::{
    CancellationToken, Clock, ForumError, NeverCancel, NewPost, Post, Result, ThreadId,
    TransactionPhase,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Writes a post and its thread's counters in one transaction
#[derive(Debug, Clone)]
pub struct PostWriteOrchestrator {
    coordinator: TransactionCoordinator,
    clock: Arc<dyn Clock>,
}

impl PostWriteOrchestrator {
    /// Create an orchestrator
    pub fn new(coordinator: TransactionCoordinator, clock: Arc<dyn Clock>) -> Self {
        Self { coordinator, clock }
    }

    /// Create a post in `thread_id` with no cancellation.
    pub async fn create_post(
        &self,
        thread_id: ThreadId,
        content: impl Into<String>,
        author_address: impl Into<String>,
    ) -> Result<Post> {
        let post = NewPost {
            thread_id,
            content: content.into(),
            author_address: author_address.into(),
        };
        self.create_post_until(post, &NeverCancel).await
    }

    /// Create a post, aborting before commit if `cancel` fires.
    ///
    /// Input is validated before any transaction is opened. Inside the scope the
    /// post row is inserted first and the thread counters are incremented second;
    /// an increment that matches no thread aborts the whole unit with
    /// [`ForumError::ThreadNotFound`], so no orphan post survives.
    pub async fn create_post_until(
        &self,
        post: NewPost,
        cancel: &dyn CancellationToken,
    ) -> Result<Post> {
        post.validate()?;

        let thread_id = post.thread_id;
        let now = self.clock.now_utc();

        let result = self
            .coordinator
            .run_in_transaction(cancel, move |scope| {
                Box::pin(async move {
                    let id = scope
                        .insert_post(&post, now)
                        .await
                        .map_err(|e| ForumError::from_storage(TransactionPhase::Statement, e))?;

                    let matched = scope
                        .increment_thread_counters(thread_id, now)
                        .await
                        .map_err(|e| ForumError::from_storage(TransactionPhase::Statement, e))?;
                    if matched == 0 {
                        return Err(ForumError::ThreadNotFound {
                            thread_id: thread_id.value(),
                        });
                    }

                    Ok(Post {
                        id,
                        thread_id,
                        content: post.content,
                        author_address: post.author_address,
                        is_deleted: false,
                        created_at: now,
                        updated_at: now,
                    })
                })
            })
            .await;

        match &result {
            Ok(created) => info!(post_id = %created.id, thread_id = %thread_id, "Created post"),
            Err(err) => warn!(
                thread_id = %thread_id,
                error = %err,
                code = err.code(),
                "Failed to create post"
            ),
        }
        result
    }
}
