use super::logged;
use crate::orchestrator::PostWriteOrchestrator;
use heisei_core::models::validate_post_content;
use heisei_core::{
    CancellationToken, Clock, ForumError, ForumStorage, NewPost, Pagination, Post, PostId,
    Result, ThreadId,
};
use std::sync::Arc;
use tracing::info;

/// Post reads, edits, and creation
#[derive(Clone)]
pub struct PostService {
    storage: Arc<dyn ForumStorage>,
    clock: Arc<dyn Clock>,
    orchestrator: PostWriteOrchestrator,
}

impl std::fmt::Debug for PostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostService").finish_non_exhaustive()
    }
}

impl PostService {
    pub(crate) fn new(
        storage: Arc<dyn ForumStorage>,
        clock: Arc<dyn Clock>,
        orchestrator: PostWriteOrchestrator,
    ) -> Self {
        Self {
            storage,
            clock,
            orchestrator,
        }
    }

    /// Create a post and bump its thread's counters atomically.
    pub async fn create(&self, post: NewPost, cancel: &dyn CancellationToken) -> Result<Post> {
        self.orchestrator.create_post_until(post, cancel).await
    }

    /// One post
    pub async fn get(&self, id: PostId) -> Result<Post> {
        self.storage
            .get_post(id)
            .await?
            .ok_or_else(|| ForumError::not_found("post", id.value()))
    }

    /// A page of a thread's posts, soft-deleted ones included.
    pub async fn list_by_thread(&self, thread_id: ThreadId, page: Pagination) -> Result<Vec<Post>> {
        self.ensure_thread(thread_id).await?;
        self.storage
            .posts_by_thread(thread_id, page.offset(), page.limit())
            .await
            .map_err(ForumError::from)
            .map_err(logged("list posts"))
    }

    /// Replace the body of a post.
    pub async fn update_content(&self, id: PostId, content: String) -> Result<Post> {
        validate_post_content(&content)?;
        self.storage
            .update_post_content(id, &content, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("update post"))
    }

    /// Flag a post as deleted; thread counters are left as they are.
    pub async fn soft_delete(&self, id: PostId) -> Result<()> {
        self.storage
            .soft_delete_post(id, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("delete post"))?;
        info!(post_id = %id, "Soft-deleted post");
        Ok(())
    }

    /// Number of post rows in a thread
    pub async fn count_by_thread(&self, thread_id: ThreadId) -> Result<u64> {
        self.ensure_thread(thread_id).await?;
        Ok(self.storage.count_posts(thread_id).await?)
    }

    /// Most recent post of a thread, if any
    pub async fn latest_in_thread(&self, thread_id: ThreadId) -> Result<Option<Post>> {
        self.ensure_thread(thread_id).await?;
        Ok(self.storage.latest_post(thread_id).await?)
    }

    async fn ensure_thread(&self, thread_id: ThreadId) -> Result<()> {
        match self.storage.get_thread(thread_id).await? {
            Some(_) => Ok(()),
            None => Err(ForumError::ThreadNotFound {
                thread_id: thread_id.value(),
            }),
        }
    }
}
