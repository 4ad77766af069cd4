use super::logged;
use heisei_core::{
    CategoryId, Clock, ForumError, ForumStorage, NewThread, Result, Thread, ThreadId, ThreadUpdate,
};
use std::sync::Arc;
use tracing::info;

/// Thread CRUD
#[derive(Clone)]
pub struct ThreadService {
    storage: Arc<dyn ForumStorage>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ThreadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadService").finish_non_exhaustive()
    }
}

impl ThreadService {
    pub(crate) fn new(storage: Arc<dyn ForumStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Create a thread with zeroed counters in an existing category.
    pub async fn create(&self, thread: NewThread) -> Result<Thread> {
        thread.validate()?;
        let created = self
            .storage
            .create_thread(&thread, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("create thread"))?;
        info!(thread_id = %created.id, category_id = %created.category_id, "Created thread");
        Ok(created)
    }

    /// All threads, or only those of `category`.
    pub async fn list(&self, category: Option<CategoryId>) -> Result<Vec<Thread>> {
        let threads = match category {
            Some(category_id) => {
                if self.storage.get_category(category_id).await?.is_none() {
                    return Err(ForumError::not_found("category", category_id.value()));
                }
                self.storage.threads_by_category(category_id).await
            }
            None => self.storage.list_threads().await,
        };
        threads
            .map_err(ForumError::from)
            .map_err(logged("list threads"))
    }

    /// One thread
    pub async fn get(&self, id: ThreadId) -> Result<Thread> {
        self.storage
            .get_thread(id)
            .await?
            .ok_or(ForumError::ThreadNotFound {
                thread_id: id.value(),
            })
    }

    /// Replace the title; counters are untouched.
    pub async fn update(&self, id: ThreadId, update: ThreadUpdate) -> Result<Thread> {
        update.validate()?;
        self.storage
            .update_thread_title(id, &update.title, self.clock.now_utc())
            .await
            .map_err(ForumError::from)
            .map_err(logged("update thread"))
    }

    /// Delete a thread with its posts.
    pub async fn delete(&self, id: ThreadId) -> Result<()> {
        self.storage
            .delete_thread(id)
            .await
            .map_err(ForumError::from)
            .map_err(logged("delete thread"))?;
        info!(thread_id = %id, "Deleted thread");
        Ok(())
    }
}
