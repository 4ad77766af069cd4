//! Staged transaction scopes.

use crate::memory::Tables;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heisei_core::effects::{StorageError, StorageResult, TransactionScope};
use heisei_core::{NewPost, Post, PostId, ThreadId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Open,
    Committed,
    RolledBack,
}

/// Pending `post_count + n, last_post_at = max(last_post_at, at)` for one thread.
#[derive(Debug, Clone, Copy)]
struct CounterDelta {
    posts: u64,
    at: DateTime<Utc>,
}

/// Transaction scope over [`crate::MemoryStorage`]
///
/// Nothing touches the shared tables until commit, so rollback (and drop) only
/// has to forget the staged statements.
#[derive(Debug)]
pub(crate) struct MemoryScope {
    tables: Arc<RwLock<Tables>>,
    staged_posts: Vec<Post>,
    staged_counters: BTreeMap<ThreadId, CounterDelta>,
    state: ScopeState,
}

impl MemoryScope {
    pub(crate) fn new(tables: Arc<RwLock<Tables>>) -> Self {
        Self {
            tables,
            staged_posts: Vec::new(),
            staged_counters: BTreeMap::new(),
            state: ScopeState::Open,
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.state == ScopeState::Open {
            Ok(())
        } else {
            Err(StorageError::ScopeClosed)
        }
    }

    fn discard(&mut self) {
        self.staged_posts.clear();
        self.staged_counters.clear();
    }
}

#[async_trait]
impl TransactionScope for MemoryScope {
    async fn insert_post(&mut self, post: &NewPost, now: DateTime<Utc>) -> StorageResult<PostId> {
        self.ensure_open()?;
        let id = self.tables.write().allocate_post_id();
        self.staged_posts.push(Post {
            id,
            thread_id: post.thread_id,
            content: post.content.clone(),
            author_address: post.author_address.clone(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        });
        trace!(post_id = %id, thread_id = %post.thread_id, "Staged post insert");
        Ok(id)
    }

    async fn increment_thread_counters(
        &mut self,
        thread_id: ThreadId,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        self.ensure_open()?;
        if !self.tables.read().threads.contains_key(&thread_id) {
            return Ok(0);
        }
        let delta = self.staged_counters.entry(thread_id).or_insert(CounterDelta {
            posts: 0,
            at: now,
        });
        delta.posts += 1;
        delta.at = delta.at.max(now);
        Ok(1)
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.state = ScopeState::Committed;

        let mut tables = self.tables.write();

        // Threads can be deleted between a statement and commit; validate every
        // reference before applying anything.
        let missing = self
            .staged_posts
            .iter()
            .map(|p| p.thread_id)
            .chain(self.staged_counters.keys().copied())
            .find(|id| !tables.threads.contains_key(id));
        if let Some(thread_id) = missing {
            drop(tables);
            self.discard();
            return Err(StorageError::Conflict {
                reason: format!("thread {thread_id} was deleted before commit"),
            });
        }

        for (thread_id, delta) in &self.staged_counters {
            if let Some(thread) = tables.threads.get_mut(thread_id) {
                thread.post_count += delta.posts;
                thread.last_post_at = thread.last_post_at.max(delta.at);
            }
        }
        for post in self.staged_posts.drain(..) {
            tables.posts.insert(post.id, post);
        }
        self.staged_counters.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.state = ScopeState::RolledBack;
        self.discard();
        Ok(())
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        if self.state == ScopeState::Open && !self.staged_posts.is_empty() {
            debug!(
                staged_posts = self.staged_posts.len(),
                "Discarding open transaction scope on drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::MemoryStorage;
    use chrono::{Duration, Utc};
    use heisei_core::effects::{ForumStorage, StorageError};
    use heisei_core::{CategoryId, NewCategory, NewPost, NewThread, ThreadId};

    async fn seeded() -> (MemoryStorage, ThreadId) {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let category = storage
            .create_category(
                &NewCategory {
                    name: "General".into(),
                    slug: "general".into(),
                },
                now,
            )
            .await
            .unwrap();
        let thread = storage
            .create_thread(
                &NewThread {
                    category_id: category.id,
                    title: "Hello".into(),
                },
                now,
            )
            .await
            .unwrap();
        (storage, thread.id)
    }

    fn new_post(thread_id: ThreadId) -> NewPost {
        NewPost {
            thread_id,
            content: "first".into(),
            author_address: "10.0.0.1".into(),
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let (storage, thread_id) = seeded().await;
        let mut scope = storage.begin_scope().await.unwrap();

        scope.insert_post(&new_post(thread_id), Utc::now()).await.unwrap();
        assert_eq!(scope.increment_thread_counters(thread_id, Utc::now()).await.unwrap(), 1);

        assert_eq!(storage.total_posts(), 0);
        assert_eq!(storage.get_thread(thread_id).await.unwrap().unwrap().post_count, 0);

        scope.commit().await.unwrap();
        assert_eq!(storage.total_posts(), 1);
        assert_eq!(storage.get_thread(thread_id).await.unwrap().unwrap().post_count, 1);
    }

    #[tokio::test]
    async fn rollback_discards_and_closes_scope() {
        let (storage, thread_id) = seeded().await;
        let mut scope = storage.begin_scope().await.unwrap();
        scope.insert_post(&new_post(thread_id), Utc::now()).await.unwrap();

        scope.rollback().await.unwrap();
        assert_eq!(storage.total_posts(), 0);
        assert_eq!(scope.commit().await, Err(StorageError::ScopeClosed));
        assert_eq!(scope.rollback().await, Err(StorageError::ScopeClosed));
    }

    #[tokio::test]
    async fn unknown_thread_matches_zero_rows() {
        let (storage, _) = seeded().await;
        let mut scope = storage.begin_scope().await.unwrap();
        let rows = scope
            .increment_thread_counters(ThreadId::new(404), Utc::now())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn commit_fails_when_thread_vanished() {
        let (storage, thread_id) = seeded().await;
        let mut scope = storage.begin_scope().await.unwrap();
        scope.insert_post(&new_post(thread_id), Utc::now()).await.unwrap();
        scope.increment_thread_counters(thread_id, Utc::now()).await.unwrap();

        storage.delete_thread(thread_id).await.unwrap();

        let err = scope.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(storage.total_posts(), 0);
    }

    #[tokio::test]
    async fn last_post_at_never_moves_backwards() {
        let (storage, thread_id) = seeded().await;
        let later = Utc::now() + Duration::seconds(30);
        let earlier = later - Duration::seconds(10);

        let mut first = storage.begin_scope().await.unwrap();
        first.increment_thread_counters(thread_id, later).await.unwrap();
        first.commit().await.unwrap();

        let mut second = storage.begin_scope().await.unwrap();
        second.increment_thread_counters(thread_id, earlier).await.unwrap();
        second.commit().await.unwrap();

        let thread = storage.get_thread(thread_id).await.unwrap().unwrap();
        assert_eq!(thread.post_count, 2);
        assert_eq!(thread.last_post_at, later);
    }

    #[tokio::test]
    async fn dropping_open_scope_discards_work() {
        let (storage, thread_id) = seeded().await;
        {
            let mut scope = storage.begin_scope().await.unwrap();
            scope.insert_post(&new_post(thread_id), Utc::now()).await.unwrap();
        }
        assert_eq!(storage.total_posts(), 0);
        assert!(storage.get_category(CategoryId::new(1)).await.unwrap().is_some());
    }
}
