//! Fault injection for transaction paths
//!
//! [`FaultyStorage`] wraps [`MemoryStorage`] and consults a shared [`FaultPlan`]
//! at every scope operation, so a test can fail begin, a statement, commit, or
//! rollback, panic mid-work, or stall a statement long enough to be cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heisei_core::effects::{ForumStorage, StorageError, StorageResult, TransactionScope};
use heisei_core::{
    Category, CategoryId, CategoryUpdate, NewCategory, NewPost, NewThread, Post, PostId, Thread,
    ThreadId,
};
use heisei_store::MemoryStorage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Switches and counters shared by a [`FaultyStorage`] and its scopes
#[derive(Debug, Default)]
pub struct FaultPlan {
    fail_begin: AtomicBool,
    fail_insert: AtomicBool,
    fail_increment: AtomicBool,
    panic_on_increment: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    increment_delay: Mutex<Option<Duration>>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl FaultPlan {
    /// Make `begin_scope` fail.
    pub fn fail_begin(&self, on: bool) {
        self.fail_begin.store(on, Ordering::SeqCst);
    }

    /// Make post inserts fail.
    pub fn fail_insert(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    /// Make counter increments fail after the insert succeeded.
    pub fn fail_increment(&self, on: bool) {
        self.fail_increment.store(on, Ordering::SeqCst);
    }

    /// Panic inside the counter increment.
    pub fn panic_on_increment(&self, on: bool) {
        self.panic_on_increment.store(on, Ordering::SeqCst);
    }

    /// Make commit fail; staged work is discarded.
    pub fn fail_commit(&self, on: bool) {
        self.fail_commit.store(on, Ordering::SeqCst);
    }

    /// Make rollback report failure; staged work is still discarded.
    pub fn fail_rollback(&self, on: bool) {
        self.fail_rollback.store(on, Ordering::SeqCst);
    }

    /// Sleep this long before every counter increment.
    pub fn delay_increment(&self, delay: Option<Duration>) {
        *self.increment_delay.lock() = delay;
    }

    /// Scopes opened
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// Commit calls
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rollback calls
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    fn is_set(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

/// [`MemoryStorage`] with injectable transaction faults
#[derive(Debug, Clone, Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    plan: Arc<FaultPlan>,
}

impl FaultyStorage {
    /// Wrap fresh storage with no faults armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault switches and call counters
    pub fn plan(&self) -> &FaultPlan {
        &self.plan
    }

    /// Underlying storage, for inspecting committed state
    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

struct FaultyScope {
    inner: Box<dyn TransactionScope>,
    plan: Arc<FaultPlan>,
}

#[async_trait]
impl TransactionScope for FaultyScope {
    async fn insert_post(&mut self, post: &NewPost, now: DateTime<Utc>) -> StorageResult<PostId> {
        if FaultPlan::is_set(&self.plan.fail_insert) {
            return Err(StorageError::backend("injected insert failure"));
        }
        self.inner.insert_post(post, now).await
    }

    async fn increment_thread_counters(
        &mut self,
        thread_id: ThreadId,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let delay = *self.plan.increment_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if FaultPlan::is_set(&self.plan.panic_on_increment) {
            panic!("injected panic during counter increment");
        }
        if FaultPlan::is_set(&self.plan.fail_increment) {
            return Err(StorageError::backend("injected increment failure"));
        }
        self.inner.increment_thread_counters(thread_id, now).await
    }

    async fn commit(&mut self) -> StorageResult<()> {
        self.plan.commits.fetch_add(1, Ordering::SeqCst);
        if FaultPlan::is_set(&self.plan.fail_commit) {
            let _ = self.inner.rollback().await;
            return Err(StorageError::backend("injected commit failure"));
        }
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> StorageResult<()> {
        self.plan.rollbacks.fetch_add(1, Ordering::SeqCst);
        if FaultPlan::is_set(&self.plan.fail_rollback) {
            let _ = self.inner.rollback().await;
            return Err(StorageError::backend("injected rollback failure"));
        }
        self.inner.rollback().await
    }
}

#[async_trait]
impl ForumStorage for FaultyStorage {
    async fn begin_scope(&self) -> StorageResult<Box<dyn TransactionScope>> {
        if FaultPlan::is_set(&self.plan.fail_begin) {
            return Err(StorageError::backend("injected begin failure"));
        }
        self.plan.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyScope {
            inner: self.inner.begin_scope().await?,
            plan: self.plan.clone(),
        }))
    }

    async fn create_category(
        &self,
        category: &NewCategory,
        now: DateTime<Utc>,
    ) -> StorageResult<Category> {
        self.inner.create_category(category, now).await
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn get_category(&self, id: CategoryId) -> StorageResult<Option<Category>> {
        self.inner.get_category(id).await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
        now: DateTime<Utc>,
    ) -> StorageResult<Category> {
        self.inner.update_category(id, update, now).await
    }

    async fn delete_category(&self, id: CategoryId) -> StorageResult<()> {
        self.inner.delete_category(id).await
    }

    async fn create_thread(&self, thread: &NewThread, now: DateTime<Utc>) -> StorageResult<Thread> {
        self.inner.create_thread(thread, now).await
    }

    async fn list_threads(&self) -> StorageResult<Vec<Thread>> {
        self.inner.list_threads().await
    }

    async fn threads_by_category(&self, category_id: CategoryId) -> StorageResult<Vec<Thread>> {
        self.inner.threads_by_category(category_id).await
    }

    async fn get_thread(&self, id: ThreadId) -> StorageResult<Option<Thread>> {
        self.inner.get_thread(id).await
    }

    async fn update_thread_title(
        &self,
        id: ThreadId,
        title: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Thread> {
        self.inner.update_thread_title(id, title, now).await
    }

    async fn delete_thread(&self, id: ThreadId) -> StorageResult<()> {
        self.inner.delete_thread(id).await
    }

    async fn get_post(&self, id: PostId) -> StorageResult<Option<Post>> {
        self.inner.get_post(id).await
    }

    async fn posts_by_thread(
        &self,
        thread_id: ThreadId,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<Post>> {
        self.inner.posts_by_thread(thread_id, offset, limit).await
    }

    async fn update_post_content(
        &self,
        id: PostId,
        content: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Post> {
        self.inner.update_post_content(id, content, now).await
    }

    async fn soft_delete_post(&self, id: PostId, now: DateTime<Utc>) -> StorageResult<()> {
        self.inner.soft_delete_post(id, now).await
    }

    async fn count_posts(&self, thread_id: ThreadId) -> StorageResult<u64> {
        self.inner.count_posts(thread_id).await
    }

    async fn latest_post(&self, thread_id: ThreadId) -> StorageResult<Option<Post>> {
        self.inner.latest_post(thread_id).await
    }
}
