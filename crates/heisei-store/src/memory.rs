//! Table storage and keyed CRUD.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::RwLock` for the tables because:
//! 1. Every operation is an in-memory map lookup or update
//! 2. Lock is never held across `.await` points
//! 3. No I/O or async work inside lock scope

use crate::scope::MemoryScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heisei_core::effects::{ForumStorage, StorageError, StorageResult, TransactionScope};
use heisei_core::{
    Category, CategoryId, CategoryUpdate, NewCategory, NewThread, Post, PostId, Thread, ThreadId,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) categories: BTreeMap<CategoryId, Category>,
    pub(crate) threads: BTreeMap<ThreadId, Thread>,
    pub(crate) posts: BTreeMap<PostId, Post>,
    next_category: u64,
    next_thread: u64,
    next_post: u64,
}

impl Tables {
    fn allocate_category_id(&mut self) -> CategoryId {
        self.next_category += 1;
        CategoryId::new(self.next_category)
    }

    fn allocate_thread_id(&mut self) -> ThreadId {
        self.next_thread += 1;
        ThreadId::new(self.next_thread)
    }

    /// Post ids come from a sequence: ids handed to scopes that later roll back
    /// are never reused.
    pub(crate) fn allocate_post_id(&mut self) -> PostId {
        self.next_post += 1;
        PostId::new(self.next_post)
    }

    fn slug_taken(&self, slug: &str, except: Option<CategoryId>) -> bool {
        self.categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != except)
    }

    fn remove_thread_cascade(&mut self, id: ThreadId) {
        self.threads.remove(&id);
        self.posts.retain(|_, post| post.thread_id != id);
    }
}

/// In-memory [`ForumStorage`] implementation
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed post rows across all threads
    pub fn total_posts(&self) -> usize {
        self.tables.read().posts.len()
    }

    /// Total number of thread rows
    pub fn total_threads(&self) -> usize {
        self.tables.read().threads.len()
    }
}

#[async_trait]
impl ForumStorage for MemoryStorage {
    async fn begin_scope(&self) -> StorageResult<Box<dyn TransactionScope>> {
        Ok(Box::new(MemoryScope::new(self.tables.clone())))
    }

    async fn create_category(
        &self,
        category: &NewCategory,
        now: DateTime<Utc>,
    ) -> StorageResult<Category> {
        let mut tables = self.tables.write();
        if tables.slug_taken(&category.slug, None) {
            return Err(StorageError::Duplicate {
                field: "slug",
                value: category.slug.clone(),
            });
        }
        let row = Category {
            id: tables.allocate_category_id(),
            name: category.name.clone(),
            slug: category.slug.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_categories(&self) -> StorageResult<Vec<Category>> {
        Ok(self.tables.read().categories.values().cloned().collect())
    }

    async fn get_category(&self, id: CategoryId) -> StorageResult<Option<Category>> {
        Ok(self.tables.read().categories.get(&id).cloned())
    }

    async fn update_category(
        &self,
        id: CategoryId,
        update: &CategoryUpdate,
        now: DateTime<Utc>,
    ) -> StorageResult<Category> {
        let mut tables = self.tables.write();
        if !tables.categories.contains_key(&id) {
            return Err(StorageError::NotFound {
                entity: "category",
                id: id.value(),
            });
        }
        if tables.slug_taken(&update.slug, Some(id)) {
            return Err(StorageError::Duplicate {
                field: "slug",
                value: update.slug.clone(),
            });
        }
        let row = tables
            .categories
            .get_mut(&id)
            .ok_or(StorageError::NotFound {
                entity: "category",
                id: id.value(),
            })?;
        row.name = update.name.clone();
        row.slug = update.slug.clone();
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn delete_category(&self, id: CategoryId) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if tables.categories.remove(&id).is_none() {
            return Err(StorageError::NotFound {
                entity: "category",
                id: id.value(),
            });
        }
        let orphaned: Vec<ThreadId> = tables
            .threads
            .values()
            .filter(|t| t.category_id == id)
            .map(|t| t.id)
            .collect();
        for thread_id in &orphaned {
            tables.remove_thread_cascade(*thread_id);
        }
        debug!(category_id = %id, threads = orphaned.len(), "Deleted category");
        Ok(())
    }

    async fn create_thread(&self, thread: &NewThread, now: DateTime<Utc>) -> StorageResult<Thread> {
        let mut tables = self.tables.write();
        if !tables.categories.contains_key(&thread.category_id) {
            return Err(StorageError::NotFound {
                entity: "category",
                id: thread.category_id.value(),
            });
        }
        let row = Thread {
            id: tables.allocate_thread_id(),
            category_id: thread.category_id,
            title: thread.title.clone(),
            created_at: now,
            updated_at: now,
            last_post_at: now,
            post_count: 0,
        };
        tables.threads.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_threads(&self) -> StorageResult<Vec<Thread>> {
        Ok(self.tables.read().threads.values().cloned().collect())
    }

    async fn threads_by_category(&self, category_id: CategoryId) -> StorageResult<Vec<Thread>> {
        Ok(self
            .tables
            .read()
            .threads
            .values()
            .filter(|t| t.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn get_thread(&self, id: ThreadId) -> StorageResult<Option<Thread>> {
        Ok(self.tables.read().threads.get(&id).cloned())
    }

    async fn update_thread_title(
        &self,
        id: ThreadId,
        title: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Thread> {
        let mut tables = self.tables.write();
        let row = tables.threads.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "thread",
            id: id.value(),
        })?;
        row.title = title.to_string();
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn delete_thread(&self, id: ThreadId) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if !tables.threads.contains_key(&id) {
            return Err(StorageError::NotFound {
                entity: "thread",
                id: id.value(),
            });
        }
        tables.remove_thread_cascade(id);
        Ok(())
    }

    async fn get_post(&self, id: PostId) -> StorageResult<Option<Post>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn posts_by_thread(
        &self,
        thread_id: ThreadId,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<Post>> {
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| p.thread_id == thread_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_post_content(
        &self,
        id: PostId,
        content: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Post> {
        let mut tables = self.tables.write();
        let row = tables.posts.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "post",
            id: id.value(),
        })?;
        row.content = content.to_string();
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn soft_delete_post(&self, id: PostId, now: DateTime<Utc>) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let row = tables.posts.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "post",
            id: id.value(),
        })?;
        row.is_deleted = true;
        row.updated_at = now;
        Ok(())
    }

    async fn count_posts(&self, thread_id: ThreadId) -> StorageResult<u64> {
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| p.thread_id == thread_id)
            .count() as u64)
    }

    async fn latest_post(&self, thread_id: ThreadId) -> StorageResult<Option<Post>> {
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| p.thread_id == thread_id)
            .max_by_key(|p| (p.created_at, p.id))
            .cloned())
    }
}
