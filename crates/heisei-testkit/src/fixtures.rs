//! Seeded forums for tests

use crate::faults::{FaultPlan, FaultyStorage};
use crate::time::ManualClock;
use heisei_core::{Category, Clock, ForumStorage, NewCategory, NewThread, Thread};
use std::sync::Arc;

/// Insert a category named after `slug`.
pub async fn seed_category(storage: &dyn ForumStorage, slug: &str) -> Category {
    storage
        .create_category(
            &NewCategory {
                name: slug.to_string(),
                slug: slug.to_string(),
            },
            chrono::Utc::now(),
        )
        .await
        .expect("seed category")
}

/// Insert a category and one empty thread in it.
pub async fn seed_thread(storage: &dyn ForumStorage) -> (Category, Thread) {
    let category = seed_category(storage, "general").await;
    let thread = storage
        .create_thread(
            &NewThread {
                category_id: category.id,
                title: "Welcome".to_string(),
            },
            chrono::Utc::now(),
        )
        .await
        .expect("seed thread");
    (category, thread)
}

/// Fault-injecting storage seeded with one category and one thread
#[derive(Debug)]
pub struct ForumFixture {
    /// Storage under test
    pub storage: FaultyStorage,
    /// Clock shared with anything built from this fixture
    pub clock: Arc<ManualClock>,
    /// Seeded category
    pub category: Category,
    /// Seeded thread, with zeroed counters
    pub thread: Thread,
}

impl ForumFixture {
    /// Build and seed
    pub async fn new() -> Self {
        let storage = FaultyStorage::new();
        let (category, thread) = seed_thread(&storage).await;
        Self {
            storage,
            clock: ManualClock::new(),
            category,
            thread,
        }
    }

    /// Shared handle to the storage
    pub fn storage_handle(&self) -> Arc<dyn ForumStorage> {
        Arc::new(self.storage.clone())
    }

    /// Shared handle to the clock
    pub fn clock_handle(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Fault switches and counters
    pub fn plan(&self) -> &FaultPlan {
        self.storage.plan()
    }

    /// Current committed state of the seeded thread
    pub async fn reload_thread(&self) -> Thread {
        self.storage
            .get_thread(self.thread.id)
            .await
            .expect("read thread")
            .expect("seeded thread exists")
    }

    /// Number of committed post rows in the seeded thread
    pub async fn committed_posts(&self) -> u64 {
        self.storage
            .count_posts(self.thread.id)
            .await
            .expect("count posts")
    }
}
