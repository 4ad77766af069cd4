//! Read and CRUD services over the storage contract.
//!
//! Single-row writes go straight to storage; post creation goes through the
//! [`PostWriteOrchestrator`](crate::orchestrator::PostWriteOrchestrator).

mod categories;
mod posts;
mod threads;

pub use categories::CategoryService;
pub use posts::PostService;
pub use threads::ThreadService;

use crate::coordinator::TransactionCoordinator;
use crate::orchestrator::PostWriteOrchestrator;
use heisei_core::{Clock, ForumError, ForumStorage};
use std::sync::Arc;
use tracing::error;

/// Every service the API needs, built over one storage and clock
#[derive(Debug, Clone)]
pub struct ForumServices {
    /// Category CRUD
    pub categories: CategoryService,
    /// Thread CRUD
    pub threads: ThreadService,
    /// Post reads, edits, and transactional creation
    pub posts: PostService,
}

impl ForumServices {
    /// Wire the services over `storage`
    pub fn new(storage: Arc<dyn ForumStorage>, clock: Arc<dyn Clock>) -> Self {
        let coordinator = TransactionCoordinator::new(storage.clone());
        let orchestrator = PostWriteOrchestrator::new(coordinator, clock.clone());
        Self {
            categories: CategoryService::new(storage.clone(), clock.clone()),
            threads: ThreadService::new(storage.clone(), clock.clone()),
            posts: PostService::new(storage, clock, orchestrator),
        }
    }
}

/// Log a failed operation at error level, keeping the error.
fn logged(operation: &'static str) -> impl Fn(ForumError) -> ForumError {
    move |err| {
        error!(error = %err, code = err.code(), "Failed to {operation}");
        err
    }
}
