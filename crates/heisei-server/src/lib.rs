//! # Heisei Server - Forum Write Path
//!
//! **Purpose**: Admit client requests, run multi-row writes as all-or-nothing
//! transactions, and expose the forum over HTTP.
//!
//! # Architecture Constraints
//!
//! - YES Per-client token bucket admission with idle reclamation
//! - YES Transaction coordination with commit/rollback/panic/cancel handling
//! - YES Post creation that keeps thread counters in step with posts
//! - YES REST surface, configuration, and process bootstrap
//! - NO storage engine (that's `heisei-store`)
//! - NO domain types or error taxonomy (that's `heisei-core`)
//!
//! ## Request Flow
//!
//! ```text
//! HTTP ─► admission (VisitorLimiter) ─► handler ─► service
//!                                                    │
//!                         PostWriteOrchestrator ◄────┘ (create post)
//!                                   │
//!                         TransactionCoordinator ─► TransactionScope
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// REST surface
pub mod api;

/// Configuration loading
pub mod config;

/// Transaction coordination
pub mod coordinator;

/// Drain signal shared by requests and background work
pub mod lifecycle;

/// Per-client admission control
pub mod limiter;

/// Transactional post creation
pub mod orchestrator;

/// Default category seeding
pub mod seed;

/// Process bootstrap
pub mod server;

/// Read and CRUD services
pub mod services;

pub use api::{router, AppState};
pub use config::{ConfigError, ServerConfig};
pub use coordinator::TransactionCoordinator;
pub use lifecycle::ShutdownSignal;
pub use limiter::{AdmissionDecision, LimiterConfig, ReclaimerHandle, VisitorLimiter};
pub use orchestrator::PostWriteOrchestrator;
pub use server::Application;
pub use services::ForumServices;
