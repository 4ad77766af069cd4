//! Heisei Testing Infrastructure
//!
//! Shared helpers for forum tests: a manually advanced clock, a storage wrapper
//! that injects failures at chosen points of a transaction, a cancellation
//! token tests can trigger, and fixtures for seeding rows.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! heisei-testkit = { path = "../heisei-testkit" }
//! ```

pub mod cancel;
pub mod faults;
pub mod fixtures;
pub mod time;

pub use cancel::TriggerCancel;
pub use faults::{FaultPlan, FaultyStorage};
pub use fixtures::{seed_category, seed_thread, ForumFixture};
pub use time::ManualClock;
