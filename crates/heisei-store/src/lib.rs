//! # Heisei Store - In-Memory Storage Collaborator
//!
//! Implements the [`heisei_core::ForumStorage`] contract over process memory.
//!
//! Tables sit behind one `parking_lot::RwLock`. Transaction scopes stage their
//! statements privately and apply them in a single write-locked step on commit,
//! which gives the write path the two properties it relies on:
//! - atomic visibility: readers see all of a scope's statements or none
//! - no lost updates: counter deltas are added to the stored value at commit

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;
mod scope;

pub use memory::MemoryStorage;
