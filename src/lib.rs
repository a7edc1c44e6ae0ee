//! mnemo — project-scoped persistent memory for agents and humans.
//!
//! Short notes with a type and tags, deduplicated semantically on write,
//! retrieved by full-text match, vector similarity, or project context.
//! The CLI in `main.rs` is the only consumer; all decision logic lives
//! here so it can be tested without a terminal.

pub mod dedup;
pub mod embed;
pub mod error;
pub mod ops;
pub mod project;
pub mod retrieve;
pub mod store;
pub mod util;

use std::sync::Arc;

/// Shared handle to the store, clonable into detached tasks.
pub type SharedStore = Arc<store::MemoryStore>;
