//! Persistence contract for task records and the system event log.
//!
//! The engine only needs append/update/query; [`TaskStore`] captures that
//! contract so the storage technology stays a host decision.
//!
//! # Main types
//!
//! - [`TaskStore`] — Async capability contract for task records and events.
//! - [`FileTaskStore`] — JSON-file store: one file per task plus an `events.jsonl` log.
//! - [`MemoryTaskStore`] — In-process store for tests and ephemeral runs.

/// In-memory store.
pub mod memory;
/// Store trait and the JSON-file implementation.
pub mod store;

pub use memory::MemoryTaskStore;
pub use store::{FileTaskStore, TaskStore};
