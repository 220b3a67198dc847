//! Core types and error definitions for the autodev workspace.
//!
//! This crate provides the foundational types shared across all autodev crates:
//! the error taxonomy, the task data model with its forward-only state machine,
//! and the system event records that make up the append-only event log.
//!
//! # Main types
//!
//! - [`AutodevError`] — Unified error enum for all autodev subsystems.
//! - [`AutodevResult`] — Convenience alias for `Result<T, AutodevError>`.
//! - [`Task`] — A unit of schedulable development work.
//! - [`NewTask`] — The caller-supplied part of a task, before identity is assigned.
//! - [`TaskType`], [`TaskPriority`], [`TaskStatus`] — Task classification enums.
//! - [`SystemEvent`] — One entry of the lifecycle/audit event log.

/// System event log records.
pub mod event;
/// Task data model and state transitions.
pub mod task;

pub use event::{EventKind, SystemEvent};
pub use task::{NewTask, Task, TaskPriority, TaskStatus, TaskType};

use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the autodev engine.
///
/// Configuration problems are returned to the caller; execution problems are
/// recorded on the task and never escape the scheduling loop.
#[derive(Debug, thiserror::Error)]
pub enum AutodevError {
    /// Invalid configuration or an invalid request against the configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A task was requested for a type whose feature flag is disabled.
    #[error("Config error: task type '{0}' is disabled")]
    FeatureDisabled(TaskType),

    /// A dependency references a task id that does not exist.
    #[error("Config error: dependency {0} does not reference a known task")]
    UnknownDependency(Uuid),

    /// A status change that would violate the forward-only state machine.
    #[error("Invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        /// The task that rejected the transition.
        id: Uuid,
        /// Status before the attempted transition.
        from: TaskStatus,
        /// Status the caller tried to move to.
        to: TaskStatus,
    },

    /// No task with the given id is known.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// The task store failed to read or write a record.
    #[error("Store error: {0}")]
    Store(String),

    /// A processing routine reported failure.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The deployment collaborator failed or was unreachable.
    #[error("Deployment error: {0}")]
    Deployment(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutodevError {
    /// Whether this error belongs to the configuration class (rejected up front
    /// rather than recorded on a task).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AutodevError::Config(_)
                | AutodevError::FeatureDisabled(_)
                | AutodevError::UnknownDependency(_)
        )
    }
}

/// A convenience `Result` alias using [`AutodevError`].
pub type AutodevResult<T> = Result<T, AutodevError>;
