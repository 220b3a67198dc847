//! Autonomous development engine: task backlog, agents, scheduling loop,
//! quality gate and deployment trigger.
//!
//! Tasks are admitted by a timer-driven loop once every dependency has
//! completed, subject to a concurrency ceiling and one busy flag per agent.
//! Each admitted task runs on its own tokio task through the processor
//! registered for its type. Completions feed the quality gate, and a passing
//! gate plus a finished deployment task triggers the deployment collaborator.
//!
//! # Main types
//!
//! - [`DevelopmentSystem`] — The engine: `start`, `stop`, `add_task`, `get_metrics`, `tick`.
//! - [`TaskQueue`] — Backlog with dependency resolution and priority/age ordering.
//! - [`AgentRegistry`] — One agent per enabled task type with paired acquire/release.
//! - [`Scheduler`] — Owns [`SystemState`] and the periodic tick loop.
//! - [`TaskProcessor`] — Type-specific processing routine; [`SimulatedProcessor`] by default.
//! - [`QualityGate`] / [`QualityScorer`] — Score the task history and gate deployment.
//! - [`DeploymentTrigger`] / [`Deployer`] — Decide when to deploy and call out.
//! - [`MetricsSnapshot`] — Aggregated counts, scores and deployment state.

/// Engine configuration and feature flags.
pub mod config;
/// Deployment trigger and collaborator.
pub mod deploy;
/// The development system engine.
pub mod engine;
/// Processing routines and their registry.
pub mod executor;
/// Metrics aggregation.
pub mod metrics;
/// Default agent profiles and the seed backlog.
pub mod profiles;
/// Quality scoring and gate.
pub mod quality;
/// Agent roster with busy/free tracking.
pub mod registry;
/// System state and the tick loop.
pub mod scheduler;
/// Task backlog and dependency resolution.
pub mod task_queue;
/// Agent types.
pub mod types;

pub use config::{FeatureFlags, OrchestratorConfig, QualityConfig, SimulationConfig};
pub use deploy::{
    DeployOutcome, Deployer, DeploymentReceipt, DeploymentRequest, DeploymentTrigger, LogDeployer,
};
pub use engine::{DevelopmentSystem, DevelopmentSystemBuilder, INTERRUPTED};
pub use executor::{ProcessorRegistry, SimulatedProcessor, TaskProcessor};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use profiles::{default_profiles, profile_for, seed_tasks, SeedTask};
pub use quality::{GateEvaluation, HeuristicScorer, QualityGate, QualityScorer, QualityScores};
pub use registry::AgentRegistry;
pub use scheduler::{Scheduler, SystemState};
pub use task_queue::{DependencyState, TaskQueue};
pub use types::{AgentMetrics, AgentProfile, AgentState, WorkerStatus};
