use crate::config::{FeatureFlags, SimulationConfig};
use crate::profiles::profile_for;
use async_trait::async_trait;
use autodev_core::{AutodevError, AutodevResult, Task, TaskType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The type-specific routine that performs an admitted task.
///
/// Returning `Err` fails the task; the message is appended to its `errors`.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: &Task) -> AutodevResult<serde_json::Value>;
}

/// Lookup table from task type to processing routine.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<TaskType, Arc<dyn TaskProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One processor per enabled type: the override when given, otherwise a
    /// [`SimulatedProcessor`].
    pub fn from_features(
        features: &FeatureFlags,
        simulation: &SimulationConfig,
        overrides: &HashMap<TaskType, Arc<dyn TaskProcessor>>,
    ) -> Self {
        let mut registry = Self::new();
        for task_type in features.enabled_types() {
            let processor = match overrides.get(&task_type) {
                Some(p) => p.clone(),
                None => Arc::new(SimulatedProcessor::new(
                    task_type,
                    simulation.millis_per_minute,
                )) as Arc<dyn TaskProcessor>,
            };
            registry.register(task_type, processor);
        }
        registry
    }

    pub fn register(&mut self, task_type: TaskType, processor: Arc<dyn TaskProcessor>) {
        self.processors.insert(task_type, processor);
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskProcessor>> {
        self.processors.get(&task_type).cloned()
    }

    /// Number of task types with a routine.
    pub fn count(&self) -> usize {
        self.processors.len()
    }
}

/// Run `task` on `processor` and resolve to an output or a failure message.
///
/// The routine runs on its own tokio task so that a panic is contained and
/// reported as a failure instead of unwinding into the caller.
pub async fn execute(
    processor: Option<Arc<dyn TaskProcessor>>,
    task: &Task,
) -> Result<serde_json::Value, String> {
    let Some(processor) = processor else {
        return Err(AutodevError::Config(format!(
            "no processing routine registered for task type '{}'",
            task.task_type
        ))
        .to_string());
    };

    let owned = task.clone();
    let handle = tokio::spawn(async move { processor.process(&owned).await });
    match handle.await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) if join.is_panic() => Err(AutodevError::Execution(
            "processing routine panicked".to_string(),
        )
        .to_string()),
        Err(join) => Err(AutodevError::Execution(format!(
            "processing routine aborted: {join}"
        ))
        .to_string()),
    }
}

/// Stand-in routine that spends time proportional to the task's estimate and
/// reports a summary. Each type works at its own pace.
pub struct SimulatedProcessor {
    task_type: TaskType,
    millis_per_minute: u64,
}

impl SimulatedProcessor {
    pub fn new(task_type: TaskType, millis_per_minute: u64) -> Self {
        Self {
            task_type,
            millis_per_minute,
        }
    }

    /// Relative working speed; higher finishes sooner.
    pub fn speed_multiplier(task_type: TaskType) -> f64 {
        match task_type {
            TaskType::Research => 0.5,
            TaskType::Database => 1.0,
            TaskType::Backend => 0.8,
            TaskType::Frontend => 0.7,
            TaskType::UiUx => 0.6,
            TaskType::Portal => 0.8,
            TaskType::Api => 0.9,
            TaskType::Security => 0.7,
            TaskType::Testing => 1.2,
            TaskType::Deployment => 1.0,
        }
    }

    pub fn simulated_delay(&self, estimated_minutes: f64) -> Duration {
        let millis = estimated_minutes.max(0.0) * self.millis_per_minute as f64
            / Self::speed_multiplier(self.task_type);
        Duration::from_millis(millis.round() as u64)
    }
}

#[async_trait]
impl TaskProcessor for SimulatedProcessor {
    async fn process(&self, task: &Task) -> AutodevResult<serde_json::Value> {
        let delay = self.simulated_delay(task.estimated_duration);
        debug!(task_id = %task.id, task_type = %self.task_type, delay_ms = delay.as_millis() as u64, "Simulating task");
        tokio::time::sleep(delay).await;

        let profile = profile_for(self.task_type);
        let mut output = serde_json::json!({
            "agent": profile.agent_id(),
            "summary": format!("{} finished: {}", profile.name, task.description),
            "capabilities": profile.capabilities,
        });
        // Testing runs report the coverage they were asked to reach.
        if self.task_type == TaskType::Testing {
            if let Some(coverage) = task.requirements.get("coverage").and_then(|v| v.as_f64()) {
                output["coverage"] = serde_json::json!(coverage);
            }
        }
        Ok(output)
    }
}
