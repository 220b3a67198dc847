use crate::{AutodevError, AutodevResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of development work. Selects both the agent and the processing routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Research,
    Frontend,
    Backend,
    Database,
    Testing,
    Deployment,
    #[serde(alias = "uiux", alias = "ui_ux")]
    UiUx,
    Portal,
    Api,
    Security,
}

impl TaskType {
    /// Every task type, in declaration order.
    pub const ALL: [TaskType; 10] = [
        TaskType::Research,
        TaskType::Frontend,
        TaskType::Backend,
        TaskType::Database,
        TaskType::Testing,
        TaskType::Deployment,
        TaskType::UiUx,
        TaskType::Portal,
        TaskType::Api,
        TaskType::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Frontend => "frontend",
            TaskType::Backend => "backend",
            TaskType::Database => "database",
            TaskType::Testing => "testing",
            TaskType::Deployment => "deployment",
            TaskType::UiUx => "ui-ux",
            TaskType::Portal => "portal",
            TaskType::Api => "api",
            TaskType::Security => "security",
        }
    }

    /// Identifier of the single agent bound to this type.
    pub fn agent_id(&self) -> String {
        format!("{}-agent", self.as_str())
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = AutodevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(TaskType::Research),
            "frontend" => Ok(TaskType::Frontend),
            "backend" => Ok(TaskType::Backend),
            "database" => Ok(TaskType::Database),
            "testing" => Ok(TaskType::Testing),
            "deployment" => Ok(TaskType::Deployment),
            "ui-ux" | "uiux" | "ui_ux" => Ok(TaskType::UiUx),
            "portal" => Ok(TaskType::Portal),
            "api" => Ok(TaskType::Api),
            "security" => Ok(TaskType::Security),
            other => Err(AutodevError::Config(format!("unknown task type '{other}'"))),
        }
    }
}

/// Tie-break hint when several tasks are eligible at once. Ordered low → critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = AutodevError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(AutodevError::Config(format!("unknown priority '{other}'"))),
        }
    }
}

/// Lifecycle status. Moves forward only: pending → in-progress → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and failed tasks never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Caller-supplied fields of a task. Identity, status and timestamps are
/// assigned by the engine when the task is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub description: String,
    #[serde(default)]
    pub requirements: serde_json::Value,
    /// Planned duration in minutes.
    #[serde(default)]
    pub estimated_duration: f64,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
}

impl NewTask {
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        Self {
            task_type,
            priority: TaskPriority::Medium,
            description: description.into(),
            requirements: serde_json::Value::Null,
            estimated_duration: 0.0,
            dependencies: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_requirements(mut self, requirements: serde_json::Value) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_estimated_duration(mut self, minutes: f64) -> Self {
        self.estimated_duration = minutes;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<Uuid>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// A unit of development work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub description: String,
    #[serde(default)]
    pub requirements: serde_json::Value,
    /// Set at admission; `None` while pending.
    #[serde(default)]
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Minutes.
    #[serde(default)]
    pub estimated_duration: f64,
    /// Minutes from admission to the terminal transition.
    #[serde(default)]
    pub actual_duration: Option<f64>,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Task {
    /// Materialize a pending task from its caller-supplied fields.
    pub fn create(spec: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: spec.task_type,
            priority: spec.priority,
            status: TaskStatus::Pending,
            description: spec.description,
            requirements: spec.requirements,
            assigned_agent: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            estimated_duration: spec.estimated_duration,
            actual_duration: None,
            dependencies: spec.dependencies,
            output: None,
            errors: Vec::new(),
        }
    }

    /// Shorthand for tests and seeding: a pending task with default fields.
    pub fn new(task_type: TaskType, description: impl Into<String>) -> Self {
        Self::create(NewTask::new(task_type, description), Utc::now())
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<Uuid>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn check_transition(&self, next: TaskStatus) -> AutodevResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(AutodevError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            })
        }
    }

    /// pending → in-progress, binding the agent.
    pub fn admit(&mut self, agent_id: impl Into<String>, now: DateTime<Utc>) -> AutodevResult<()> {
        self.check_transition(TaskStatus::InProgress)?;
        self.status = TaskStatus::InProgress;
        self.assigned_agent = Some(agent_id.into());
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// in-progress → completed with the processor's output.
    pub fn complete(&mut self, output: serde_json::Value, now: DateTime<Utc>) -> AutodevResult<()> {
        self.check_transition(TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.output = Some(output);
        self.finish(now);
        Ok(())
    }

    /// in-progress → failed, appending the failure message.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> AutodevResult<()> {
        self.check_transition(TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.errors.push(error.into());
        self.finish(now);
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        let started = self.started_at.unwrap_or(self.created_at);
        let elapsed_ms = (now - started).num_milliseconds().max(0);
        self.actual_duration = Some(elapsed_ms as f64 / 60_000.0);
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}
