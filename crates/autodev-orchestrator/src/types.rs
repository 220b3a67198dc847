use autodev_core::TaskType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Static description of the agent bound to one task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub task_type: TaskType,
    pub name: String,
    pub capabilities: Vec<String>,
}

impl AgentProfile {
    pub fn agent_id(&self) -> String {
        self.task_type.agent_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
}

/// Counters tracked per agent across its lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u32,
    pub tasks_failed: u32,
}

/// Real-time snapshot of an agent's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    pub profile: AgentProfile,
    pub current_task: Option<Uuid>,
    pub status: WorkerStatus,
    pub metrics: AgentMetrics,
    pub last_activity: DateTime<Utc>,
}

impl AgentState {
    pub fn idle(profile: AgentProfile) -> Self {
        Self {
            id: profile.agent_id(),
            profile,
            current_task: None,
            status: WorkerStatus::Idle,
            metrics: AgentMetrics::default(),
            last_activity: Utc::now(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == WorkerStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_agent_state() {
        let profile = AgentProfile {
            task_type: TaskType::Database,
            name: "Database Agent".into(),
            capabilities: vec!["migrations".into()],
        };
        let state = AgentState::idle(profile);
        assert_eq!(state.id, "database-agent");
        assert!(state.is_free());
        assert!(state.current_task.is_none());
        assert_eq!(state.metrics.tasks_completed, 0);
    }
}
