use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened. Task lifecycle kinds carry a task id; system kinds usually don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskAdmitted,
    TaskCompleted,
    TaskFailed,
    TaskStalled,
    SystemStarted,
    SystemStopped,
    QualityGateChanged,
    RemediationRequested,
    DeploymentTriggered,
    DeploymentFailed,
    Reconciled,
}

/// One entry of the append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl SystemEvent {
    pub fn system(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            task_id: None,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// A lifecycle event for `task`, with its status and agent in `details`.
    pub fn for_task(kind: EventKind, task: &Task, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            task_id: Some(task.id),
            message: message.into(),
            details: serde_json::json!({
                "type": task.task_type,
                "status": task.status,
                "agent": task.assigned_agent,
            }),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::task::TaskType;

    #[test]
    fn test_task_event_carries_status() {
        let task = Task::new(TaskType::Portal, "portal management");
        let event = SystemEvent::for_task(EventKind::TaskCreated, &task, "created");
        assert_eq!(event.task_id, Some(task.id));
        assert_eq!(event.details["status"], "pending");
        assert_eq!(event.details["type"], "portal");
    }

    #[test]
    fn test_event_kind_serialization() {
        let event = SystemEvent::system(EventKind::SystemStarted, "up");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"system_started\""));
    }
}
