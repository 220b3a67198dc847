use crate::quality::QualityScores;
use autodev_core::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the system, derived entirely from task records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    /// Mean `actual_duration` of completed tasks, in minutes. Zero when none.
    pub average_task_duration: f64,
    pub code_quality: f64,
    pub test_coverage: f64,
    pub deployment_success: f64,
    pub security_score: f64,
    pub quality_gate_open: bool,
    pub last_deployment: Option<DateTime<Utc>>,
    pub active_agents: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn scores(&self) -> QualityScores {
        QualityScores {
            code_quality: self.code_quality,
            test_coverage: self.test_coverage,
            deployment_success: self.deployment_success,
            security_score: self.security_score,
        }
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        MetricsAggregator::compute(&[], QualityScores::default(), false, None, Vec::new())
    }
}

/// Pure recomputation of a [`MetricsSnapshot`].
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn compute(
        tasks: &[Task],
        scores: QualityScores,
        quality_gate_open: bool,
        last_deployment: Option<DateTime<Utc>>,
        active_agents: Vec<String>,
    ) -> MetricsSnapshot {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

        let durations: Vec<f64> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter_map(|t| t.actual_duration)
            .collect();
        let average_task_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        MetricsSnapshot {
            total_tasks: tasks.len(),
            completed_tasks: count(TaskStatus::Completed),
            failed_tasks: count(TaskStatus::Failed),
            pending_tasks: count(TaskStatus::Pending),
            in_progress_tasks: count(TaskStatus::InProgress),
            average_task_duration,
            code_quality: scores.code_quality,
            test_coverage: scores.test_coverage,
            deployment_success: scores.deployment_success,
            security_score: scores.security_score,
            quality_gate_open,
            last_deployment,
            active_agents,
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodev_core::TaskType;
    use chrono::Duration;

    fn finished(minutes: i64, success: bool) -> Task {
        let start = Utc::now();
        let mut task = Task::new(TaskType::Backend, "work");
        task.admit("backend-agent", start).ok();
        let end = start + Duration::minutes(minutes);
        if success {
            task.complete(serde_json::Value::Null, end).ok();
        } else {
            task.fail("boom", end).ok();
        }
        task
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = MetricsSnapshot::default();
        assert_eq!(snapshot.total_tasks, 0);
        assert_eq!(snapshot.average_task_duration, 0.0);
        assert!(!snapshot.quality_gate_open);
        assert!(snapshot.last_deployment.is_none());
    }

    #[test]
    fn test_counts_and_average() {
        let tasks = vec![
            finished(10, true),
            finished(30, true),
            finished(99, false),
            Task::new(TaskType::Api, "queued"),
        ];
        let snapshot = MetricsAggregator::compute(
            &tasks,
            QualityScores::uniform(85.0),
            true,
            None,
            vec!["backend-agent".into()],
        );
        assert_eq!(snapshot.total_tasks, 4);
        assert_eq!(snapshot.completed_tasks, 2);
        assert_eq!(snapshot.failed_tasks, 1);
        assert_eq!(snapshot.pending_tasks, 1);
        assert_eq!(snapshot.in_progress_tasks, 0);
        assert!((snapshot.average_task_duration - 20.0).abs() < 1e-9);
        assert_eq!(snapshot.scores(), QualityScores::uniform(85.0));
        assert_eq!(snapshot.active_agents, vec!["backend-agent".to_string()]);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = MetricsSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap_or_default();
        assert_eq!(json["total_tasks"], 0);
        assert!(json["last_deployment"].is_null());
    }
}
