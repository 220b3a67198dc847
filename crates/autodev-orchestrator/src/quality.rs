use autodev_core::{Task, TaskStatus, TaskType};
use serde::{Deserialize, Serialize};

/// The four aggregate scores the gate looks at, each in 0–100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub code_quality: f64,
    pub test_coverage: f64,
    pub deployment_success: f64,
    pub security_score: f64,
}

impl QualityScores {
    pub fn uniform(score: f64) -> Self {
        Self {
            code_quality: score,
            test_coverage: score,
            deployment_success: score,
            security_score: score,
        }
    }

    pub fn min(&self) -> f64 {
        self.code_quality
            .min(self.test_coverage)
            .min(self.deployment_success)
            .min(self.security_score)
    }

    /// Names of the scores strictly below `threshold`.
    pub fn below(&self, threshold: f64) -> Vec<&'static str> {
        [
            ("code_quality", self.code_quality),
            ("test_coverage", self.test_coverage),
            ("deployment_success", self.deployment_success),
            ("security_score", self.security_score),
        ]
        .into_iter()
        .filter(|(_, score)| *score < threshold)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Derives quality scores from the task history.
pub trait QualityScorer: Send + Sync {
    fn score(&self, tasks: &[Task]) -> QualityScores;
}

/// Default scorer: scores grow with the number of completed tasks and
/// deployment success tracks the failure ratio. Explicit `coverage` /
/// `security_score` values reported by the latest testing / security task
/// outputs take precedence over the estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    fn latest_reported(tasks: &[Task], task_type: TaskType, field: &str) -> Option<f64> {
        tasks
            .iter()
            .filter(|t| t.task_type == task_type && t.status == TaskStatus::Completed)
            .max_by_key(|t| t.completed_at)
            .and_then(|t| t.output.as_ref())
            .and_then(|o| o.get(field))
            .and_then(serde_json::Value::as_f64)
            .map(|v| v.clamp(0.0, 100.0))
    }
}

impl QualityScorer for HeuristicScorer {
    fn score(&self, tasks: &[Task]) -> QualityScores {
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as f64;
        let failed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count() as f64;

        let code_quality = (70.0 + completed / 100.0 * 25.0).min(95.0);
        let test_coverage = Self::latest_reported(tasks, TaskType::Testing, "coverage")
            .unwrap_or_else(|| (60.0 + completed / 50.0 * 38.0).min(98.0));
        let deployment_success = if failed == 0.0 {
            100.0
        } else {
            completed / (completed + failed) * 100.0
        };
        let security_score = Self::latest_reported(tasks, TaskType::Security, "security_score")
            .unwrap_or_else(|| (80.0 + completed / 200.0 * 19.0).min(99.0));

        QualityScores {
            code_quality,
            test_coverage,
            deployment_success,
            security_score,
        }
    }
}

/// Result of one gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GateEvaluation {
    pub open: bool,
    /// Whether this evaluation flipped the gate.
    pub changed: bool,
    pub min_score: f64,
    pub failing: Vec<&'static str>,
}

/// Inhibits deployment while the lowest score is below the threshold.
/// Starts closed; only an evaluation opens it.
#[derive(Debug, Clone)]
pub struct QualityGate {
    threshold: f64,
    open: bool,
}

impl QualityGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn evaluate(&mut self, scores: &QualityScores) -> GateEvaluation {
        let min_score = scores.min();
        let open = min_score >= self.threshold;
        let changed = open != self.open;
        self.open = open;
        GateEvaluation {
            open,
            changed,
            min_score,
            failing: scores.below(self.threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completed(task_type: TaskType, output: serde_json::Value) -> Task {
        let mut task = Task::new(task_type, "done");
        task.admit(task_type.agent_id(), Utc::now()).ok();
        task.complete(output, Utc::now()).ok();
        task
    }

    fn failed(task_type: TaskType) -> Task {
        let mut task = Task::new(task_type, "broken");
        task.admit(task_type.agent_id(), Utc::now()).ok();
        task.fail("boom", Utc::now()).ok();
        task
    }

    #[test]
    fn test_empty_history_baseline() {
        let scores = HeuristicScorer.score(&[]);
        assert_eq!(scores.code_quality, 70.0);
        assert_eq!(scores.test_coverage, 60.0);
        assert_eq!(scores.deployment_success, 100.0);
        assert_eq!(scores.security_score, 80.0);
        assert_eq!(scores.min(), 60.0);
    }

    #[test]
    fn test_scores_are_capped() {
        let tasks: Vec<Task> = (0..500)
            .map(|_| completed(TaskType::Backend, serde_json::Value::Null))
            .collect();
        let scores = HeuristicScorer.score(&tasks);
        assert_eq!(scores.code_quality, 95.0);
        assert_eq!(scores.test_coverage, 98.0);
        assert_eq!(scores.security_score, 99.0);
    }

    #[test]
    fn test_deployment_success_tracks_failures() {
        let tasks = vec![
            completed(TaskType::Backend, serde_json::Value::Null),
            completed(TaskType::Frontend, serde_json::Value::Null),
            completed(TaskType::Api, serde_json::Value::Null),
            failed(TaskType::Testing),
        ];
        let scores = HeuristicScorer.score(&tasks);
        assert_eq!(scores.deployment_success, 75.0);
    }

    #[test]
    fn test_reported_coverage_wins() {
        let tasks = vec![completed(
            TaskType::Testing,
            serde_json::json!({"coverage": 91.5}),
        )];
        let scores = HeuristicScorer.score(&tasks);
        assert_eq!(scores.test_coverage, 91.5);
    }

    #[test]
    fn test_gate_starts_closed_and_flips() {
        let mut gate = QualityGate::new(80.0);
        assert!(!gate.is_open());

        let eval = gate.evaluate(&QualityScores::uniform(85.0));
        assert!(eval.open);
        assert!(eval.changed);
        assert!(eval.failing.is_empty());

        let eval = gate.evaluate(&QualityScores::uniform(90.0));
        assert!(eval.open);
        assert!(!eval.changed);

        let mut low = QualityScores::uniform(90.0);
        low.security_score = 50.0;
        let eval = gate.evaluate(&low);
        assert!(!eval.open);
        assert!(eval.changed);
        assert_eq!(eval.failing, vec!["security_score"]);
        assert_eq!(eval.min_score, 50.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut gate = QualityGate::new(80.0);
        assert!(gate.evaluate(&QualityScores::uniform(80.0)).open);
    }
}
