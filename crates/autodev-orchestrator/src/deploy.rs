use crate::quality::QualityScores;
use async_trait::async_trait;
use autodev_core::{AutodevResult, Task, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// What the engine hands the deployment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub requested_at: DateTime<Utc>,
    /// Completed deployment tasks not yet covered by a previous deployment.
    pub deployment_tasks: Vec<Uuid>,
    pub scores: QualityScores,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReceipt {
    pub reference: String,
    pub deployed_at: DateTime<Utc>,
}

/// Downstream deployment collaborator.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, request: &DeploymentRequest) -> AutodevResult<DeploymentReceipt>;
}

/// Deployer that only records the request in the log.
#[derive(Debug, Default)]
pub struct LogDeployer;

#[async_trait]
impl Deployer for LogDeployer {
    async fn deploy(&self, request: &DeploymentRequest) -> AutodevResult<DeploymentReceipt> {
        let reference = format!("deploy-{}", Uuid::new_v4());
        info!(
            reference = %reference,
            tasks = request.deployment_tasks.len(),
            min_score = request.scores.min(),
            "Deployment requested"
        );
        Ok(DeploymentReceipt {
            reference,
            deployed_at: Utc::now(),
        })
    }
}

/// Outcome of one trigger evaluation.
#[derive(Debug)]
pub enum DeployOutcome {
    /// Conditions not met; the collaborator was not called.
    Skipped,
    Deployed(DeploymentReceipt),
    /// The collaborator failed; `last_deployment` is unchanged.
    Failed(String),
}

/// Decides when to call the deployment collaborator and remembers the last
/// successful deployment.
///
/// Deployment tasks are tracked by id once shipped, so a task that completes
/// while a deployment call is in flight is still picked up next time.
#[derive(Debug, Clone)]
pub struct DeploymentTrigger {
    auto_deploy: bool,
    last_deployment: Option<DateTime<Utc>>,
    shipped: HashSet<Uuid>,
}

impl DeploymentTrigger {
    pub fn new(auto_deploy: bool) -> Self {
        Self {
            auto_deploy,
            last_deployment: None,
            shipped: HashSet::new(),
        }
    }

    /// Resume from a previous run's last deployment time. Deployment tasks
    /// completed before it count as shipped.
    pub fn resume(&mut self, last_deployment: DateTime<Utc>, tasks: &[Task]) {
        self.last_deployment = Some(last_deployment);
        self.shipped.extend(
            tasks
                .iter()
                .filter(|t| t.task_type == TaskType::Deployment)
                .filter(|t| t.completed_at.is_some_and(|done| done <= last_deployment))
                .map(|t| t.id),
        );
    }

    pub fn last_deployment(&self) -> Option<DateTime<Utc>> {
        self.last_deployment
    }

    /// Completed deployment tasks not covered by a previous deployment.
    pub fn undeployed(&self, tasks: &[Task]) -> Vec<Uuid> {
        tasks
            .iter()
            .filter(|t| t.task_type == TaskType::Deployment && t.status == TaskStatus::Completed)
            .filter(|t| !self.shipped.contains(&t.id))
            .map(|t| t.id)
            .collect()
    }

    pub fn should_deploy(&self, gate_open: bool, tasks: &[Task]) -> bool {
        self.auto_deploy && gate_open && !self.undeployed(tasks).is_empty()
    }

    /// Call `deployer` if conditions hold. Only a successful call advances
    /// `last_deployment`.
    pub async fn fire(
        &mut self,
        deployer: &dyn Deployer,
        gate_open: bool,
        tasks: &[Task],
        scores: QualityScores,
    ) -> DeployOutcome {
        if !self.should_deploy(gate_open, tasks) {
            return DeployOutcome::Skipped;
        }
        let request = DeploymentRequest {
            requested_at: Utc::now(),
            deployment_tasks: self.undeployed(tasks),
            scores,
        };
        match deployer.deploy(&request).await {
            Ok(receipt) => {
                self.last_deployment = Some(receipt.deployed_at);
                self.shipped.extend(request.deployment_tasks.iter().copied());
                DeployOutcome::Deployed(receipt)
            }
            Err(e) => DeployOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use autodev_core::AutodevError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Unreachable;

    #[async_trait]
    impl Deployer for Unreachable {
        async fn deploy(&self, _request: &DeploymentRequest) -> AutodevResult<DeploymentReceipt> {
            Err(AutodevError::Deployment("connection refused".into()))
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl Deployer for Counting {
        async fn deploy(&self, _request: &DeploymentRequest) -> AutodevResult<DeploymentReceipt> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(DeploymentReceipt {
                reference: "r".into(),
                deployed_at: Utc::now(),
            })
        }
    }

    fn completed_deployment() -> Task {
        let mut task = Task::new(TaskType::Deployment, "ship");
        task.admit("deployment-agent", Utc::now()).unwrap();
        task.complete(serde_json::Value::Null, Utc::now()).unwrap();
        task
    }

    #[test]
    fn test_requires_completed_deployment_task() {
        let trigger = DeploymentTrigger::new(true);
        assert!(!trigger.should_deploy(true, &[]));
        assert!(!trigger.should_deploy(true, &[Task::new(TaskType::Deployment, "pending")]));
        assert!(trigger.should_deploy(true, &[completed_deployment()]));
    }

    #[test]
    fn test_closed_gate_or_disabled_inhibits() {
        let tasks = vec![completed_deployment()];
        assert!(!DeploymentTrigger::new(true).should_deploy(false, &tasks));
        assert!(!DeploymentTrigger::new(false).should_deploy(true, &tasks));
    }

    #[tokio::test]
    async fn test_successful_fire_advances_last_deployment() {
        let mut trigger = DeploymentTrigger::new(true);
        let deployer = Counting::default();
        let tasks = vec![completed_deployment()];

        let outcome = trigger
            .fire(&deployer, true, &tasks, QualityScores::uniform(90.0))
            .await;
        assert!(matches!(outcome, DeployOutcome::Deployed(_)));
        assert!(trigger.last_deployment().is_some());

        // Same completed task is already covered.
        let outcome = trigger
            .fire(&deployer, true, &tasks, QualityScores::uniform(90.0))
            .await;
        assert!(matches!(outcome, DeployOutcome::Skipped));
        assert_eq!(deployer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fire_keeps_last_deployment() {
        let mut trigger = DeploymentTrigger::new(true);
        let tasks = vec![completed_deployment()];
        let outcome = trigger
            .fire(&Unreachable, true, &tasks, QualityScores::uniform(90.0))
            .await;
        assert!(matches!(outcome, DeployOutcome::Failed(ref msg) if msg.contains("refused")));
        assert!(trigger.last_deployment().is_none());
        assert!(trigger.should_deploy(true, &tasks));
    }

    #[test]
    fn test_resume_marks_older_tasks_shipped() {
        let tasks = vec![completed_deployment()];
        let mut trigger = DeploymentTrigger::new(true);
        trigger.resume(Utc::now(), &tasks);
        assert!(trigger.last_deployment().is_some());
        assert!(!trigger.should_deploy(true, &tasks));
    }

    #[tokio::test]
    async fn test_log_deployer() {
        let receipt = LogDeployer
            .deploy(&DeploymentRequest {
                requested_at: Utc::now(),
                deployment_tasks: vec![],
                scores: QualityScores::default(),
            })
            .await
            .unwrap();
        assert!(receipt.reference.starts_with("deploy-"));
    }
}
