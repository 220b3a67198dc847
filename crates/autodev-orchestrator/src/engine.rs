use crate::config::OrchestratorConfig;
use crate::deploy::{DeployOutcome, Deployer, DeploymentTrigger, LogDeployer};
use crate::executor::{self, ProcessorRegistry, TaskProcessor};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::profiles::{default_profiles, seed_tasks};
use crate::quality::{HeuristicScorer, QualityGate, QualityScorer, QualityScores};
use crate::registry::AgentRegistry;
use crate::scheduler::{Scheduler, SystemState};
use crate::task_queue::{DependencyState, TaskQueue};
use crate::types::AgentState;
use autodev_core::{
    AutodevError, AutodevResult, EventKind, NewTask, SystemEvent, Task, TaskPriority, TaskStatus,
    TaskType,
};
use autodev_store::{MemoryTaskStore, TaskStore};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Failure recorded on tasks that were in progress when a previous run ended.
pub const INTERRUPTED: &str = "execution interrupted before completion";

const REMEDIATION_DESCRIPTION: &str = "Improve code quality and coverage";

/// Builder for [`DevelopmentSystem`]. Every collaborator has a default.
pub struct DevelopmentSystemBuilder {
    config: OrchestratorConfig,
    store: Option<Arc<dyn TaskStore>>,
    deployer: Option<Arc<dyn Deployer>>,
    scorer: Option<Arc<dyn QualityScorer>>,
    processors: HashMap<TaskType, Arc<dyn TaskProcessor>>,
}

impl DevelopmentSystemBuilder {
    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn Deployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Replace the simulated routine for `task_type`.
    pub fn with_processor(mut self, task_type: TaskType, processor: Arc<dyn TaskProcessor>) -> Self {
        self.processors.insert(task_type, processor);
        self
    }

    pub fn build(self) -> AutodevResult<DevelopmentSystem> {
        self.config.validate()?;
        let interval = self.config.monitoring_interval();
        let threshold = self.config.quality_threshold;
        let auto_deploy = self.config.auto_deploy;

        let inner = Inner {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTaskStore::new())),
            deployer: self.deployer.unwrap_or_else(|| Arc::new(LogDeployer)),
            scorer: self.scorer.unwrap_or_else(|| Arc::new(HeuristicScorer)),
            overrides: self.processors,
            processors: RwLock::new(ProcessorRegistry::new()),
            queue: tokio::sync::RwLock::new(TaskQueue::new()),
            agents: AgentRegistry::new(),
            scheduler: Scheduler::new(interval),
            gate: Mutex::new(QualityGate::new(threshold)),
            trigger: tokio::sync::Mutex::new(DeploymentTrigger::new(auto_deploy)),
            last_deployment: RwLock::new(None),
            remediation: tokio::sync::Mutex::new(()),
            metrics: RwLock::new(MetricsSnapshot::default()),
            stalled: Mutex::new(HashSet::new()),
            recovered: AtomicBool::new(false),
            lifecycle: tokio::sync::Mutex::new(()),
            config: self.config,
        };
        Ok(DevelopmentSystem {
            inner: Arc::new(inner),
        })
    }
}

/// The autonomous development engine.
///
/// Holds the task backlog, one agent per enabled task type, and a timer-driven
/// loop that admits eligible tasks up to the concurrency ceiling. Completions
/// feed the quality gate and the deployment trigger.
///
/// Cloning is cheap and every clone drives the same engine.
#[derive(Clone)]
pub struct DevelopmentSystem {
    inner: Arc<Inner>,
}

struct Inner {
    config: OrchestratorConfig,
    store: Arc<dyn TaskStore>,
    deployer: Arc<dyn Deployer>,
    scorer: Arc<dyn QualityScorer>,
    overrides: HashMap<TaskType, Arc<dyn TaskProcessor>>,
    processors: RwLock<ProcessorRegistry>,
    queue: tokio::sync::RwLock<TaskQueue>,
    agents: AgentRegistry,
    scheduler: Scheduler,
    gate: Mutex<QualityGate>,
    /// Serializes deployment evaluation.
    trigger: tokio::sync::Mutex<DeploymentTrigger>,
    last_deployment: RwLock<Option<DateTime<Utc>>>,
    remediation: tokio::sync::Mutex<()>,
    metrics: RwLock<MetricsSnapshot>,
    /// Tasks already reported as stalled.
    stalled: Mutex<HashSet<Uuid>>,
    recovered: AtomicBool,
    /// Serializes start/stop.
    lifecycle: tokio::sync::Mutex<()>,
}

impl DevelopmentSystem {
    pub fn builder(config: OrchestratorConfig) -> DevelopmentSystemBuilder {
        DevelopmentSystemBuilder {
            config,
            store: None,
            deployer: None,
            scorer: None,
            processors: HashMap::new(),
        }
    }

    /// Engine with an in-memory store and default collaborators.
    pub fn new(config: OrchestratorConfig) -> AutodevResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Bring the engine up. A no-op if already running.
    ///
    /// On the first start, records are loaded from the store; tasks found in
    /// progress are failed as interrupted. The seed backlog is enqueued only
    /// when the store held nothing.
    pub async fn start(&self) -> AutodevResult<()> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        if inner.scheduler.is_running() {
            debug!("start() while already running");
            return Ok(());
        }
        inner.config.validate()?;

        let registry = ProcessorRegistry::from_features(
            &inner.config.features,
            &inner.config.simulation,
            &inner.overrides,
        );
        let processor_count = registry.count();
        *inner.processors.write() = registry;

        let agent_count = inner
            .agents
            .provision(default_profiles(&inner.config.features))
            .await;

        let mut should_seed = false;
        if !inner.recovered.load(Ordering::SeqCst) {
            let was_empty = inner.recover().await?;
            inner.recovered.store(true, Ordering::SeqCst);
            should_seed = was_empty && inner.config.seed_initial_tasks;
        }
        inner.reconcile_agents().await;

        if should_seed {
            inner.seed().await?;
        }

        inner.scheduler.transition(SystemState::Running);
        inner
            .record(
                SystemEvent::system(EventKind::SystemStarted, "Development system started")
                    .with_details(serde_json::json!({
                        "agents": agent_count,
                        "processors": processor_count,
                        "max_concurrent_tasks": inner.config.max_concurrent_tasks,
                    })),
            )
            .await;
        inner.refresh_metrics().await;

        let weak: Weak<Inner> = Arc::downgrade(inner);
        inner.scheduler.spawn(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        inner.tick().await;
                        true
                    }
                    None => false,
                }
            }
        });

        info!(
            agents = agent_count,
            interval_ms = inner.config.monitoring_interval_ms,
            "Development system started"
        );
        Ok(())
    }

    /// Halt the loop and release agents. In-flight executions still finish and
    /// are recorded. A no-op if already stopped.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        if !inner.scheduler.transition(SystemState::Stopped) {
            debug!("stop() while already stopped");
            return;
        }
        inner.scheduler.halt().await;
        inner.agents.teardown().await;
        inner
            .record(SystemEvent::system(
                EventKind::SystemStopped,
                "Development system stopped",
            ))
            .await;
        inner.refresh_metrics().await;
        info!("Development system stopped");
    }

    /// Validate, persist and enqueue a new pending task.
    ///
    /// Fails without persisting anything if the type is disabled or a
    /// dependency id is unknown.
    pub async fn add_task(&self, spec: NewTask) -> AutodevResult<Uuid> {
        self.inner.add_task(spec).await
    }

    /// Latest cached snapshot. Never waits on the scheduler.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.read().clone()
    }

    pub async fn should_deploy(&self) -> bool {
        let tasks = self.inner.snapshot_tasks().await;
        let gate_open = self.inner.gate.lock().is_open();
        self.inner
            .trigger
            .lock()
            .await
            .should_deploy(gate_open, &tasks)
    }

    /// Run one scheduling pass now. Returns how many tasks were admitted.
    pub async fn tick(&self) -> usize {
        self.inner.tick().await
    }

    pub fn state(&self) -> SystemState {
        self.inner.scheduler.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.inner.scheduler.subscribe()
    }

    pub async fn task(&self, id: Uuid) -> Option<Task> {
        self.inner.queue.read().await.get(id).cloned()
    }

    /// Every known task, oldest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.snapshot_tasks().await
    }

    pub async fn agents(&self) -> Vec<AgentState> {
        self.inner.agents.snapshot().await
    }

    pub async fn events(&self) -> AutodevResult<Vec<SystemEvent>> {
        self.inner.store.events().await
    }

    pub fn quality_gate_open(&self) -> bool {
        self.inner.gate.lock().is_open()
    }

    pub fn last_deployment(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_deployment.read()
    }

    /// Recompute metrics from stored records alone, without a running engine.
    ///
    /// The gate flag is the one last recorded by a running engine.
    pub async fn metrics_from_store(store: &dyn TaskStore) -> AutodevResult<MetricsSnapshot> {
        let tasks = store.list().await?;
        let events = store.events().await?;
        let scores = HeuristicScorer.score(&tasks);
        let gate_open = events
            .iter()
            .rev()
            .find(|e| e.kind == EventKind::QualityGateChanged)
            .and_then(|e| e.details.get("open"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        debug!(tasks = tasks.len(), gate_open, "Metrics recomputed from store");
        Ok(MetricsAggregator::compute(
            &tasks,
            scores,
            gate_open,
            last_deployment_from(&events),
            Vec::new(),
        ))
    }
}

fn last_deployment_from(events: &[SystemEvent]) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::DeploymentTriggered)
        .map(|e| e.timestamp)
        .max()
}

impl Inner {
    async fn record(&self, event: SystemEvent) {
        if let Err(e) = self.store.append_event(&event).await {
            error!(error = %e, kind = ?event.kind, "Failed to append system event");
        }
    }

    async fn persist(&self, task: &Task) {
        if let Err(e) = self.store.update(task).await {
            error!(task_id = %task.id, status = %task.status, error = %e, "Failed to persist task");
        }
    }

    async fn snapshot_tasks(&self) -> Vec<Task> {
        self.queue
            .read()
            .await
            .all_tasks()
            .into_iter()
            .cloned()
            .collect()
    }

    async fn add_task(&self, spec: NewTask) -> AutodevResult<Uuid> {
        if !self.config.features.is_enabled(spec.task_type) {
            return Err(AutodevError::FeatureDisabled(spec.task_type));
        }
        let task = Task::create(spec, Utc::now());
        {
            let mut queue = self.queue.write().await;
            for dep in &task.dependencies {
                if !queue.contains(*dep) && self.store.get(*dep).await?.is_none() {
                    return Err(AutodevError::UnknownDependency(*dep));
                }
            }
            self.store.create(&task).await?;
            queue.enqueue(task.clone())?;
        }

        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            priority = %task.priority,
            dependencies = task.dependencies.len(),
            "Task added"
        );
        self.record(SystemEvent::for_task(
            EventKind::TaskCreated,
            &task,
            format!("Task created: {}", task.description),
        ))
        .await;
        self.refresh_metrics().await;
        Ok(task.id)
    }

    /// Load stored records into the queue. In-progress records cannot have a
    /// live execution, so they are failed. Returns whether the store was empty.
    async fn recover(&self) -> AutodevResult<bool> {
        let records = self.store.list().await?;
        let was_empty = records.is_empty();
        let now = Utc::now();
        let mut interrupted = Vec::new();
        {
            let mut queue = self.queue.write().await;
            for mut task in records {
                if queue.contains(task.id) {
                    continue;
                }
                if task.status == TaskStatus::InProgress {
                    task.fail(INTERRUPTED, now)?;
                    interrupted.push(task.clone());
                }
                queue.restore(task);
            }
        }

        for task in &interrupted {
            warn!(task_id = %task.id, task_type = %task.task_type, "Failing interrupted task");
            self.persist(task).await;
            self.record(SystemEvent::for_task(EventKind::Reconciled, task, INTERRUPTED))
                .await;
        }

        if let Some(last) = last_deployment_from(&self.store.events().await?) {
            let tasks = self.snapshot_tasks().await;
            self.trigger.lock().await.resume(last, &tasks);
            *self.last_deployment.write() = Some(last);
        }

        info!(
            loaded = self.queue.read().await.total_count(),
            interrupted = interrupted.len(),
            "Recovered task records"
        );
        Ok(was_empty)
    }

    /// Bind agents to executions still in flight and free the rest.
    ///
    /// The queue read lock is held until the roster matches it: `finish`
    /// needs the write lock to leave in-progress, so an execution cannot
    /// complete between being seen here and being bound.
    async fn reconcile_agents(&self) {
        let freed = {
            let queue = self.queue.read().await;
            let in_progress = queue.with_status(TaskStatus::InProgress);
            for task in &in_progress {
                self.agents.bind(task.task_type, task.id).await;
            }
            let live: HashSet<Uuid> = in_progress.iter().map(|t| t.id).collect();
            self.agents.reconcile(&live).await
        };
        if !freed.is_empty() {
            warn!(agents = ?freed, "Freed agents without a live task");
            self.record(
                SystemEvent::system(EventKind::Reconciled, "Freed orphaned agents")
                    .with_details(serde_json::json!({ "agents": freed })),
            )
            .await;
        }
    }

    /// Enqueue the initial backlog, resolving type dependencies to ids.
    async fn seed(&self) -> AutodevResult<()> {
        let mut seeded: HashMap<TaskType, Uuid> = HashMap::new();
        for seed in seed_tasks() {
            let task_type = seed.task.task_type;
            if !self.config.features.is_enabled(task_type) {
                debug!(task_type = %task_type, "Skipping seed for disabled type");
                continue;
            }
            let deps: Option<Vec<Uuid>> = seed
                .depends_on
                .iter()
                .map(|t| seeded.get(t).copied())
                .collect();
            let Some(deps) = deps else {
                warn!(
                    task_type = %task_type,
                    depends_on = ?seed.depends_on,
                    "Skipping seed whose dependency was not seeded"
                );
                continue;
            };
            let id = self.add_task(seed.task.with_dependencies(deps)).await?;
            seeded.insert(task_type, id);
        }
        info!(count = seeded.len(), "Seeded initial tasks");
        Ok(())
    }

    async fn tick(self: &Arc<Self>) -> usize {
        if !self.scheduler.is_running() {
            return 0;
        }
        let admitted = self.admit_ready().await;
        for task in &admitted {
            info!(
                task_id = %task.id,
                task_type = %task.task_type,
                agent = task.assigned_agent.as_deref().unwrap_or_default(),
                "Task admitted"
            );
            self.persist(task).await;
            self.record(SystemEvent::for_task(
                EventKind::TaskAdmitted,
                task,
                format!("Task admitted: {}", task.description),
            ))
            .await;
            self.spawn_execution(task.clone());
        }
        self.check_stalls().await;
        if !admitted.is_empty() {
            self.refresh_metrics().await;
        }
        admitted.len()
    }

    /// Admit eligible tasks in priority/age order until the ceiling is hit.
    async fn admit_ready(&self) -> Vec<Task> {
        let mut queue = self.queue.write().await;
        let ceiling = self.config.max_concurrent_tasks;
        let mut in_flight = queue.in_progress_count();
        if in_flight >= ceiling {
            debug!(in_flight, ceiling, "Concurrency ceiling reached");
            return Vec::new();
        }

        let candidates: Vec<(Uuid, TaskType)> = queue
            .next_eligible()
            .iter()
            .map(|t| (t.id, t.task_type))
            .collect();
        let mut admitted = Vec::new();
        for (id, task_type) in candidates {
            if in_flight >= ceiling {
                break;
            }
            let Some(agent_id) = self.agents.try_acquire(task_type, id).await else {
                continue;
            };
            match queue.admit(id, &agent_id, Utc::now()) {
                Ok(task) => {
                    admitted.push(task.clone());
                    in_flight += 1;
                }
                Err(e) => {
                    self.agents.release(task_type, id).await;
                    warn!(task_id = %id, error = %e, "Admission rejected");
                }
            }
        }
        admitted
    }

    fn spawn_execution(self: &Arc<Self>, task: Task) {
        let processor = self.processors.read().get(task.task_type);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = executor::execute(processor, &task).await;
            inner.finish(&task, outcome).await;
        });
    }

    /// Terminal transition for an execution, then the completion or failure path.
    async fn finish(self: &Arc<Self>, task: &Task, outcome: Result<serde_json::Value, String>) {
        let now = Utc::now();
        let success = outcome.is_ok();
        let failure = outcome.as_ref().err().cloned();
        let result = {
            let mut queue = self.queue.write().await;
            match outcome {
                Ok(output) => queue.complete(task.id, output, now).cloned(),
                Err(message) => queue.fail(task.id, &message, now).cloned(),
            }
        };
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Terminal transition rejected");
                self.agents.release(task.task_type, task.id).await;
                return;
            }
        };

        self.agents.release(task.task_type, task.id).await;
        self.agents.record_outcome(task.task_type, success).await;
        self.persist(&record).await;

        match failure {
            None => {
                info!(
                    task_id = %record.id,
                    task_type = %record.task_type,
                    minutes = record.actual_duration.unwrap_or_default(),
                    "Task completed"
                );
                self.record(SystemEvent::for_task(
                    EventKind::TaskCompleted,
                    &record,
                    format!("Task completed: {}", record.description),
                ))
                .await;
                let unblocked: Vec<Uuid> = {
                    let queue = self.queue.read().await;
                    queue
                        .dependents_of(record.id)
                        .into_iter()
                        .filter(|t| queue.is_eligible(t))
                        .map(|t| t.id)
                        .collect()
                };
                if !unblocked.is_empty() {
                    debug!(task_id = %record.id, unblocked = ?unblocked, "Dependents now eligible");
                }
                self.on_completion().await;
            }
            Some(message) => {
                warn!(
                    task_id = %record.id,
                    task_type = %record.task_type,
                    error = %message,
                    "Task failed"
                );
                self.record(
                    SystemEvent::for_task(
                        EventKind::TaskFailed,
                        &record,
                        format!("Task failed: {}", record.description),
                    )
                    .with_details(serde_json::json!({
                        "type": record.task_type,
                        "status": record.status,
                        "agent": record.assigned_agent,
                        "error": message,
                    })),
                )
                .await;
                self.refresh_metrics().await;
            }
        }
    }

    async fn on_completion(&self) {
        let tasks = self.snapshot_tasks().await;
        let scores = self.scorer.score(&tasks);
        let evaluation = self.gate.lock().evaluate(&scores);
        if evaluation.changed {
            if evaluation.open {
                info!(min_score = evaluation.min_score, "Quality gate opened");
            } else {
                warn!(
                    min_score = evaluation.min_score,
                    failing = ?evaluation.failing,
                    "Quality gate closed"
                );
            }
            self.record(
                SystemEvent::system(
                    EventKind::QualityGateChanged,
                    if evaluation.open {
                        "Quality gate opened"
                    } else {
                        "Quality gate closed"
                    },
                )
                .with_details(serde_json::json!({
                    "open": evaluation.open,
                    "min_score": evaluation.min_score,
                    "failing": evaluation.failing,
                    "threshold": self.config.quality_threshold,
                })),
            )
            .await;
        }

        if self.config.quality.remediation {
            self.remediate(&scores).await;
        }
        self.evaluate_deployment(scores).await;
        self.refresh_metrics().await;
    }

    /// Queue a testing task when code quality is under the threshold and no
    /// remediation task is outstanding.
    async fn remediate(&self, scores: &QualityScores) {
        if scores.code_quality >= self.config.quality_threshold
            || !self.config.features.is_enabled(TaskType::Testing)
        {
            return;
        }
        let _guard = self.remediation.lock().await;
        let outstanding = self.snapshot_tasks().await.iter().any(|t| {
            !t.is_terminal()
                && t.requirements.get("remediation") == Some(&serde_json::Value::Bool(true))
        });
        if outstanding {
            return;
        }

        let spec = NewTask::new(TaskType::Testing, REMEDIATION_DESCRIPTION)
            .with_priority(TaskPriority::High)
            .with_requirements(serde_json::json!({
                "remediation": true,
                "coverage": self.config.quality_threshold,
            }))
            .with_estimated_duration(120.0);
        match self.add_task(spec).await {
            Ok(id) => {
                warn!(
                    task_id = %id,
                    code_quality = scores.code_quality,
                    "Code quality below threshold, remediation queued"
                );
                let mut event =
                    SystemEvent::system(EventKind::RemediationRequested, REMEDIATION_DESCRIPTION)
                        .with_details(serde_json::json!({ "code_quality": scores.code_quality }));
                event.task_id = Some(id);
                self.record(event).await;
            }
            Err(e) => warn!(error = %e, "Could not queue remediation task"),
        }
    }

    async fn evaluate_deployment(&self, scores: QualityScores) {
        let mut trigger = self.trigger.lock().await;
        let tasks = self.snapshot_tasks().await;
        let gate_open = self.gate.lock().is_open();
        let undeployed = trigger.undeployed(&tasks);

        match trigger
            .fire(self.deployer.as_ref(), gate_open, &tasks, scores)
            .await
        {
            DeployOutcome::Skipped => {}
            DeployOutcome::Deployed(receipt) => {
                *self.last_deployment.write() = Some(receipt.deployed_at);
                info!(reference = %receipt.reference, tasks = undeployed.len(), "Deployment triggered");
                self.record(
                    SystemEvent::system(EventKind::DeploymentTriggered, "Deployment triggered")
                        .with_details(serde_json::json!({
                            "reference": receipt.reference,
                            "deployed_at": receipt.deployed_at,
                            "tasks": undeployed,
                        })),
                )
                .await;
            }
            DeployOutcome::Failed(message) => {
                warn!(error = %message, "Deployment failed, will retry on next completion");
                self.record(
                    SystemEvent::system(EventKind::DeploymentFailed, "Deployment failed")
                        .with_details(serde_json::json!({ "error": message })),
                )
                .await;
            }
        }
    }

    /// Warn once about old pending tasks that cannot become eligible yet.
    async fn check_stalls(&self) {
        // Thresholds past chrono's range can never be reached.
        let Some(threshold) = i64::try_from(self.config.stall_warning_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
        else {
            return;
        };
        let now = Utc::now();
        let stalled: Vec<(Task, String)> = {
            let queue = self.queue.read().await;
            let mut reported = self.stalled.lock();
            let mut found = Vec::new();
            for task in queue.with_status(TaskStatus::Pending) {
                if now - task.created_at < threshold || reported.contains(&task.id) {
                    continue;
                }
                let reason = if queue.in_cycle(task.id) {
                    "dependency cycle".to_string()
                } else {
                    match queue.dependency_state(task) {
                        DependencyState::Satisfied => continue,
                        DependencyState::Waiting(ids) => {
                            format!("waiting on {} dependencies", ids.len())
                        }
                        DependencyState::Blocked(ids) => {
                            format!("{} dependencies failed", ids.len())
                        }
                        DependencyState::Missing(ids) => {
                            format!("{} dependencies unknown", ids.len())
                        }
                    }
                };
                reported.insert(task.id);
                found.push((task.clone(), reason));
            }
            found
        };

        for (task, reason) in stalled {
            warn!(task_id = %task.id, task_type = %task.task_type, reason = %reason, "Task stalled");
            self.record(
                SystemEvent::for_task(EventKind::TaskStalled, &task, "Task stalled")
                    .with_details(serde_json::json!({
                        "type": task.task_type,
                        "reason": reason,
                        "dependencies": task.dependencies,
                    })),
            )
            .await;
        }
    }

    async fn refresh_metrics(&self) -> MetricsSnapshot {
        let tasks = self.snapshot_tasks().await;
        let scores = self.scorer.score(&tasks);
        let gate_open = self.gate.lock().is_open();
        let last_deployment = *self.last_deployment.read();
        let active_agents = self.agents.active_agents().await;
        let snapshot =
            MetricsAggregator::compute(&tasks, scores, gate_open, last_deployment, active_agents);
        *self.metrics.write() = snapshot.clone();
        snapshot
    }
}
