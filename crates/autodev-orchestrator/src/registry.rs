use crate::types::{AgentProfile, AgentState, WorkerStatus};
use autodev_core::TaskType;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Holds one agent per enabled task type and its busy/free flag.
///
/// Acquire and release are paired: `try_acquire` binds a free agent to a task,
/// `release` frees it only if it is still bound to that same task, so a
/// repeated or late release is a no-op.
pub struct AgentRegistry {
    states: Arc<RwLock<HashMap<TaskType, AgentState>>>,
}

impl AgentRegistry {
    /// An empty registry. Agents exist only after [`provision`](Self::provision).
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the roster with fresh idle agents for `profiles`.
    pub async fn provision(&self, profiles: Vec<AgentProfile>) -> usize {
        let mut states = self.states.write().await;
        states.clear();
        for profile in profiles {
            states.insert(profile.task_type, AgentState::idle(profile));
        }
        states.len()
    }

    /// Remove every agent.
    pub async fn teardown(&self) {
        self.states.write().await.clear();
    }

    /// Bind the agent for `task_type` to `task_id` if it exists and is idle.
    /// Returns the agent id on success.
    pub async fn try_acquire(&self, task_type: TaskType, task_id: Uuid) -> Option<String> {
        let mut states = self.states.write().await;
        let state = states.get_mut(&task_type)?;
        if !state.is_free() {
            return None;
        }
        state.status = WorkerStatus::Working;
        state.current_task = Some(task_id);
        state.last_activity = Utc::now();
        Some(state.id.clone())
    }

    /// Bind unconditionally. Used when re-provisioning while executions are in flight.
    pub async fn bind(&self, task_type: TaskType, task_id: Uuid) -> bool {
        let mut states = self.states.write().await;
        match states.get_mut(&task_type) {
            Some(state) => {
                state.status = WorkerStatus::Working;
                state.current_task = Some(task_id);
                true
            }
            None => false,
        }
    }

    /// Free the agent if it is bound to `task_id`. Returns whether anything changed.
    pub async fn release(&self, task_type: TaskType, task_id: Uuid) -> bool {
        let mut states = self.states.write().await;
        match states.get_mut(&task_type) {
            Some(state) if state.current_task == Some(task_id) => {
                state.current_task = None;
                state.status = WorkerStatus::Idle;
                state.last_activity = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Count a finished task against the agent for `task_type`.
    pub async fn record_outcome(&self, task_type: TaskType, success: bool) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&task_type) {
            if success {
                state.metrics.tasks_completed += 1;
            } else {
                state.metrics.tasks_failed += 1;
            }
        }
    }

    /// Free every busy agent whose bound task is not in `in_progress`.
    /// Returns the ids of the agents that were freed.
    pub async fn reconcile(&self, in_progress: &HashSet<Uuid>) -> Vec<String> {
        let mut states = self.states.write().await;
        let mut freed = Vec::new();
        for state in states.values_mut() {
            if state.status == WorkerStatus::Idle {
                continue;
            }
            let live = state
                .current_task
                .is_some_and(|id| in_progress.contains(&id));
            if !live {
                state.current_task = None;
                state.status = WorkerStatus::Idle;
                freed.push(state.id.clone());
            }
        }
        freed.sort();
        freed
    }

    /// Ids of all provisioned agents, sorted.
    pub async fn active_agents(&self) -> Vec<String> {
        let states = self.states.read().await;
        let mut ids: Vec<String> = states.values().map(|s| s.id.clone()).collect();
        ids.sort();
        ids
    }

    /// Get a snapshot of all agent states, ordered by task type.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let states = self.states.read().await;
        let mut all: Vec<AgentState> = states.values().cloned().collect();
        all.sort_by_key(|s| s.profile.task_type);
        all
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
