use autodev_core::{AutodevError, AutodevResult, Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Why a pending task can or cannot be admitted right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyState {
    /// Every dependency is completed.
    Satisfied,
    /// Some dependencies are still pending or in progress.
    Waiting(Vec<Uuid>),
    /// Some dependency failed; the task will never become eligible.
    Blocked(Vec<Uuid>),
    /// Some dependency id is unknown; the task will never become eligible.
    Missing(Vec<Uuid>),
}

/// The backlog plus history of every task, with dependency resolution.
///
/// Eligibility is recomputed from current statuses on every call, so a
/// completion unblocks its dependents without any extra bookkeeping.
pub struct TaskQueue {
    tasks: HashMap<Uuid, Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Add a new pending task.
    pub fn enqueue(&mut self, task: Task) -> AutodevResult<Uuid> {
        if task.status != TaskStatus::Pending {
            return Err(AutodevError::Config(format!(
                "only pending tasks can be enqueued, {} is {}",
                task.id, task.status
            )));
        }
        if self.tasks.contains_key(&task.id) {
            return Err(AutodevError::Config(format!(
                "task {} is already queued",
                task.id
            )));
        }
        let id = task.id;
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Insert a record loaded from storage, whatever its status.
    pub fn restore(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Classify the dependencies of `task` against current statuses.
    pub fn dependency_state(&self, task: &Task) -> DependencyState {
        let mut missing = Vec::new();
        let mut failed = Vec::new();
        let mut waiting = Vec::new();
        for dep in &task.dependencies {
            match self.tasks.get(dep).map(|t| t.status) {
                None => missing.push(*dep),
                Some(TaskStatus::Failed) => failed.push(*dep),
                Some(TaskStatus::Completed) => {}
                Some(_) => waiting.push(*dep),
            }
        }
        if !missing.is_empty() {
            DependencyState::Missing(missing)
        } else if !failed.is_empty() {
            DependencyState::Blocked(failed)
        } else if !waiting.is_empty() {
            DependencyState::Waiting(waiting)
        } else {
            DependencyState::Satisfied
        }
    }

    /// Pending with every dependency completed.
    pub fn is_eligible(&self, task: &Task) -> bool {
        task.status == TaskStatus::Pending
            && self.dependency_state(task) == DependencyState::Satisfied
    }

    /// All eligible tasks, critical first, then oldest first.
    pub fn next_eligible(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| self.is_eligible(t))
            .collect();
        ready.sort_by_key(|t| (Reverse(t.priority), t.created_at, t.id));
        ready
    }

    /// pending → in-progress. Refuses tasks that are not eligible.
    pub fn admit(&mut self, id: Uuid, agent_id: &str, now: DateTime<Utc>) -> AutodevResult<&Task> {
        let task = self.tasks.get(&id).ok_or(AutodevError::TaskNotFound(id))?;
        if task.status == TaskStatus::Pending && !self.is_eligible(task) {
            return Err(AutodevError::Config(format!(
                "task {id} has unmet dependencies: {:?}",
                self.dependency_state(task)
            )));
        }
        let task = self.tasks.get_mut(&id).ok_or(AutodevError::TaskNotFound(id))?;
        task.admit(agent_id, now)?;
        Ok(task)
    }

    /// in-progress → completed.
    pub fn complete(
        &mut self,
        id: Uuid,
        output: serde_json::Value,
        now: DateTime<Utc>,
    ) -> AutodevResult<&Task> {
        let task = self.tasks.get_mut(&id).ok_or(AutodevError::TaskNotFound(id))?;
        task.complete(output, now)?;
        Ok(task)
    }

    /// in-progress → failed.
    pub fn fail(&mut self, id: Uuid, error: &str, now: DateTime<Utc>) -> AutodevResult<&Task> {
        let task = self.tasks.get_mut(&id).ok_or(AutodevError::TaskNotFound(id))?;
        task.fail(error, now)?;
        Ok(task)
    }

    /// Pending tasks that list `id` among their dependencies.
    pub fn dependents_of(&self, id: Uuid) -> Vec<&Task> {
        let mut dependents: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.dependencies.contains(&id))
            .collect();
        dependents.sort_by_key(|t| (t.created_at, t.id));
        dependents
    }

    /// List all tasks, oldest first.
    pub fn all_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        tasks
    }

    pub fn with_status(&self, status: TaskStatus) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().filter(|t| t.status == status).collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        tasks
    }

    pub fn in_progress_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count()
    }

    /// Total number of tasks.
    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether `id` can reach itself through its dependencies.
    pub fn in_cycle(&self, id: Uuid) -> bool {
        let Some(start) = self.tasks.get(&id) else {
            return false;
        };
        let mut stack: Vec<Uuid> = start.dependencies.clone();
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if next == id {
                return true;
            }
            if !seen.insert(next) {
                continue;
            }
            if let Some(task) = self.tasks.get(&next) {
                stack.extend(task.dependencies.iter().copied());
            }
        }
        false
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use autodev_core::{NewTask, TaskPriority, TaskType};
    use chrono::Duration;

    fn at(offset_secs: i64, task_type: TaskType, priority: TaskPriority) -> Task {
        let base = Utc::now();
        Task::create(
            NewTask::new(task_type, format!("{task_type} task")).with_priority(priority),
            base + Duration::seconds(offset_secs),
        )
    }

    fn finish(queue: &mut TaskQueue, id: Uuid) {
        let agent = queue.get(id).unwrap().task_type.agent_id();
        queue.admit(id, &agent, Utc::now()).unwrap();
        queue.complete(id, serde_json::Value::Null, Utc::now()).unwrap();
    }

    #[test]
    fn test_empty_queue() {
        let queue = TaskQueue::new();
        assert_eq!(queue.total_count(), 0);
        assert_eq!(queue.in_progress_count(), 0);
        assert!(queue.next_eligible().is_empty());
    }

    #[test]
    fn test_enqueue_rejects_non_pending() {
        let mut queue = TaskQueue::new();
        let mut task = Task::new(TaskType::Api, "hub");
        task.admit("api-agent", Utc::now()).unwrap();
        assert!(queue.enqueue(task).is_err());
        assert_eq!(queue.total_count(), 0);
    }

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let mut queue = TaskQueue::new();
        let task = Task::new(TaskType::Api, "hub");
        queue.enqueue(task.clone()).unwrap();
        assert!(queue.enqueue(task).is_err());
        assert_eq!(queue.total_count(), 1);
    }

    #[test]
    fn test_priority_then_age_ordering() {
        let mut queue = TaskQueue::new();
        let old_low = at(0, TaskType::Research, TaskPriority::Low);
        let old_high = at(1, TaskType::Backend, TaskPriority::High);
        let new_high = at(2, TaskType::Frontend, TaskPriority::High);
        let critical = at(3, TaskType::Security, TaskPriority::Critical);
        let (a, b, c, d) = (old_low.id, old_high.id, new_high.id, critical.id);
        for t in [new_high, old_low, critical, old_high] {
            queue.enqueue(t).unwrap();
        }

        let order: Vec<Uuid> = queue.next_eligible().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![d, b, c, a]);
    }

    #[test]
    fn test_dependency_unblocks_after_completion() {
        let mut queue = TaskQueue::new();
        let first = Task::new(TaskType::Database, "schema");
        let first_id = first.id;
        let second = Task::new(TaskType::Backend, "api").with_dependencies(vec![first_id]);
        let second_id = second.id;
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        let ready = queue.next_eligible();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, first_id);

        queue.admit(first_id, "database-agent", Utc::now()).unwrap();
        assert!(queue.next_eligible().is_empty());
        assert!(matches!(
            queue.dependency_state(queue.get(second_id).unwrap()),
            DependencyState::Waiting(_)
        ));

        queue
            .complete(first_id, serde_json::Value::Null, Utc::now())
            .unwrap();
        let ready = queue.next_eligible();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, second_id);
    }

    #[test]
    fn test_failed_dependency_blocks_forever() {
        let mut queue = TaskQueue::new();
        let dep = Task::new(TaskType::Testing, "suite");
        let dep_id = dep.id;
        let dependent = Task::new(TaskType::Deployment, "ship").with_dependencies(vec![dep_id]);
        let dependent_id = dependent.id;
        queue.enqueue(dep).unwrap();
        queue.enqueue(dependent).unwrap();

        queue.admit(dep_id, "testing-agent", Utc::now()).unwrap();
        queue.fail(dep_id, "red build", Utc::now()).unwrap();

        assert!(queue.next_eligible().is_empty());
        assert_eq!(
            queue.dependency_state(queue.get(dependent_id).unwrap()),
            DependencyState::Blocked(vec![dep_id])
        );
        assert_eq!(queue.get(dependent_id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_missing_dependency_is_ineligible() {
        let mut queue = TaskQueue::new();
        let ghost = Uuid::new_v4();
        let task = Task::new(TaskType::Api, "hub").with_dependencies(vec![ghost]);
        let id = task.id;
        queue.restore(task);
        assert!(queue.next_eligible().is_empty());
        assert_eq!(
            queue.dependency_state(queue.get(id).unwrap()),
            DependencyState::Missing(vec![ghost])
        );
    }

    #[test]
    fn test_admit_refuses_unmet_dependencies() {
        let mut queue = TaskQueue::new();
        let dep = Task::new(TaskType::Database, "schema");
        let task = Task::new(TaskType::Backend, "api").with_dependencies(vec![dep.id]);
        let id = task.id;
        queue.enqueue(dep).unwrap();
        queue.enqueue(task).unwrap();

        assert!(queue.admit(id, "backend-agent", Utc::now()).is_err());
        assert_eq!(queue.get(id).unwrap().status, TaskStatus::Pending);
        assert!(queue.get(id).unwrap().assigned_agent.is_none());
    }

    #[test]
    fn test_terminal_tasks_cannot_be_readmitted() {
        let mut queue = TaskQueue::new();
        let task = Task::new(TaskType::Research, "trends");
        let id = task.id;
        queue.enqueue(task).unwrap();
        finish(&mut queue, id);

        assert!(queue.admit(id, "research-agent", Utc::now()).is_err());
        assert!(queue.fail(id, "late", Utc::now()).is_err());
        assert_eq!(queue.get(id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_dependency_chain() {
        let mut queue = TaskQueue::new();
        let t1 = Task::new(TaskType::Database, "Schema");
        let t1_id = t1.id;
        let t2 = Task::new(TaskType::Backend, "Api").with_dependencies(vec![t1_id]);
        let t2_id = t2.id;
        let t3 = Task::new(TaskType::Testing, "Tests").with_dependencies(vec![t2_id]);
        let t3_id = t3.id;
        let t4 = Task::new(TaskType::Deployment, "Ship").with_dependencies(vec![t2_id, t3_id]);
        for t in [t1, t2, t3, t4] {
            queue.enqueue(t).unwrap();
        }

        assert_eq!(queue.next_eligible().len(), 1);
        finish(&mut queue, t1_id);
        assert_eq!(queue.next_eligible().len(), 1);
        finish(&mut queue, t2_id);
        assert_eq!(queue.next_eligible().len(), 1);
        finish(&mut queue, t3_id);
        assert_eq!(queue.next_eligible().len(), 1);
        assert_eq!(queue.with_status(TaskStatus::Completed).len(), 3);
    }

    #[test]
    fn test_dependents_of() {
        let mut queue = TaskQueue::new();
        let root = Task::new(TaskType::Backend, "api");
        let root_id = root.id;
        let a = Task::new(TaskType::Frontend, "ui").with_dependencies(vec![root_id]);
        let b = Task::new(TaskType::Api, "hub").with_dependencies(vec![root_id]);
        let c = Task::new(TaskType::Research, "trends");
        for t in [root, a, b, c] {
            queue.enqueue(t).unwrap();
        }
        assert_eq!(queue.dependents_of(root_id).len(), 2);

        finish(&mut queue, root_id);
        assert!(queue
            .dependents_of(root_id)
            .iter()
            .all(|t| queue.is_eligible(t)));
    }

    #[test]
    fn test_counts() {
        let mut queue = TaskQueue::new();
        let a = Task::new(TaskType::Backend, "a");
        let b = Task::new(TaskType::Frontend, "b");
        let c = Task::new(TaskType::Api, "c");
        let (a_id, b_id) = (a.id, b.id);
        for t in [a, b, c] {
            queue.enqueue(t).unwrap();
        }
        finish(&mut queue, a_id);
        queue.admit(b_id, "frontend-agent", Utc::now()).unwrap();

        assert_eq!(queue.in_progress_count(), 1);
        assert_eq!(queue.with_status(TaskStatus::Completed).len(), 1);
        assert_eq!(queue.with_status(TaskStatus::Pending).len(), 1);
        assert!(queue.with_status(TaskStatus::Failed).is_empty());
        assert_eq!(queue.with_status(TaskStatus::InProgress)[0].id, b_id);
    }

    #[test]
    fn test_acyclic_chain_is_not_a_cycle() {
        let mut queue = TaskQueue::new();
        let t1 = Task::new(TaskType::Database, "A");
        let t1_id = t1.id;
        queue.enqueue(t1).unwrap();
        let t2 = Task::new(TaskType::Backend, "B").with_dependencies(vec![t1_id]);
        let t2_id = t2.id;
        queue.enqueue(t2).unwrap();
        assert!(!queue.in_cycle(t2_id));
    }

    #[test]
    fn test_cycle_membership() {
        let mut queue = TaskQueue::new();
        let mut t1 = Task::new(TaskType::Database, "A");
        let mut t2 = Task::new(TaskType::Backend, "B");
        let t3 = Task::new(TaskType::Research, "C");
        t1.dependencies = vec![t2.id];
        t2.dependencies = vec![t1.id];
        let (id1, id3) = (t1.id, t3.id);

        queue.restore(t1);
        queue.restore(t2);
        queue.restore(t3);
        assert!(queue.in_cycle(id1));
        assert!(!queue.in_cycle(id3));
        assert_eq!(queue.next_eligible().len(), 1);
    }
}
