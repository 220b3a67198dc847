use crate::store::TaskStore;
use async_trait::async_trait;
use autodev_core::{AutodevError, AutodevResult, SystemEvent, Task};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Task store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
    events: RwLock<Vec<SystemEvent>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-existing records, e.g. to simulate a restart.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        {
            let mut map = store.tasks.write();
            for task in tasks {
                map.insert(task.id, task);
            }
        }
        store
    }

    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: &Task) -> AutodevResult<()> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(AutodevError::Store(format!(
                "task {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> AutodevResult<()> {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => Err(AutodevError::TaskNotFound(task.id)),
        }
    }

    async fn get(&self, id: Uuid) -> AutodevResult<Option<Task>> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn list(&self) -> AutodevResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    async fn append_event(&self, event: &SystemEvent) -> AutodevResult<()> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn events(&self) -> AutodevResult<Vec<SystemEvent>> {
        Ok(self.events.read().clone())
    }
}
