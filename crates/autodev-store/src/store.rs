use async_trait::async_trait;
use autodev_core::{AutodevError, AutodevResult, SystemEvent, Task, TaskStatus};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Durable record of tasks and system events.
///
/// Task records are keyed by id. Events are append-only and returned in
/// insertion order.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new record. Fails if the id is already present.
    async fn create(&self, task: &Task) -> AutodevResult<()>;
    /// Overwrite an existing record. Fails with `TaskNotFound` if absent.
    async fn update(&self, task: &Task) -> AutodevResult<()>;
    async fn get(&self, id: Uuid) -> AutodevResult<Option<Task>>;
    /// All records, oldest first.
    async fn list(&self) -> AutodevResult<Vec<Task>>;
    async fn append_event(&self, event: &SystemEvent) -> AutodevResult<()>;
    async fn events(&self) -> AutodevResult<Vec<SystemEvent>>;

    /// Records currently in `status`, oldest first.
    async fn query(&self, status: TaskStatus) -> AutodevResult<Vec<Task>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }
}

/// File-based task store: `tasks/<id>.json` per record and an append-only
/// `events.jsonl`.
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    pub async fn new(dir: PathBuf) -> AutodevResult<Self> {
        tokio::fs::create_dir_all(dir.join("tasks")).await?;
        Ok(Self { dir })
    }

    fn task_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("tasks").join(format!("{id}.json"))
    }

    fn temp_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("tasks").join(format!("{id}.json.tmp"))
    }

    fn events_path(&self) -> PathBuf {
        self.dir.join("events.jsonl")
    }

    /// Write to a sibling temp file, then rename over the record so a crash
    /// never leaves a truncated record behind.
    async fn write(&self, task: &Task) -> AutodevResult<()> {
        let json = serde_json::to_string_pretty(task)?;
        let tmp = self.temp_path(task.id);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, self.task_path(task.id)).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn create(&self, task: &Task) -> AutodevResult<()> {
        if tokio::fs::try_exists(self.task_path(task.id)).await? {
            return Err(AutodevError::Store(format!(
                "task {} already exists",
                task.id
            )));
        }
        self.write(task).await
    }

    async fn update(&self, task: &Task) -> AutodevResult<()> {
        if !tokio::fs::try_exists(self.task_path(task.id)).await? {
            return Err(AutodevError::TaskNotFound(task.id));
        }
        self.write(task).await
    }

    async fn get(&self, id: Uuid) -> AutodevResult<Option<Task>> {
        let path = self.task_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let task: Task = serde_json::from_str(&data)
            .map_err(|e| AutodevError::Store(format!("Failed to parse task {id}: {e}")))?;
        Ok(Some(task))
    }

    async fn list(&self) -> AutodevResult<Vec<Task>> {
        let mut entries = tokio::fs::read_dir(self.dir.join("tasks")).await?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(id) = name
                .strip_suffix(".json")
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            match self.get(id).await {
                Ok(Some(task)) => tasks.push(task),
                Ok(None) => {}
                Err(e) => warn!(task_id = %id, error = %e, "Skipping unreadable task record"),
            }
        }
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    async fn append_event(&self, event: &SystemEvent) -> AutodevResult<()> {
        let line = format!("{}\n", serde_json::to_string(event)?);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn events(&self) -> AutodevResult<Vec<SystemEvent>> {
        let path = self.events_path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(path).await?;
        let mut events = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<SystemEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "Skipping malformed event line"),
            }
        }
        Ok(events)
    }
}
