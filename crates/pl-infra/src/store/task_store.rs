//! File-backed durable task records, one JSON document per task.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pl_core::ids::TaskId;
use pl_core::ports::TaskStorePort;
use pl_core::task::{PasteTask, TaskState};
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_of(&self, task_id: &TaskId) -> PathBuf {
        self.dir.join(format!("{task_id}.json"))
    }

    async fn write(&self, task: &PasteTask) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create task dir {}", self.dir.display()))?;
        let bytes = serde_json::to_vec_pretty(task)?;
        crate::fs::write_atomic(&self.path_of(&task.task_id), &bytes).await
    }
}

#[async_trait]
impl TaskStorePort for FileTaskStore {
    async fn save(&self, task: &PasteTask) -> Result<()> {
        self.write(task).await
    }

    async fn update(&self, task: &PasteTask) -> Result<()> {
        self.write(task).await
    }

    async fn load_due(&self) -> Result<Vec<PasteTask>> {
        let mut due = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(due),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(entry.path()).await?;
            match serde_json::from_slice::<PasteTask>(&bytes) {
                // Executing means a crash interrupted the attempt; the
                // executor is idempotent, run it again.
                Ok(mut task)
                    if matches!(task.state, TaskState::Pending | TaskState::Executing) =>
                {
                    task.state = TaskState::Pending;
                    due.push(task);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "skipping unreadable task record");
                }
            }
        }

        due.sort_by_key(|t| t.created_at_ms);
        Ok(due)
    }

    async fn remove(&self, task_id: &TaskId) -> Result<()> {
        match fs::remove_file(self.path_of(task_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
