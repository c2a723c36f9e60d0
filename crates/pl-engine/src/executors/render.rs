//! Render a paste entry into a preview image via the renderer port.

use crate::executor::TaskExecutor;
use async_trait::async_trait;
use pl_core::error::ErrorCode;
use pl_core::ports::{EntryStorePort, FileCategory, PathProviderPort, RendererPort};
use pl_core::task::{PasteTask, TaskOutcome, TaskType};
use pl_infra::write_atomic;
use std::sync::Arc;
use tokio::fs;

pub struct RenderExecutor {
    entries: Arc<dyn EntryStorePort>,
    renderer: Arc<dyn RendererPort>,
    paths: Arc<dyn PathProviderPort>,
}

impl RenderExecutor {
    pub fn new(
        entries: Arc<dyn EntryStorePort>,
        renderer: Arc<dyn RendererPort>,
        paths: Arc<dyn PathProviderPort>,
    ) -> Self {
        Self {
            entries,
            renderer,
            paths,
        }
    }
}

#[async_trait]
impl TaskExecutor for RenderExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Render
    }

    fn resource_key(&self, task: &PasteTask) -> String {
        task.paste_id.to_string()
    }

    async fn execute(&self, task: &PasteTask) -> TaskOutcome {
        let relative = format!("{}-{}.png", task.peer_id, task.paste_id);
        let path = match self.paths.resolve(FileCategory::Temp, &relative).await {
            Ok(path) => path,
            Err(err) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("resolve preview path: {err}"),
                )
            }
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            return TaskOutcome::Success;
        }

        let entry = match self.entries.get_entry(&task.peer_id, task.paste_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::EntryNotFound,
                    format!("paste {} not in store", task.paste_id),
                )
            }
            Err(err) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("load entry: {err}"),
                )
            }
        };

        let bytes = match self.renderer.render(&entry).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::UnknownError,
                    format!("render paste {}: {err}", task.paste_id),
                )
            }
        };

        match write_atomic(&path, &bytes).await {
            Ok(()) => TaskOutcome::Success,
            Err(err) => TaskOutcome::fail_terminal(
                ErrorCode::LocalIoError,
                format!("write preview: {err}"),
            ),
        }
    }
}
