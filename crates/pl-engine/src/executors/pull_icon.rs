//! Pull a favicon from the peer that captured the paste entry.

use crate::coordinator::SyncCoordinator;
use crate::executor::TaskExecutor;
use async_trait::async_trait;
use pl_core::error::ErrorCode;
use pl_core::ports::{FileCategory, PathProviderPort, PullClientPort};
use pl_core::task::{PasteTask, TaskOutcome, TaskType};
use pl_infra::write_atomic;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

pub struct PullIconExecutor {
    coordinator: Arc<SyncCoordinator>,
    client: Arc<dyn PullClientPort>,
    paths: Arc<dyn PathProviderPort>,
}

impl PullIconExecutor {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        client: Arc<dyn PullClientPort>,
        paths: Arc<dyn PathProviderPort>,
    ) -> Self {
        Self {
            coordinator,
            client,
            paths,
        }
    }
}

#[async_trait]
impl TaskExecutor for PullIconExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::PullIcon
    }

    /// Icons are shared across pastes with the same source, so tasks
    /// serialize on the source key rather than on the paste.
    fn resource_key(&self, task: &PasteTask) -> String {
        task.extra
            .source
            .clone()
            .unwrap_or_else(|| task.paste_id.to_string())
    }

    async fn execute(&self, task: &PasteTask) -> TaskOutcome {
        let Some(source) = task.extra.source.as_deref() else {
            return TaskOutcome::fail_terminal(
                ErrorCode::UnknownError,
                "pull-icon task carries no source",
            );
        };

        let relative = format!("{source}.png");
        let path = match self.paths.resolve(FileCategory::Icon, &relative).await {
            Ok(path) => path,
            Err(err) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("resolve icon path: {err}"),
                )
            }
        };

        // A previous task for the same source already fetched it.
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(source, "icon already present");
            return TaskOutcome::Success;
        }

        let Some((host, port)) = self.coordinator.connect_address(&task.peer_id).await else {
            return TaskOutcome::fail(
                ErrorCode::CantGetSyncAddress,
                format!("no connect address for {}", task.peer_id),
            );
        };

        let bytes = match self.client.pull_icon(&host, port, &task.peer_id, source).await {
            Ok(bytes) => bytes,
            Err(err) => return TaskOutcome::fail(err.code, err.message),
        };

        match write_atomic(&path, &bytes).await {
            Ok(()) => TaskOutcome::Success,
            Err(err) => TaskOutcome::fail_terminal(
                ErrorCode::LocalIoError,
                format!("store icon {source}: {err}"),
            ),
        }
    }
}
