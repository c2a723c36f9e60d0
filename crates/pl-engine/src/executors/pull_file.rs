//! Pull the files of one paste entry from its origin device.
//!
//! The transfer is chunk-addressed: pull the entry's content index,
//! fetch only the chunks not already cached, then reassemble each file
//! and verify its whole-file digest before it becomes visible at its
//! final path.

use crate::coordinator::SyncCoordinator;
use crate::executor::TaskExecutor;
use async_trait::async_trait;
use pl_core::error::ErrorCode;
use pl_core::hash::{fingerprint, Digester};
use pl_core::ports::{FileCategory, PathProviderPort, PullClientPort};
use pl_core::task::{PasteTask, TaskOutcome, TaskType};
use pl_infra::{write_atomic, ChunkCache};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct PullFileExecutor {
    coordinator: Arc<SyncCoordinator>,
    client: Arc<dyn PullClientPort>,
    paths: Arc<dyn PathProviderPort>,
    cache: Arc<ChunkCache>,
}

impl PullFileExecutor {
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        client: Arc<dyn PullClientPort>,
        paths: Arc<dyn PathProviderPort>,
        cache: Arc<ChunkCache>,
    ) -> Self {
        Self {
            coordinator,
            client,
            paths,
            cache,
        }
    }
}

#[async_trait]
impl TaskExecutor for PullFileExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::PullFile
    }

    fn resource_key(&self, task: &PasteTask) -> String {
        task.paste_id.to_string()
    }

    async fn execute(&self, task: &PasteTask) -> TaskOutcome {
        let Some((host, port)) = self.coordinator.connect_address(&task.peer_id).await else {
            return TaskOutcome::fail(
                ErrorCode::CantGetSyncAddress,
                format!("no connect address for {}", task.peer_id),
            );
        };

        let index = match self
            .client
            .pull_index(&host, port, &task.peer_id, task.paste_id)
            .await
        {
            Ok(index) => index,
            Err(err) => return TaskOutcome::fail(err.code, err.message),
        };

        let have = match self.cache.have_set().await {
            Ok(have) => have,
            Err(err) => {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("scan chunk cache: {err}"),
                )
            }
        };

        let missing = index.missing_chunks(&have);
        debug!(
            paste_id = %task.paste_id,
            total = index.chunk_count(),
            missing = missing.len(),
            "pulling chunks"
        );

        for fp in missing {
            let bytes = match self.client.pull_chunk(&host, port, &task.peer_id, fp).await {
                Ok(bytes) => bytes,
                Err(err) => return TaskOutcome::fail(err.code, err.message),
            };
            // Corrupt chunk bytes would poison the cache; verify first.
            if fingerprint(&bytes) != fp {
                return TaskOutcome::fail_terminal(
                    ErrorCode::DigestMismatch,
                    format!("chunk {fp} bytes do not match fingerprint"),
                );
            }
            if let Err(err) = self.cache.store(fp, &bytes).await {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("cache chunk {fp}: {err}"),
                );
            }
        }

        for (relative, file) in &index.files {
            let path = match self.paths.resolve(FileCategory::ReceivedFile, relative).await {
                Ok(path) => path,
                Err(err) => {
                    return TaskOutcome::fail_terminal(
                        ErrorCode::LocalIoError,
                        format!("resolve {relative}: {err}"),
                    )
                }
            };
            // Reassembled on an earlier attempt.
            if fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }

            let mut assembled = Vec::with_capacity(file.size as usize);
            let mut digester = Digester::new();
            for chunk in &file.chunks {
                let bytes = match self.cache.read(chunk.fingerprint).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        return TaskOutcome::fail_terminal(
                            ErrorCode::LocalIoError,
                            format!("read cached chunk {}: {err}", chunk.fingerprint),
                        )
                    }
                };
                digester.update(&bytes);
                assembled.extend_from_slice(&bytes);
            }

            if digester.finish() != file.digest {
                return TaskOutcome::fail_terminal(
                    ErrorCode::DigestMismatch,
                    format!("digest mismatch for {relative}"),
                );
            }

            if let Err(err) = write_atomic(&path, &assembled).await {
                return TaskOutcome::fail_terminal(
                    ErrorCode::LocalIoError,
                    format!("write {relative}: {err}"),
                );
            }
            info!(%relative, size = file.size, "file received");
        }

        TaskOutcome::Success
    }
}
