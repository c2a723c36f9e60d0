//! Serving side of the pull protocol.
//!
//! Answers icon, index and chunk requests against local state. Absent
//! resources answer `NotFound`; only real faults (I/O, indexing) become
//! protocol errors, so the client can tell "not here" from "broken".

use async_trait::async_trait;
use pl_core::content::{relative_path, ContentIndex};
use pl_core::error::ErrorCode;
use pl_core::hash::ContentFingerprint;
use pl_core::ids::{PasteId, PeerId};
use pl_core::paste::PasteEntry;
use pl_core::ports::{EntryStorePort, FileCategory, PathProviderPort};
use pl_infra::{build_index, ChunkLocator, IndexEntry};
use pl_network::{PullHandler, PullRequest, PullResponse};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct PullService {
    local_peer_id: PeerId,
    entries: Arc<dyn EntryStorePort>,
    paths: Arc<dyn PathProviderPort>,
    chunk_size: u32,
    /// Chunks of every index served so far, addressable by fingerprint.
    locator: RwLock<ChunkLocator>,
}

impl PullService {
    pub fn new(
        local_peer_id: PeerId,
        entries: Arc<dyn EntryStorePort>,
        paths: Arc<dyn PathProviderPort>,
        chunk_size: u32,
    ) -> Self {
        Self {
            local_peer_id,
            entries,
            paths,
            chunk_size,
            locator: RwLock::new(ChunkLocator::new()),
        }
    }

    async fn serve_icon(&self, source: &str) -> PullResponse {
        let relative = format!("{source}.png");
        let path = match self.paths.resolve(FileCategory::Icon, &relative).await {
            Ok(path) => path,
            Err(err) => {
                warn!(source, %err, "icon path rejected");
                return PullResponse::NotFound;
            }
        };
        match fs::read(&path).await {
            Ok(bytes) => PullResponse::Icon(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PullResponse::NotFound,
            Err(err) => PullResponse::Error {
                code: ErrorCode::LocalIoError,
                message: format!("read icon {source}: {err}"),
            },
        }
    }

    async fn serve_index(&self, paste_id: PasteId) -> PullResponse {
        let entry = match self.entries.get_entry(&self.local_peer_id, paste_id).await {
            Ok(Some(entry)) if !entry.deleted => entry,
            Ok(_) => return PullResponse::NotFound,
            Err(err) => {
                return PullResponse::Error {
                    code: ErrorCode::LocalIoError,
                    message: format!("load entry {paste_id}: {err}"),
                }
            }
        };

        match self.build_entry_index(&entry).await {
            Ok(index) => {
                debug!(%paste_id, files = index.files.len(), "served index");
                PullResponse::Index(index)
            }
            Err(err) => PullResponse::Error {
                code: ErrorCode::LocalIoError,
                message: format!("index paste {paste_id}: {err}"),
            },
        }
    }

    async fn build_entry_index(&self, entry: &PasteEntry) -> anyhow::Result<ContentIndex> {
        let bucket = entry.date_bucket();
        let mut absolute_of: HashMap<String, PathBuf> = HashMap::new();
        let mut index_entries = Vec::with_capacity(entry.files.len());
        for file in &entry.files {
            let relative = relative_path(&entry.peer_id, &bucket, entry.paste_id, &file.file_name);
            absolute_of.insert(relative.clone(), file.absolute_path.clone());
            index_entries.push(IndexEntry {
                absolute_path: file.absolute_path.clone(),
                relative_path: relative,
            });
        }

        let index = build_index(&index_entries, self.chunk_size).await?;

        let mut locator = self.locator.write().await;
        locator.add_index(&index, |relative| {
            absolute_of.get(relative).cloned().unwrap_or_default()
        });
        Ok(index)
    }

    async fn serve_chunk(&self, fingerprint: ContentFingerprint) -> PullResponse {
        let locator = self.locator.read().await;
        match locator.lookup_chunk(fingerprint).await {
            Ok(Some(bytes)) => PullResponse::Chunk(bytes),
            Ok(None) => PullResponse::NotFound,
            Err(err) => PullResponse::Error {
                code: ErrorCode::LocalIoError,
                message: format!("read chunk {fingerprint}: {err}"),
            },
        }
    }
}

#[async_trait]
impl PullHandler for PullService {
    async fn handle(&self, peer_id: &PeerId, request: PullRequest) -> PullResponse {
        debug!(%peer_id, ?request, "pull request");
        match request {
            PullRequest::Icon { source } => self.serve_icon(&source).await,
            PullRequest::Index { paste_id } => self.serve_index(paste_id).await,
            PullRequest::Chunk { fingerprint } => self.serve_chunk(fingerprint).await,
        }
    }
}
