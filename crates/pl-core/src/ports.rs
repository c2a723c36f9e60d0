//! Boundary traits to external collaborators.
//!
//! Storage, paths, notification display and the pull client are owned by
//! the surrounding application; the engine only sees these narrow
//! interfaces.

use crate::content::ContentIndex;
use crate::error::SyncError;
use crate::hash::ContentFingerprint;
use crate::ids::{PasteId, PeerId, TaskId};
use crate::notify::NotificationMessage;
use crate::paste::PasteEntry;
use crate::task::PasteTask;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Read access to the clipboard history store.
#[async_trait]
pub trait EntryStorePort: Send + Sync {
    async fn get_entry(&self, peer_id: &PeerId, paste_id: PasteId) -> Result<Option<PasteEntry>>;

    async fn mark_deleted(&self, paste_id: PasteId) -> Result<()>;

    /// Entries with id greater than `after`, up to `limit`, used by
    /// batch export operations.
    async fn entries_needing_export(&self, after: PasteId, limit: usize)
        -> Result<Vec<PasteEntry>>;
}

/// Logical file-type categories the engine persists bytes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileCategory {
    Icon,
    Temp,
    ReceivedFile,
}

/// Maps (category, relative name) to an absolute storage location,
/// creating the containing directory as needed.
#[async_trait]
pub trait PathProviderPort: Send + Sync {
    async fn resolve(&self, category: FileCategory, relative: &str) -> Result<PathBuf>;
}

/// UI/log layer that displays coalesced notifications. Must not block.
pub trait NotificationSinkPort: Send + Sync {
    fn deliver(&self, message: NotificationMessage);
}

/// Durable task records for the task engine.
#[async_trait]
pub trait TaskStorePort: Send + Sync {
    async fn save(&self, task: &PasteTask) -> Result<()>;

    async fn update(&self, task: &PasteTask) -> Result<()>;

    /// Tasks that should run: pending ones plus executions interrupted
    /// by a crash.
    async fn load_due(&self) -> Result<Vec<PasteTask>>;

    async fn remove(&self, task_id: &TaskId) -> Result<()>;
}

/// Request/response client toward one peer, implemented by `pl-network`.
#[async_trait]
pub trait PullClientPort: Send + Sync {
    async fn pull_icon(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        source: &str,
    ) -> Result<Vec<u8>, SyncError>;

    async fn pull_index(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        paste_id: PasteId,
    ) -> Result<ContentIndex, SyncError>;

    async fn pull_chunk(
        &self,
        host: &str,
        port: u16,
        peer_id: &PeerId,
        fingerprint: ContentFingerprint,
    ) -> Result<Vec<u8>, SyncError>;
}

/// External renderer driven by render tasks (e.g. rich text to image).
#[async_trait]
pub trait RendererPort: Send + Sync {
    async fn render(&self, entry: &PasteEntry) -> Result<Vec<u8>>;
}
