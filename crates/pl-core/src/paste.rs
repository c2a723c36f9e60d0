//! Paste entry model as seen by the sync engine.
//!
//! The engine never touches the raw persistence format; it reads these
//! projections through [`crate::ports::EntryStorePort`].

use crate::hash::ContentDigest;
use crate::ids::{PasteId, PeerId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file referenced by a paste entry, on the device that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteFileRef {
    /// Name within the paste (no directories).
    pub file_name: String,
    /// Absolute location on the owning device.
    pub absolute_path: PathBuf,
    pub size: u64,
    pub digest: Option<ContentDigest>,
}

/// Projection of a clipboard entry relevant to synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteEntry {
    /// Device that captured the entry.
    pub peer_id: PeerId,
    pub paste_id: PasteId,
    pub created_at_ms: i64,
    /// Origin of the entry (e.g. a URL) used as favicon source key.
    pub source: Option<String>,
    pub files: Vec<PasteFileRef>,
    pub deleted: bool,
}

impl PasteEntry {
    /// Date bucket used in the per-paste relative path scheme.
    pub fn date_bucket(&self) -> String {
        use chrono::TimeZone;
        chrono::Utc
            .timestamp_millis_opt(self.created_at_ms)
            .single()
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string()
    }
}
