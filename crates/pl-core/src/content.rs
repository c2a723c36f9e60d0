//! Content-addressed index model.
//!
//! A `ContentIndex` is a manifest for the files belonging to one paste
//! entry: each file is partitioned into fixed-size chunks (the final
//! chunk may be short) and identified by the ordered list of chunk
//! fingerprints. Concatenating a file's chunks in order reproduces the
//! original bytes exactly.

use crate::hash::{ContentDigest, ContentFingerprint};
use crate::ids::{PasteId, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default chunk size, protocol-visible. Receivers must honor the
/// sender's declared value, not this constant.
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;

/// One fixed-size slice of a file, identified by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub fingerprint: ContentFingerprint,
    pub size: u32,
}

/// A relative path plus the ordered chunks that reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    pub relative_path: String,
    pub size: u64,
    /// SHA-256 of the whole file, verified after reassembly.
    pub digest: ContentDigest,
    /// Empty for zero-length files.
    pub chunks: Vec<ContentChunk>,
}

/// Ordered mapping from relative path to file manifest, built
/// deterministically from the file set of one paste entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIndex {
    /// Chunk size used at build time. Carried with the index so the
    /// pulling side uses the sender's value.
    pub chunk_size: u32,
    pub files: BTreeMap<String, ContentFile>,
}

impl ContentIndex {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, file: ContentFile) {
        self.files.insert(file.relative_path.clone(), file);
    }

    /// Fingerprints not present in `have`, deduplicated, in index order.
    /// Empty once every chunk is locally present.
    pub fn missing_chunks(&self, have: &HashSet<ContentFingerprint>) -> Vec<ContentFingerprint> {
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for file in self.files.values() {
            for chunk in &file.chunks {
                if !have.contains(&chunk.fingerprint) && seen.insert(chunk.fingerprint) {
                    missing.push(chunk.fingerprint);
                }
            }
        }
        missing
    }

    /// Total number of chunk references, duplicates included.
    pub fn chunk_count(&self) -> usize {
        self.files.values().map(|f| f.chunks.len()).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }
}

/// Fixed per-paste relative path scheme: `{peer_id}/{date_bucket}/{paste_id}/{name}`.
pub fn relative_path(peer_id: &PeerId, date_bucket: &str, paste_id: PasteId, name: &str) -> String {
    format!("{peer_id}/{date_bucket}/{paste_id}/{name}")
}
