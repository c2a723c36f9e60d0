//! Local chunk cache on the pulling side.
//!
//! Chunks land here keyed by fingerprint so pastes sharing identical
//! file content are never transferred twice.

use crate::fs::write_atomic;
use anyhow::{Context, Result};
use pl_core::hash::ContentFingerprint;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;

pub struct ChunkCache {
    dir: PathBuf,
}

impl ChunkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_of(&self, fingerprint: ContentFingerprint) -> PathBuf {
        self.dir.join(format!("{fingerprint}.chunk"))
    }

    pub async fn contains(&self, fingerprint: ContentFingerprint) -> bool {
        fs::try_exists(self.path_of(fingerprint))
            .await
            .unwrap_or(false)
    }

    pub async fn store(&self, fingerprint: ContentFingerprint, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path_of(fingerprint), bytes).await
    }

    pub async fn read(&self, fingerprint: ContentFingerprint) -> Result<Vec<u8>> {
        fs::read(self.path_of(fingerprint))
            .await
            .with_context(|| format!("read cached chunk {fingerprint}"))
    }

    /// Fingerprints currently present, fed to `missing_chunks`.
    pub async fn have_set(&self) -> Result<HashSet<ContentFingerprint>> {
        let mut have = HashSet::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Cache dir not created yet: nothing cached.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(have),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(hex_part) = name.strip_suffix(".chunk") else {
                continue;
            };
            if let Ok(value) = u128::from_str_radix(hex_part, 16) {
                have.insert(ContentFingerprint(value));
            }
        }
        Ok(have)
    }
}
