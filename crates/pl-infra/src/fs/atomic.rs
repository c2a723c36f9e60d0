//! Atomic file visibility.
//!
//! Received bytes are written to a temporary sibling and renamed into
//! place, so a partial write from a crashed transfer is never observed
//! as a complete file.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("payload");
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("write temp file {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path).await {
        // Leave no orphan temp file behind on a failed rename.
        let _ = fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("rename into {}", path.display()));
    }
    Ok(())
}
