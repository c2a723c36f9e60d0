//! Filesystem path provider.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use pl_core::ports::{FileCategory, PathProviderPort};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const ICONS_DIR: &str = "icons";
const TEMP_DIR: &str = "temp";
const FILES_DIR: &str = "files";

/// Resolves logical file categories under a single user-data root.
pub struct UserDataPathProvider {
    root: PathBuf,
}

impl UserDataPathProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn category_dir(&self, category: FileCategory) -> PathBuf {
        let sub = match category {
            FileCategory::Icon => ICONS_DIR,
            FileCategory::Temp => TEMP_DIR,
            FileCategory::ReceivedFile => FILES_DIR,
        };
        self.root.join(sub)
    }
}

/// Relative names come from the network; anything that could escape the
/// category directory is rejected.
fn validate_relative(relative: &str) -> Result<()> {
    let path = Path::new(relative);
    if path.is_absolute() {
        bail!("absolute path not allowed: {relative}");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => bail!("unsafe path component in {relative}"),
        }
    }
    Ok(())
}

#[async_trait]
impl PathProviderPort for UserDataPathProvider {
    async fn resolve(&self, category: FileCategory, relative: &str) -> Result<PathBuf> {
        validate_relative(relative)?;
        let path = self.category_dir(category).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        Ok(path)
    }
}
