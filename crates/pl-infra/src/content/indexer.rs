//! Content index construction and chunk serving.

use anyhow::{Context, Result};
use pl_core::content::{ContentChunk, ContentFile, ContentIndex};
use pl_core::hash::{ContentFingerprint, Digester, Fingerprinter};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

/// One file to index: where it lives plus its manifest path.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub absolute_path: PathBuf,
    pub relative_path: String,
}

/// Walk the given file references (only the files of one paste entry,
/// never directories at large) and build their content index.
///
/// Files are streamed in chunk-size reads, so indexing never buffers a
/// whole file. Zero-length files yield an empty chunk list.
pub async fn build_index(entries: &[IndexEntry], chunk_size: u32) -> Result<ContentIndex> {
    anyhow::ensure!(chunk_size > 0, "chunk size must be positive");

    let mut index = ContentIndex::new(chunk_size);
    for entry in entries {
        let file = index_file(entry, chunk_size)
            .await
            .with_context(|| format!("index {}", entry.absolute_path.display()))?;
        index.insert(file);
    }
    Ok(index)
}

async fn index_file(entry: &IndexEntry, chunk_size: u32) -> Result<ContentFile> {
    let mut file = File::open(&entry.absolute_path).await?;
    let mut buf = vec![0u8; chunk_size as usize];
    let mut chunks = Vec::new();
    let mut digester = Digester::new();
    let mut size: u64 = 0;

    loop {
        let read = read_up_to(&mut file, &mut buf).await?;
        if read == 0 {
            break;
        }
        let slice = &buf[..read];

        let mut hasher = Fingerprinter::new();
        hasher.update(slice);
        chunks.push(ContentChunk {
            fingerprint: hasher.finish(),
            size: read as u32,
        });
        digester.update(slice);
        size += read as u64;
    }

    debug!(
        path = %entry.relative_path,
        size,
        chunks = chunks.len(),
        "indexed file"
    );

    Ok(ContentFile {
        relative_path: entry.relative_path.clone(),
        size,
        digest: digester.finish(),
        chunks,
    })
}

/// Fill the buffer as far as the file allows; chunk boundaries must be
/// exact even when the reader returns short counts.
async fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Serves pull requests by chunk id without re-reading whole files.
///
/// Built from an index plus the absolute location of each indexed file;
/// each fingerprint maps to a (path, offset, size) byte range.
pub struct ChunkLocator {
    ranges: HashMap<ContentFingerprint, (PathBuf, u64, u32)>,
}

impl ChunkLocator {
    pub fn new() -> Self {
        Self {
            ranges: HashMap::new(),
        }
    }

    /// Register every chunk of `index`, resolving relative paths to
    /// absolute ones through `resolve`.
    pub fn add_index<F>(&mut self, index: &ContentIndex, mut resolve: F)
    where
        F: FnMut(&str) -> PathBuf,
    {
        for file in index.files.values() {
            let absolute = resolve(&file.relative_path);
            let mut offset = 0u64;
            for chunk in &file.chunks {
                self.ranges
                    .entry(chunk.fingerprint)
                    .or_insert_with(|| (absolute.clone(), offset, chunk.size));
                offset += chunk.size as u64;
            }
        }
    }

    pub fn contains(&self, fingerprint: ContentFingerprint) -> bool {
        self.ranges.contains_key(&fingerprint)
    }

    /// Read exactly the chunk's byte range from disk, or `None` for an
    /// unknown fingerprint.
    pub async fn lookup_chunk(
        &self,
        fingerprint: ContentFingerprint,
    ) -> Result<Option<Vec<u8>>> {
        let Some((path, offset, size)) = self.ranges.get(&fingerprint) else {
            return Ok(None);
        };

        let mut file = File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        file.seek(SeekFrom::Start(*offset)).await?;
        let mut bytes = vec![0u8; *size as usize];
        file.read_exact(&mut bytes)
            .await
            .with_context(|| format!("read chunk at {}+{}", path.display(), offset))?;
        Ok(Some(bytes))
    }
}

impl Default for ChunkLocator {
    fn default() -> Self {
        Self::new()
    }
}
