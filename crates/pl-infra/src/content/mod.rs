mod chunk_cache;
mod indexer;

pub use chunk_cache::ChunkCache;
pub use indexer::{build_index, ChunkLocator, IndexEntry};
