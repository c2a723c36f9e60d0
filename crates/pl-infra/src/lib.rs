//! # pl-infra
//!
//! Infrastructure for PasteLink: filesystem path provider and atomic
//! writes, content index building and chunk serving, the file-backed
//! task store and the notification coalescer.

pub mod content;
pub mod fs;
pub mod notify;
pub mod store;

pub use content::{build_index, ChunkCache, ChunkLocator, IndexEntry};
pub use fs::{write_atomic, UserDataPathProvider};
pub use notify::NotificationPipe;
pub use store::FileTaskStore;
