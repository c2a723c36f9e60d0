//! # pl-core
//!
//! Core domain models and business logic for PasteLink.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

// Public module exports
pub mod config;
pub mod content;
pub mod error;
pub mod hash;
pub mod ids;
pub mod net;
pub mod notify;
pub mod paste;
pub mod ports;
pub mod session;
pub mod task;

// Re-export commonly used types at the crate root
pub use config::EngineConfig;
pub use content::{ContentChunk, ContentFile, ContentIndex};
pub use error::{ErrorCode, ErrorKind, SyncError};
pub use hash::{ContentDigest, ContentFingerprint, Digester, Fingerprinter};
pub use ids::{PasteId, PeerId, TaskId};
pub use notify::{NotificationMessage, Severity};
pub use paste::{PasteEntry, PasteFileRef};
pub use session::{Envelope, EnvelopeHeader, RatchetSession, SessionError};
pub use task::{PasteTask, TaskOutcome, TaskState, TaskType};
