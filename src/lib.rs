//! # pastelink
//!
//! LAN clipboard synchronization engine. Devices on the same network
//! keep their clipboard history in sync by pulling content from each
//! other over an encrypted, chunk-addressed protocol.
//!
//! The facade re-exports the workspace crates:
//! - [`core`]: domain model (hashing, content index, tasks, sessions,
//!   error taxonomy) plus the ports toward the host application.
//! - [`network`]: encrypted TCP transport, pull client/server and local
//!   host resolution.
//! - [`infra`]: filesystem path provider, atomic writes, chunk cache,
//!   file-backed task store and the notification coalescer.
//! - [`engine`]: the persistent task engine with its executors, the
//!   peer coordinator and the serving side of the pull protocol.

pub use pl_core as core;
pub use pl_engine as engine;
pub use pl_infra as infra;
pub use pl_network as network;

pub use pl_core::config::EngineConfig;
pub use pl_core::error::{ErrorCode, ErrorKind, SyncError};
pub use pl_core::ids::{PasteId, PeerId, TaskId};
pub use pl_engine::{
    DiscoveredPeer, PullService, SyncCoordinator, SyncHandler, TaskEngine, TaskEvent,
};
pub use pl_infra::NotificationPipe;
pub use pl_network::{PullClient, PullServer, SessionManager};
