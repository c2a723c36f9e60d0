//! # pl-engine
//!
//! The synchronization engine of PasteLink: the persistent task engine
//! with its built-in executors, the peer coordinator and the serving
//! side of the pull protocol.

pub mod coordinator;
pub mod engine;
pub mod executor;
pub mod executors;
pub mod pull_service;

pub use coordinator::{DiscoveredPeer, SyncCoordinator, SyncHandler};
pub use engine::{TaskEngine, TaskEvent};
pub use executor::TaskExecutor;
pub use executors::{PullFileExecutor, PullIconExecutor, RenderExecutor};
pub use pull_service::PullService;
