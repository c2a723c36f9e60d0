//! Engine configuration consumed by the core.

use crate::content::DEFAULT_CHUNK_SIZE;
use crate::ids::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_LISTEN_PORT: u16 = 13129;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether LAN discovery results are applied at all.
    #[serde(default = "default_true")]
    pub discovery_enabled: bool,

    /// Port the pull server binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Peers to never communicate with; checked before session creation.
    #[serde(default)]
    pub blacklist: HashSet<PeerId>,

    /// Chunk size used when building content indexes locally.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Per-request network timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Peers not seen within this window are dropped on refresh.
    #[serde(default = "default_peer_stale_timeout_ms")]
    pub peer_stale_timeout_ms: i64,

    /// Debounce window of the notification coalescer.
    #[serde(default = "default_notify_debounce_ms")]
    pub notify_debounce_ms: u64,

    /// Concurrent task executions across all resource keys.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Linear backoff unit between retry attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}
fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_peer_stale_timeout_ms() -> i64 {
    60_000
}
fn default_notify_debounce_ms() -> u64 {
    300
}
fn default_worker_count() -> usize {
    4
}
fn default_retry_backoff_ms() -> u64 {
    1_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery_enabled: true,
            listen_port: DEFAULT_LISTEN_PORT,
            blacklist: HashSet::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout_ms: default_request_timeout_ms(),
            peer_stale_timeout_ms: default_peer_stale_timeout_ms(),
            notify_debounce_ms: default_notify_debounce_ms(),
            worker_count: default_worker_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl EngineConfig {
    pub fn is_blacklisted(&self, peer: &PeerId) -> bool {
        self.blacklist.contains(peer)
    }
}
