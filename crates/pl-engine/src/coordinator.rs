//! Peer coordination: who we sync with and where to reach them.
//!
//! Discovery (mDNS or manual pairing) feeds [`SyncCoordinator::refresh`]
//! with the peers currently visible; the coordinator keeps one handler
//! per peer, drops the ones gone stale and never admits blacklisted
//! ids. Address selection prefers the advertised host on the same
//! subnet as our preferred local address.

use pl_core::config::EngineConfig;
use pl_core::ids::PeerId;
use pl_core::net::{prefix_match, HostInfo};
use pl_network::HostResolver;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One peer as reported by discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredPeer {
    pub peer_id: PeerId,
    /// Addresses the peer advertises, with their prefix lengths.
    pub hosts: Vec<HostInfo>,
    pub port: u16,
    /// Whether pairing completed; unpaired peers are visible but never
    /// dialed.
    pub paired: bool,
}

/// Live view of one reachable peer.
#[derive(Debug, Clone)]
pub struct SyncHandler {
    pub peer_id: PeerId,
    pub hosts: Vec<HostInfo>,
    pub port: u16,
    pub last_seen_ms: i64,
    pub paired: bool,
}

impl SyncHandler {
    /// Address to connect to, scoped to `local` when possible.
    ///
    /// An advertised host sharing the local subnet wins; otherwise the
    /// first advertised address is used. `None` means the peer gave us
    /// nothing to connect to.
    pub fn connect_host_address(&self, local: Option<IpAddr>) -> Option<String> {
        if let Some(local) = local {
            if let Some(host) = self
                .hosts
                .iter()
                .find(|h| prefix_match(local, h.address, h.network_prefix_length))
            {
                return Some(host.address.to_string());
            }
        }
        self.hosts.first().map(|h| h.address.to_string())
    }
}

pub struct SyncCoordinator {
    config: EngineConfig,
    resolver: Arc<HostResolver>,
    handlers: RwLock<HashMap<PeerId, SyncHandler>>,
}

impl SyncCoordinator {
    pub fn new(config: EngineConfig, resolver: Arc<HostResolver>) -> Self {
        Self {
            config,
            resolver,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Apply one round of discovery results: upsert visible peers, then
    /// drop everyone not seen within the stale window. A disabled
    /// discovery switch freezes the map.
    pub async fn refresh(&self, discovered: Vec<DiscoveredPeer>) {
        if !self.config.discovery_enabled {
            debug!("discovery disabled; keeping current handlers");
            return;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let mut handlers = self.handlers.write().await;

        for peer in discovered {
            if self.config.is_blacklisted(&peer.peer_id) {
                debug!(peer_id = %peer.peer_id, "ignoring blacklisted peer");
                continue;
            }
            handlers
                .entry(peer.peer_id.clone())
                .and_modify(|handler| {
                    handler.hosts = peer.hosts.clone();
                    handler.port = peer.port;
                    handler.last_seen_ms = now;
                    handler.paired = peer.paired;
                })
                .or_insert_with(|| {
                    info!(peer_id = %peer.peer_id, "peer appeared");
                    SyncHandler {
                        peer_id: peer.peer_id.clone(),
                        hosts: peer.hosts.clone(),
                        port: peer.port,
                        last_seen_ms: now,
                        paired: peer.paired,
                    }
                });
        }

        let stale = self.config.peer_stale_timeout_ms;
        handlers.retain(|peer_id, handler| {
            let keep = now - handler.last_seen_ms < stale;
            if !keep {
                info!(%peer_id, "peer went stale; dropping handler");
            }
            keep
        });
    }

    /// Snapshot of the current handlers.
    pub async fn get_sync_handlers(&self) -> Vec<SyncHandler> {
        self.handlers.read().await.values().cloned().collect()
    }

    pub async fn handler_of(&self, peer_id: &PeerId) -> Option<SyncHandler> {
        self.handlers.read().await.get(peer_id).cloned()
    }

    pub async fn remove(&self, peer_id: &PeerId) {
        self.handlers.write().await.remove(peer_id);
    }

    /// `(host, port)` to dial for a peer, or `None` when the peer is
    /// unknown, unpaired or advertises no usable address.
    pub async fn connect_address(&self, peer_id: &PeerId) -> Option<(String, u16)> {
        let handler = self.handler_of(peer_id).await?;
        if !handler.paired {
            return None;
        }
        let local = self.resolver.preferred_local_address();
        let host = handler.connect_host_address(local)?;
        Some((host, handler.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(addr: &str, prefix: u8) -> HostInfo {
        HostInfo {
            address: addr.parse().unwrap(),
            network_prefix_length: prefix,
        }
    }

    fn discovered(id: &str, hosts: Vec<HostInfo>) -> DiscoveredPeer {
        DiscoveredPeer {
            peer_id: PeerId::from(id),
            hosts,
            port: 13129,
            paired: true,
        }
    }

    fn coordinator(config: EngineConfig) -> SyncCoordinator {
        SyncCoordinator::new(config, Arc::new(HostResolver::new()))
    }

    #[tokio::test]
    async fn test_refresh_upserts_and_snapshots() {
        let coord = coordinator(EngineConfig::default());
        coord
            .refresh(vec![discovered("a", vec![host("192.168.1.2", 24)])])
            .await;
        coord
            .refresh(vec![
                discovered("a", vec![host("192.168.1.3", 24)]),
                discovered("b", vec![host("192.168.1.4", 24)]),
            ])
            .await;

        let handlers = coord.get_sync_handlers().await;
        assert_eq!(handlers.len(), 2);
        let a = coord.handler_of(&PeerId::from("a")).await.unwrap();
        assert_eq!(a.hosts[0].address.to_string(), "192.168.1.3");
    }

    #[tokio::test]
    async fn test_blacklisted_peer_never_admitted() {
        let mut config = EngineConfig::default();
        config.blacklist.insert(PeerId::from("bad"));
        let coord = coordinator(config);

        coord
            .refresh(vec![
                discovered("bad", vec![host("192.168.1.9", 24)]),
                discovered("good", vec![host("192.168.1.10", 24)]),
            ])
            .await;

        assert!(coord.handler_of(&PeerId::from("bad")).await.is_none());
        assert!(coord.handler_of(&PeerId::from("good")).await.is_some());
    }

    #[tokio::test]
    async fn test_disabled_discovery_freezes_map() {
        let mut config = EngineConfig::default();
        config.discovery_enabled = false;
        let coord = coordinator(config);

        coord
            .refresh(vec![discovered("a", vec![host("192.168.1.2", 24)])])
            .await;
        assert!(coord.get_sync_handlers().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_peers_dropped_on_refresh() {
        let mut config = EngineConfig::default();
        config.peer_stale_timeout_ms = 0;
        let coord = coordinator(config);

        coord
            .refresh(vec![discovered("a", vec![host("192.168.1.2", 24)])])
            .await;
        // Next round does not see "a"; zero stale window drops it.
        coord.refresh(vec![]).await;
        assert!(coord.get_sync_handlers().await.is_empty());
    }

    #[tokio::test]
    async fn test_unpaired_peer_gets_no_connect_address() {
        let coord = coordinator(EngineConfig::default());
        let mut peer = discovered("shy", vec![host("192.168.1.2", 24)]);
        peer.paired = false;
        coord.refresh(vec![peer]).await;

        assert!(coord.handler_of(&PeerId::from("shy")).await.is_some());
        assert!(coord.connect_address(&PeerId::from("shy")).await.is_none());
    }

    #[test]
    fn test_connect_prefers_same_subnet_host() {
        let handler = SyncHandler {
            peer_id: PeerId::from("a"),
            hosts: vec![host("10.0.0.5", 24), host("192.168.1.5", 24)],
            port: 13129,
            last_seen_ms: 0,
            paired: true,
        };

        let local: IpAddr = "192.168.1.7".parse().unwrap();
        assert_eq!(
            handler.connect_host_address(Some(local)),
            Some("192.168.1.5".to_string())
        );
        // No local scope known: first advertised address wins.
        assert_eq!(
            handler.connect_host_address(None),
            Some("10.0.0.5".to_string())
        );
    }

    #[test]
    fn test_connect_with_no_hosts_is_none() {
        let handler = SyncHandler {
            peer_id: PeerId::from("a"),
            hosts: vec![],
            port: 13129,
            last_seen_ms: 0,
            paired: true,
        };
        assert_eq!(handler.connect_host_address(None), None);
    }
}
