//! Local interface enumeration and preferred-address selection.

use anyhow::{Context, Result};
use log::debug;
use pl_core::net::{HostInfo, HostInfoFilter};
use std::net::IpAddr;
use std::sync::RwLock;

// The enumeration crate exposes addresses without netmasks; LAN peers
// advertise their own prefix length during discovery, these defaults
// only describe the local side.
const DEFAULT_IPV4_PREFIX: u8 = 24;
const DEFAULT_IPV6_PREFIX: u8 = 64;

fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

fn default_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => DEFAULT_IPV4_PREFIX,
        IpAddr::V6(_) => DEFAULT_IPV6_PREFIX,
    }
}

/// Resolves local addresses for discovery advertisement and scoping.
///
/// The preferred address is cached; there is no polling. Callers clear
/// the cache when a network-change event fires.
#[derive(Default)]
pub struct HostResolver {
    preferred: RwLock<Option<IpAddr>>,
}

impl HostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-loopback interface addresses passing the given filter.
    pub fn list_local_hosts(&self, filter: &dyn HostInfoFilter) -> Result<Vec<HostInfo>> {
        let interfaces =
            local_ip_address::list_afinet_netifas().context("enumerate network interfaces")?;

        let hosts: Vec<HostInfo> = interfaces
            .into_iter()
            .filter(|(_, addr)| !addr.is_loopback())
            .map(|(name, addr)| {
                debug!("local interface {} -> {}", name, addr);
                HostInfo {
                    address: addr,
                    network_prefix_length: default_prefix(&addr),
                }
            })
            .filter(|host| filter.filter(host))
            .collect();

        Ok(hosts)
    }

    /// Single non-loopback, non-link-local address for display and
    /// discovery advertisement; IPv4 wins over IPv6 when both exist.
    pub fn preferred_local_address(&self) -> Option<IpAddr> {
        if let Some(cached) = *self.preferred.read().expect("preferred address lock") {
            return Some(cached);
        }

        let interfaces = local_ip_address::list_afinet_netifas().ok()?;
        let candidates: Vec<IpAddr> = interfaces
            .into_iter()
            .map(|(_, addr)| addr)
            .filter(|addr| !addr.is_loopback() && !is_link_local(addr))
            .collect();

        let chosen = candidates
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| candidates.first())
            .copied();

        if let Some(addr) = chosen {
            *self.preferred.write().expect("preferred address lock") = Some(addr);
        }
        chosen
    }

    /// Invalidate the cached preferred address on network-change events.
    pub fn clear_cache(&self) {
        *self.preferred.write().expect("preferred address lock") = None;
    }
}
