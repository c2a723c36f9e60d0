//! Host and subnet domain logic.
//!
//! Pure address math lives here; actual interface enumeration is in
//! `pl-network` where the OS is consulted.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One local or discovered address with its subnet prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub address: IpAddr,
    pub network_prefix_length: u8,
}

/// Bit-exact prefix comparison, valid for IPv4 and IPv6.
/// Addresses of different families never match.
pub fn prefix_match(a: IpAddr, b: IpAddr, prefix_length: u8) -> bool {
    let (abytes, bbytes): (Vec<u8>, Vec<u8>) = match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => (a.octets().to_vec(), b.octets().to_vec()),
        (IpAddr::V6(a), IpAddr::V6(b)) => (a.octets().to_vec(), b.octets().to_vec()),
        _ => return false,
    };

    let total_bits = (abytes.len() * 8) as u32;
    let prefix = (prefix_length as u32).min(total_bits);

    let full_bytes = (prefix / 8) as usize;
    if abytes[..full_bytes] != bbytes[..full_bytes] {
        return false;
    }

    let rem_bits = prefix % 8;
    if rem_bits == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - rem_bits);
    (abytes[full_bytes] & mask) == (bbytes[full_bytes] & mask)
}

/// Capability deciding whether a candidate host is a plausible peer.
pub trait HostInfoFilter: Send + Sync {
    fn filter(&self, host: &HostInfo) -> bool;
}

/// Accepts everything.
pub struct NoFilter;

impl HostInfoFilter for NoFilter {
    fn filter(&self, _host: &HostInfo) -> bool {
        true
    }
}

/// Accepts hosts on the same logical subnet as a reference address.
/// Used to scope LAN discovery to plausible peers.
#[derive(Debug, Clone)]
pub struct SubnetFilter {
    pub host_address: IpAddr,
    pub network_prefix_length: u8,
}

impl HostInfoFilter for SubnetFilter {
    fn filter(&self, host: &HostInfo) -> bool {
        self.network_prefix_length == host.network_prefix_length
            && prefix_match(
                self.host_address,
                host.address,
                self.network_prefix_length,
            )
    }
}
