//! Local-address filter
//!
//! Membership test over the router's own IPv4/IPv6 addresses. The datapath
//! queries it to bypass policy classification for locally-destined traffic;
//! the routing layer feeds it through interface address add/del callbacks.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::RwLock;

/// Expected table size: thousands of tunnel loopbacks plus VLANs.
const LOCALS_CAPACITY: usize = 24_000;

/// Hash sets of local addresses, one per family.
#[derive(Debug)]
pub struct LocalAddrFilter {
    v4: RwLock<HashSet<Ipv4Addr>>,
    v6: RwLock<HashSet<Ipv6Addr>>,
}

impl LocalAddrFilter {
    /// New filter with the limited broadcast address pre-seeded, so
    /// broadcasts are never handled by policies.
    pub fn new() -> Self {
        let mut v4 = HashSet::with_capacity(LOCALS_CAPACITY);
        v4.insert(Ipv4Addr::BROADCAST);
        Self {
            v4: RwLock::new(v4),
            v6: RwLock::new(HashSet::with_capacity(LOCALS_CAPACITY)),
        }
    }

    pub fn contains_v4(&self, addr: Ipv4Addr) -> bool {
        self.v4.read().unwrap().contains(&addr)
    }

    pub fn contains_v6(&self, addr: Ipv6Addr) -> bool {
        self.v6.read().unwrap().contains(&addr)
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(a) => self.contains_v4(a),
            IpAddr::V6(a) => self.contains_v6(a),
        }
    }

    pub fn add(&self, addr: IpAddr) {
        match addr {
            IpAddr::V4(a) => {
                self.v4.write().unwrap().insert(a);
            }
            IpAddr::V6(a) => {
                self.v6.write().unwrap().insert(a);
            }
        }
    }

    pub fn remove(&self, addr: IpAddr) {
        match addr {
            IpAddr::V4(a) => {
                self.v4.write().unwrap().remove(&a);
            }
            IpAddr::V6(a) => {
                self.v6.write().unwrap().remove(&a);
            }
        }
    }

    /// Interface address callback from the routing layer.
    pub fn on_interface_address(&self, addr: IpAddr, is_delete: bool) {
        if is_delete {
            self.remove(addr);
        } else {
            self.add(addr);
        }
    }

    pub fn len(&self) -> usize {
        self.v4.read().unwrap().len() + self.v6.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted dump for introspection.
    pub fn dump(&self) -> Vec<IpAddr> {
        let mut addrs: Vec<IpAddr> = self
            .v4
            .read()
            .unwrap()
            .iter()
            .map(|a| IpAddr::V4(*a))
            .chain(self.v6.read().unwrap().iter().map(|a| IpAddr::V6(*a)))
            .collect();
        addrs.sort();
        addrs
    }
}

impl Default for LocalAddrFilter {
    fn default() -> Self {
        Self::new()
    }
}
