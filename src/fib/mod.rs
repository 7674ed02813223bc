//! Routing substrate
//!
//! The forwarding engine consumes the FIB through a narrow interface:
//! longest-prefix-match lookups returning a load-balance object, path-lists
//! that track next-hop reachability, and child subscriptions that deliver
//! back-walk notifications when the topology changes. This module defines
//! those interface types plus a compact in-memory implementation used by
//! the CLI and the test suite.

mod adjacency;
mod flow_hash;
mod table;

pub use adjacency::{Adjacency, AdjacencyTable};
pub use flow_hash::{flow_hash, FlowHashConfig, FLOW_HASH_DEFAULT};
pub use table::{BackWalk, BackWalkFn, ChildToken, EntryHandle, Fib, PathListHandle};

use crate::packet::Family;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Adjacency identifier. The adjacency space is bounded so that
/// direct-addressed per-adjacency arrays stay practical.
pub type AdjIndex = u32;

/// Upper bound (exclusive) of the adjacency space.
pub const MAX_ADJ_INDEX: u32 = 0xFFFF;

/// Graph node a forwarding descriptor dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextNode {
    /// Rewrite the MAC header and transmit.
    Rewrite,
    /// Hand the packet to the local stack.
    Local,
    /// Next-hop is not resolved yet; trigger neighbor discovery.
    NeighborProbe,
    /// Discard.
    Drop,
}

impl std::fmt::Display for NextNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextNode::Rewrite => write!(f, "rewrite"),
            NextNode::Local => write!(f, "local"),
            NextNode::NeighborProbe => write!(f, "neighbor-probe"),
            NextNode::Drop => write!(f, "drop"),
        }
    }
}

/// Kind of a forwarding descriptor.
///
/// Only `Adjacency` and `AdjacencyMidchain` can carry traffic; an
/// `AdjacencyIncomplete` descriptor means the next-hop is not ARP/ND
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpoKind {
    Adjacency,
    AdjacencyMidchain,
    AdjacencyIncomplete,
    Receive,
    Drop,
}

/// Forwarding descriptor: the pair the graph dispatcher needs to forward a
/// packet — next graph node plus adjacency index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dpo {
    pub kind: DpoKind,
    pub adj: AdjIndex,
    pub next: NextNode,
}

impl Dpo {
    /// Descriptor that discards the packet.
    pub fn drop() -> Self {
        Self {
            kind: DpoKind::Drop,
            adj: 0,
            next: NextNode::Drop,
        }
    }

    /// Descriptor that delivers the packet locally.
    pub fn receive() -> Self {
        Self {
            kind: DpoKind::Receive,
            adj: 0,
            next: NextNode::Local,
        }
    }

    /// True when the descriptor points at a usable (resolved) adjacency.
    pub fn is_up(&self) -> bool {
        matches!(self.kind, DpoKind::Adjacency | DpoKind::AdjacencyMidchain)
    }
}

/// Result of a FIB lookup: one or more candidate forwarding descriptors.
///
/// The bucket vector is padded to a power of two by cycling the declared
/// paths, so picking a bucket by flow hash is a single mask. Iteration
/// order over `buckets()` is declared-path order.
#[derive(Debug, Clone)]
pub struct LoadBalance {
    buckets: Vec<Dpo>,
    /// Number of distinct paths before pow2 padding.
    n_paths: usize,
    pub hash_config: FlowHashConfig,
}

impl LoadBalance {
    /// Build from the per-path descriptors. An empty path set yields a
    /// single drop bucket (unroutable).
    pub fn new(paths: Vec<Dpo>, hash_config: FlowHashConfig) -> Self {
        if paths.is_empty() {
            return Self {
                buckets: vec![Dpo::drop()],
                n_paths: 1,
                hash_config,
            };
        }
        let n_paths = paths.len();
        let padded = n_paths.next_power_of_two();
        let mut buckets = Vec::with_capacity(padded);
        for i in 0..padded {
            buckets.push(paths[i % n_paths]);
        }
        Self {
            buckets,
            n_paths,
            hash_config,
        }
    }

    /// Single-descriptor convenience constructor.
    pub fn single(dpo: Dpo) -> Self {
        Self::new(vec![dpo], FLOW_HASH_DEFAULT)
    }

    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Number of distinct paths (ECMP width before padding).
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    pub fn bucket(&self, i: usize) -> &Dpo {
        &self.buckets[i]
    }

    /// Pick a bucket by flow hash. Bucket count is a power of two.
    pub fn fwd_bucket(&self, hash: u32) -> &Dpo {
        &self.buckets[hash as usize & (self.buckets.len() - 1)]
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Dpo> {
        self.buckets.iter()
    }
}

/// An explicit forwarding path: the remote tunnel end or WAN gateway,
/// reached through a specific interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePath {
    pub next_hop: IpAddr,
    pub sw_if_index: u32,
}

impl RoutePath {
    pub fn new(next_hop: IpAddr, sw_if_index: u32) -> Self {
        Self {
            next_hop,
            sw_if_index,
        }
    }

    pub fn family(&self) -> Family {
        Family::of(self.next_hop)
    }
}

/// An IP prefix with host bits masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// New prefix; host bits are cleared.
    pub fn new(addr: IpAddr, len: u8) -> Self {
        let addr = match addr {
            IpAddr::V4(a) => {
                let len = len.min(32);
                let mask = if len == 0 { 0 } else { !0u32 << (32 - len) };
                IpAddr::V4(Ipv4Addr::from(u32::from(a) & mask))
            }
            IpAddr::V6(a) => {
                let len = len.min(128);
                let mask = if len == 0 { 0 } else { !0u128 << (128 - len) };
                IpAddr::V6(Ipv6Addr::from(u128::from(a) & mask))
            }
        };
        Self { addr, len }
    }

    /// Parse CIDR notation, e.g. "10.0.0.0/8" or "2001:db8::/32".
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, len) = s.split_once('/')?;
        let addr: IpAddr = addr.parse().ok()?;
        let len: u8 = len.parse().ok()?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if len > max {
            return None;
        }
        Some(Self::new(addr, len))
    }

    /// The all-zeros default prefix for a family.
    pub fn default_route(family: Family) -> Self {
        match family {
            Family::V4 => Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            Family::V6 => Self::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn family(&self) -> Family {
        Family::of(self.addr)
    }

    /// True when `addr` falls inside this prefix.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = if self.len == 0 {
                    0
                } else {
                    !0u32 << (32 - self.len)
                };
                (u32::from(a) & mask) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = if self.len == 0 {
                    0
                } else {
                    !0u128 << (128 - self.len)
                };
                (u128::from(a) & mask) == u128::from(net)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}
