//! Adjacency table
//!
//! An adjacency binds a next-hop to an outgoing interface. Whether it can
//! carry traffic depends on neighbor resolution (ARP for IPv4, ND for
//! IPv6): an unresolved adjacency contributes an incomplete descriptor
//! that cannot be used for forwarding.

use super::{AdjIndex, Dpo, DpoKind, NextNode, MAX_ADJ_INDEX};
use std::collections::HashMap;
use std::net::IpAddr;

/// One next-hop rewrite entry.
#[derive(Debug, Clone)]
pub struct Adjacency {
    pub sw_if_index: u32,
    pub next_hop: IpAddr,
    /// ARP/ND resolved.
    pub resolved: bool,
}

/// Table of adjacencies keyed by (interface, next-hop). Entries are
/// allocated on first use and never freed; indices stay stable.
#[derive(Debug, Default)]
pub struct AdjacencyTable {
    adjs: Vec<Adjacency>,
    by_key: HashMap<(u32, IpAddr), AdjIndex>,
}

impl AdjacencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the adjacency for (interface, next-hop), allocating a new
    /// unresolved entry on first use.
    pub fn adj_for(&mut self, sw_if_index: u32, next_hop: IpAddr) -> AdjIndex {
        if let Some(&idx) = self.by_key.get(&(sw_if_index, next_hop)) {
            return idx;
        }
        let idx = self.adjs.len() as AdjIndex;
        debug_assert!(idx < MAX_ADJ_INDEX);
        self.adjs.push(Adjacency {
            sw_if_index,
            next_hop,
            resolved: false,
        });
        self.by_key.insert((sw_if_index, next_hop), idx);
        idx
    }

    /// Existing adjacency index for (interface, next-hop), if any.
    pub fn lookup(&self, sw_if_index: u32, next_hop: IpAddr) -> Option<AdjIndex> {
        self.by_key.get(&(sw_if_index, next_hop)).copied()
    }

    pub fn get(&self, idx: AdjIndex) -> Option<&Adjacency> {
        self.adjs.get(idx as usize)
    }

    /// Flip resolution state. Returns the affected index when the entry
    /// exists and the state actually changed.
    pub fn set_resolved(
        &mut self,
        sw_if_index: u32,
        next_hop: IpAddr,
        resolved: bool,
    ) -> Option<AdjIndex> {
        let idx = self.lookup(sw_if_index, next_hop)?;
        let adj = &mut self.adjs[idx as usize];
        if adj.resolved == resolved {
            return None;
        }
        adj.resolved = resolved;
        Some(idx)
    }

    /// Forwarding descriptor contributed by an adjacency in its current
    /// resolution state.
    pub fn contribute(&self, idx: AdjIndex) -> Dpo {
        match self.get(idx) {
            Some(adj) if adj.resolved => Dpo {
                kind: DpoKind::Adjacency,
                adj: idx,
                next: NextNode::Rewrite,
            },
            Some(_) => Dpo {
                kind: DpoKind::AdjacencyIncomplete,
                adj: idx,
                next: NextNode::NeighborProbe,
            },
            None => Dpo::drop(),
        }
    }

    pub fn len(&self) -> usize {
        self.adjs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjs.is_empty()
    }
}
