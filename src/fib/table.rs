//! FIB table, path-lists and back-walk delivery
//!
//! Longest prefix match over explicit route paths, producing load-balance
//! objects for the datapath. Interested parties (the link registry, the
//! default-route tracker) subscribe as children of a path-list or of a
//! route entry: they hand over an opaque token plus a callback closure and
//! get invoked with the refreshed forwarding payload whenever a topology
//! change walks back over their parent.

use super::{
    AdjacencyTable, AdjIndex, Adjacency, Dpo, LoadBalance, Prefix, RoutePath, FLOW_HASH_DEFAULT,
};
use crate::packet::Family;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, RwLock};

/// Opaque subscriber token, passed back verbatim on every back-walk. The
/// subscriber encodes whatever it needs to dispatch internally (the link
/// registry uses the interface index).
pub type ChildToken = u64;

/// Payload delivered to a child on a back-walk: the parent's refreshed
/// forwarding contribution.
#[derive(Debug, Clone)]
pub enum BackWalk {
    /// A path-list re-resolved; this is its new forwarding descriptor.
    PathList(Dpo),
    /// A route entry changed; this is its new load-balance.
    Entry(LoadBalance),
}

/// Back-walk callback. Must not re-enter the [`Fib`].
pub type BackWalkFn = Arc<dyn Fn(ChildToken, &BackWalk) + Send + Sync>;

/// Handle of a path-list created by [`Fib::path_list_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathListHandle(u32);

/// Handle of a route entry found by [`Fib::entry_lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle(u32);

struct Child {
    token: ChildToken,
    callback: BackWalkFn,
}

struct PathList {
    adj: AdjIndex,
    children: Vec<Option<Child>>,
    in_use: bool,
}

struct RouteEntry {
    prefix: Prefix,
    paths: Vec<RoutePath>,
    /// False once the route is withdrawn; the entry slot stays for its
    /// children.
    has_route: bool,
    children: Vec<Option<Child>>,
}

#[derive(Default)]
struct FibInner {
    adjs: AdjacencyTable,
    path_lists: Vec<PathList>,
    entries: Vec<RouteEntry>,
    /// Entry indices sorted by prefix length, longest first, per family.
    sorted_v4: Vec<u32>,
    sorted_v6: Vec<u32>,
}

type Pending = Vec<(BackWalkFn, ChildToken, BackWalk)>;

impl FibInner {
    fn entry_index(&self, prefix: &Prefix) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| e.prefix == *prefix)
            .map(|i| i as u32)
    }

    fn resort(&mut self) {
        self.sorted_v4.clear();
        self.sorted_v6.clear();
        for (i, e) in self.entries.iter().enumerate() {
            match e.prefix.family() {
                Family::V4 => self.sorted_v4.push(i as u32),
                Family::V6 => self.sorted_v6.push(i as u32),
            }
        }
        let entries = &self.entries;
        self.sorted_v4
            .sort_by(|a, b| entries[*b as usize].prefix.len().cmp(&entries[*a as usize].prefix.len()));
        self.sorted_v6
            .sort_by(|a, b| entries[*b as usize].prefix.len().cmp(&entries[*a as usize].prefix.len()));
    }

    fn entry_lb(&self, idx: u32) -> LoadBalance {
        let entry = &self.entries[idx as usize];
        if !entry.has_route {
            return LoadBalance::new(Vec::new(), FLOW_HASH_DEFAULT);
        }
        let dpos = entry
            .paths
            .iter()
            .filter_map(|p| self.adjs.lookup(p.sw_if_index, p.next_hop))
            .map(|adj| self.adjs.contribute(adj))
            .collect();
        LoadBalance::new(dpos, FLOW_HASH_DEFAULT)
    }

    /// Queue back-walks for every child of the entry.
    fn walk_entry(&self, idx: u32, pending: &mut Pending) {
        let entry = &self.entries[idx as usize];
        if entry.children.iter().all(|c| c.is_none()) {
            return;
        }
        let lb = self.entry_lb(idx);
        for child in entry.children.iter().flatten() {
            pending.push((
                child.callback.clone(),
                child.token,
                BackWalk::Entry(lb.clone()),
            ));
        }
    }

    /// Queue back-walks for everything that depends on the adjacency.
    fn walk_adj(&self, adj: AdjIndex, pending: &mut Pending) {
        for pl in &self.path_lists {
            if !pl.in_use || pl.adj != adj {
                continue;
            }
            let dpo = self.adjs.contribute(adj);
            for child in pl.children.iter().flatten() {
                pending.push((child.callback.clone(), child.token, BackWalk::PathList(dpo)));
            }
        }
        for idx in 0..self.entries.len() as u32 {
            let entry = &self.entries[idx as usize];
            if !entry.has_route {
                continue;
            }
            let touches = entry
                .paths
                .iter()
                .any(|p| self.adjs.lookup(p.sw_if_index, p.next_hop) == Some(adj));
            if touches {
                self.walk_entry(idx, pending);
            }
        }
    }
}

fn dispatch(pending: Pending) {
    for (callback, token, walk) in pending {
        callback(token, &walk);
    }
}

/// In-memory FIB with explicit routes and neighbor state.
#[derive(Default)]
pub struct Fib {
    inner: RwLock<FibInner>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------

    /// Add or replace a route. Every path's adjacency is allocated here so
    /// later lookups are allocation-free.
    pub fn route_add(&self, prefix: Prefix, paths: Vec<RoutePath>) {
        let pending = {
            let mut inner = self.inner.write().unwrap();
            for p in &paths {
                inner.adjs.adj_for(p.sw_if_index, p.next_hop);
            }
            let idx = match inner.entry_index(&prefix) {
                Some(idx) => {
                    let entry = &mut inner.entries[idx as usize];
                    entry.paths = paths;
                    entry.has_route = true;
                    idx
                }
                None => {
                    inner.entries.push(RouteEntry {
                        prefix,
                        paths,
                        has_route: true,
                        children: Vec::new(),
                    });
                    (inner.entries.len() - 1) as u32
                }
            };
            inner.resort();
            let mut pending = Pending::new();
            inner.walk_entry(idx, &mut pending);
            pending
        };
        dispatch(pending);
    }

    /// Withdraw a route. The entry slot survives for its children, which
    /// are walked with an unroutable load-balance.
    pub fn route_del(&self, prefix: Prefix) {
        let pending = {
            let mut inner = self.inner.write().unwrap();
            let Some(idx) = inner.entry_index(&prefix) else {
                return;
            };
            inner.entries[idx as usize].has_route = false;
            let mut pending = Pending::new();
            inner.walk_entry(idx, &mut pending);
            pending
        };
        dispatch(pending);
    }

    /// Longest prefix match. Always yields a load-balance; an unroutable
    /// destination gets a single drop bucket.
    pub fn lookup(&self, dst: IpAddr) -> LoadBalance {
        let inner = self.inner.read().unwrap();
        let sorted = match Family::of(dst) {
            Family::V4 => &inner.sorted_v4,
            Family::V6 => &inner.sorted_v6,
        };
        for &idx in sorted {
            let entry = &inner.entries[idx as usize];
            if entry.has_route && entry.prefix.contains(dst) {
                return inner.entry_lb(idx);
            }
        }
        LoadBalance::new(Vec::new(), FLOW_HASH_DEFAULT)
    }

    pub fn lookup_v4(&self, dst: Ipv4Addr) -> LoadBalance {
        self.lookup(IpAddr::V4(dst))
    }

    pub fn lookup_v6(&self, dst: Ipv6Addr) -> LoadBalance {
        self.lookup(IpAddr::V6(dst))
    }

    // ------------------------------------------------------------------
    // Neighbor state
    // ------------------------------------------------------------------

    /// Mark a next-hop ARP/ND resolved and back-walk dependents.
    pub fn neighbor_resolve(&self, sw_if_index: u32, next_hop: IpAddr) {
        self.set_neighbor(sw_if_index, next_hop, true);
    }

    /// Mark a next-hop unresolved and back-walk dependents.
    pub fn neighbor_unresolve(&self, sw_if_index: u32, next_hop: IpAddr) {
        self.set_neighbor(sw_if_index, next_hop, false);
    }

    fn set_neighbor(&self, sw_if_index: u32, next_hop: IpAddr, resolved: bool) {
        let pending = {
            let mut inner = self.inner.write().unwrap();
            let Some(adj) = inner.adjs.set_resolved(sw_if_index, next_hop, resolved) else {
                return;
            };
            let mut pending = Pending::new();
            inner.walk_adj(adj, &mut pending);
            pending
        };
        dispatch(pending);
    }

    // ------------------------------------------------------------------
    // Path-lists
    // ------------------------------------------------------------------

    /// Create a single-path path-list resolving `rpath`.
    pub fn path_list_create(&self, rpath: RoutePath) -> PathListHandle {
        let mut inner = self.inner.write().unwrap();
        let adj = inner.adjs.adj_for(rpath.sw_if_index, rpath.next_hop);
        inner.path_lists.push(PathList {
            adj,
            children: Vec::new(),
            in_use: true,
        });
        PathListHandle((inner.path_lists.len() - 1) as u32)
    }

    /// The path-list's current forwarding descriptor.
    pub fn path_list_contribute(&self, handle: PathListHandle) -> Dpo {
        let inner = self.inner.read().unwrap();
        match inner.path_lists.get(handle.0 as usize) {
            Some(pl) if pl.in_use => inner.adjs.contribute(pl.adj),
            _ => Dpo::drop(),
        }
    }

    /// Subscribe to back-walks on the path-list. Returns the sibling slot
    /// used to unsubscribe.
    pub fn path_list_child_add(
        &self,
        handle: PathListHandle,
        token: ChildToken,
        callback: BackWalkFn,
    ) -> u32 {
        let mut inner = self.inner.write().unwrap();
        let pl = &mut inner.path_lists[handle.0 as usize];
        pl.children.push(Some(Child { token, callback }));
        (pl.children.len() - 1) as u32
    }

    pub fn path_list_child_remove(&self, handle: PathListHandle, sibling: u32) {
        let mut inner = self.inner.write().unwrap();
        if let Some(pl) = inner.path_lists.get_mut(handle.0 as usize) {
            if let Some(slot) = pl.children.get_mut(sibling as usize) {
                *slot = None;
            }
        }
    }

    /// Release a path-list once its last child is gone.
    pub fn path_list_release(&self, handle: PathListHandle) {
        let mut inner = self.inner.write().unwrap();
        if let Some(pl) = inner.path_lists.get_mut(handle.0 as usize) {
            pl.in_use = false;
            pl.children.clear();
        }
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// Handle of the entry for an installed prefix.
    pub fn entry_lookup(&self, prefix: Prefix) -> Option<EntryHandle> {
        let inner = self.inner.read().unwrap();
        let idx = inner.entry_index(&prefix)?;
        if inner.entries[idx as usize].has_route {
            Some(EntryHandle(idx))
        } else {
            None
        }
    }

    /// The entry's current load-balance.
    pub fn entry_contribute(&self, handle: EntryHandle) -> LoadBalance {
        let inner = self.inner.read().unwrap();
        inner.entry_lb(handle.0)
    }

    /// Subscribe to back-walks on the entry.
    pub fn entry_child_add(
        &self,
        handle: EntryHandle,
        token: ChildToken,
        callback: BackWalkFn,
    ) -> u32 {
        let mut inner = self.inner.write().unwrap();
        let entry = &mut inner.entries[handle.0 as usize];
        entry.children.push(Some(Child { token, callback }));
        (entry.children.len() - 1) as u32
    }

    pub fn entry_child_remove(&self, handle: EntryHandle, sibling: u32) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.entries.get_mut(handle.0 as usize) {
            if let Some(slot) = entry.children.get_mut(sibling as usize) {
                *slot = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Snapshot of an adjacency.
    pub fn adj(&self, idx: AdjIndex) -> Option<Adjacency> {
        self.inner.read().unwrap().adjs.get(idx).cloned()
    }

    /// Existing adjacency index for (interface, next-hop).
    pub fn adj_lookup(&self, sw_if_index: u32, next_hop: IpAddr) -> Option<AdjIndex> {
        self.inner.read().unwrap().adjs.lookup(sw_if_index, next_hop)
    }
}
