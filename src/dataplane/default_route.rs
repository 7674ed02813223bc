//! Default-route tracker
//!
//! The FIB lookup result does not say whether it came from the default
//! entry (0.0.0.0/0, ::/0), yet policy needs exactly that bit: traffic
//! resolved by the default route is public-Internet traffic and may be
//! enforced onto a labeled link regardless of routing. The tracker
//! subscribes as a child of the default entry per family and maintains a
//! direct-addressed membership map of the adjacencies currently reachable
//! through it, so the datapath query is O(1).
//!
//! Initialization is lazy: the default prefix may not exist yet when the
//! engine comes up, so every link addition retries the entry lookup.

use crate::fib::{AdjIndex, BackWalk, DpoKind, EntryHandle, Fib, LoadBalance, Prefix, MAX_ADJ_INDEX};
use crate::packet::Family;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::debug;

struct FamilyState {
    /// Entry handle once the default prefix is found.
    entry: RwLock<Option<EntryHandle>>,
    /// adjacency → is a default-route adjacency.
    adj_map: Vec<AtomicBool>,
    /// Current adjacency set, kept for clearing and for dumps.
    adj_list: RwLock<Vec<AdjIndex>>,
}

impl FamilyState {
    fn new() -> Self {
        Self {
            entry: RwLock::new(None),
            adj_map: (0..MAX_ADJ_INDEX as usize).map(|_| AtomicBool::new(false)).collect(),
            adj_list: RwLock::new(Vec::new()),
        }
    }

    /// Replace the tracked adjacency set from a refreshed load-balance.
    /// Only usable adjacencies count.
    fn refresh(&self, lb: &LoadBalance) {
        let mut list = self.adj_list.write().unwrap();
        for adj in list.drain(..) {
            self.adj_map[adj as usize].store(false, Ordering::Relaxed);
        }
        for dpo in lb.buckets() {
            if dpo.is_up() && !list.contains(&dpo.adj) {
                list.push(dpo.adj);
                self.adj_map[dpo.adj as usize].store(true, Ordering::Relaxed);
            }
        }
    }
}

/// Per-family tracking of the default-route adjacency set.
pub struct DefaultRouteTracker {
    v4: FamilyState,
    v6: FamilyState,
}

impl DefaultRouteTracker {
    pub fn new() -> Self {
        Self {
            v4: FamilyState::new(),
            v6: FamilyState::new(),
        }
    }

    fn state(&self, family: Family) -> &FamilyState {
        match family {
            Family::V4 => &self.v4,
            Family::V6 => &self.v6,
        }
    }

    /// Find the default entries and subscribe to them, for any family not
    /// tracked yet. Called on every link addition.
    pub fn try_init(tracker: &Arc<Self>, fib: &Fib) {
        for family in [Family::V4, Family::V6] {
            let state = tracker.state(family);
            if state.entry.read().unwrap().is_some() {
                continue;
            }
            let Some(entry) = fib.entry_lookup(Prefix::default_route(family)) else {
                continue;
            };

            let weak: Weak<Self> = Arc::downgrade(tracker);
            fib.entry_child_add(
                entry,
                family as u64,
                Arc::new(move |token, walk| {
                    if let (Some(tracker), BackWalk::Entry(lb)) = (weak.upgrade(), walk) {
                        let family = if token == Family::V4 as u64 {
                            Family::V4
                        } else {
                            Family::V6
                        };
                        tracker.state(family).refresh(lb);
                    }
                }),
            );
            *state.entry.write().unwrap() = Some(entry);
            state.refresh(&fib.entry_contribute(entry));
            debug!(%family, "default route tracking started");
        }
    }

    /// O(1): is this adjacency currently reachable via the default route?
    pub fn is_default_route_adjacency(&self, adj: AdjIndex, family: Family) -> bool {
        self.state(family).adj_map[adj as usize].load(Ordering::Relaxed)
    }

    /// Whether the FIB lookup result came from the default route. Any
    /// bucket that is not a plain adjacency (e.g. a receive path) makes
    /// this false; otherwise any bucket in the tracked set is enough.
    pub fn is_lb_default_route(&self, lb: &LoadBalance, family: Family) -> bool {
        let state = self.state(family);
        for dpo in lb.buckets() {
            if dpo.kind != DpoKind::Adjacency {
                return false;
            }
            if state.adj_map[dpo.adj as usize].load(Ordering::Relaxed) {
                return true;
            }
        }
        false
    }

    /// True once the default entry for the family has been found.
    pub fn is_tracking(&self, family: Family) -> bool {
        self.state(family).entry.read().unwrap().is_some()
    }

    /// Current default-route adjacency set, for introspection.
    pub fn dump(&self, family: Family) -> Vec<AdjIndex> {
        self.state(family).adj_list.read().unwrap().clone()
    }
}

impl Default for DefaultRouteTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::RoutePath;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn make_tracked_fib() -> (Arc<Fib>, Arc<DefaultRouteTracker>) {
        let fib = Arc::new(Fib::new());
        fib.route_add(
            Prefix::default_route(Family::V4),
            vec![RoutePath::new(ip("192.168.1.1"), 1)],
        );
        fib.neighbor_resolve(1, ip("192.168.1.1"));
        let tracker = Arc::new(DefaultRouteTracker::new());
        DefaultRouteTracker::try_init(&tracker, &fib);
        (fib, tracker)
    }

    #[test]
    fn test_lazy_init_retries() {
        let fib = Arc::new(Fib::new());
        let tracker = Arc::new(DefaultRouteTracker::new());

        // No default route yet.
        DefaultRouteTracker::try_init(&tracker, &fib);
        assert!(!tracker.is_tracking(Family::V4));

        fib.route_add(
            Prefix::default_route(Family::V4),
            vec![RoutePath::new(ip("192.168.1.1"), 1)],
        );
        DefaultRouteTracker::try_init(&tracker, &fib);
        assert!(tracker.is_tracking(Family::V4));
        assert!(!tracker.is_tracking(Family::V6));
    }

    #[test]
    fn test_membership_tracks_route_changes() {
        let (fib, tracker) = make_tracked_fib();
        let adj = fib.adj_lookup(1, ip("192.168.1.1")).unwrap();
        assert!(tracker.is_default_route_adjacency(adj, Family::V4));
        assert_eq!(tracker.dump(Family::V4), vec![adj]);

        // Default route moves to another gateway.
        fib.route_add(
            Prefix::default_route(Family::V4),
            vec![RoutePath::new(ip("192.168.1.2"), 1)],
        );
        fib.neighbor_resolve(1, ip("192.168.1.2"));
        let adj2 = fib.adj_lookup(1, ip("192.168.1.2")).unwrap();

        assert!(!tracker.is_default_route_adjacency(adj, Family::V4));
        assert!(tracker.is_default_route_adjacency(adj2, Family::V4));
    }

    #[test]
    fn test_unresolved_adjacency_not_tracked() {
        let fib = Arc::new(Fib::new());
        fib.route_add(
            Prefix::default_route(Family::V4),
            vec![RoutePath::new(ip("192.168.1.1"), 1)],
        );
        let tracker = Arc::new(DefaultRouteTracker::new());
        DefaultRouteTracker::try_init(&tracker, &fib);

        let adj = fib.adj_lookup(1, ip("192.168.1.1")).unwrap();
        assert!(!tracker.is_default_route_adjacency(adj, Family::V4));

        // Resolution walks the entry and the set fills in.
        fib.neighbor_resolve(1, ip("192.168.1.1"));
        assert!(tracker.is_default_route_adjacency(adj, Family::V4));
    }

    #[test]
    fn test_is_lb_default_route() {
        let (fib, tracker) = make_tracked_fib();
        let lb = fib.lookup(ip("8.8.8.8"));
        assert!(tracker.is_lb_default_route(&lb, Family::V4));

        // A specific route off the default path is not default-route.
        fib.route_add(
            Prefix::parse("10.0.0.0/8").unwrap(),
            vec![RoutePath::new(ip("10.0.0.254"), 2)],
        );
        fib.neighbor_resolve(2, ip("10.0.0.254"));
        let lb = fib.lookup(ip("10.1.1.1"));
        assert!(!tracker.is_lb_default_route(&lb, Family::V4));

        // Unroutable (drop bucket) is not default-route either.
        let fib2 = Fib::new();
        let lb = fib2.lookup(ip("1.2.3.4"));
        assert!(!tracker.is_lb_default_route(&lb, Family::V4));
    }

    #[test]
    fn test_route_withdrawal_empties_set() {
        let (fib, tracker) = make_tracked_fib();
        let adj = fib.adj_lookup(1, ip("192.168.1.1")).unwrap();
        assert!(tracker.is_default_route_adjacency(adj, Family::V4));

        fib.route_del(Prefix::default_route(Family::V4));
        assert!(!tracker.is_default_route_adjacency(adj, Family::V4));
        assert!(tracker.dump(Family::V4).is_empty());
    }
}
