//! Policies and the per-packet decision
//!
//! A policy pairs a packet class (an ACL id) with an action: groups of
//! labels plus a fallback. Link selection works by *intersecting* the FIB
//! lookup result with the labeled reachable links, so the chosen link is
//! always on a shortest path — with one exception: when the FIB resolved
//! the packet via the default route, the labeled link's descriptor is used
//! directly, enforcing policy over routing for public-Internet traffic.
//!
//! Random selection maps the packet flow hash to a group (and to a label
//! within the group) with two pre-computed masks and no division. A random
//! probe is tried exactly once; on a miss, selection degrades to ordered
//! scans. Continuing random probing over the unchecked remainder was
//! considered and rejected: it complicates the code disproportionately.

use crate::dataplane::default_route::DefaultRouteTracker;
use crate::dataplane::links::{Label, LinkRegistry, MAX_LABEL};
use crate::dataplane::quality::ServiceClass;
use crate::error::{Error, Result};
use crate::fib::{flow_hash, Dpo, LoadBalance, FLOW_HASH_DEFAULT};
use crate::packet::PacketMeta;
use crate::telemetry::PolicyCounters;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use tracing::{debug, warn};

/// How to pick among several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Ordered,
    Random,
}

/// What to do when no label yields a usable link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Forward by the FIB lookup result.
    DefaultRoute,
    /// Drop the packet.
    Drop,
}

/// A group of labels with its selection mode. The flow-hash-to-index
/// masks are pre-computed at construction.
#[derive(Debug, Clone)]
pub struct LinkGroup {
    pub selection: Selection,
    pub labels: Vec<Label>,
    n_minus_1: u32,
    pow2_mask: u32,
}

fn pow2_mask(len: usize) -> u32 {
    if len <= 0xF {
        0xF
    } else {
        0xFF
    }
}

impl LinkGroup {
    pub fn new(selection: Selection, labels: Vec<Label>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::Config("group needs at least one label".into()));
        }
        if let Some(&label) = labels.iter().find(|&&l| l > MAX_LABEL) {
            return Err(Error::LabelOutOfRange {
                label: label as u32,
            });
        }
        Ok(Self {
            selection,
            n_minus_1: labels.len() as u32 - 1,
            pow2_mask: pow2_mask(labels.len()),
            labels,
        })
    }
}

impl std::fmt::Display for LinkGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let alg = match self.selection {
            Selection::Random => "random",
            Selection::Ordered => "priority",
        };
        write!(f, "order:{} labels:", alg)?;
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// A policy action: fallback, group selection mode, and the groups.
#[derive(Debug, Clone)]
pub struct PolicyAction {
    pub fallback: Fallback,
    pub selection: Selection,
    pub groups: Vec<LinkGroup>,
    n_minus_1: u32,
    pow2_mask: u32,
}

impl PolicyAction {
    pub fn new(fallback: Fallback, selection: Selection, groups: Vec<LinkGroup>) -> Result<Self> {
        if groups.is_empty() {
            return Err(Error::Config("action needs at least one group".into()));
        }
        Ok(Self {
            fallback,
            selection,
            n_minus_1: groups.len() as u32 - 1,
            pow2_mask: pow2_mask(groups.len()),
            groups,
        })
    }
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fallback = match self.fallback {
            Fallback::Drop => "drop",
            Fallback::DefaultRoute => "default_routing",
        };
        write!(f, "fallback:{}", fallback)?;
        if self.groups.len() > 1 {
            let alg = match self.selection {
                Selection::Random => "random",
                Selection::Ordered => "priority",
            };
            write!(f, " select_group:{}", alg)?;
        }
        for (i, group) in self.groups.iter().enumerate() {
            write!(f, "\n  group[{}]: {}", i, group)?;
        }
        Ok(())
    }
}

/// Outcome of the policy decision for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// Forward with this descriptor (a labeled link, or drop).
    Forward(Dpo),
    /// Use the FIB lookup result.
    DeferToFib,
}

/// One policy object.
#[derive(Debug)]
pub struct Policy {
    pub policy_id: u32,
    pub acl_id: u32,
    pub action: PolicyAction,
    ref_count: AtomicU32,
    pub counters: PolicyCounters,
}

/// Introspection snapshot of a policy.
#[derive(Debug, Clone)]
pub struct PolicyInfo {
    pub policy_id: u32,
    pub acl_id: u32,
    pub ref_count: u32,
    pub action: PolicyAction,
    pub matched: u64,
    pub applied: u64,
    pub fallback: u64,
    pub dropped: u64,
    pub default_route: u64,
}

#[derive(Default)]
struct Pool {
    slots: Vec<Option<Policy>>,
    free: Vec<u32>,
}

/// Pool of policies with stable indices, an id→index map, and the
/// process-wide default-route override action.
#[derive(Default)]
pub struct PolicyStore {
    pool: RwLock<Pool>,
    by_id: RwLock<HashMap<u32, u32>>,
    default_route_action: RwLock<Option<PolicyAction>>,
}

/// Two-step flow-hash-to-index rule: one wide mask, then the narrow mask
/// only when the first landed past the end. Uniform over [0, n) without
/// division.
fn index_by_flow_hash(hash: u32, pow2_mask: u32, n_minus_1: u32) -> u32 {
    let i = hash & pow2_mask;
    if i <= n_minus_1 {
        i
    } else {
        i & n_minus_1
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    /// Create a policy. The id is client-assigned and must be new.
    pub fn policy_add(&self, policy_id: u32, acl_id: u32, action: PolicyAction) -> Result<u32> {
        let mut by_id = self.by_id.write().unwrap();
        if by_id.contains_key(&policy_id) {
            warn!(policy_id, "policy exists");
            return Err(Error::PolicyExists { policy_id });
        }
        let mut pool = self.pool.write().unwrap();
        let policy = Policy {
            policy_id,
            acl_id,
            action,
            ref_count: AtomicU32::new(0),
            counters: PolicyCounters::default(),
        };
        let index = match pool.free.pop() {
            Some(index) => {
                pool.slots[index as usize] = Some(policy);
                index
            }
            None => {
                pool.slots.push(Some(policy));
                (pool.slots.len() - 1) as u32
            }
        };
        by_id.insert(policy_id, index);
        debug!(policy_id, acl_id, index, "policy added");
        Ok(index)
    }

    /// Delete a policy. Fails while attachments still reference it.
    pub fn policy_delete(&self, policy_id: u32) -> Result<()> {
        let mut by_id = self.by_id.write().unwrap();
        let Some(&index) = by_id.get(&policy_id) else {
            return Err(Error::PolicyNotFound { policy_id });
        };
        let mut pool = self.pool.write().unwrap();
        let in_use = pool.slots[index as usize]
            .as_ref()
            .map(|p| p.ref_count.load(Ordering::Relaxed) > 0)
            .unwrap_or(false);
        if in_use {
            return Err(Error::PolicyInUse { policy_id });
        }
        pool.slots[index as usize] = None;
        pool.free.push(index);
        by_id.remove(&policy_id);
        debug!(policy_id, "policy deleted");
        Ok(())
    }

    /// Pool index for a policy id.
    pub fn find(&self, policy_id: u32) -> Option<u32> {
        self.by_id.read().unwrap().get(&policy_id).copied()
    }

    /// ACL id of a policy by pool index.
    pub fn acl_of(&self, index: u32) -> Option<u32> {
        let pool = self.pool.read().unwrap();
        pool.slots.get(index as usize)?.as_ref().map(|p| p.acl_id)
    }

    pub fn ref_inc(&self, index: u32) {
        let pool = self.pool.read().unwrap();
        if let Some(Some(policy)) = pool.slots.get(index as usize) {
            policy.ref_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn ref_dec(&self, index: u32) {
        let pool = self.pool.read().unwrap();
        if let Some(Some(policy)) = pool.slots.get(index as usize) {
            policy.ref_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // Default-route override action
    // ------------------------------------------------------------------

    /// Install the process-wide action applied when the FIB resolves a
    /// packet via the default route.
    pub fn default_route_action_set(&self, action: PolicyAction) -> Result<()> {
        let mut dra = self.default_route_action.write().unwrap();
        if dra.is_some() {
            return Err(Error::DefaultRouteActionExists);
        }
        *dra = Some(action);
        Ok(())
    }

    /// Replace the default-route action regardless of presence.
    pub fn default_route_action_update(&self, action: PolicyAction) {
        *self.default_route_action.write().unwrap() = Some(action);
    }

    /// Remove the default-route action. No-op when absent.
    pub fn default_route_action_clear(&self) {
        *self.default_route_action.write().unwrap() = None;
    }

    pub fn default_route_action(&self) -> Option<PolicyAction> {
        self.default_route_action.read().unwrap().clone()
    }

    // ------------------------------------------------------------------
    // Decision
    // ------------------------------------------------------------------

    /// The per-packet decision. Called on ACL match only.
    ///
    /// Selection: if group selection is random, probe the hash-picked
    /// group once (and within it the hash-picked label once, if the group
    /// is random too); any miss degrades to ordered scans — first within
    /// the probed group, then across all groups in declared order. Each
    /// label resolves through the FIB intersection, or through the
    /// enforced labeled descriptor when the lookup came from the default
    /// route.
    pub fn get_dpo(
        &self,
        index: u32,
        meta: &PacketMeta,
        lb: &LoadBalance,
        links: &LinkRegistry,
        tracker: &DefaultRouteTracker,
    ) -> PolicyVerdict {
        let pool = self.pool.read().unwrap();
        let Some(Some(policy)) = pool.slots.get(index as usize) else {
            // Stale index after a delete: behave as a miss.
            return PolicyVerdict::DeferToFib;
        };
        policy.counters.matched.inc();

        let family = meta.family();
        let is_default_route = tracker.is_lb_default_route(lb, family);

        let dra = self.default_route_action.read().unwrap();
        let action = match dra.as_ref() {
            Some(action) if is_default_route => {
                policy.counters.default_route.inc();
                action
            }
            _ => &policy.action,
        };

        let class = ServiceClass::from_dscp(meta.dscp);
        let resolve = |label: Label| -> Option<Dpo> {
            if !links.meets_tolerance(label, class) {
                return None;
            }
            if is_default_route {
                links.get_labeled_dpo(label)
            } else {
                links.get_dpo(label, lb)
            }
        };

        // Flow hash is computed at most once per packet, lazily.
        let mut cached_hash: Option<u32> = None;

        if action.selection == Selection::Random && action.groups.len() > 1 {
            let hash =
                *cached_hash.get_or_insert_with(|| flow_hash(meta, FLOW_HASH_DEFAULT));
            let gi = index_by_flow_hash(hash, action.pow2_mask, action.n_minus_1) as usize;
            let group = &action.groups[gi];

            if group.selection == Selection::Random && group.labels.len() > 1 {
                let li = index_by_flow_hash(hash, group.pow2_mask, group.n_minus_1) as usize;
                if let Some(dpo) = resolve(group.labels[li]) {
                    policy.counters.applied.inc();
                    return PolicyVerdict::Forward(dpo);
                }
            }

            // Probe missed: ordered scan within the chosen group before
            // the scan over all groups.
            for &label in &group.labels {
                if let Some(dpo) = resolve(label) {
                    policy.counters.applied.inc();
                    return PolicyVerdict::Forward(dpo);
                }
            }
        }

        for group in &action.groups {
            if group.selection == Selection::Random && group.labels.len() > 1 {
                let hash =
                    *cached_hash.get_or_insert_with(|| flow_hash(meta, FLOW_HASH_DEFAULT));
                let li = (hash & group.n_minus_1) as usize;
                if let Some(dpo) = resolve(group.labels[li]) {
                    policy.counters.applied.inc();
                    return PolicyVerdict::Forward(dpo);
                }
            }
            for &label in &group.labels {
                if let Some(dpo) = resolve(label) {
                    policy.counters.applied.inc();
                    return PolicyVerdict::Forward(dpo);
                }
            }
        }

        match action.fallback {
            Fallback::DefaultRoute => {
                policy.counters.fallback.inc();
                PolicyVerdict::DeferToFib
            }
            Fallback::Drop => {
                policy.counters.dropped.inc();
                PolicyVerdict::Forward(Dpo::drop())
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Snapshot every policy.
    pub fn dump(&self) -> Vec<PolicyInfo> {
        let pool = self.pool.read().unwrap();
        let mut infos: Vec<PolicyInfo> = pool
            .slots
            .iter()
            .flatten()
            .map(|p| PolicyInfo {
                policy_id: p.policy_id,
                acl_id: p.acl_id,
                ref_count: p.ref_count.load(Ordering::Relaxed),
                action: p.action.clone(),
                matched: p.counters.matched.get(),
                applied: p.counters.applied.get(),
                fallback: p.counters.fallback.get(),
                dropped: p.counters.dropped.get(),
                default_route: p.counters.default_route.get(),
            })
            .collect();
        infos.sort_by_key(|p| p.policy_id);
        infos
    }

    /// Counter snapshot for one policy id.
    pub fn counters(&self, policy_id: u32) -> Option<PolicyInfo> {
        let index = self.find(policy_id)?;
        let pool = self.pool.read().unwrap();
        pool.slots.get(index as usize)?.as_ref().map(|p| PolicyInfo {
            policy_id: p.policy_id,
            acl_id: p.acl_id,
            ref_count: p.ref_count.load(Ordering::Relaxed),
            action: p.action.clone(),
            matched: p.counters.matched.get(),
            applied: p.counters.applied.get(),
            fallback: p.counters.fallback.get(),
            dropped: p.counters.dropped.get(),
            default_route: p.counters.default_route.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::{Fib, Prefix, RoutePath};
    use crate::packet::Family;
    use std::net::IpAddr;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn ordered(labels: Vec<Label>) -> PolicyAction {
        PolicyAction::new(
            Fallback::DefaultRoute,
            Selection::Ordered,
            vec![LinkGroup::new(Selection::Ordered, labels).unwrap()],
        )
        .unwrap()
    }

    struct Env {
        fib: Arc<Fib>,
        links: Arc<LinkRegistry>,
        tracker: Arc<DefaultRouteTracker>,
        store: PolicyStore,
    }

    /// Two labeled tunnels (10 on if 1, 20 on if 2) and an ECMP route to
    /// 8.8.8.0/24 over both, everything resolved.
    fn make_env() -> Env {
        let fib = Arc::new(Fib::new());
        let links = Arc::new(LinkRegistry::new());
        let tracker = Arc::new(DefaultRouteTracker::new());

        LinkRegistry::link_add(&links, &fib, 1, 10, RoutePath::new(ip("10.100.0.1"), 1))
            .unwrap();
        LinkRegistry::link_add(&links, &fib, 2, 20, RoutePath::new(ip("10.100.0.2"), 2))
            .unwrap();
        fib.route_add(
            Prefix::parse("8.8.8.0/24").unwrap(),
            vec![
                RoutePath::new(ip("10.100.0.1"), 1),
                RoutePath::new(ip("10.100.0.2"), 2),
            ],
        );
        fib.neighbor_resolve(1, ip("10.100.0.1"));
        fib.neighbor_resolve(2, ip("10.100.0.2"));

        Env {
            fib,
            links,
            tracker,
            store: PolicyStore::new(),
        }
    }

    fn pkt() -> PacketMeta {
        PacketMeta::new(ip("192.168.1.10"), ip("8.8.8.8"), 6, 5).with_ports(40000, 443)
    }

    #[test]
    fn test_index_by_flow_hash_in_range() {
        for len in 1..=20usize {
            let n_minus_1 = len as u32 - 1;
            let mask = pow2_mask(len);
            for hash in [0u32, 1, 7, 0xF, 0x10, 0xFE, 0xFFFF_FFFF] {
                let i = index_by_flow_hash(hash, mask, n_minus_1);
                assert!(i <= n_minus_1, "len={} hash={:#x} -> {}", len, hash, i);
            }
        }
    }

    #[test]
    fn test_policy_crud() {
        let store = PolicyStore::new();
        let action = ordered(vec![10]);
        store.policy_add(1, 100, action.clone()).unwrap();
        assert!(matches!(
            store.policy_add(1, 100, action.clone()),
            Err(Error::PolicyExists { policy_id: 1 })
        ));
        assert!(matches!(
            store.policy_delete(2),
            Err(Error::PolicyNotFound { policy_id: 2 })
        ));

        let index = store.find(1).unwrap();
        store.ref_inc(index);
        assert!(matches!(
            store.policy_delete(1),
            Err(Error::PolicyInUse { policy_id: 1 })
        ));
        store.ref_dec(index);
        store.policy_delete(1).unwrap();
        assert!(store.find(1).is_none());

        // The freed slot is reused.
        let index2 = store.policy_add(3, 100, action).unwrap();
        assert_eq!(index, index2);
    }

    #[test]
    fn test_ordered_selection_first_declared_wins() {
        let env = make_env();
        let index = env.store.policy_add(1, 100, ordered(vec![10, 20])).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));

        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        let PolicyVerdict::Forward(dpo) = verdict else {
            panic!("expected a policy descriptor");
        };
        assert_eq!(env.fib.adj(dpo.adj).unwrap().sw_if_index, 1);

        let info = env.store.counters(1).unwrap();
        assert_eq!(info.matched, 1);
        assert_eq!(info.applied, 1);
    }

    #[test]
    fn test_ordered_selection_skips_down_link() {
        let env = make_env();
        let index = env.store.policy_add(1, 100, ordered(vec![10, 20])).unwrap();

        env.fib.neighbor_unresolve(1, ip("10.100.0.1"));
        let lb = env.fib.lookup(ip("8.8.8.8"));
        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        let PolicyVerdict::Forward(dpo) = verdict else {
            panic!("expected a policy descriptor");
        };
        assert_eq!(env.fib.adj(dpo.adj).unwrap().sw_if_index, 2);
    }

    #[test]
    fn test_fallback_default_route_defers_to_fib() {
        let env = make_env();
        // Label 77 has no link.
        let index = env.store.policy_add(1, 100, ordered(vec![77])).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));

        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        assert_eq!(verdict, PolicyVerdict::DeferToFib);
        assert_eq!(env.store.counters(1).unwrap().fallback, 1);
    }

    #[test]
    fn test_fallback_drop_returns_drop_descriptor() {
        let env = make_env();
        let action = PolicyAction::new(
            Fallback::Drop,
            Selection::Ordered,
            vec![LinkGroup::new(Selection::Ordered, vec![77]).unwrap()],
        )
        .unwrap();
        let index = env.store.policy_add(1, 100, action).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));

        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        assert_eq!(verdict, PolicyVerdict::Forward(Dpo::drop()));
        assert_eq!(env.store.counters(1).unwrap().dropped, 1);
    }

    #[test]
    fn test_random_probe_miss_degrades_to_ordered() {
        let env = make_env();
        // Three groups, all labels dead except group C's first.
        let action = PolicyAction::new(
            Fallback::DefaultRoute,
            Selection::Random,
            vec![
                LinkGroup::new(Selection::Ordered, vec![70]).unwrap(),
                LinkGroup::new(Selection::Ordered, vec![71]).unwrap(),
                LinkGroup::new(Selection::Ordered, vec![20]).unwrap(),
            ],
        )
        .unwrap();
        let index = env.store.policy_add(1, 100, action).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));

        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        let PolicyVerdict::Forward(dpo) = verdict else {
            panic!("expected a policy descriptor");
        };
        // Whatever group the hash picked, the ordered fallback must land
        // on the only live label.
        assert_eq!(env.fib.adj(dpo.adj).unwrap().sw_if_index, 2);
    }

    #[test]
    fn test_random_group_respects_flow_hash_pick() {
        let env = make_env();
        let action = PolicyAction::new(
            Fallback::DefaultRoute,
            Selection::Random,
            vec![
                LinkGroup::new(Selection::Ordered, vec![10]).unwrap(),
                LinkGroup::new(Selection::Ordered, vec![20]).unwrap(),
            ],
        )
        .unwrap();
        let index = env.store.policy_add(1, 100, action).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));
        let meta = pkt();

        let hash = flow_hash(&meta, FLOW_HASH_DEFAULT);
        let expected_group = index_by_flow_hash(hash, pow2_mask(2), 1);
        let expected_if = if expected_group == 0 { 1 } else { 2 };

        let verdict = env
            .store
            .get_dpo(index, &meta, &lb, &env.links, &env.tracker);
        let PolicyVerdict::Forward(dpo) = verdict else {
            panic!("expected a policy descriptor");
        };
        assert_eq!(env.fib.adj(dpo.adj).unwrap().sw_if_index, expected_if);
    }

    #[test]
    fn test_default_route_override_action() {
        let env = make_env();
        // WAN link labeled 30 behind the default route.
        LinkRegistry::link_add(
            &env.links,
            &env.fib,
            3,
            30,
            RoutePath::new(ip("192.168.0.254"), 3),
        )
        .unwrap();
        env.fib.route_add(
            Prefix::default_route(Family::V4),
            vec![RoutePath::new(ip("192.168.0.254"), 3)],
        );
        env.fib.neighbor_resolve(3, ip("192.168.0.254"));
        DefaultRouteTracker::try_init(&env.tracker, &env.fib);

        // The policy's own labels can never resolve.
        let index = env.store.policy_add(1, 100, ordered(vec![77])).unwrap();
        env.store
            .default_route_action_set(ordered(vec![30]))
            .unwrap();
        assert!(env.store.default_route_action_set(ordered(vec![30])).is_err());

        // Packet to an address only the default route covers.
        let meta = PacketMeta::new(ip("192.168.1.10"), ip("203.0.113.9"), 6, 5)
            .with_ports(40000, 443);
        let lb = env.fib.lookup(ip("203.0.113.9"));
        let verdict = env
            .store
            .get_dpo(index, &meta, &lb, &env.links, &env.tracker);
        let PolicyVerdict::Forward(dpo) = verdict else {
            panic!("expected a policy descriptor");
        };
        assert_eq!(env.fib.adj(dpo.adj).unwrap().sw_if_index, 3);
        assert_eq!(env.store.counters(1).unwrap().default_route, 1);

        env.store.default_route_action_clear();
        assert!(env.store.default_route_action().is_none());
    }

    #[test]
    fn test_stale_index_defers_to_fib() {
        let env = make_env();
        let index = env.store.policy_add(1, 100, ordered(vec![10])).unwrap();
        env.store.policy_delete(1).unwrap();
        let lb = env.fib.lookup(ip("8.8.8.8"));
        let verdict = env
            .store
            .get_dpo(index, &pkt(), &lb, &env.links, &env.tracker);
        assert_eq!(verdict, PolicyVerdict::DeferToFib);
    }

    #[test]
    fn test_action_display() {
        let action = PolicyAction::new(
            Fallback::Drop,
            Selection::Random,
            vec![
                LinkGroup::new(Selection::Random, vec![1, 2]).unwrap(),
                LinkGroup::new(Selection::Ordered, vec![3]).unwrap(),
            ],
        )
        .unwrap();
        let s = action.to_string();
        assert!(s.contains("fallback:drop"));
        assert!(s.contains("select_group:random"));
        assert!(s.contains("group[0]: order:random labels:1,2"));
        assert!(s.contains("group[1]: order:priority labels:3"));
    }

    #[test]
    fn test_action_validation() {
        assert!(PolicyAction::new(Fallback::Drop, Selection::Ordered, vec![]).is_err());
        assert!(LinkGroup::new(Selection::Ordered, vec![]).is_err());
        assert!(LinkGroup::new(Selection::Ordered, vec![255]).is_err());
        assert!(LinkGroup::new(Selection::Ordered, vec![254]).is_ok());
    }
}
