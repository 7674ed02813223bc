//! Link registry
//!
//! A Link is the engine's record for one labeled transmit interface — a
//! tunnel or a WAN interface. It holds the label, a path-list tracking the
//! reachability of the remote tunnel end / gateway, and the cached
//! forwarding descriptor refreshed on every routing back-walk.
//!
//! The registry owns the authoritative adjacency→label mapping as two
//! direct-addressed byte arrays read by the datapath without locks:
//! the *admin* map holds the label while the link exists regardless of
//! reachability, the *reachable* map only while the link is usable. The
//! main datapath query is [`LinkRegistry::get_dpo`]: intersect the FIB
//! lookup result with the labeled reachable links and return the first
//! bucket that carries the label.

use crate::dataplane::default_route::DefaultRouteTracker;
use crate::dataplane::quality::{Quality, ServiceClass};
use crate::error::{Error, Result};
use crate::fib::{
    AdjIndex, BackWalk, Dpo, DpoKind, Fib, LoadBalance, PathListHandle, RoutePath, MAX_ADJ_INDEX,
};
use crate::packet::Family;
use crate::telemetry::LabelStats;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

/// Path label assigned by the operator to a transmit link.
pub type Label = u8;

/// Sentinel: no label.
pub const INVALID_LABEL: Label = 0xFF;

/// Largest assignable label.
pub const MAX_LABEL: Label = 0xFE;

const INVALID_INDEX: u32 = u32::MAX;

fn has_adjacency(dpo: &Dpo) -> bool {
    matches!(
        dpo.kind,
        DpoKind::Adjacency | DpoKind::AdjacencyMidchain | DpoKind::AdjacencyIncomplete
    )
}

/// One link slot. A slot whose `sw_if_index` is the invalid sentinel is
/// free; slots are never removed, so indices stay stable.
#[derive(Debug)]
struct LinkSlot {
    sw_if_index: u32,
    label: Label,
    family: Family,
    rpath: Option<RoutePath>,
    path_list: Option<PathListHandle>,
    sibling: u32,
    /// Cached forwarding descriptor, refreshed on back-walks.
    dpo: Dpo,
    quality: Quality,
}

impl Default for LinkSlot {
    fn default() -> Self {
        Self {
            sw_if_index: INVALID_INDEX,
            label: INVALID_LABEL,
            family: Family::V4,
            rpath: None,
            path_list: None,
            sibling: 0,
            dpo: Dpo::drop(),
            quality: Quality::default(),
        }
    }
}

/// Per-label data: the interface carrying the label plus usage counters.
#[derive(Debug, Default)]
struct LabelSlot {
    sw_if_index: u32,
    stats: LabelStats,
}

/// Introspection snapshot of one link.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub sw_if_index: u32,
    pub label: Label,
    pub family: Family,
    pub next_hop: Option<std::net::IpAddr>,
    pub adj: Option<AdjIndex>,
    pub up: bool,
    pub quality: Quality,
    pub hits: u64,
    pub misses: u64,
    pub enforced_hits: u64,
    pub enforced_misses: u64,
}

/// Database of labeled links and the adjacency→label maps.
pub struct LinkRegistry {
    links: RwLock<Vec<LinkSlot>>,
    labels: RwLock<Vec<LabelSlot>>,
    /// adjacency → label while the link exists (any reachability).
    admin_map: Vec<AtomicU8>,
    /// adjacency → label while the link is up and usable.
    reachable_map: Vec<AtomicU8>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        let mut labels = Vec::with_capacity(MAX_LABEL as usize + 1);
        for _ in 0..=MAX_LABEL {
            labels.push(LabelSlot {
                sw_if_index: INVALID_INDEX,
                stats: LabelStats::default(),
            });
        }
        let mk_map = || {
            (0..MAX_ADJ_INDEX as usize)
                .map(|_| AtomicU8::new(INVALID_LABEL))
                .collect()
        };
        Self {
            links: RwLock::new(Vec::new()),
            labels: RwLock::new(labels),
            admin_map: mk_map(),
            reachable_map: mk_map(),
        }
    }

    // ------------------------------------------------------------------
    // Control plane
    // ------------------------------------------------------------------

    /// Register a labeled link on `sw_if_index`, resolving `rpath` (the
    /// remote tunnel end or WAN gateway) through a path-list subscribed to
    /// routing back-walks.
    pub fn link_add(
        registry: &Arc<Self>,
        fib: &Fib,
        sw_if_index: u32,
        label: Label,
        rpath: RoutePath,
    ) -> Result<()> {
        if label > MAX_LABEL {
            warn!(label, "label is too big, should be less than 255");
            return Err(Error::LabelOutOfRange {
                label: label as u32,
            });
        }

        let mut links = registry.links.write().unwrap();
        if links.len() <= sw_if_index as usize {
            links.resize_with(sw_if_index as usize + 1, LinkSlot::default);
        }
        if links[sw_if_index as usize].sw_if_index != INVALID_INDEX {
            warn!(sw_if_index, "link on interface exists");
            return Err(Error::LinkExists { sw_if_index });
        }

        let path_list = fib.path_list_create(rpath);
        let dpo = fib.path_list_contribute(path_list);
        if has_adjacency(&dpo) && dpo.adj >= MAX_ADJ_INDEX {
            fib.path_list_release(path_list);
            return Err(Error::AdjacencyOutOfRange { adj: dpo.adj });
        }

        let weak: Weak<Self> = Arc::downgrade(registry);
        let sibling = fib.path_list_child_add(
            path_list,
            sw_if_index as u64,
            Arc::new(move |token, walk| {
                if let (Some(registry), BackWalk::PathList(dpo)) = (weak.upgrade(), walk) {
                    registry.refresh(token as u32, *dpo);
                }
            }),
        );

        let slot = &mut links[sw_if_index as usize];
        slot.sw_if_index = sw_if_index;
        slot.label = label;
        slot.family = rpath.family();
        slot.rpath = Some(rpath);
        slot.path_list = Some(path_list);
        slot.sibling = sibling;
        slot.quality = Quality::default();
        slot.dpo = Dpo::drop();
        registry.install_dpo(slot, dpo);
        drop(links);

        // The label index is published last; a reader that beats it just
        // misses the label, which is a valid pre-add state.
        registry.labels.write().unwrap()[label as usize].sw_if_index = sw_if_index;

        debug!(sw_if_index, label, "link added");
        Ok(())
    }

    /// Remove the link on `sw_if_index`. Idempotent: unknown interfaces
    /// are fine. The slot sentinel is written before anything else so the
    /// datapath never follows a half-torn-down link.
    pub fn link_del(&self, fib: &Fib, sw_if_index: u32) -> Result<()> {
        let (label, path_list, sibling) = {
            let mut links = self.links.write().unwrap();
            let Some(slot) = links.get_mut(sw_if_index as usize) else {
                return Ok(());
            };
            if slot.sw_if_index == INVALID_INDEX {
                return Ok(());
            }
            slot.sw_if_index = INVALID_INDEX;

            if has_adjacency(&slot.dpo) {
                let adj = slot.dpo.adj as usize;
                self.reachable_map[adj].store(INVALID_LABEL, Ordering::Relaxed);
                self.admin_map[adj].store(INVALID_LABEL, Ordering::Relaxed);
            }
            let label = slot.label;
            let path_list = slot.path_list.take();
            let sibling = slot.sibling;
            slot.dpo = Dpo::drop();
            (label, path_list, sibling)
        };

        self.labels.write().unwrap()[label as usize].sw_if_index = INVALID_INDEX;

        if let Some(path_list) = path_list {
            fib.path_list_child_remove(path_list, sibling);
            fib.path_list_release(path_list);
        }
        debug!(sw_if_index, label, "link deleted");
        Ok(())
    }

    /// Update quality figures. Only the provided fields change. A loss
    /// update flips the reachable-map slot; the admin map is untouched.
    pub fn quality_set(
        &self,
        sw_if_index: u32,
        loss: Option<u32>,
        delay: Option<u32>,
        jitter: Option<u32>,
    ) -> Result<()> {
        let mut links = self.links.write().unwrap();
        let slot = links
            .get_mut(sw_if_index as usize)
            .filter(|s| s.sw_if_index != INVALID_INDEX)
            .ok_or(Error::LinkNotFound { sw_if_index })?;

        if let Some(loss) = loss {
            slot.quality.loss = loss;
        }
        if let Some(delay) = delay {
            slot.quality.delay = delay;
        }
        if let Some(jitter) = jitter {
            slot.quality.jitter = jitter;
        }

        if loss.is_some() && has_adjacency(&slot.dpo) {
            let reachable = if slot.quality.usable() && slot.dpo.is_up() {
                slot.label
            } else {
                INVALID_LABEL
            };
            self.reachable_map[slot.dpo.adj as usize].store(reachable, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Back-walk target: a link's path-list re-resolved.
    fn refresh(&self, sw_if_index: u32, dpo: Dpo) {
        let mut links = self.links.write().unwrap();
        let Some(slot) = links.get_mut(sw_if_index as usize) else {
            return;
        };
        if slot.sw_if_index == INVALID_INDEX {
            return;
        }
        self.install_dpo(slot, dpo);
    }

    /// Write the refreshed descriptor into the slot and the maps.
    fn install_dpo(&self, slot: &mut LinkSlot, dpo: Dpo) {
        // The path-list can re-resolve onto a different adjacency; stale
        // map slots must not keep the label.
        if has_adjacency(&slot.dpo) && (!has_adjacency(&dpo) || slot.dpo.adj != dpo.adj) {
            let old = slot.dpo.adj as usize;
            self.reachable_map[old].store(INVALID_LABEL, Ordering::Relaxed);
            self.admin_map[old].store(INVALID_LABEL, Ordering::Relaxed);
        }

        if has_adjacency(&dpo) {
            let adj = dpo.adj as usize;
            let reachable = if dpo.is_up() && slot.quality.usable() {
                slot.label
            } else {
                INVALID_LABEL
            };
            self.reachable_map[adj].store(reachable, Ordering::Relaxed);
            self.admin_map[adj].store(slot.label, Ordering::Relaxed);
        }
        slot.dpo = dpo;
    }

    // ------------------------------------------------------------------
    // Datapath queries
    // ------------------------------------------------------------------

    /// Intersect the FIB lookup result with the labeled reachable links:
    /// the first bucket whose adjacency carries `label` wins. The FIB's
    /// own descriptor is returned, not the link's cached one — it carries
    /// the right next graph node.
    pub fn get_dpo(&self, label: Label, lb: &LoadBalance) -> Option<Dpo> {
        if label > MAX_LABEL {
            return None;
        }
        for dpo in lb.buckets() {
            if dpo.is_up()
                && self.reachable_map[dpo.adj as usize].load(Ordering::Relaxed) == label
            {
                self.labels.read().unwrap()[label as usize].stats.hits.inc();
                return Some(*dpo);
            }
        }
        self.labels.read().unwrap()[label as usize].stats.misses.inc();
        None
    }

    /// The labeled link's own descriptor, bypassing the FIB intersection.
    /// Used when the FIB brought a default-route adjacency and policy is
    /// enforced over routing.
    pub fn get_labeled_dpo(&self, label: Label) -> Option<Dpo> {
        if label > MAX_LABEL {
            return None;
        }
        let sw_if_index = self.labels.read().unwrap()[label as usize].sw_if_index;
        if sw_if_index == INVALID_INDEX {
            return None;
        }
        // The slot is re-checked after the label index lookup; a racing
        // delete shows up as the slot sentinel.
        let dpo = {
            let links = self.links.read().unwrap();
            let slot = links.get(sw_if_index as usize)?;
            if slot.sw_if_index == INVALID_INDEX {
                return None;
            }
            (slot.dpo.is_up() && slot.quality.usable()).then_some(slot.dpo)
        };

        let labels = self.labels.read().unwrap();
        let stats = &labels[label as usize].stats;
        match dpo {
            Some(dpo) => {
                stats.enforced_hits.inc();
                Some(dpo)
            }
            None => {
                stats.enforced_misses.inc();
                None
            }
        }
    }

    /// Label admin-assigned to an adjacency, if any (regardless of
    /// reachability).
    pub fn admin_label(&self, adj: AdjIndex) -> Option<Label> {
        match self.admin_map[adj as usize].load(Ordering::Relaxed) {
            INVALID_LABEL => None,
            label => Some(label),
        }
    }

    /// Label an adjacency currently serves, if the link is up.
    pub fn reachable_label(&self, adj: AdjIndex) -> Option<Label> {
        match self.reachable_map[adj as usize].load(Ordering::Relaxed) {
            INVALID_LABEL => None,
            label => Some(label),
        }
    }

    /// Whether the FIB lookup result leads to labeled links or to the
    /// default route at all. Any bucket that is not a usable adjacency
    /// (e.g. a receive path to the local machine) makes this false.
    pub fn is_lb_labeled_or_default_route(
        &self,
        lb: &LoadBalance,
        tracker: &DefaultRouteTracker,
        family: Family,
    ) -> bool {
        for dpo in lb.buckets() {
            if !dpo.is_up() {
                return false;
            }
            if self.admin_label(dpo.adj).is_some() {
                return true;
            }
            if tracker.is_default_route_adjacency(dpo.adj, family) {
                return true;
            }
        }
        false
    }

    /// Whether the link carrying `label` satisfies the service-class
    /// tolerance. Labels without a link pass (resolution fails on its own
    /// terms later).
    pub fn meets_tolerance(&self, label: Label, class: ServiceClass) -> bool {
        if label > MAX_LABEL {
            return true;
        }
        let sw_if_index = self.labels.read().unwrap()[label as usize].sw_if_index;
        if sw_if_index == INVALID_INDEX {
            return true;
        }
        let links = self.links.read().unwrap();
        match links.get(sw_if_index as usize) {
            Some(slot) if slot.sw_if_index != INVALID_INDEX => {
                slot.quality.within(class.tolerance())
            }
            _ => true,
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Snapshot every live link with its per-label counters.
    pub fn dump(&self) -> Vec<LinkInfo> {
        let mut infos: Vec<LinkInfo> = {
            let links = self.links.read().unwrap();
            links
                .iter()
                .filter(|slot| slot.sw_if_index != INVALID_INDEX)
                .map(|slot| LinkInfo {
                    sw_if_index: slot.sw_if_index,
                    label: slot.label,
                    family: slot.family,
                    next_hop: slot.rpath.map(|r| r.next_hop),
                    adj: has_adjacency(&slot.dpo).then_some(slot.dpo.adj),
                    up: slot.dpo.is_up() && slot.quality.usable(),
                    quality: slot.quality,
                    hits: 0,
                    misses: 0,
                    enforced_hits: 0,
                    enforced_misses: 0,
                })
                .collect()
        };
        let labels = self.labels.read().unwrap();
        for info in &mut infos {
            let stats = &labels[info.label as usize].stats;
            info.hits = stats.hits.get();
            info.misses = stats.misses.get();
            info.enforced_hits = stats.enforced_hits.get();
            info.enforced_misses = stats.enforced_misses.get();
        }
        infos
    }

    /// Interface carrying a label, if any.
    pub fn label_interface(&self, label: Label) -> Option<u32> {
        if label > MAX_LABEL {
            return None;
        }
        let sw_if_index = self.labels.read().unwrap()[label as usize].sw_if_index;
        (sw_if_index != INVALID_INDEX).then_some(sw_if_index)
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
