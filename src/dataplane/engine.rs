//! Engine composite
//!
//! Owns the registries and wires them to the routing substrate: link
//! registration subscribes path-lists to back-walks, and every link
//! addition gives the default-route tracker another chance to find the
//! default entry. Control-plane operations land here; the per-packet path
//! lives in the node module.

use crate::acl::AclDb;
use crate::dataplane::attach::{Attachment, AttachmentStore};
use crate::dataplane::default_route::DefaultRouteTracker;
use crate::dataplane::links::{Label, LinkInfo, LinkRegistry};
use crate::dataplane::locals::LocalAddrFilter;
use crate::dataplane::policy::{PolicyAction, PolicyInfo, PolicyStore};
use crate::error::Result;
use crate::fib::{AdjIndex, Fib, LoadBalance, RoutePath};
use crate::packet::Family;
use crate::telemetry::NodeCounters;
use std::net::IpAddr;
use std::sync::Arc;

/// The ACL-based multi-link forwarding engine.
pub struct Engine {
    pub(crate) fib: Arc<Fib>,
    pub(crate) acl: Arc<AclDb>,
    pub(crate) locals: LocalAddrFilter,
    pub(crate) links: Arc<LinkRegistry>,
    pub(crate) default_route: Arc<DefaultRouteTracker>,
    pub(crate) policies: PolicyStore,
    pub(crate) attachments: AttachmentStore,
    pub(crate) counters: NodeCounters,
}

impl Engine {
    /// New engine over the given routing substrate and classifier.
    pub fn new(fib: Arc<Fib>, acl: Arc<AclDb>) -> Self {
        Self {
            fib,
            acl,
            locals: LocalAddrFilter::new(),
            links: Arc::new(LinkRegistry::new()),
            default_route: Arc::new(DefaultRouteTracker::new()),
            policies: PolicyStore::new(),
            attachments: AttachmentStore::new(),
            counters: NodeCounters::default(),
        }
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Register a labeled transmit link. Also retries default-route entry
    /// discovery, which is lazy because the default prefix may be
    /// installed after the engine comes up.
    pub fn link_add(&self, sw_if_index: u32, label: Label, rpath: RoutePath) -> Result<()> {
        LinkRegistry::link_add(&self.links, &self.fib, sw_if_index, label, rpath)?;
        DefaultRouteTracker::try_init(&self.default_route, &self.fib);
        Ok(())
    }

    /// Remove a labeled link. Idempotent.
    pub fn link_del(&self, sw_if_index: u32) -> Result<()> {
        self.links.link_del(&self.fib, sw_if_index)
    }

    /// Update link quality figures; `None` fields are left unchanged.
    pub fn quality_set(
        &self,
        sw_if_index: u32,
        loss: Option<u32>,
        delay: Option<u32>,
        jitter: Option<u32>,
    ) -> Result<()> {
        self.links.quality_set(sw_if_index, loss, delay, jitter)
    }

    // ------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------

    pub fn policy_add(&self, policy_id: u32, acl_id: u32, action: PolicyAction) -> Result<()> {
        self.policies.policy_add(policy_id, acl_id, action)?;
        Ok(())
    }

    pub fn policy_delete(&self, policy_id: u32) -> Result<()> {
        self.policies.policy_delete(policy_id)
    }

    pub fn default_route_action_set(&self, action: PolicyAction) -> Result<()> {
        self.policies.default_route_action_set(action)
    }

    pub fn default_route_action_update(&self, action: PolicyAction) {
        self.policies.default_route_action_update(action)
    }

    pub fn default_route_action_clear(&self) {
        self.policies.default_route_action_clear()
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    pub fn attach(
        &self,
        family: Family,
        policy_id: u32,
        rx_sw_if_index: u32,
        priority: u32,
    ) -> Result<()> {
        self.attachments.attach(
            &self.policies,
            &self.acl,
            family,
            policy_id,
            rx_sw_if_index,
            priority,
        )
    }

    pub fn detach(&self, family: Family, policy_id: u32, rx_sw_if_index: u32) -> Result<()> {
        self.attachments
            .detach(&self.policies, &self.acl, family, policy_id, rx_sw_if_index)
    }

    // ------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------

    /// Interface address callback from the routing layer.
    pub fn on_interface_address(&self, addr: IpAddr, is_delete: bool) {
        self.locals.on_interface_address(addr, is_delete);
    }

    // ------------------------------------------------------------------
    // Queries and introspection
    // ------------------------------------------------------------------

    /// Whether the FIB lookup result leads to labeled links or the
    /// default route at all.
    pub fn is_labeled_or_default_route(&self, lb: &LoadBalance, family: Family) -> bool {
        self.links
            .is_lb_labeled_or_default_route(lb, &self.default_route, family)
    }

    pub fn fib(&self) -> &Arc<Fib> {
        &self.fib
    }

    pub fn acl(&self) -> &AclDb {
        &self.acl
    }

    pub fn locals(&self) -> &LocalAddrFilter {
        &self.locals
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub fn default_route(&self) -> &DefaultRouteTracker {
        &self.default_route
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    pub fn node_counters(&self) -> &NodeCounters {
        &self.counters
    }

    pub fn policies_dump(&self) -> Vec<PolicyInfo> {
        self.policies.dump()
    }

    pub fn links_dump(&self) -> Vec<LinkInfo> {
        self.links.dump()
    }

    pub fn attachments_dump(&self, sw_if_index: Option<u32>) -> Vec<Attachment> {
        self.attachments.dump(sw_if_index)
    }

    pub fn default_route_dump(&self, family: Family) -> Vec<AdjIndex> {
        self.default_route.dump(family)
    }
}
