//! Attachments
//!
//! An attachment binds a policy to an RX interface at a priority, which is
//! what actually activates classification on that interface. Attachments
//! are grouped into per-(interface, family) lists sorted by ascending
//! priority; the same ordered list supplies the ACL vector of the
//! interface's lookup context, so the position returned by an ACL match is
//! a direct index into the attachment list.
//!
//! The first attachment on an interface enables the engine's node on the
//! interface's feature arc and acquires the ACL lookup context; the last
//! detachment reverses both.

use crate::acl::AclDb;
use crate::dataplane::policy::PolicyStore;
use crate::error::{Error, Result};
use crate::packet::Family;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// One policy-to-interface binding. Attachments reference policies by
/// stable pool index; they own nothing.
#[derive(Debug, Clone, Copy)]
pub struct Attachment {
    pub policy_index: u32,
    pub policy_id: u32,
    /// Cached from the policy for the ACL context rebuild.
    pub acl_id: u32,
    pub sw_if_index: u32,
    pub family: Family,
    /// Lower value = higher priority.
    pub priority: u32,
}

#[derive(Debug)]
struct ItfState {
    /// Attachment pool indices, sorted by ascending priority.
    attachments: Vec<u32>,
    lc_index: u32,
}

/// Store of attachments plus the per-interface activation state.
#[derive(Debug, Default)]
pub struct AttachmentStore {
    pool: RwLock<Vec<Option<Attachment>>>,
    db: RwLock<HashMap<(u32, u32, Family), u32>>,
    per_itf: RwLock<HashMap<(Family, u32), ItfState>>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `policy_id` to `sw_if_index` for `family` at `priority`.
    pub fn attach(
        &self,
        policies: &PolicyStore,
        acl: &AclDb,
        family: Family,
        policy_id: u32,
        sw_if_index: u32,
        priority: u32,
    ) -> Result<()> {
        let policy_index = policies
            .find(policy_id)
            .ok_or(Error::PolicyNotFound { policy_id })?;
        let acl_id = policies
            .acl_of(policy_index)
            .ok_or(Error::PolicyNotFound { policy_id })?;

        let mut db = self.db.write().unwrap();
        if db.contains_key(&(policy_id, sw_if_index, family)) {
            return Err(Error::AttachmentExists {
                policy_id,
                sw_if_index,
            });
        }

        let attachment = Attachment {
            policy_index,
            policy_id,
            acl_id,
            sw_if_index,
            family,
            priority,
        };

        let mut pool = self.pool.write().unwrap();
        let index = match pool.iter().position(|slot| slot.is_none()) {
            Some(i) => {
                pool[i] = Some(attachment);
                i as u32
            }
            None => {
                pool.push(Some(attachment));
                (pool.len() - 1) as u32
            }
        };
        db.insert((policy_id, sw_if_index, family), index);

        let mut per_itf = self.per_itf.write().unwrap();
        let state = per_itf.entry((family, sw_if_index)).or_insert_with(|| {
            // First policy on the interface: enable the feature-arc node
            // and acquire an ACL lookup context.
            debug!(sw_if_index, %family, "enabling engine on interface");
            ItfState {
                attachments: Vec::new(),
                lc_index: acl.get_lookup_context(),
            }
        });
        state.attachments.push(index);
        state
            .attachments
            .sort_by_key(|&i| pool[i as usize].map(|a| a.priority).unwrap_or(u32::MAX));
        let acl_ids = state
            .attachments
            .iter()
            .filter_map(|&i| pool[i as usize].map(|a| a.acl_id))
            .collect();
        acl.set_context_acls(state.lc_index, acl_ids);

        policies.ref_inc(policy_index);
        debug!(policy_id, sw_if_index, priority, "policy attached");
        Ok(())
    }

    /// Detach `policy_id` from `sw_if_index` for `family`.
    pub fn detach(
        &self,
        policies: &PolicyStore,
        acl: &AclDb,
        family: Family,
        policy_id: u32,
        sw_if_index: u32,
    ) -> Result<()> {
        let mut db = self.db.write().unwrap();
        let Some(index) = db.remove(&(policy_id, sw_if_index, family)) else {
            return Err(Error::AttachmentNotFound {
                policy_id,
                sw_if_index,
            });
        };

        let mut pool = self.pool.write().unwrap();
        let attachment = pool[index as usize].take();

        let mut per_itf = self.per_itf.write().unwrap();
        if let Some(state) = per_itf.get_mut(&(family, sw_if_index)) {
            state.attachments.retain(|&i| i != index);
            if state.attachments.is_empty() {
                // Last attachment: disable the feature-arc node and
                // release the ACL context.
                debug!(sw_if_index, %family, "disabling engine on interface");
                acl.put_lookup_context(state.lc_index);
                per_itf.remove(&(family, sw_if_index));
            } else {
                let acl_ids = state
                    .attachments
                    .iter()
                    .filter_map(|&i| pool[i as usize].map(|a| a.acl_id))
                    .collect();
                acl.set_context_acls(state.lc_index, acl_ids);
            }
        }

        if let Some(attachment) = attachment {
            policies.ref_dec(attachment.policy_index);
        }
        debug!(policy_id, sw_if_index, "policy detached");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Datapath accessors
    // ------------------------------------------------------------------

    /// Whether the engine is active on this (interface, family).
    pub fn is_enabled(&self, family: Family, sw_if_index: u32) -> bool {
        self.per_itf
            .read()
            .unwrap()
            .contains_key(&(family, sw_if_index))
    }

    /// ACL lookup context of the interface, if active.
    pub fn lc_index(&self, family: Family, sw_if_index: u32) -> Option<u32> {
        self.per_itf
            .read()
            .unwrap()
            .get(&(family, sw_if_index))
            .map(|s| s.lc_index)
    }

    /// Attachment at an ACL match position.
    pub fn attachment_at(
        &self,
        family: Family,
        sw_if_index: u32,
        acl_pos: u32,
    ) -> Option<Attachment> {
        let index = {
            let per_itf = self.per_itf.read().unwrap();
            let state = per_itf.get(&(family, sw_if_index))?;
            *state.attachments.get(acl_pos as usize)?
        };
        self.pool.read().unwrap().get(index as usize)?.as_ref().copied()
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Attachments, optionally restricted to one interface, in priority
    /// order per interface.
    pub fn dump(&self, sw_if_index: Option<u32>) -> Vec<Attachment> {
        let pool = self.pool.read().unwrap();
        let mut out: Vec<Attachment> = pool
            .iter()
            .flatten()
            .filter(|a| sw_if_index.map(|i| a.sw_if_index == i).unwrap_or(true))
            .copied()
            .collect();
        out.sort_by_key(|a| (a.sw_if_index, a.priority, a.policy_id));
        out
    }
}
