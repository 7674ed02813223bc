//! ACL classifier
//!
//! Packet classification for policies: an ACL is an ordered rule set over
//! packet 5-tuples (addresses, ports, protocol). The engine consumes it
//! through a narrow interface — fill a 5-tuple from packet metadata, then
//! match it against a lookup context holding the ACLs attached to the RX
//! interface. The match result carries the *position* of the winning ACL
//! within the context, which the attachment store uses as a direct index
//! into its priority-ordered attachment list.

use crate::error::{Error, Result};
use crate::fib::Prefix;
use crate::packet::{Family, PacketMeta};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};

/// Extracted packet classification key.
#[derive(Debug, Clone)]
pub struct FiveTuple {
    pub family: Family,
    pub src: std::net::IpAddr,
    pub dst: std::net::IpAddr,
    pub protocol: u8,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

/// Build the 5-tuple for a packet.
pub fn fill_5tuple(meta: &PacketMeta) -> FiveTuple {
    FiveTuple {
        family: meta.family(),
        src: meta.src,
        dst: meta.dst,
        protocol: meta.protocol,
        src_port: meta.src_port,
        dst_port: meta.dst_port,
    }
}

/// A single ACL rule. All specified criteria must match.
#[derive(Debug, Clone, Default)]
pub struct AclRule {
    /// Source prefix.
    pub src: Option<Prefix>,
    /// Destination prefix.
    pub dst: Option<Prefix>,
    /// IP protocol number (6=TCP, 17=UDP, ...).
    pub protocol: Option<u8>,
    pub src_port: Option<RangeInclusive<u16>>,
    pub dst_port: Option<RangeInclusive<u16>>,
}

impl AclRule {
    /// Check the 5-tuple against this rule.
    pub fn matches(&self, tuple: &FiveTuple) -> bool {
        if let Some(prefix) = self.src {
            if !prefix.contains(tuple.src) {
                return false;
            }
        }
        if let Some(prefix) = self.dst {
            if !prefix.contains(tuple.dst) {
                return false;
            }
        }
        if let Some(proto) = self.protocol {
            if tuple.protocol != proto {
                return false;
            }
        }
        if let Some(ref range) = self.src_port {
            match tuple.src_port {
                Some(port) if range.contains(&port) => {}
                _ => return false,
            }
        }
        if let Some(ref range) = self.dst_port {
            match tuple.dst_port {
                Some(port) if range.contains(&port) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Result of a context match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclMatch {
    /// Position of the matching ACL within the context's ACL vector.
    pub acl_pos: u32,
    /// Id of the matching ACL.
    pub acl_id: u32,
    /// Index of the matching rule within that ACL.
    pub rule_index: u32,
}

/// Database of compiled ACLs plus per-interface lookup contexts.
#[derive(Debug, Default)]
pub struct AclDb {
    acls: RwLock<HashMap<u32, Arc<Vec<AclRule>>>>,
    /// Context slot -> ordered ACL id vector. Freed slots are reused.
    contexts: RwLock<Vec<Option<Vec<u32>>>>,
}

impl AclDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace an ACL.
    pub fn acl_add(&self, acl_id: u32, rules: Vec<AclRule>) {
        self.acls.write().unwrap().insert(acl_id, Arc::new(rules));
    }

    pub fn acl_del(&self, acl_id: u32) -> Result<()> {
        match self.acls.write().unwrap().remove(&acl_id) {
            Some(_) => Ok(()),
            None => Err(Error::AclNotFound { acl_id }),
        }
    }

    pub fn acl_exists(&self, acl_id: u32) -> bool {
        self.acls.read().unwrap().contains_key(&acl_id)
    }

    /// Allocate a lookup context slot.
    pub fn get_lookup_context(&self) -> u32 {
        let mut contexts = self.contexts.write().unwrap();
        if let Some(i) = contexts.iter().position(|c| c.is_none()) {
            contexts[i] = Some(Vec::new());
            return i as u32;
        }
        contexts.push(Some(Vec::new()));
        (contexts.len() - 1) as u32
    }

    /// Release a lookup context slot.
    pub fn put_lookup_context(&self, lc_index: u32) {
        let mut contexts = self.contexts.write().unwrap();
        if let Some(slot) = contexts.get_mut(lc_index as usize) {
            *slot = None;
        }
    }

    /// Replace the ordered ACL vector of a context.
    pub fn set_context_acls(&self, lc_index: u32, acl_ids: Vec<u32>) {
        let mut contexts = self.contexts.write().unwrap();
        if let Some(Some(slot)) = contexts.get_mut(lc_index as usize) {
            *slot = acl_ids;
        }
    }

    /// Match the 5-tuple against the context's ACLs in order; the first
    /// ACL with any matching rule wins.
    pub fn match_5tuple(&self, lc_index: u32, tuple: &FiveTuple) -> Option<AclMatch> {
        let acl_ids = {
            let contexts = self.contexts.read().unwrap();
            contexts.get(lc_index as usize)?.clone()?
        };
        let acls = self.acls.read().unwrap();
        for (pos, acl_id) in acl_ids.iter().enumerate() {
            let Some(rules) = acls.get(acl_id) else {
                continue;
            };
            for (rule_index, rule) in rules.iter().enumerate() {
                if rule.matches(tuple) {
                    return Some(AclMatch {
                        acl_pos: pos as u32,
                        acl_id: *acl_id,
                        rule_index: rule_index as u32,
                    });
                }
            }
        }
        None
    }
}
