//! Datapath node
//!
//! Per packet: FIB lookup, locals bypass, ACL match, policy decision, and
//! on a miss the standard FIB forwarding completion. The node replaces the
//! plain lookup stage on interfaces where the engine is enabled, so the
//! lookup happens exactly once whether or not the packet matches a policy.
//!
//! Failures here are soft by construction: anything that cannot resolve a
//! labeled link degrades to the FIB path (or to a drop descriptor when the
//! policy says so). The node batches by frames, but correctness is defined
//! per packet.

use crate::acl;
use crate::dataplane::engine::Engine;
use crate::dataplane::policy::PolicyVerdict;
use crate::fib::{flow_hash, AdjIndex, LoadBalance, NextNode};
use crate::packet::PacketMeta;
use tracing::trace;

/// Forwarding decision for one packet: the next graph node to enqueue to
/// and the adjacency to forward with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardDecision {
    pub next: NextNode,
    pub adj: AdjIndex,
    /// True when a policy descriptor was used instead of the FIB's.
    pub policy_applied: bool,
    /// Policy consulted for the packet, if its ACL matched.
    pub policy_id: Option<u32>,
}

impl Engine {
    /// Process one packet and decide where it goes.
    pub fn process_packet(&self, meta: &PacketMeta) -> ForwardDecision {
        let lb = self.fib.lookup(meta.dst);

        // Locally-destined traffic bypasses classification entirely.
        if self.locals.contains(meta.dst) {
            self.counters.local_bypass.inc();
            return self.fib_forward(meta, &lb, None);
        }

        let family = meta.family();
        let mut policy_id = None;

        if let Some(lc_index) = self.attachments.lc_index(family, meta.rx_sw_if_index) {
            let tuple = acl::fill_5tuple(meta);
            if let Some(m) = self.acl.match_5tuple(lc_index, &tuple) {
                // The ACL match position indexes the priority-ordered
                // attachment list directly.
                if let Some(att) =
                    self.attachments
                        .attachment_at(family, meta.rx_sw_if_index, m.acl_pos)
                {
                    self.counters.matched.inc();
                    policy_id = Some(att.policy_id);
                    let verdict = self.policies.get_dpo(
                        att.policy_index,
                        meta,
                        &lb,
                        &self.links,
                        &self.default_route,
                    );
                    if let PolicyVerdict::Forward(dpo) = verdict {
                        self.counters.policy_forwarded.inc();
                        let decision = ForwardDecision {
                            next: dpo.next,
                            adj: dpo.adj,
                            policy_applied: true,
                            policy_id,
                        };
                        trace!(
                            next = %decision.next,
                            adj = decision.adj,
                            policy = att.policy_id,
                            "policy forward"
                        );
                        return decision;
                    }
                }
            }
        }

        self.fib_forward(meta, &lb, policy_id)
    }

    /// Standard FIB forwarding: hash across ECMP buckets when there are
    /// several, otherwise take the single bucket.
    fn fib_forward(
        &self,
        meta: &PacketMeta,
        lb: &LoadBalance,
        policy_id: Option<u32>,
    ) -> ForwardDecision {
        let dpo = if lb.n_buckets() > 1 {
            let hash = flow_hash(meta, lb.hash_config);
            *lb.fwd_bucket(hash)
        } else {
            *lb.bucket(0)
        };
        self.counters.fib_forwarded.inc();
        let decision = ForwardDecision {
            next: dpo.next,
            adj: dpo.adj,
            policy_applied: false,
            policy_id,
        };
        trace!(next = %decision.next, adj = decision.adj, "fib forward");
        decision
    }

    /// Process a frame of packets. Batching is a dispatcher concern; the
    /// contract is per-packet.
    pub fn process_frame(&self, frame: &[PacketMeta]) -> Vec<ForwardDecision> {
        frame.iter().map(|meta| self.process_packet(meta)).collect()
    }
}
