//! End-to-end engine scenarios
//!
//! Builds the full engine over the in-memory FIB and drives packets
//! through the datapath node while the topology changes underneath:
//! link failover, fallback semantics, default-route enforcement,
//! attachment priorities and mid-flight deletion.

use linksteer::acl::{AclDb, AclRule};
use linksteer::config::parse_action;
use linksteer::dataplane::Engine;
use linksteer::error::Error;
use linksteer::fib::{flow_hash, AdjIndex, Fib, NextNode, Prefix, RoutePath, FLOW_HASH_DEFAULT};
use linksteer::packet::{Family, PacketMeta};
use std::net::IpAddr;
use std::sync::Arc;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn make_engine() -> Engine {
    Engine::new(Arc::new(Fib::new()), Arc::new(AclDb::new()))
}

/// TCP packet arriving on RX interface 5.
fn pkt(dst: &str) -> PacketMeta {
    PacketMeta::new(ip("192.168.1.10"), ip(dst), 6, 5).with_ports(40000, 443)
}

fn adj_of(engine: &Engine, sw_if_index: u32, next_hop: &str) -> AdjIndex {
    engine.fib().adj_lookup(sw_if_index, ip(next_hop)).unwrap()
}

/// Two labeled tunnels — label 10 on interface 1 (tun_A), label 20 on
/// interface 2 (tun_B) — with an ECMP route to 8.8.8.0/24 over both,
/// both next-hops resolved. A match-everything ACL 100 backs policy 1
/// with the given action, attached to RX interface 5.
fn dual_tunnel_engine(action: &str) -> Engine {
    let engine = make_engine();
    engine
        .link_add(1, 10, RoutePath::new(ip("10.100.0.1"), 1))
        .unwrap();
    engine
        .link_add(2, 20, RoutePath::new(ip("10.100.0.2"), 2))
        .unwrap();
    engine.fib().route_add(
        Prefix::parse("8.8.8.0/24").unwrap(),
        vec![
            RoutePath::new(ip("10.100.0.1"), 1),
            RoutePath::new(ip("10.100.0.2"), 2),
        ],
    );
    engine.fib().neighbor_resolve(1, ip("10.100.0.1"));
    engine.fib().neighbor_resolve(2, ip("10.100.0.2"));

    engine.acl().acl_add(100, vec![AclRule::default()]);
    engine
        .policy_add(1, 100, parse_action(action).unwrap())
        .unwrap();
    engine.attach(Family::V4, 1, 5, 10).unwrap();
    engine
}

// ----------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------

#[test]
fn label_range_rejected_without_side_effect() {
    let engine = make_engine();
    let err = engine
        .link_add(1, 255, RoutePath::new(ip("10.0.0.1"), 1))
        .unwrap_err();
    assert!(matches!(err, Error::LabelOutOfRange { label: 255 }));
    assert!(engine.links_dump().is_empty());
}

#[test]
fn admin_map_tracks_link_lifetime() {
    let engine = make_engine();
    engine
        .link_add(1, 10, RoutePath::new(ip("10.100.0.1"), 1))
        .unwrap();
    let adj = adj_of(&engine, 1, "10.100.0.1");
    assert_eq!(engine.links().admin_label(adj), Some(10));

    engine.link_del(1).unwrap();
    assert_eq!(engine.links().admin_label(adj), None);
}

#[test]
fn reachable_map_follows_neighbor_resolution() {
    let engine = make_engine();
    engine
        .link_add(1, 10, RoutePath::new(ip("10.100.0.1"), 1))
        .unwrap();
    let adj = adj_of(&engine, 1, "10.100.0.1");

    assert_eq!(engine.links().reachable_label(adj), None);
    engine.fib().neighbor_resolve(1, ip("10.100.0.1"));
    assert_eq!(engine.links().reachable_label(adj), Some(10));
    engine.fib().neighbor_unresolve(1, ip("10.100.0.1"));
    assert_eq!(engine.links().reachable_label(adj), None);
    engine.fib().neighbor_resolve(1, ip("10.100.0.1"));
    assert_eq!(engine.links().reachable_label(adj), Some(10));
}

#[test]
fn ordered_selection_picks_first_declared() {
    let engine = dual_tunnel_engine("labels 20,10");
    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 2, "10.100.0.2"));
}

#[test]
fn random_probe_miss_falls_back_to_first_ordered() {
    // One random group of two labels; take down exactly the link the
    // flow hash would pick, leaving the other as the only resolver.
    let engine = dual_tunnel_engine("random labels 10,20");
    let meta = pkt("8.8.8.8");

    let hash = flow_hash(&meta, FLOW_HASH_DEFAULT);
    // Two labels: wide mask 0xF, then narrow mask 1 if past the end.
    let i = hash & 0xF;
    let picked = if i <= 1 { i } else { i & 1 };
    let (down_if, down_nh, alive_if, alive_nh) = if picked == 0 {
        (1, "10.100.0.1", 2, "10.100.0.2")
    } else {
        (2, "10.100.0.2", 1, "10.100.0.1")
    };

    engine.fib().neighbor_unresolve(down_if, ip(down_nh));
    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, alive_if, alive_nh));
}

#[test]
fn ref_count_gates_policy_delete() {
    let engine = dual_tunnel_engine("labels 10");
    assert!(matches!(
        engine.policy_delete(1),
        Err(Error::PolicyInUse { policy_id: 1 })
    ));
    engine.detach(Family::V4, 1, 5).unwrap();
    engine.policy_delete(1).unwrap();
}

#[test]
fn labeled_or_default_route_query() {
    let engine = dual_tunnel_engine("labels 10");
    let lb = engine.fib().lookup(ip("8.8.8.8"));
    assert!(engine.is_labeled_or_default_route(&lb, Family::V4));

    // A route through an unlabeled interface is neither.
    engine.fib().route_add(
        Prefix::parse("9.9.9.0/24").unwrap(),
        vec![RoutePath::new(ip("10.200.0.1"), 7)],
    );
    engine.fib().neighbor_resolve(7, ip("10.200.0.1"));
    let lb = engine.fib().lookup(ip("9.9.9.9"));
    assert!(!engine.is_labeled_or_default_route(&lb, Family::V4));
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

/// S1: ordered [10,20] over ECMP; tun_A carries the flow until it goes
/// down, then tun_B takes over.
#[test]
fn s1_ordered_failover() {
    let engine = dual_tunnel_engine("labels 10,20");
    let meta = pkt("8.8.8.8");

    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 1, "10.100.0.1"));

    engine.fib().neighbor_unresolve(1, ip("10.100.0.1"));
    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 2, "10.100.0.2"));
}

/// S2: fallback drop with the only labeled link down drops the packet
/// through the policy, not the FIB.
#[test]
fn s2_fallback_drop() {
    let engine = dual_tunnel_engine("fallback drop labels 10");
    engine.fib().neighbor_unresolve(1, ip("10.100.0.1"));

    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert!(decision.policy_applied);
    assert_eq!(decision.next, NextNode::Drop);
    assert_eq!(engine.policies().counters(1).unwrap().dropped, 1);
}

/// Same packet with default-route fallback forwards per the FIB instead.
#[test]
fn s2b_fallback_default_route() {
    let engine = dual_tunnel_engine("labels 10");
    engine.fib().neighbor_unresolve(1, ip("10.100.0.1"));

    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert!(!decision.policy_applied);
    // The FIB completes forwarding; the policy never turned it into a drop.
    assert_ne!(decision.next, NextNode::Drop);
    assert_eq!(engine.policies().counters(1).unwrap().fallback, 1);
}

/// S3: FIB resolves via the default route; the default-route action
/// steers the packet onto the WAN label even though the policy's own
/// labels cannot resolve.
#[test]
fn s3_default_route_override() {
    let engine = dual_tunnel_engine("labels 77");
    // Default route first, then the WAN link labeled 30 behind it; the
    // link addition is what starts default-route tracking (lazy init).
    engine.fib().route_add(
        Prefix::default_route(Family::V4),
        vec![RoutePath::new(ip("192.168.0.254"), 3)],
    );
    engine
        .link_add(3, 30, RoutePath::new(ip("192.168.0.254"), 3))
        .unwrap();
    engine.fib().neighbor_resolve(3, ip("192.168.0.254"));

    engine
        .default_route_action_set(parse_action("labels 30").unwrap())
        .unwrap();

    let decision = engine.process_packet(&pkt("203.0.113.9"));
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 3, "192.168.0.254"));
    assert_eq!(engine.policies().counters(1).unwrap().default_route, 1);

    // With no reachable labeled link, fallback applies.
    engine.fib().neighbor_unresolve(3, ip("192.168.0.254"));
    let decision = engine.process_packet(&pkt("203.0.113.9"));
    assert!(!decision.policy_applied);
}

/// S4: two attachments on the same interface; the numerically smaller
/// priority is consulted and only its counters move.
#[test]
fn s4_attachment_priority() {
    let engine = make_engine();
    engine
        .link_add(1, 10, RoutePath::new(ip("10.100.0.1"), 1))
        .unwrap();
    engine.fib().route_add(
        Prefix::parse("8.8.8.0/24").unwrap(),
        vec![RoutePath::new(ip("10.100.0.1"), 1)],
    );
    engine.fib().neighbor_resolve(1, ip("10.100.0.1"));

    // Both ACLs match the packet.
    engine.acl().acl_add(100, vec![AclRule::default()]);
    engine.acl().acl_add(200, vec![AclRule::default()]);
    engine
        .policy_add(1, 100, parse_action("labels 10").unwrap())
        .unwrap();
    engine
        .policy_add(2, 200, parse_action("labels 10").unwrap())
        .unwrap();
    engine.attach(Family::V4, 2, 5, 20).unwrap();
    engine.attach(Family::V4, 1, 5, 10).unwrap();

    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert!(decision.policy_applied);
    assert_eq!(decision.policy_id, Some(1));

    assert_eq!(engine.policies().counters(1).unwrap().matched, 1);
    assert_eq!(engine.policies().counters(2).unwrap().matched, 0);
}

/// S5: random group selection lands on a group with dead labels; the
/// ordered scan walks the groups in declared order and settles on the
/// last group's live label.
#[test]
fn s5_random_group_then_ordered_scan() {
    let engine = make_engine();
    // Live link only for label 20 (group C); labels 70/71 never resolve.
    engine
        .link_add(2, 20, RoutePath::new(ip("10.100.0.2"), 2))
        .unwrap();
    engine.fib().route_add(
        Prefix::parse("8.8.8.0/24").unwrap(),
        vec![RoutePath::new(ip("10.100.0.2"), 2)],
    );
    engine.fib().neighbor_resolve(2, ip("10.100.0.2"));

    engine.acl().acl_add(100, vec![AclRule::default()]);
    engine
        .policy_add(
            1,
            100,
            parse_action("select_group random group 1 labels 70 group 2 labels 71 group 3 labels 20")
                .unwrap(),
        )
        .unwrap();
    engine.attach(Family::V4, 1, 5, 10).unwrap();

    // Find a flow whose hash picks a dead group (0 or 1), so the result
    // can only come from the ordered scan.
    let meta = (0u16..64)
        .map(|port| pkt("8.8.8.8").with_ports(40000 + port, 443))
        .find(|m| {
            let hash = flow_hash(m, FLOW_HASH_DEFAULT);
            let i = hash & 0xF;
            let picked = if i <= 2 { i } else { i & 2 };
            picked != 2
        })
        .expect("some flow must hash to a dead group");

    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 2, "10.100.0.2"));
}

/// S6: deleting a link mid-stream never forwards onto a stale labeled
/// adjacency; the packet misses into fallback.
#[test]
fn s6_link_del_mid_flight() {
    let engine = dual_tunnel_engine("labels 10");
    let meta = pkt("8.8.8.8");
    let tun_a = adj_of(&engine, 1, "10.100.0.1");

    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, tun_a);

    engine.link_del(1).unwrap();
    // The adjacency maps were cleared before the slot was released.
    assert_eq!(engine.links().admin_label(tun_a), None);
    assert_eq!(engine.links().reachable_label(tun_a), None);

    let decision = engine.process_packet(&meta);
    assert!(!decision.policy_applied);
    assert_eq!(engine.policies().counters(1).unwrap().fallback, 1);
}

/// Service-class filtering: a lossy link is skipped for EF traffic but
/// still carries best-effort.
#[test]
fn quality_filters_by_service_class() {
    let engine = dual_tunnel_engine("labels 10");
    engine.quality_set(1, Some(8), Some(50), Some(10)).unwrap();

    let ef = pkt("8.8.8.8").with_dscp(46);
    let decision = engine.process_packet(&ef);
    assert!(!decision.policy_applied, "EF must not ride a lossy link");

    let best_effort = pkt("8.8.8.8");
    let decision = engine.process_packet(&best_effort);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 1, "10.100.0.1"));
}

/// Loss at 100% takes the link out of policy entirely until it recovers.
#[test]
fn quality_loss_full_marks_link_down() {
    let engine = dual_tunnel_engine("labels 10,20");
    engine.quality_set(1, Some(100), None, None).unwrap();

    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert_eq!(decision.adj, adj_of(&engine, 2, "10.100.0.2"));

    engine.quality_set(1, Some(0), None, None).unwrap();
    let decision = engine.process_packet(&pkt("8.8.8.8"));
    assert_eq!(decision.adj, adj_of(&engine, 1, "10.100.0.1"));
}

/// The v6 datapath works the same way end to end.
#[test]
fn v6_policy_forward() {
    let engine = make_engine();
    engine
        .link_add(1, 10, RoutePath::new(ip("2001:db8:100::1"), 1))
        .unwrap();
    engine.fib().route_add(
        Prefix::parse("2001:db8:8::/48").unwrap(),
        vec![RoutePath::new(ip("2001:db8:100::1"), 1)],
    );
    engine.fib().neighbor_resolve(1, ip("2001:db8:100::1"));

    engine.acl().acl_add(100, vec![AclRule::default()]);
    engine
        .policy_add(1, 100, parse_action("labels 10").unwrap())
        .unwrap();
    engine.attach(Family::V6, 1, 5, 10).unwrap();

    let meta = PacketMeta::new(ip("2001:db8::10"), ip("2001:db8:8::1"), 6, 5)
        .with_ports(40000, 443);
    let decision = engine.process_packet(&meta);
    assert!(decision.policy_applied);
    assert_eq!(decision.adj, adj_of(&engine, 1, "2001:db8:100::1"));
}

/// Policy changes take effect for the next packet.
#[test]
fn policy_change_visible_to_next_packet() {
    let engine = dual_tunnel_engine("labels 10");
    let meta = pkt("8.8.8.8");
    assert_eq!(
        engine.process_packet(&meta).adj,
        adj_of(&engine, 1, "10.100.0.1")
    );

    engine.detach(Family::V4, 1, 5).unwrap();
    engine.policy_delete(1).unwrap();
    engine
        .policy_add(2, 100, parse_action("labels 20").unwrap())
        .unwrap();
    engine.attach(Family::V4, 2, 5, 10).unwrap();

    let decision = engine.process_packet(&meta);
    assert_eq!(decision.policy_id, Some(2));
    assert_eq!(decision.adj, adj_of(&engine, 2, "10.100.0.2"));
}
