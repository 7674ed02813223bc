//! Flow hashing
//!
//! Distributes flows across ECMP buckets and across labeled links. The
//! hash covers the IP pair, the port pair and the protocol; with the
//! symmetric bit set, both directions of a flow produce the same value.

use crate::packet::PacketMeta;
use std::net::IpAddr;

/// Which packet fields participate in the flow hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowHashConfig {
    pub src_addr: bool,
    pub dst_addr: bool,
    pub src_port: bool,
    pub dst_port: bool,
    pub protocol: bool,
    /// Fold src/dst pairs order-independently so both flow directions hash
    /// the same.
    pub symmetric: bool,
}

/// Default configuration: IP pair, ports, protocol and their reverse.
pub const FLOW_HASH_DEFAULT: FlowHashConfig = FlowHashConfig {
    src_addr: true,
    dst_addr: true,
    src_port: true,
    dst_port: true,
    protocol: true,
    symmetric: true,
};

fn addr_word(addr: IpAddr) -> u64 {
    match addr {
        IpAddr::V4(a) => u32::from(a) as u64,
        IpAddr::V6(a) => {
            let o = a.octets();
            let hi = u64::from_be_bytes(o[0..8].try_into().unwrap());
            let lo = u64::from_be_bytes(o[8..16].try_into().unwrap());
            hi ^ lo
        }
    }
}

fn mix(state: u64, word: u64) -> u64 {
    // Multiply-xorshift round with the 64-bit golden-ratio constant.
    let x = (state ^ word).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^ (x >> 29)
}

/// Compute a flow hash over the packet per `cfg`.
pub fn flow_hash(meta: &PacketMeta, cfg: FlowHashConfig) -> u32 {
    let src = if cfg.src_addr { addr_word(meta.src) } else { 0 };
    let dst = if cfg.dst_addr { addr_word(meta.dst) } else { 0 };
    let sp = if cfg.src_port {
        meta.src_port.unwrap_or(0) as u64
    } else {
        0
    };
    let dp = if cfg.dst_port {
        meta.dst_port.unwrap_or(0) as u64
    } else {
        0
    };

    let mut h = 0u64;
    if cfg.symmetric {
        // Order-independent folds: a ^ b and a + b are the same for both
        // directions.
        h = mix(h, src ^ dst);
        h = mix(h, src.wrapping_add(dst));
        h = mix(h, sp ^ dp);
        h = mix(h, sp.wrapping_add(dp));
    } else {
        h = mix(h, src);
        h = mix(h, dst);
        h = mix(h, (sp << 16) | dp);
    }
    if cfg.protocol {
        h = mix(h, meta.protocol as u64);
    }
    (h ^ (h >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn pkt(src: [u8; 4], dst: [u8; 4], sp: u16, dp: u16) -> PacketMeta {
        PacketMeta::new(
            IpAddr::V4(Ipv4Addr::from(src)),
            IpAddr::V4(Ipv4Addr::from(dst)),
            6,
            0,
        )
        .with_ports(sp, dp)
    }

    #[test]
    fn test_deterministic() {
        let a = pkt([10, 0, 0, 1], [8, 8, 8, 8], 1111, 443);
        assert_eq!(
            flow_hash(&a, FLOW_HASH_DEFAULT),
            flow_hash(&a, FLOW_HASH_DEFAULT)
        );
    }

    #[test]
    fn test_symmetric_both_directions() {
        let fwd = pkt([10, 0, 0, 1], [8, 8, 8, 8], 1111, 443);
        let rev = pkt([8, 8, 8, 8], [10, 0, 0, 1], 443, 1111);
        assert_eq!(
            flow_hash(&fwd, FLOW_HASH_DEFAULT),
            flow_hash(&rev, FLOW_HASH_DEFAULT)
        );
    }

    #[test]
    fn test_different_flows_differ() {
        let a = pkt([10, 0, 0, 1], [8, 8, 8, 8], 1111, 443);
        let b = pkt([10, 0, 0, 1], [8, 8, 8, 8], 1112, 443);
        assert_ne!(
            flow_hash(&a, FLOW_HASH_DEFAULT),
            flow_hash(&b, FLOW_HASH_DEFAULT)
        );
    }

    #[test]
    fn test_ports_ignored_when_disabled() {
        let cfg = FlowHashConfig {
            src_port: false,
            dst_port: false,
            ..FLOW_HASH_DEFAULT
        };
        let a = pkt([10, 0, 0, 1], [8, 8, 8, 8], 1111, 443);
        let b = pkt([10, 0, 0, 1], [8, 8, 8, 8], 2222, 80);
        assert_eq!(flow_hash(&a, cfg), flow_hash(&b, cfg));
    }

    #[test]
    fn test_v6_hashes() {
        let a = PacketMeta::new(
            "2001:db8::1".parse().unwrap(),
            "2001:db8::2".parse().unwrap(),
            17,
            0,
        )
        .with_ports(5000, 53);
        let rev = PacketMeta::new(
            "2001:db8::2".parse().unwrap(),
            "2001:db8::1".parse().unwrap(),
            17,
            0,
        )
        .with_ports(53, 5000);
        assert_eq!(
            flow_hash(&a, FLOW_HASH_DEFAULT),
            flow_hash(&rev, FLOW_HASH_DEFAULT)
        );
    }
}
