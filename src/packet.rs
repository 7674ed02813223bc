//! Packet metadata
//!
//! The engine never touches raw packet bytes; the graph dispatcher hands it
//! a parsed header summary. This module defines that summary and the
//! address-family tag used throughout the crate.

use std::net::IpAddr;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Family of an address.
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::V4 => write!(f, "ip4"),
            Family::V6 => write!(f, "ip6"),
        }
    }
}

/// Parsed header summary for one packet.
///
/// `src_port`/`dst_port` are `None` for protocols without ports (e.g. ICMP).
#[derive(Debug, Clone)]
pub struct PacketMeta {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// IP protocol number (1=ICMP, 6=TCP, 17=UDP).
    pub protocol: u8,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    /// DSCP field, used for service-class aware link selection.
    pub dscp: u8,
    /// RX interface the packet arrived on.
    pub rx_sw_if_index: u32,
}

impl PacketMeta {
    /// New packet summary with no ports and default DSCP.
    pub fn new(src: IpAddr, dst: IpAddr, protocol: u8, rx_sw_if_index: u32) -> Self {
        Self {
            src,
            dst,
            protocol,
            src_port: None,
            dst_port: None,
            dscp: 0,
            rx_sw_if_index,
        }
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    pub fn with_dscp(mut self, dscp: u8) -> Self {
        self.dscp = dscp;
        self
    }

    /// Address family, derived from the destination address.
    pub fn family(&self) -> Family {
        Family::of(self.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_family_of() {
        assert_eq!(Family::of(IpAddr::V4(Ipv4Addr::LOCALHOST)), Family::V4);
        assert_eq!(Family::of(IpAddr::V6(Ipv6Addr::LOCALHOST)), Family::V6);
    }

    #[test]
    fn test_packet_meta_builder() {
        let meta = PacketMeta::new(
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
            IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            6,
            1,
        )
        .with_ports(12345, 443)
        .with_dscp(46);

        assert_eq!(meta.family(), Family::V4);
        assert_eq!(meta.src_port, Some(12345));
        assert_eq!(meta.dst_port, Some(443));
        assert_eq!(meta.dscp, 46);
    }
}
