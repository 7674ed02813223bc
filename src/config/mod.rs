//! Configuration management
//!
//! Loads the TOML configuration describing links, packet classes,
//! policies (in the textual action grammar), attachments and the routing
//! topology, validates it, and builds a running engine from it. The core
//! persists nothing; configuration is reconstructed at startup from here.

mod action;
mod types;
mod validation;

pub use action::parse_action;
pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::acl::{AclDb, AclRule};
use crate::dataplane::Engine;
use crate::error::{Error, Result};
use crate::fib::{Fib, Prefix, RoutePath};
use crate::packet::Family;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let config: Config = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
    Ok(config)
}

/// Parse "443" or "80-443" into an inclusive range.
pub(crate) fn parse_port_range(s: &str) -> Option<RangeInclusive<u16>> {
    match s.split_once('-') {
        Some((lo, hi)) => {
            let lo: u16 = lo.trim().parse().ok()?;
            let hi: u16 = hi.trim().parse().ok()?;
            (lo <= hi).then_some(lo..=hi)
        }
        None => {
            let port: u16 = s.trim().parse().ok()?;
            Some(port..=port)
        }
    }
}

fn parse_addr(s: &str) -> Result<IpAddr> {
    s.parse()
        .map_err(|_| Error::Config(format!("invalid address '{}'", s)))
}

/// Build a running engine from a validated configuration: install the
/// topology into the FIB, compile the ACLs, then register links, policies
/// and attachments in that order.
pub fn build_engine(config: &Config) -> Result<Engine> {
    let fib = Arc::new(Fib::new());
    let acl = Arc::new(AclDb::new());

    for route in &config.routes {
        let prefix = Prefix::parse(&route.destination)
            .ok_or_else(|| Error::Config(format!("bad destination '{}'", route.destination)))?;
        let mut paths = Vec::new();
        for path in &route.paths {
            paths.push(RoutePath::new(parse_addr(&path.via)?, path.interface));
        }
        fib.route_add(prefix, paths);
    }
    for neighbor in &config.neighbors {
        fib.neighbor_resolve(neighbor.interface, parse_addr(&neighbor.address)?);
    }

    for acl_cfg in &config.acls {
        let mut rules = Vec::new();
        for rule in &acl_cfg.rules {
            rules.push(AclRule {
                src: parse_prefix_opt(&rule.src)?,
                dst: parse_prefix_opt(&rule.dst)?,
                protocol: rule.protocol,
                src_port: parse_ports_opt(&rule.src_port)?,
                dst_port: parse_ports_opt(&rule.dst_port)?,
            });
        }
        acl.acl_add(acl_cfg.id, rules);
    }

    let engine = Engine::new(fib, acl);

    for link in &config.links {
        if link.label > crate::dataplane::MAX_LABEL as u32 {
            return Err(Error::LabelOutOfRange { label: link.label });
        }
        engine.link_add(
            link.interface,
            link.label as u8,
            RoutePath::new(parse_addr(&link.via)?, link.interface),
        )?;
    }

    for policy in &config.policies {
        engine.policy_add(policy.id, policy.acl, parse_action(&policy.action)?)?;
    }
    if let Some(ref dra) = config.default_route_action {
        engine.default_route_action_set(parse_action(dra)?)?;
    }

    for att in &config.attachments {
        engine.attach(
            Family::from(att.family),
            att.policy,
            att.interface,
            att.priority,
        )?;
    }

    for addr in &config.locals {
        engine.on_interface_address(parse_addr(addr)?, false);
    }

    Ok(engine)
}

fn parse_prefix_opt(value: &Option<String>) -> Result<Option<Prefix>> {
    match value {
        Some(s) => Prefix::parse(s)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("bad prefix '{}'", s))),
        None => Ok(None),
    }
}

fn parse_ports_opt(value: &Option<String>) -> Result<Option<RangeInclusive<u16>>> {
    match value {
        Some(s) => parse_port_range(s)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("bad port range '{}'", s))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketMeta;

    const SAMPLE: &str = r#"
        locals = ["10.0.0.1"]

        [[links]]
        interface = 1
        label = 10
        via = "10.100.0.1"

        [[acls]]
        id = 100
        [[acls.rules]]
        dst = "8.8.8.0/24"
        protocol = 6
        dst_port = "80-443"

        [[policies]]
        id = 1
        acl = 100
        action = "fallback drop labels 10"

        [[attachments]]
        family = "ip4"
        policy = 1
        interface = 5
        priority = 10

        [[routes]]
        destination = "8.8.8.0/24"
        paths = [{ via = "10.100.0.1", interface = 1 }]

        [[neighbors]]
        interface = 1
        address = "10.100.0.1"
    "#;

    #[test]
    fn test_parse_port_range() {
        assert_eq!(parse_port_range("443"), Some(443..=443));
        assert_eq!(parse_port_range("80-443"), Some(80..=443));
        assert_eq!(parse_port_range("443-80"), None);
        assert_eq!(parse_port_range("x"), None);
    }

    #[test]
    fn test_sample_deserializes_and_validates() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.links.len(), 1);
        assert_eq!(config.policies.len(), 1);
        let result = validate(&config);
        assert!(!result.has_errors(), "{:?}", result.errors);
    }

    #[test]
    fn test_build_engine_forwards_by_policy() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let engine = build_engine(&config).unwrap();

        let meta = PacketMeta::new(
            "192.168.1.10".parse().unwrap(),
            "8.8.8.8".parse().unwrap(),
            6,
            5,
        )
        .with_ports(40000, 443);
        let decision = engine.process_packet(&meta);
        assert!(decision.policy_applied);
        assert_eq!(decision.policy_id, Some(1));
        assert!(engine.locals().contains("10.0.0.1".parse().unwrap()));
    }
}
