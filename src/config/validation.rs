//! Configuration validation

use super::action::parse_action;
use super::types::Config;
use super::parse_port_range;
use crate::dataplane::MAX_LABEL;
use crate::fib::Prefix;
use std::collections::HashSet;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            eprintln!("[WARN] {}", warning);
        }
        for error in &self.errors {
            eprintln!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_links(config, &mut result);
    validate_acls(config, &mut result);
    validate_policies(config, &mut result);
    validate_attachments(config, &mut result);
    validate_topology(config, &mut result);

    result
}

fn validate_links(config: &Config, result: &mut ValidationResult) {
    let mut seen_interfaces: HashSet<u32> = HashSet::new();
    let mut seen_labels: HashSet<u32> = HashSet::new();

    for (i, link) in config.links.iter().enumerate() {
        if link.label > MAX_LABEL as u32 {
            result.error(format!(
                "links[{}]: label {} out of range (must be 0-254)",
                i, link.label
            ));
        }
        if !seen_interfaces.insert(link.interface) {
            result.error(format!(
                "links[{}]: duplicate interface {}",
                i, link.interface
            ));
        }
        if !seen_labels.insert(link.label) {
            result.error(format!("links[{}]: duplicate label {}", i, link.label));
        }
        if link.via.parse::<IpAddr>().is_err() {
            result.error(format!("links[{}]: invalid via address '{}'", i, link.via));
        }
    }
}

fn validate_acls(config: &Config, result: &mut ValidationResult) {
    let mut seen_ids: HashSet<u32> = HashSet::new();

    for acl in &config.acls {
        if !seen_ids.insert(acl.id) {
            result.error(format!("acls: duplicate id {}", acl.id));
        }
        if acl.rules.is_empty() {
            result.warn(format!("acls.{}: no rules, will never match", acl.id));
        }
        for (i, rule) in acl.rules.iter().enumerate() {
            for (field, value) in [("src", &rule.src), ("dst", &rule.dst)] {
                if let Some(cidr) = value {
                    if Prefix::parse(cidr).is_none() {
                        result.error(format!(
                            "acls.{}.rules[{}]: {} '{}' must be in CIDR notation",
                            acl.id, i, field, cidr
                        ));
                    }
                }
            }
            for (field, value) in [("src_port", &rule.src_port), ("dst_port", &rule.dst_port)] {
                if let Some(ports) = value {
                    if parse_port_range(ports).is_none() {
                        result.error(format!(
                            "acls.{}.rules[{}]: bad {} '{}'",
                            acl.id, i, field, ports
                        ));
                    }
                }
            }
            let has_port_match = rule.src_port.is_some() || rule.dst_port.is_some();
            let is_tcp_or_udp = matches!(rule.protocol, Some(6) | Some(17));
            if has_port_match && !is_tcp_or_udp {
                result.error(format!(
                    "acls.{}.rules[{}]: port match requires protocol 6 (tcp) or 17 (udp)",
                    acl.id, i
                ));
            }
        }
    }
}

fn validate_policies(config: &Config, result: &mut ValidationResult) {
    let mut seen_ids: HashSet<u32> = HashSet::new();
    let known_labels: HashSet<u32> = config.links.iter().map(|l| l.label).collect();

    for policy in &config.policies {
        if !seen_ids.insert(policy.id) {
            result.error(format!("policies: duplicate id {}", policy.id));
        }
        if !config.acls.iter().any(|a| a.id == policy.acl) {
            result.error(format!(
                "policies.{}: acl {} not defined",
                policy.id, policy.acl
            ));
        }
        match parse_action(&policy.action) {
            Ok(action) => {
                for group in &action.groups {
                    for &label in &group.labels {
                        if !known_labels.contains(&(label as u32)) {
                            result.warn(format!(
                                "policies.{}: label {} has no link",
                                policy.id, label
                            ));
                        }
                    }
                }
            }
            Err(e) => result.error(format!("policies.{}: {}", policy.id, e)),
        }
    }

    if let Some(ref action) = config.default_route_action {
        if let Err(e) = parse_action(action) {
            result.error(format!("default_route_action: {}", e));
        }
    }
}

fn validate_attachments(config: &Config, result: &mut ValidationResult) {
    let mut seen: HashSet<(u32, u32, super::types::FamilyConfig)> = HashSet::new();

    for (i, att) in config.attachments.iter().enumerate() {
        if !config.policies.iter().any(|p| p.id == att.policy) {
            result.error(format!(
                "attachments[{}]: policy {} not defined",
                i, att.policy
            ));
        }
        if !seen.insert((att.policy, att.interface, att.family)) {
            result.error(format!(
                "attachments[{}]: duplicate attachment of policy {} on interface {}",
                i, att.policy, att.interface
            ));
        }
    }
}

fn validate_topology(config: &Config, result: &mut ValidationResult) {
    for (i, route) in config.routes.iter().enumerate() {
        if Prefix::parse(&route.destination).is_none() {
            result.error(format!(
                "routes[{}]: destination '{}' must be in CIDR notation",
                i, route.destination
            ));
        }
        if route.paths.is_empty() {
            result.warn(format!("routes[{}]: no paths, route is unroutable", i));
        }
        for (j, path) in route.paths.iter().enumerate() {
            if path.via.parse::<IpAddr>().is_err() {
                result.error(format!(
                    "routes[{}].paths[{}]: invalid via address '{}'",
                    i, j, path.via
                ));
            }
        }
    }
    for (i, neighbor) in config.neighbors.iter().enumerate() {
        if neighbor.address.parse::<IpAddr>().is_err() {
            result.error(format!(
                "neighbors[{}]: invalid address '{}'",
                i, neighbor.address
            ));
        }
    }
    for (i, addr) in config.locals.iter().enumerate() {
        if addr.parse::<IpAddr>().is_err() {
            result.error(format!("locals[{}]: invalid address '{}'", i, addr));
        }
    }
}
