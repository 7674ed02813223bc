//! Configuration types

use crate::packet::Family;
use serde::Deserialize;

/// User-defined configuration (TOML).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    /// Labeled transmit links.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    /// Packet classes.
    #[serde(default)]
    pub acls: Vec<AclConfig>,
    /// Policies over the classes.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    /// Process-wide action for default-route traffic, in the action
    /// grammar.
    #[serde(default)]
    pub default_route_action: Option<String>,
    /// Policy-to-interface bindings.
    #[serde(default)]
    pub attachments: Vec<AttachmentConfig>,
    /// Routing topology (routes and resolved neighbors) to install into
    /// the FIB.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub neighbors: Vec<NeighborConfig>,
    /// The router's own addresses.
    #[serde(default)]
    pub locals: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub interface: u32,
    /// Kept wide so out-of-range values are reported by validation, not
    /// by the deserializer.
    pub label: u32,
    /// Remote tunnel end or WAN gateway.
    pub via: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AclConfig {
    pub id: u32,
    #[serde(default)]
    pub rules: Vec<AclRuleConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AclRuleConfig {
    /// Source prefix in CIDR notation.
    pub src: Option<String>,
    /// Destination prefix in CIDR notation.
    pub dst: Option<String>,
    pub protocol: Option<u8>,
    /// Port or inclusive range, e.g. "443" or "80-443".
    pub src_port: Option<String>,
    pub dst_port: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub id: u32,
    pub acl: u32,
    /// Action in the textual grammar:
    /// `[select_group random] [fallback drop] [group <id>] [random] labels <a,b,...> ...`
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyConfig {
    Ip4,
    Ip6,
}

impl From<FamilyConfig> for Family {
    fn from(f: FamilyConfig) -> Family {
        match f {
            FamilyConfig::Ip4 => Family::V4,
            FamilyConfig::Ip6 => Family::V6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    pub family: FamilyConfig,
    pub policy: u32,
    pub interface: u32,
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Destination in CIDR notation.
    pub destination: String,
    pub paths: Vec<PathConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    pub via: String,
    pub interface: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborConfig {
    pub interface: u32,
    pub address: String,
}
