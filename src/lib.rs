//! Linksteer - ACL-based multi-link forwarding engine
//!
//! Sits in a software router's IP unicast fast path: packets received on
//! an enabled RX interface are classified against ACLs and, on match,
//! redirected onto one of several labeled transmit links (tunnels or WAN
//! interfaces) chosen by policy instead of the plain longest-prefix-match
//! result.

pub mod acl;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod fib;
pub mod packet;
pub mod telemetry;

pub use error::{Code, Error, Result};
