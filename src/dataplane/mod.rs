//! Engine core
//!
//! The forwarding engine proper: labeled links, the default-route tracker,
//! policies and their per-packet decision, attachments, the local-address
//! filter, and the datapath node tying them to the FIB.

mod attach;
mod default_route;
mod engine;
mod links;
mod locals;
mod node;
mod policy;
mod quality;

pub use attach::{Attachment, AttachmentStore};
pub use default_route::DefaultRouteTracker;
pub use engine::Engine;
pub use links::{Label, LinkInfo, LinkRegistry, INVALID_LABEL, MAX_LABEL};
pub use locals::LocalAddrFilter;
pub use node::ForwardDecision;
pub use policy::{
    Fallback, LinkGroup, Policy, PolicyAction, PolicyInfo, PolicyStore, PolicyVerdict, Selection,
};
pub use quality::{Quality, ServiceClass, Tolerance, LOSS_DOWN};
