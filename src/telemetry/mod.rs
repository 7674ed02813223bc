//! Telemetry: logging and statistics counters.

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig};
pub use metrics::{Counter, LabelStats, NodeCounters, PolicyCounters};
