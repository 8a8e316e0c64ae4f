//! Observability: runtime counters and the sink boundary that feeds them.
//!
//! Cursor and save logic never touch `metrics` directly; every event flows
//! through `sink::record`.

pub(crate) mod metrics;
pub mod sink;

// re-exports
pub use metrics::{DomainCounters, EventOps, EventReport};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
