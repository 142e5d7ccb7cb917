//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Structured logs go through `tracing`; counters go through the sink.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EntitySummary, EventOps, EventReport, EventState};
pub use sink::{
    MetricsEvent, MetricsSink, StoreOp, TransformMode, metrics_report, metrics_reset_all,
    with_metrics_sink,
};
