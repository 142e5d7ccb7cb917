//! Metrics sink boundary.
//!
//! Store, transformer and access code MUST NOT touch obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// StoreOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreOp {
    Delete,
    Filter,
    Get,
    Insert,
    Patch,
    Scan,
    Update,
}

impl StoreOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Filter => "filter",
            Self::Get => "get",
            Self::Insert => "insert",
            Self::Patch => "patch",
            Self::Scan => "scan",
            Self::Update => "update",
        }
    }
}

///
/// TransformMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransformMode {
    Build,
    Patch,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricsEvent {
    AccessDenied {
        permission: &'static str,
    },
    PutFallback {
        entity: &'static str,
    },
    StoreOp {
        op: StoreOp,
        entity: &'static str,
        rows: u64,
    },
    Transform {
        mode: TransformMode,
        entity: &'static str,
    },
    ValidationFailure {
        entity: &'static str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into the metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::AccessDenied { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.access_denials = m.ops.access_denials.saturating_add(1);
                });
            }

            MetricsEvent::PutFallback { entity } => {
                metrics::with_state_mut(|m| {
                    m.ops.put_fallbacks = m.ops.put_fallbacks.saturating_add(1);
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.put_fallbacks = entry.put_fallbacks.saturating_add(1);
                });
            }

            MetricsEvent::StoreOp { op, entity, rows } => {
                metrics::with_state_mut(|m| {
                    let ops = &mut m.ops;
                    match op {
                        StoreOp::Get => ops.get_calls = ops.get_calls.saturating_add(1),
                        StoreOp::Scan => ops.scan_calls = ops.scan_calls.saturating_add(1),
                        StoreOp::Filter => ops.filter_calls = ops.filter_calls.saturating_add(1),
                        StoreOp::Insert => ops.insert_calls = ops.insert_calls.saturating_add(1),
                        StoreOp::Update => ops.update_calls = ops.update_calls.saturating_add(1),
                        StoreOp::Patch => ops.patch_calls = ops.patch_calls.saturating_add(1),
                        StoreOp::Delete => ops.delete_calls = ops.delete_calls.saturating_add(1),
                    }

                    let entry = m.entities.entry(entity.to_string()).or_default();
                    match op {
                        StoreOp::Get | StoreOp::Scan | StoreOp::Filter => {
                            m.ops.rows_read = m.ops.rows_read.saturating_add(rows);
                            entry.read_calls = entry.read_calls.saturating_add(1);
                            entry.rows_read = entry.rows_read.saturating_add(rows);
                        }
                        StoreOp::Insert | StoreOp::Update | StoreOp::Patch => {
                            m.ops.rows_written = m.ops.rows_written.saturating_add(rows);
                            entry.write_calls = entry.write_calls.saturating_add(1);
                            entry.rows_written = entry.rows_written.saturating_add(rows);
                        }
                        StoreOp::Delete => {
                            m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(rows);
                            entry.delete_calls = entry.delete_calls.saturating_add(1);
                            entry.rows_deleted = entry.rows_deleted.saturating_add(rows);
                        }
                    }
                });
            }

            MetricsEvent::Transform { mode, .. } => {
                metrics::with_state_mut(|m| match mode {
                    TransformMode::Build => m.ops.builds = m.ops.builds.saturating_add(1),
                    TransformMode::Patch => m.ops.patches = m.ops.patches.saturating_add(1),
                });
            }

            MetricsEvent::ValidationFailure { entity } => {
                metrics::with_state_mut(|m| {
                    m.ops.validation_failures = m.ops.validation_failures.saturating_add(1);
                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.validation_failures = entry.validation_failures.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwind.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// Span
/// RAII guard that emits one store-op event per store call.
/// Ensures accounting happens even on early return.
///

pub(crate) struct Span {
    op: StoreOp,
    entity: &'static str,
    rows: u64,
}

impl Span {
    #[must_use]
    pub(crate) const fn new(op: StoreOp, entity: &'static str) -> Self {
        Self {
            op,
            entity,
            rows: 0,
        }
    }

    pub(crate) fn set_rows(&mut self, rows: usize) {
        self.rows = u64::try_from(rows).unwrap_or(u64::MAX);
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        record(MetricsEvent::StoreOp {
            op: self.op,
            entity: self.entity,
            rows: self.rows,
        });
    }
}

///
/// TESTS
///
