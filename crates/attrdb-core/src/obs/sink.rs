//! Metrics sink boundary.
//!
//! This module is the only bridge between execution logic and the
//! thread-local metrics state.
use crate::obs::metrics::{self, EventReport};
use std::{cell::RefCell, sync::Arc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Arc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Count,
    Save,
}

///
/// SelectPhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectPhase {
    /// Item-returning page.
    Fetch,
    /// Count-only page for `size()`.
    Count,
    /// Count-only page consumed by offset emulation.
    Offset,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        domain: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        domain: &'a str,
        rows: u64,
    },
    Select {
        phase: SelectPhase,
        domain: &'a str,
        items: u64,
    },
    AttributesPut {
        domain: &'a str,
        count: u64,
    },
    AttributesDeleted {
        domain: &'a str,
        count: u64,
    },
    LobStored {
        domain: &'a str,
        bytes: u64,
    },
    VersionConflict {
        domain: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, domain } => metrics::with_state_mut(|m| {
                match kind {
                    ExecKind::Load => m.ops.load_calls = m.ops.load_calls.saturating_add(1),
                    ExecKind::Count => m.ops.count_calls = m.ops.count_calls.saturating_add(1),
                    ExecKind::Save => m.ops.save_calls = m.ops.save_calls.saturating_add(1),
                }
                if kind == ExecKind::Save {
                    let entry = m.domains.entry(domain.to_string()).or_default();
                    entry.saves = entry.saves.saturating_add(1);
                }
            }),

            // Row totals are already tracked per select; finish is a hook for
            // external sinks.
            MetricsEvent::ExecFinish { .. } => {}

            MetricsEvent::Select {
                phase,
                domain,
                items,
            } => metrics::with_state_mut(|m| {
                match phase {
                    SelectPhase::Fetch => {
                        m.ops.fetch_selects = m.ops.fetch_selects.saturating_add(1);
                        m.ops.items_fetched = m.ops.items_fetched.saturating_add(items);
                    }
                    SelectPhase::Count => {
                        m.ops.count_selects = m.ops.count_selects.saturating_add(1);
                    }
                    SelectPhase::Offset => {
                        m.ops.offset_selects = m.ops.offset_selects.saturating_add(1);
                    }
                }

                let entry = m.domains.entry(domain.to_string()).or_default();
                entry.selects = entry.selects.saturating_add(1);
                if phase == SelectPhase::Fetch {
                    entry.items_fetched = entry.items_fetched.saturating_add(items);
                }
            }),

            MetricsEvent::AttributesPut { domain, count } => metrics::with_state_mut(|m| {
                m.ops.put_calls = m.ops.put_calls.saturating_add(1);
                m.ops.attributes_put = m.ops.attributes_put.saturating_add(count);
                let entry = m.domains.entry(domain.to_string()).or_default();
                entry.attributes_put = entry.attributes_put.saturating_add(count);
            }),

            MetricsEvent::AttributesDeleted { domain, count } => metrics::with_state_mut(|m| {
                m.ops.delete_calls = m.ops.delete_calls.saturating_add(1);
                m.ops.attributes_deleted = m.ops.attributes_deleted.saturating_add(count);
                let entry = m.domains.entry(domain.to_string()).or_default();
                entry.attributes_deleted = entry.attributes_deleted.saturating_add(count);
            }),

            MetricsEvent::LobStored { bytes, .. } => metrics::with_state_mut(|m| {
                m.ops.lobs_stored = m.ops.lobs_stored.saturating_add(1);
                m.ops.lob_bytes = m.ops.lob_bytes.saturating_add(bytes);
            }),

            MetricsEvent::VersionConflict { domain } => metrics::with_state_mut(|m| {
                m.ops.version_conflicts = m.ops.version_conflicts.saturating_add(1);
                let entry = m.domains.entry(domain.to_string()).or_default();
                entry.version_conflicts = entry.version_conflicts.saturating_add(1);
            }),
        }
    }
}

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match override_sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current thread's metrics state.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::with_state(EventReport::clone)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: Arc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Arc<dyn MetricsSink>>);

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

/// Span
/// RAII guard that emits start/finish metrics events for one executor call.
/// Ensures finish accounting happens even on early return.

pub(crate) struct Span<'a> {
    kind: ExecKind,
    domain: &'a str,
    rows: u64,
}

impl<'a> Span<'a> {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, domain: &'a str) -> Self {
        record(MetricsEvent::ExecStart { kind, domain });

        Self {
            kind,
            domain,
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            domain: self.domain,
            rows: self.rows,
        });
    }
}

///
/// TESTS
///
