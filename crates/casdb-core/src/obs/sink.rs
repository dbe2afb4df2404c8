//! Metrics sink boundary.
//!
//! Core DB logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.

use crate::obs::metrics::{self, EventReport};
use std::{cell::RefCell, sync::Arc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Arc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent<'a> {
    ApplyStart {
        table: &'a str,
        conditional: bool,
    },
    ApplyFinish {
        table: &'a str,
        applied: bool,
    },
    DecodeFailed {
        table: &'a str,
    },
    EvalFailed {
        table: &'a str,
    },
    LockTimeout {
        table: &'a str,
    },
    CompileRejected {
        table: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ApplyStart { table, conditional } => {
                metrics::with_state_mut(|m| {
                    m.ops.apply_calls = m.ops.apply_calls.saturating_add(1);
                    if !conditional {
                        m.ops.unconditional = m.ops.unconditional.saturating_add(1);
                    }

                    let entry = m.tables.entry(table.to_string()).or_default();
                    entry.apply_calls = entry.apply_calls.saturating_add(1);
                });
            }

            MetricsEvent::ApplyFinish { table, applied } => {
                metrics::with_state_mut(|m| {
                    let entry = m.tables.entry(table.to_string()).or_default();
                    if applied {
                        m.ops.applied = m.ops.applied.saturating_add(1);
                        entry.applied = entry.applied.saturating_add(1);
                    } else {
                        m.ops.skipped = m.ops.skipped.saturating_add(1);
                        entry.skipped = entry.skipped.saturating_add(1);
                    }
                });
            }

            MetricsEvent::DecodeFailed { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.decode_failures = m.ops.decode_failures.saturating_add(1);
                });
            }

            MetricsEvent::EvalFailed { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.eval_failures = m.ops.eval_failures.saturating_add(1);
                });
            }

            MetricsEvent::LockTimeout { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.lock_timeouts = m.ops.lock_timeouts.saturating_add(1);
                });
            }

            MetricsEvent::CompileRejected { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.compile_rejections = m.ops.compile_rejections.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match override_sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
///
/// The previous sink is restored on every exit, including unwind.
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

///
/// TESTS
///
