use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// EventState
/// Ephemeral, in-memory counters for the apply path.
/// Process-global: apply runs on worker threads.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct EventState {
    pub(crate) ops: EventOps,
    pub(crate) tables: BTreeMap<String, TableCounters>,
}

impl EventState {
    const fn new() -> Self {
        Self {
            ops: EventOps::new(),
            tables: BTreeMap::new(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Apply entrypoint
    pub apply_calls: u64,
    pub unconditional: u64,

    // Outcomes
    pub applied: u64,
    pub skipped: u64,

    // Failures
    pub decode_failures: u64,
    pub eval_failures: u64,
    pub lock_timeouts: u64,
    pub compile_rejections: u64,
}

impl EventOps {
    const fn new() -> Self {
        Self {
            apply_calls: 0,
            unconditional: 0,
            applied: 0,
            skipped: 0,
            decode_failures: 0,
            eval_failures: 0,
            lock_timeouts: 0,
            compile_rejections: 0,
        }
    }
}

///
/// TableCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableCounters {
    pub apply_calls: u64,
    pub applied: u64,
    pub skipped: u64,
}

///
/// EventReport
/// Point-in-time snapshot of the event counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub tables: BTreeMap<String, TableCounters>,
}

static EVENT_STATE: Mutex<EventState> = Mutex::new(EventState::new());

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    f(&mut EVENT_STATE.lock())
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::new());
}

/// Snapshot current counters.
#[must_use]
pub(crate) fn report() -> EventReport {
    with_state_mut(|m| EventReport {
        ops: m.ops.clone(),
        tables: m.tables.clone(),
    })
}
