use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventReport
/// Ephemeral, in-memory counters for store traffic.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub domains: BTreeMap<String, DomainCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Executor entrypoints
    pub load_calls: u64,
    pub count_calls: u64,
    pub save_calls: u64,

    // Select traffic
    pub fetch_selects: u64,
    pub count_selects: u64,
    pub offset_selects: u64,
    pub items_fetched: u64,

    // Write traffic
    pub put_calls: u64,
    pub attributes_put: u64,
    pub delete_calls: u64,
    pub attributes_deleted: u64,
    pub lobs_stored: u64,
    pub lob_bytes: u64,
    pub version_conflicts: u64,
}

///
/// DomainCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DomainCounters {
    pub selects: u64,
    pub items_fetched: u64,
    pub saves: u64,
    pub attributes_put: u64,
    pub attributes_deleted: u64,
    pub version_conflicts: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventReport> = RefCell::new(EventReport::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventReport) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventReport) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventReport::default());
}
