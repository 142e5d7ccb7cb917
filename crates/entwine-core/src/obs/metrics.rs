use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for store, transform and access events.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            entities: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Store entrypoints
    pub get_calls: u64,
    pub scan_calls: u64,
    pub filter_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,
    pub patch_calls: u64,
    pub delete_calls: u64,
    pub put_fallbacks: u64,

    // Rows touched
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_deleted: u64,

    // Transformer / validator
    pub builds: u64,
    pub patches: u64,
    pub validation_failures: u64,

    // Access
    pub access_denials: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntityCounters {
    pub read_calls: u64,
    pub write_calls: u64,
    pub delete_calls: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_deleted: u64,
    pub put_fallbacks: u64,
    pub validation_failures: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `since_ms`.
    pub counters: Option<EventState>,
    /// Per-entity counters and averages.
    pub entity_counters: Vec<EntitySummary>,
}

///
/// EntitySummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntitySummary {
    pub entity: String,
    pub read_calls: u64,
    pub write_calls: u64,
    pub delete_calls: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_deleted: u64,
    pub avg_rows_per_read: f64,
    pub put_fallbacks: u64,
    pub validation_failures: u64,
}

/// Build a metrics report from the in-memory counters.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let entity_counters = snap
        .entities
        .iter()
        .map(|(entity, c)| EntitySummary {
            entity: entity.clone(),
            read_calls: c.read_calls,
            write_calls: c.write_calls,
            delete_calls: c.delete_calls,
            rows_read: c.rows_read,
            rows_written: c.rows_written,
            rows_deleted: c.rows_deleted,
            avg_rows_per_read: if c.read_calls > 0 {
                c.rows_read as f64 / c.read_calls as f64
            } else {
                0.0
            },
            put_fallbacks: c.put_fallbacks,
            validation_failures: c.validation_failures,
        })
        .collect();

    EventReport {
        counters: Some(snap),
        entity_counters,
    }
}
