//! Typed change notifications for the session store.
//!
//! These replace ad-hoc global events with an explicit publish/subscribe
//! channel owned by the session. Two channels exist: the *storage* channel
//! fires when the durable entry is written or deleted (cross-context
//! observers re-read the store), and the *data* channel fires on every
//! in-memory grid replacement — including uncommitted edit mutations — so
//! chart views can react without touching storage.

use std::sync::{Arc, Mutex};

use gridhub_engine::Grid;

/// Events emitted by the session store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The grid was replaced (load, commit, edit mutation, cross-context
    /// refresh). Carries the full payload.
    DataReplaced(DataChangedEvent),

    /// The grid and its durable entry were cleared.
    DataCleared,
}

/// Payload for grid replacements.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangedEvent {
    pub rows: Grid,
    pub file_name: String,
    /// Epoch milliseconds of the write that produced this payload.
    /// Cross-context reconciliation is last-writer-wins on this value.
    pub updated_at: i64,
}

/// Callback type for receiving store events.
pub type EventCallback = Box<dyn FnMut(&StoreEvent) + Send>;

/// Simple event collector for testing. Clone the collector, hand its
/// `callback()` to a subscribe method, and inspect what arrived.
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> EventCallback {
        let events = Arc::clone(&self.events);
        Box::new(move |event| events.lock().unwrap().push(event.clone()))
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Filter to only DataReplaced payloads.
    pub fn replaced(&self) -> Vec<DataChangedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StoreEvent::DataReplaced(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count of DataCleared events.
    pub fn cleared(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, StoreEvent::DataCleared))
            .count()
    }
}
