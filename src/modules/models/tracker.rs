use serde::{Deserialize, Serialize};

use crate::errors::RaceError;
use crate::modules::store::RaceStore;

#[derive(Serialize, Debug, Clone, Deserialize)]
pub struct NewTracker {
    pub name: String,
}

/// A tracked physical entity, e.g. a vehicle's onboard device, that can
/// originate heat event triggers.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Tracker {
    pub id: i32,
    pub name: String,
}

impl Tracker {
    pub fn create(store: &RaceStore, new_tracker: NewTracker) -> Result<Tracker, RaceError> {
        store.transaction(|tx| {
            let tracker = Tracker {
                id: tx.next_id(),
                name: new_tracker.name,
            };
            tx.insert_tracker(tracker.clone());
            Ok(tracker)
        })
    }

    pub fn get(store: &RaceStore, tracker_id: i32) -> Result<Tracker, RaceError> {
        store.transaction(|tx| tx.tracker(tracker_id))
    }
}
