use serde::{Deserialize, Serialize};

use crate::errors::RaceError;
use crate::modules::store::RaceStore;

#[derive(Serialize, Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub template: Option<String>,
}

/// A race event, the competition a set of races belongs to. Carries the
/// display template heats resolve through their race.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub template: Option<String>,
}

impl Event {
    pub fn create(store: &RaceStore, new_event: NewEvent) -> Result<Event, RaceError> {
        store.transaction(|tx| {
            let event = Event {
                id: tx.next_id(),
                title: new_event.title,
                template: new_event.template,
            };
            tx.insert_event(event.clone());
            Ok(event)
        })
    }

    pub fn get(store: &RaceStore, event_id: i32) -> Result<Event, RaceError> {
        store.transaction(|tx| tx.event(event_id))
    }
}
