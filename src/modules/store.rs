use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use snafu::OptionExt;

use crate::errors::{ConflictSnafu, NotFoundSnafu, RaceError};
use crate::modules::models::event::Event;
use crate::modules::models::heat::RaceHeat;
use crate::modules::models::heat_event::HeatEvent;
use crate::modules::models::race::Race;
use crate::modules::models::tracker::Tracker;

/// # In-process transactional record store
/// Plays the role the production database does: heat transitions and heat
/// creation run inside [`RaceStore::transaction`], which serializes writers
/// on a single lock and commits a snapshot all-or-nothing. That lock scope
/// covers the per-race atomic units the lifecycle logic needs (the
/// active-heat check plus state write, and the max-and-increment of heat
/// numbers).
///
/// Heat writes carry an optimistic version check: saving a snapshot that an
/// interleaved write has overtaken fails with `Conflict` instead of
/// clobbering it.
#[derive(Default)]
pub struct RaceStore {
    tables: Mutex<Tables>,
}

#[derive(Default, Clone)]
struct Tables {
    next_id: i32,
    events: HashMap<i32, Event>,
    races: HashMap<i32, Race>,
    heats: BTreeMap<i32, RaceHeat>,
    trackers: HashMap<i32, Tracker>,
    heat_events: Vec<HeatEvent>,
}

impl RaceStore {
    pub fn new() -> RaceStore {
        RaceStore::default()
    }

    /// Run `operation` against a working copy of the tables. The copy
    /// replaces the live tables only when the closure returns `Ok`, so a
    /// failed operation leaves no partial writes behind.
    pub(crate) fn transaction<T>(
        &self,
        operation: impl FnOnce(&mut StoreTransaction) -> Result<T, RaceError>,
    ) -> Result<T, RaceError> {
        let mut tables = self.tables.lock().expect("race store lock poisoned");
        let mut working = tables.clone();

        let result = operation(&mut StoreTransaction {
            tables: &mut working,
        });
        if result.is_ok() {
            *tables = working;
        }

        result
    }
}

pub(crate) struct StoreTransaction<'a> {
    tables: &'a mut Tables,
}

impl StoreTransaction<'_> {
    pub(crate) fn next_id(&mut self) -> i32 {
        self.tables.next_id += 1;
        self.tables.next_id
    }

    /************ EVENTS ************/

    pub(crate) fn event(&self, event_id: i32) -> Result<Event, RaceError> {
        self.tables.events.get(&event_id).cloned().context(NotFoundSnafu {
            entity: "event",
            id: event_id,
        })
    }

    pub(crate) fn insert_event(&mut self, event: Event) {
        self.tables.events.insert(event.id, event);
    }

    /************ RACES ************/

    pub(crate) fn race(&self, race_id: i32) -> Result<Race, RaceError> {
        self.tables.races.get(&race_id).cloned().context(NotFoundSnafu {
            entity: "race",
            id: race_id,
        })
    }

    pub(crate) fn put_race(&mut self, race: Race) {
        self.tables.races.insert(race.id, race);
    }

    /************ HEATS ************/

    pub(crate) fn heat(&self, heat_id: i32) -> Result<RaceHeat, RaceError> {
        self.tables.heats.get(&heat_id).cloned().context(NotFoundSnafu {
            entity: "heat",
            id: heat_id,
        })
    }

    /// Write a heat back, enforcing the optimistic version check. Returns
    /// the committed copy carrying the bumped version.
    pub(crate) fn save_heat(&mut self, heat: &RaceHeat) -> Result<RaceHeat, RaceError> {
        if let Some(stored) = self.tables.heats.get(&heat.id) {
            if stored.version != heat.version {
                return ConflictSnafu {
                    entity: "heat",
                    id: heat.id,
                }
                .fail();
            }
        }

        let mut committed = heat.clone();
        committed.version = heat.version + 1;
        self.tables.heats.insert(committed.id, committed.clone());
        Ok(committed)
    }

    /// All heats of a race, ordered by heat number.
    pub(crate) fn heats_for_race(&self, race_id: i32) -> Vec<RaceHeat> {
        let mut heats: Vec<RaceHeat> = self
            .tables
            .heats
            .values()
            .filter(|heat| heat.race == race_id)
            .cloned()
            .collect();

        heats.sort_by_key(|heat| heat.number);
        heats
    }

    /// Heats of a race currently in an active state, optionally excluding
    /// one heat. Must run inside the same transaction as a pending state
    /// write for the mutual-exclusion check to hold.
    pub(crate) fn active_heats(&self, race_id: i32, excluding: Option<i32>) -> Vec<RaceHeat> {
        self.tables
            .heats
            .values()
            .filter(|heat| {
                heat.race == race_id && heat.state.is_active() && Some(heat.id) != excluding
            })
            .cloned()
            .collect()
    }

    pub(crate) fn max_heat_number(&self, race_id: i32) -> i32 {
        self.tables
            .heats
            .values()
            .filter(|heat| heat.race == race_id)
            .map(|heat| heat.number)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn count_heats(&self) -> usize {
        self.tables.heats.len()
    }

    /// Heats that have not concluded yet, across all races.
    pub(crate) fn count_unconcluded_heats(&self) -> usize {
        self.tables
            .heats
            .values()
            .filter(|heat| heat.ended_time.is_none())
            .count()
    }

    /************ HEAT EVENTS ************/

    pub(crate) fn append_heat_event(&mut self, event: HeatEvent) {
        self.tables.heat_events.push(event);
    }

    /// Log entries for a heat, in creation order.
    pub(crate) fn heat_events_for(&self, heat_id: i32) -> Vec<HeatEvent> {
        self.tables
            .heat_events
            .iter()
            .filter(|event| event.heat == heat_id)
            .cloned()
            .collect()
    }

    /************ TRACKERS ************/

    pub(crate) fn tracker(&self, tracker_id: i32) -> Result<Tracker, RaceError> {
        self.tables
            .trackers
            .get(&tracker_id)
            .cloned()
            .context(NotFoundSnafu {
                entity: "tracker",
                id: tracker_id,
            })
    }

    pub(crate) fn insert_tracker(&mut self, tracker: Tracker) {
        self.tables.trackers.insert(tracker.id, tracker);
    }
}
