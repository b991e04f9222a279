use serde::{Deserialize, Serialize};

use crate::errors::RaceError;
use crate::modules::models::heat::RaceHeat;
use crate::modules::store::RaceStore;

#[derive(Serialize, Debug, Clone, Deserialize)]
pub struct NewRace {
    pub event: i32,
    pub title: String,
}

/// # A race within an event
/// Owns a collection of heats. `current_heat` is a weak reference to the
/// heat currently active for display and routing; it is only ever written
/// by the start transition, never directly.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Race {
    pub id: i32,
    pub event: i32,
    pub title: String,
    pub current_heat: Option<i32>,
}

impl Race {
    /************ INSERTERS ************/

    pub fn create(store: &RaceStore, new_race: NewRace) -> Result<Race, RaceError> {
        store.transaction(|tx| {
            tx.event(new_race.event)?;

            let race = Race {
                id: tx.next_id(),
                event: new_race.event,
                title: new_race.title,
                current_heat: None,
            };
            tx.put_race(race.clone());
            Ok(race)
        })
    }

    /************ GETTERS ************/

    pub fn get(store: &RaceStore, race_id: i32) -> Result<Race, RaceError> {
        store.transaction(|tx| tx.race(race_id))
    }

    /// # get the heats of the race
    /// ordered by heat number
    pub fn get_heats(&self, store: &RaceStore) -> Result<Vec<RaceHeat>, RaceError> {
        RaceHeat::for_race(store, self.id)
    }

    /// # get the race's current heat
    /// re-reads the race so a stale snapshot still resolves the heat the
    /// last committed start transition installed
    pub fn get_current_heat(&self, store: &RaceStore) -> Result<Option<RaceHeat>, RaceError> {
        store.transaction(|tx| {
            let race = tx.race(self.id)?;
            match race.current_heat {
                Some(heat_id) => Ok(Some(tx.heat(heat_id)?)),
                None => Ok(None),
            }
        })
    }

    /// # count the heats of the race
    pub fn count_heats(&self, store: &RaceStore) -> Result<usize, RaceError> {
        store.transaction(|tx| {
            tx.race(self.id)?;
            Ok(tx.heats_for_race(self.id).len())
        })
    }

    /// # count the heats of the race that have not concluded yet
    pub fn count_unconcluded_heats(&self, store: &RaceStore) -> Result<usize, RaceError> {
        store.transaction(|tx| {
            tx.race(self.id)?;
            Ok(tx
                .heats_for_race(self.id)
                .iter()
                .filter(|heat| heat.ended_time.is_none())
                .count())
        })
    }
}
