use chrono::{Local, NaiveDateTime};
use log::error;
use serde::{Deserialize, Serialize};

use crate::errors::{ConflictSnafu, DataIntegritySnafu, InvalidTransitionSnafu, RaceError};
use crate::macros::notify::notify_sink;
use crate::modules::notifier::{HeatNotification, HeatNotifier};
use crate::modules::store::RaceStore;

/// Lifecycle states of a race heat. The discriminants are the stable
/// storage codes and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatState {
    Waiting = 0,
    Running = 1,
    Restarting = 2,
    Ended = 3,
}

impl HeatState {
    /// States in which a heat counts against the one-active-heat-per-race
    /// invariant.
    pub const ACTIVE_STATES: [HeatState; 2] = [HeatState::Running, HeatState::Restarting];

    pub fn value(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            HeatState::Waiting => "Waiting",
            HeatState::Running => "Running",
            HeatState::Restarting => "Restarting",
            HeatState::Ended => "Ended",
        }
    }

    /// Resolve a stored state code. An unknown code is a data integrity
    /// error, not a normal case.
    pub fn from_value(value: i32) -> Result<HeatState, RaceError> {
        match value {
            0 => Ok(HeatState::Waiting),
            1 => Ok(HeatState::Running),
            2 => Ok(HeatState::Restarting),
            3 => Ok(HeatState::Ended),
            other => {
                error!(target: "models/heat", "Unknown heat state code {}", other);
                DataIntegritySnafu {
                    detail: format!("unknown heat state code {}", other),
                }
                .fail()
            }
        }
    }

    pub fn is_active(self) -> bool {
        HeatState::ACTIVE_STATES.contains(&self)
    }
}

/// Actions a caller can apply to a heat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatAction {
    Start,
    End,
    Restart,
}

struct Transition {
    action: HeatAction,
    sources: &'static [HeatState],
    target: HeatState,
}

/// The full transition table. A missing row means the action is illegal
/// from that state.
const TRANSITIONS: [Transition; 3] = [
    Transition {
        action: HeatAction::Start,
        sources: &[HeatState::Waiting, HeatState::Restarting],
        target: HeatState::Running,
    },
    Transition {
        action: HeatAction::End,
        sources: &[HeatState::Running],
        target: HeatState::Ended,
    },
    Transition {
        action: HeatAction::Restart,
        sources: &[HeatState::Running, HeatState::Ended],
        target: HeatState::Restarting,
    },
];

fn transition_for(state: HeatState, action: HeatAction) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|transition| transition.action == action && transition.sources.contains(&state))
}

#[derive(Serialize, Debug, Clone, Deserialize)]
pub struct NewRaceHeat {
    pub race: i32,
    pub group: Option<i32>,
    pub goal_start_time: NaiveDateTime,
    pub goal_end_time: NaiveDateTime,
}

/// # A single run of a race
/// A heat holds the lifecycle state for one run and logs the times it
/// starts and stops. Goal times are the planned schedule and are not
/// enforced by the transitions.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct RaceHeat {
    pub id: i32,
    pub race: i32,
    pub group: Option<i32>,
    pub number: i32,
    pub state: HeatState,
    pub goal_start_time: NaiveDateTime,
    pub goal_end_time: NaiveDateTime,
    pub started_time: Option<NaiveDateTime>,
    pub ended_time: Option<NaiveDateTime>,
    #[serde(skip)]
    pub(crate) version: u64,
}

impl RaceHeat {
    /************ INSERTERS ************/

    /// # create heat
    /// create a new heat for a race in the waiting state. the heat number is
    /// computed inside the creating transaction as one past the highest
    /// number the race has, so concurrent creations never share a number.
    ///
    /// ## Arguments
    /// * `store` - the record store
    /// * `new_heat` - the race, optional group, and goal times
    ///
    /// ## Returns
    /// * `RaceHeat` - the created heat
    pub fn create(store: &RaceStore, new_heat: NewRaceHeat) -> Result<RaceHeat, RaceError> {
        store.transaction(|tx| {
            tx.race(new_heat.race)?;

            let heat = RaceHeat {
                id: tx.next_id(),
                race: new_heat.race,
                group: new_heat.group,
                number: tx.max_heat_number(new_heat.race) + 1,
                state: HeatState::Waiting,
                goal_start_time: new_heat.goal_start_time,
                goal_end_time: new_heat.goal_end_time,
                started_time: None,
                ended_time: None,
                version: 0,
            };

            tx.save_heat(&heat)
        })
    }

    /************ GETTERS ************/

    /// # get heat by id
    ///
    /// ## Arguments
    /// * `store` - the record store
    /// * `heat_id` - the id of the heat to get
    ///
    /// ## Returns
    /// * `RaceHeat` - the heat
    pub fn get(store: &RaceStore, heat_id: i32) -> Result<RaceHeat, RaceError> {
        store.transaction(|tx| tx.heat(heat_id))
    }

    /// # get all heats of a race
    /// ordered by heat number
    pub fn for_race(store: &RaceStore, race_id: i32) -> Result<Vec<RaceHeat>, RaceError> {
        store.transaction(|tx| {
            tx.race(race_id)?;
            Ok(tx.heats_for_race(race_id))
        })
    }

    /// # get the active heats of a race
    /// heats in a running or restarting state, optionally excluding one heat
    pub fn active_for_race(
        store: &RaceStore,
        race_id: i32,
        excluding: Option<i32>,
    ) -> Result<Vec<RaceHeat>, RaceError> {
        store.transaction(|tx| {
            tx.race(race_id)?;
            Ok(tx.active_heats(race_id, excluding))
        })
    }

    /// # count all heats in the store
    pub fn count_all(store: &RaceStore) -> Result<usize, RaceError> {
        store.transaction(|tx| Ok(tx.count_heats()))
    }

    /// # count the heats that have not concluded yet
    /// a heat counts as concluded once it has an ended time
    pub fn count_unconcluded(store: &RaceStore) -> Result<usize, RaceError> {
        store.transaction(|tx| Ok(tx.count_unconcluded_heats()))
    }

    /************ TRANSITIONS ************/

    /// # apply a lifecycle action
    /// the single entry point of the heat state machine. validates the
    /// action against the transition table, checks the action's
    /// precondition, and commits the state change together with its side
    /// effects in one store transaction; the sink is notified strictly
    /// after commit.
    ///
    /// a snapshot that lost a race against a concurrent writer fails with
    /// `Conflict`; an illegal action or failed precondition fails with
    /// `InvalidTransition`. either way nothing is written.
    ///
    /// ## Arguments
    /// * `store` - the record store
    /// * `sink` - receives the state change notification after commit
    /// * `action` - the lifecycle action to apply
    pub fn apply(
        &mut self,
        store: &RaceStore,
        sink: &dyn HeatNotifier,
        action: HeatAction,
    ) -> Result<(), RaceError> {
        let committed = store.transaction(|tx| {
            let mut heat = tx.heat(self.id)?;
            if heat.version != self.version {
                return ConflictSnafu {
                    entity: "heat",
                    id: self.id,
                }
                .fail();
            }

            let transition = match transition_for(heat.state, action) {
                Some(transition) => transition,
                None => {
                    return InvalidTransitionSnafu {
                        heat: heat.id,
                        state: heat.state,
                        action,
                    }
                    .fail()
                }
            };

            // no other heat of the race may already be active
            if action == HeatAction::Start && !tx.active_heats(heat.race, Some(heat.id)).is_empty()
            {
                return InvalidTransitionSnafu {
                    heat: heat.id,
                    state: heat.state,
                    action,
                }
                .fail();
            }

            let now = Local::now().naive_local();
            match action {
                HeatAction::Start => {
                    let mut race = tx.race(heat.race)?;
                    race.current_heat = Some(heat.id);
                    tx.put_race(race);

                    heat.started_time = Some(now);
                    heat.ended_time = None;
                }
                HeatAction::End => {
                    heat.ended_time = Some(now);
                }
                HeatAction::Restart => {
                    heat.started_time = None;
                    heat.ended_time = None;
                }
            }
            heat.state = transition.target;

            tx.save_heat(&heat)
        })?;

        notify_sink!(
            sink,
            &committed.channel_name(),
            &HeatNotification::StateChanged {
                heat_number: committed.number,
                new_state: committed.state.value(),
            },
            "models/heat::apply"
        );

        *self = committed;
        Ok(())
    }

    /// Allow a waiting or restarted heat to be started. Makes this heat the
    /// race's current heat.
    pub fn start(&mut self, store: &RaceStore, sink: &dyn HeatNotifier) -> Result<(), RaceError> {
        self.apply(store, sink, HeatAction::Start)
    }

    /// Allow a running heat to be ended.
    pub fn end(&mut self, store: &RaceStore, sink: &dyn HeatNotifier) -> Result<(), RaceError> {
        self.apply(store, sink, HeatAction::End)
    }

    /// Allow a finished or running heat to be restarted.
    /// A heat may be restarted while another heat of the race is active;
    /// only starting is gated on the active set.
    pub fn restart(&mut self, store: &RaceStore, sink: &dyn HeatNotifier) -> Result<(), RaceError> {
        self.apply(store, sink, HeatAction::Restart)
    }

    /************ PROPERTIES ************/

    pub fn started(&self) -> bool {
        self.started_time.is_some()
    }

    pub fn ended(&self) -> bool {
        self.ended_time.is_some()
    }

    pub fn active(&self) -> bool {
        self.state.is_active()
    }

    /// Channel name for live update subscribers of this heat.
    pub fn channel_name(&self) -> String {
        format!("{}-heat-{}", self.race, self.number)
    }

    /// The display template of the event this heat's race belongs to.
    pub fn event_template(&self, store: &RaceStore) -> Result<Option<String>, RaceError> {
        store.transaction(|tx| {
            let race = tx.race(self.race)?;
            let event = tx.event(race.event)?;
            Ok(event.template)
        })
    }
}
