use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::RaceError;
use crate::modules::models::heat::RaceHeat;
use crate::modules::models::heat_event::HeatEvent;
use crate::modules::store::RaceStore;

/// # Struct representing the query-layer view of a heat
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiHeat {
    pub number: i32,
    pub state: i32,
    pub state_label: String,
    pub active: bool,
    pub started: bool,
    pub ended: bool,
    pub goal_start_time: NaiveDateTime,
    pub goal_end_time: NaiveDateTime,
    pub started_time: Option<NaiveDateTime>,
    pub ended_time: Option<NaiveDateTime>,
    pub event_template: Option<String>,
}

impl ApiHeat {
    /// # Create the view of a single heat
    /// the state is exposed as its stable code plus label, and the event
    /// template is resolved through the heat's race.
    ///
    /// ## Arguments
    /// * `store` - the record store
    /// * `heat` - the heat to represent
    pub fn new(store: &RaceStore, heat: &RaceHeat) -> Result<ApiHeat, RaceError> {
        Ok(ApiHeat {
            number: heat.number,
            state: heat.state.value(),
            state_label: heat.state.label().to_string(),
            active: heat.active(),
            started: heat.started(),
            ended: heat.ended(),
            goal_start_time: heat.goal_start_time,
            goal_end_time: heat.goal_end_time,
            started_time: heat.started_time,
            ended_time: heat.ended_time,
            event_template: heat.event_template(store)?,
        })
    }

    pub fn bulk_new(store: &RaceStore, heats: &[RaceHeat]) -> Result<Vec<ApiHeat>, RaceError> {
        heats.iter().map(|heat| ApiHeat::new(store, heat)).collect()
    }
}

/// # Struct representing the query-layer view of a heat event
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiHeatEvent {
    pub trigger: u16,
    pub trigger_label: String,
    pub trigger_serializer_label: String,
    pub heat: i32,
    pub tracker: Option<i32>,
    pub created: NaiveDateTime,
}

impl ApiHeatEvent {
    pub fn new(event: &HeatEvent) -> ApiHeatEvent {
        ApiHeatEvent {
            trigger: event.trigger.code(),
            trigger_label: event.trigger.label().to_string(),
            trigger_serializer_label: event.trigger.serializer_label().to_string(),
            heat: event.heat,
            tracker: event.tracker,
            created: event.created,
        }
    }

    pub fn bulk_new(events: &[HeatEvent]) -> Vec<ApiHeatEvent> {
        events.iter().map(ApiHeatEvent::new).collect()
    }
}

/// # Heat totals for the query layer
/// both counts are exposed: every heat ever created, and the heats still
/// missing an ended time.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiHeatCounts {
    pub total_heats: usize,
    pub unconcluded_heats: usize,
}

impl ApiHeatCounts {
    pub fn collect(store: &RaceStore) -> Result<ApiHeatCounts, RaceError> {
        Ok(ApiHeatCounts {
            total_heats: RaceHeat::count_all(store)?,
            unconcluded_heats: RaceHeat::count_unconcluded(store)?,
        })
    }
}
