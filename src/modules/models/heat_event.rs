use chrono::{Local, NaiveDateTime};
use log::error;
use serde::{Deserialize, Serialize};

use crate::errors::{DataIntegritySnafu, RaceError};
use crate::macros::notify::notify_sink;
use crate::modules::notifier::{HeatNotification, HeatNotifier};
use crate::modules::store::RaceStore;

/// The closed set of event kinds a heat can record.
///
/// Discriminants are the stable wire and storage codes and index straight
/// into [`TRIGGER_CATALOG`]; codes must never be renumbered once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Gate = 0,
    AreaEnter = 1,
    AreaExit = 2,
    Crash = 3,
    Land = 4,
    Takeoff = 5,
    Arm = 6,
    Disarm = 7,
    Started = 8,
    Ended = 9,
}

pub struct TriggerSpec {
    pub trigger: Trigger,
    pub code: u16,
    pub label: &'static str,
    pub serializer_label: &'static str,
}

/// One row per trigger kind, indexed by code.
pub const TRIGGER_CATALOG: [TriggerSpec; 10] = [
    TriggerSpec {
        trigger: Trigger::Gate,
        code: 0,
        label: "Gate Trigger",
        serializer_label: "gate",
    },
    TriggerSpec {
        trigger: Trigger::AreaEnter,
        code: 1,
        label: "Area Entered Trigger",
        serializer_label: "enter",
    },
    TriggerSpec {
        trigger: Trigger::AreaExit,
        code: 2,
        label: "Area Exit Trigger",
        serializer_label: "exit",
    },
    TriggerSpec {
        trigger: Trigger::Crash,
        code: 3,
        label: "Crash Trigger",
        serializer_label: "crash",
    },
    TriggerSpec {
        trigger: Trigger::Land,
        code: 4,
        label: "Land Trigger",
        serializer_label: "land",
    },
    TriggerSpec {
        trigger: Trigger::Takeoff,
        code: 5,
        label: "Takeoff Trigger",
        serializer_label: "takeoff",
    },
    TriggerSpec {
        trigger: Trigger::Arm,
        code: 6,
        label: "Arm Trigger",
        serializer_label: "arm",
    },
    TriggerSpec {
        trigger: Trigger::Disarm,
        code: 7,
        label: "Disarm Trigger",
        serializer_label: "disarm",
    },
    TriggerSpec {
        trigger: Trigger::Started,
        code: 8,
        label: "Start Trigger",
        serializer_label: "started",
    },
    TriggerSpec {
        trigger: Trigger::Ended,
        code: 9,
        label: "End Trigger",
        serializer_label: "ended",
    },
];

impl Trigger {
    fn spec(self) -> &'static TriggerSpec {
        // rows are indexed by code, which is the discriminant
        &TRIGGER_CATALOG[self as usize]
    }

    pub fn code(self) -> u16 {
        self.spec().code
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn serializer_label(self) -> &'static str {
        self.spec().serializer_label
    }

    /// Resolve a stored trigger code. An unknown code means the stored data
    /// is corrupt; it is logged and surfaced, never coerced.
    pub fn from_code(code: u16) -> Result<Trigger, RaceError> {
        match TRIGGER_CATALOG.get(code as usize) {
            Some(spec) => Ok(spec.trigger),
            None => {
                error!(target: "models/heat_event", "Unknown trigger code {}", code);
                DataIntegritySnafu {
                    detail: format!("unknown trigger code {}", code),
                }
                .fail()
            }
        }
    }

    /// Resolve a serializer label back to its trigger.
    pub fn from_serializer_label(label: &str) -> Result<Trigger, RaceError> {
        match TRIGGER_CATALOG
            .iter()
            .find(|spec| spec.serializer_label == label)
        {
            Some(spec) => Ok(spec.trigger),
            None => {
                error!(target: "models/heat_event", "Unknown trigger label {}", label);
                DataIntegritySnafu {
                    detail: format!("unknown trigger label {}", label),
                }
                .fail()
            }
        }
    }
}

/// # One immutable entry in a heat's event log
/// Created when a trigger fires, never updated or deleted. The log is the
/// durable record heat narratives are rebuilt from. The tracker is optional
/// since not every event is device triggered, e.g. manually ended heats.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct HeatEvent {
    pub id: i32,
    pub heat: i32,
    pub tracker: Option<i32>,
    pub trigger: Trigger,
    pub created: NaiveDateTime,
}

impl HeatEvent {
    /************ INSERTERS ************/

    /// # append an event to a heat's log
    /// creates the entry, timestamped at append time, and notifies the sink
    /// once the append has committed.
    ///
    /// ## Arguments
    /// * `store` - the record store
    /// * `sink` - receives the event notification after commit
    /// * `heat_id` - the heat the event belongs to
    /// * `trigger` - the kind of event
    /// * `tracker` - the tracker that fired the trigger, if any
    ///
    /// ## Returns
    /// * `HeatEvent` - the appended entry
    pub fn append(
        store: &RaceStore,
        sink: &dyn HeatNotifier,
        heat_id: i32,
        trigger: Trigger,
        tracker: Option<i32>,
    ) -> Result<HeatEvent, RaceError> {
        let (event, channel) = store.transaction(|tx| {
            let heat = tx.heat(heat_id)?;
            if let Some(tracker_id) = tracker {
                tx.tracker(tracker_id)?;
            }

            let event = HeatEvent {
                id: tx.next_id(),
                heat: heat_id,
                tracker,
                trigger,
                created: Local::now().naive_local(),
            };
            tx.append_heat_event(event.clone());

            Ok((event, heat.channel_name()))
        })?;

        notify_sink!(
            sink,
            &channel,
            &HeatNotification::EventTriggered {
                trigger: event.trigger.code(),
                tracker_id: event.tracker,
            },
            "models/heat_event::append"
        );

        Ok(event)
    }

    /************ GETTERS ************/

    /// # get all events of a heat
    /// in creation order
    pub fn for_heat(store: &RaceStore, heat_id: i32) -> Result<Vec<HeatEvent>, RaceError> {
        store.transaction(|tx| {
            tx.heat(heat_id)?;
            Ok(tx.heat_events_for(heat_id))
        })
    }

    /// # get the device triggered events of a heat
    pub fn tracker_events(store: &RaceStore, heat_id: i32) -> Result<Vec<HeatEvent>, RaceError> {
        Ok(HeatEvent::for_heat(store, heat_id)?
            .into_iter()
            .filter(|event| event.tracker.is_some())
            .collect())
    }

    /// # get the manually or system triggered events of a heat
    pub fn non_tracker_events(
        store: &RaceStore,
        heat_id: i32,
    ) -> Result<Vec<HeatEvent>, RaceError> {
        Ok(HeatEvent::for_heat(store, heat_id)?
            .into_iter()
            .filter(|event| event.tracker.is_none())
            .collect())
    }

    /// # get the events a single tracker fired in a heat
    pub fn for_tracker(
        store: &RaceStore,
        heat_id: i32,
        tracker_id: i32,
    ) -> Result<Vec<HeatEvent>, RaceError> {
        Ok(HeatEvent::for_heat(store, heat_id)?
            .into_iter()
            .filter(|event| event.tracker == Some(tracker_id))
            .collect())
    }
}
