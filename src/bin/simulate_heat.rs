use chrono::{Duration, Local};
use log::info;

use race_station::modules::heat_api::{ApiHeat, ApiHeatCounts, ApiHeatEvent};
use race_station::modules::helpers::logging::setup_logging;
use race_station::modules::models::event::{Event, NewEvent};
use race_station::modules::models::heat::{NewRaceHeat, RaceHeat};
use race_station::modules::models::heat_event::{HeatEvent, Trigger};
use race_station::modules::models::race::{NewRace, Race};
use race_station::modules::models::tracker::{NewTracker, Tracker};
use race_station::modules::notifier::LogNotifier;
use race_station::modules::store::RaceStore;

fn main() {
    setup_logging().expect("Failed to set up logging");

    let store = RaceStore::new();
    let sink = LogNotifier;

    let event = Event::create(
        &store,
        NewEvent {
            title: "Spring Cup".to_string(),
            template: Some("scoreboard".to_string()),
        },
    )
    .expect("Failed to create event");
    let race = Race::create(
        &store,
        NewRace {
            event: event.id,
            title: "Quarter final".to_string(),
        },
    )
    .expect("Failed to create race");
    let tracker = Tracker::create(
        &store,
        NewTracker {
            name: "Falcon-1".to_string(),
        },
    )
    .expect("Failed to create tracker");

    let goal_start = Local::now().naive_local();
    let mut heat = RaceHeat::create(
        &store,
        NewRaceHeat {
            race: race.id,
            group: None,
            goal_start_time: goal_start,
            goal_end_time: goal_start + Duration::minutes(5),
        },
    )
    .expect("Failed to create heat");

    info!(target: "simulate_heat", "Created heat {} of race {}", heat.number, race.title);

    heat.start(&store, &sink).expect("Failed to start heat");
    HeatEvent::append(&store, &sink, heat.id, Trigger::Arm, Some(tracker.id))
        .expect("Failed to append event");
    HeatEvent::append(&store, &sink, heat.id, Trigger::Takeoff, Some(tracker.id))
        .expect("Failed to append event");
    for _ in 0..3 {
        HeatEvent::append(&store, &sink, heat.id, Trigger::Gate, Some(tracker.id))
            .expect("Failed to append event");
    }
    HeatEvent::append(&store, &sink, heat.id, Trigger::Land, Some(tracker.id))
        .expect("Failed to append event");
    heat.end(&store, &sink).expect("Failed to end heat");
    HeatEvent::append(&store, &sink, heat.id, Trigger::Ended, None)
        .expect("Failed to append event");

    let events = HeatEvent::for_heat(&store, heat.id).expect("Failed to load events");
    for view in ApiHeatEvent::bulk_new(&events) {
        println!("{} {}", view.created, view.trigger_label);
    }

    let view = ApiHeat::new(&store, &heat).expect("Failed to project heat");
    println!(
        "{}",
        serde_json::to_string_pretty(&view).expect("Failed to serialize heat")
    );

    let counts = ApiHeatCounts::collect(&store).expect("Failed to count heats");
    println!(
        "heats: {} total, {} unconcluded",
        counts.total_heats, counts.unconcluded_heats
    );
}
