use std::sync::Arc;
use std::thread;

use chrono::{Duration, Local};

use race_station::errors::RaceError;
use race_station::modules::heat_api::ApiHeatCounts;
use race_station::modules::models::event::{Event, NewEvent};
use race_station::modules::models::heat::{HeatState, NewRaceHeat, RaceHeat};
use race_station::modules::models::heat_event::{HeatEvent, Trigger};
use race_station::modules::models::race::{NewRace, Race};
use race_station::modules::models::tracker::{NewTracker, Tracker};
use race_station::modules::notifier::{HeatNotification, MemoryNotifier};
use race_station::modules::store::RaceStore;

fn setup_race(store: &RaceStore) -> Race {
    let event = Event::create(
        store,
        NewEvent {
            title: "Spring Cup".to_string(),
            template: Some("scoreboard".to_string()),
        },
    )
    .unwrap();

    Race::create(
        store,
        NewRace {
            event: event.id,
            title: "Quarter final".to_string(),
        },
    )
    .unwrap()
}

fn new_heat(race: &Race) -> NewRaceHeat {
    let goal_start = Local::now().naive_local();
    NewRaceHeat {
        race: race.id,
        group: None,
        goal_start_time: goal_start,
        goal_end_time: goal_start + Duration::minutes(5),
    }
}

#[test]
fn one_active_heat_per_race() {
    let store = RaceStore::new();
    let sink = MemoryNotifier::new();
    let race = setup_race(&store);

    let mut heat_a = RaceHeat::create(&store, new_heat(&race)).unwrap();
    let mut heat_b = RaceHeat::create(&store, new_heat(&race)).unwrap();

    heat_a.start(&store, &sink).unwrap();
    assert_eq!(heat_a.state, HeatState::Running);
    assert_eq!(
        race.get_current_heat(&store).unwrap().map(|heat| heat.id),
        Some(heat_a.id)
    );

    let blocked = heat_b.start(&store, &sink);
    assert!(matches!(blocked, Err(RaceError::InvalidTransition { .. })));
    assert_eq!(RaceHeat::get(&store, heat_b.id).unwrap().state, HeatState::Waiting);

    heat_a.end(&store, &sink).unwrap();
    assert_eq!(heat_a.state, HeatState::Ended);

    heat_b.start(&store, &sink).unwrap();
    assert_eq!(heat_b.state, HeatState::Running);
    assert_eq!(
        race.get_current_heat(&store).unwrap().map(|heat| heat.id),
        Some(heat_b.id)
    );

    assert!(RaceHeat::active_for_race(&store, race.id, None).unwrap().len() <= 1);
}

#[test]
fn a_second_race_is_not_blocked() {
    let store = RaceStore::new();
    let sink = MemoryNotifier::new();
    let race_a = setup_race(&store);
    let race_b = Race::create(
        &store,
        NewRace {
            event: race_a.event,
            title: "Semi final".to_string(),
        },
    )
    .unwrap();

    let mut heat_a = RaceHeat::create(&store, new_heat(&race_a)).unwrap();
    let mut heat_b = RaceHeat::create(&store, new_heat(&race_b)).unwrap();

    heat_a.start(&store, &sink).unwrap();
    heat_b.start(&store, &sink).unwrap();

    assert_eq!(heat_a.state, HeatState::Running);
    assert_eq!(heat_b.state, HeatState::Running);
    assert_eq!(heat_b.number, 1);
}

#[test]
fn heat_numbers_are_gapless_in_creation_order() {
    let store = RaceStore::new();
    let race = setup_race(&store);

    for expected in 1..=4 {
        let heat = RaceHeat::create(&store, new_heat(&race)).unwrap();
        assert_eq!(heat.number, expected);
    }

    let numbers: Vec<i32> = race
        .get_heats(&store)
        .unwrap()
        .iter()
        .map(|heat| heat.number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[test]
fn concurrent_creation_assigns_unique_numbers() {
    let store = Arc::new(RaceStore::new());
    let race = setup_race(&store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let race = race.clone();
        handles.push(thread::spawn(move || {
            RaceHeat::create(&store, new_heat(&race)).unwrap().number
        }));
    }

    let mut numbers: Vec<i32> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=8).collect::<Vec<i32>>());
}

#[test]
fn concurrent_starts_admit_a_single_winner() {
    let store = Arc::new(RaceStore::new());
    let race = setup_race(&store);

    let heat_a = RaceHeat::create(&store, new_heat(&race)).unwrap();
    let heat_b = RaceHeat::create(&store, new_heat(&race)).unwrap();

    let mut handles = Vec::new();
    for heat in [heat_a, heat_b] {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let sink = MemoryNotifier::new();
            let mut heat = heat;
            heat.start(&store, &sink).is_ok()
        }));
    }

    let outcomes: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|started| **started).count(), 1);
    assert_eq!(
        RaceHeat::active_for_race(&store, race.id, None).unwrap().len(),
        1
    );
}

#[test]
fn double_start_of_one_heat_conflicts() {
    let store = Arc::new(RaceStore::new());
    let race = setup_race(&store);
    let heat = RaceHeat::create(&store, new_heat(&race)).unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = Arc::clone(&store);
        let snapshot = heat.clone();
        handles.push(thread::spawn(move || {
            let sink = MemoryNotifier::new();
            let mut snapshot = snapshot;
            snapshot.start(&store, &sink)
        }));
    }

    let outcomes: Vec<Result<(), RaceError>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(RaceError::Conflict { .. }))));
    assert_eq!(RaceHeat::get(&store, heat.id).unwrap().state, HeatState::Running);
}

#[test]
fn notifications_follow_commits_in_order() {
    let store = RaceStore::new();
    let sink = MemoryNotifier::new();
    let race = setup_race(&store);
    let tracker = Tracker::create(
        &store,
        NewTracker {
            name: "Falcon-1".to_string(),
        },
    )
    .unwrap();

    let mut heat = RaceHeat::create(&store, new_heat(&race)).unwrap();
    let channel = heat.channel_name();
    assert_eq!(channel, format!("{}-heat-1", race.id));

    heat.start(&store, &sink).unwrap();
    HeatEvent::append(&store, &sink, heat.id, Trigger::Gate, Some(tracker.id)).unwrap();
    HeatEvent::append(&store, &sink, heat.id, Trigger::Crash, None).unwrap();
    heat.end(&store, &sink).unwrap();

    // a failed transition must not publish anything
    assert!(heat.end(&store, &sink).is_err());

    let messages = sink.messages();
    assert!(messages.iter().all(|(name, _)| name == &channel));

    let payloads: Vec<HeatNotification> =
        messages.into_iter().map(|(_, payload)| payload).collect();
    assert_eq!(
        payloads,
        vec![
            HeatNotification::StateChanged {
                heat_number: 1,
                new_state: HeatState::Running.value(),
            },
            HeatNotification::EventTriggered {
                trigger: Trigger::Gate.code(),
                tracker_id: Some(tracker.id),
            },
            HeatNotification::EventTriggered {
                trigger: Trigger::Crash.code(),
                tracker_id: None,
            },
            HeatNotification::StateChanged {
                heat_number: 1,
                new_state: HeatState::Ended.value(),
            },
        ]
    );
}

#[test]
fn the_log_survives_transitions_untouched() {
    let store = RaceStore::new();
    let sink = MemoryNotifier::new();
    let race = setup_race(&store);
    let tracker = Tracker::create(
        &store,
        NewTracker {
            name: "Falcon-1".to_string(),
        },
    )
    .unwrap();

    let mut heat = RaceHeat::create(&store, new_heat(&race)).unwrap();
    heat.start(&store, &sink).unwrap();

    let mut appended = Vec::new();
    for trigger in [Trigger::Arm, Trigger::Takeoff, Trigger::Gate] {
        appended.push(HeatEvent::append(&store, &sink, heat.id, trigger, Some(tracker.id)).unwrap());
    }

    heat.end(&store, &sink).unwrap();
    heat.restart(&store, &sink).unwrap();

    // entries read back exactly as they were acknowledged
    let logged = HeatEvent::for_heat(&store, heat.id).unwrap();
    assert_eq!(logged, appended);
}

#[test]
fn counts_track_unconcluded_heats() {
    let store = RaceStore::new();
    let sink = MemoryNotifier::new();
    let race = setup_race(&store);

    let mut heat_a = RaceHeat::create(&store, new_heat(&race)).unwrap();
    let _heat_b = RaceHeat::create(&store, new_heat(&race)).unwrap();

    let counts = ApiHeatCounts::collect(&store).unwrap();
    assert_eq!(counts.total_heats, 2);
    assert_eq!(counts.unconcluded_heats, 2);

    heat_a.start(&store, &sink).unwrap();
    heat_a.end(&store, &sink).unwrap();

    let counts = ApiHeatCounts::collect(&store).unwrap();
    assert_eq!(counts.total_heats, 2);
    assert_eq!(counts.unconcluded_heats, 1);

    // restarting a heat clears its ended time, so it is unconcluded again
    heat_a.restart(&store, &sink).unwrap();
    let counts = ApiHeatCounts::collect(&store).unwrap();
    assert_eq!(counts.unconcluded_heats, 2);
}
