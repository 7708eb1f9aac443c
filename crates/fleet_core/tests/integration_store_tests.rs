mod support;

use std::collections::HashSet;
use std::sync::Arc;

use fleet_core::error::ValidationError;
use fleet_core::metrics::{compute_dashboard_metrics, Recommendation};
use fleet_core::model::{TripPhase, VehicleStatus};
use fleet_core::oracle::RuleBasedOracle;
use fleet_core::state::FleetState;
use fleet_core::test_helpers::{city, TEST_NOW_MS};
use support::{lid, manual_clock, quiet_config, store_with, vid, LoadBuilder, ScriptedOracle, VehicleBuilder};

fn assert_single_assignment(state: &FleetState) {
    let vehicles: HashSet<_> = state.active_trips.iter().map(|t| &t.vehicle_id).collect();
    let loads: HashSet<_> = state.active_trips.iter().map(|t| &t.load_id).collect();
    assert_eq!(vehicles.len(), state.active_trips.len());
    assert_eq!(loads.len(), state.active_trips.len());
}

#[test]
fn initialize_publishes_the_synthetic_fleet() {
    let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());

    let state = store.initialize(10, 20).expect("synthetic fleet");

    assert_eq!(state.vehicles.len(), 10);
    assert_eq!(state.active_loads.len(), 20);
    assert_eq!(state.snapshot_at_ms, TEST_NOW_MS);
    assert!(state.active_trips.is_empty());
    let metrics = store.dashboard();
    assert_eq!(metrics.total_vehicles, 10);
    assert_eq!(metrics.available_loads, 20);
}

#[test]
fn load_fleet_rejects_bad_records_and_keeps_the_old_fleet() {
    let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
    store
        .load_fleet(vec![VehicleBuilder::new("truck_001").build()], Vec::new())
        .expect("valid fleet");

    let duplicate = store.load_fleet(
        vec![
            VehicleBuilder::new("truck_007").build(),
            VehicleBuilder::new("truck_007").build(),
        ],
        Vec::new(),
    );
    assert_eq!(
        duplicate.err(),
        Some(ValidationError::DuplicateId {
            kind: "vehicle",
            id: "truck_007".to_string(),
        })
    );

    let overloaded = store.load_fleet(
        vec![VehicleBuilder::new("truck_008")
            .with_capacity(10.0)
            .with_load_tons(12.0)
            .build()],
        Vec::new(),
    );
    assert!(matches!(overloaded, Err(ValidationError::OverCapacity { .. })));

    assert!(store.vehicle(&vid("truck_001")).is_some());
    assert!(store.vehicle(&vid("truck_007")).is_none());
}

#[test]
fn posted_synthetic_loads_arrive_on_the_next_cycle() {
    let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
    store.initialize(3, 2).expect("synthetic fleet");

    let posted = store.post_synthetic_loads(4).expect("valid loads");
    assert_eq!(posted.len(), 4);
    assert_eq!(posted[0], lid("load_003"));
    assert_eq!(store.snapshot().active_loads.len(), 2);

    let report = store.run_monitor_cycle();
    assert_eq!(report.state.active_loads.len(), 6);
}

#[test]
fn full_cycles_keep_every_invariant() {
    let config = quiet_config()
        .with_traffic_alert_probability(0.5)
        .with_traffic_delay_probability(0.5);
    let clock = manual_clock();
    let store = store_with(config, Arc::new(RuleBasedOracle::default()), clock.clone());
    store.initialize(12, 15).expect("synthetic fleet");

    for round in 0..30 {
        if round % 5 == 0 {
            store.post_synthetic_loads(3).expect("valid loads");
        }
        let monitor = store.run_monitor_cycle();
        assert!(monitor.state.recent_events.len() <= 50);

        let matched = store.run_matcher();
        assert!(matched.state.recent_events.len() <= 100);
        assert_single_assignment(&matched.state);
        for trip in &matched.trips_created {
            let vehicle = matched.state.vehicle(&trip.vehicle_id).expect("vehicle");
            let load = store.load(&trip.load_id).expect("load");
            assert!(load.weight_tons <= vehicle.capacity_tons);
        }

        store.adapt_en_route_trips();
        store.simulate_movement();
        assert_single_assignment(&store.snapshot());
        clock.advance_minutes(15);
    }

    let finished = store
        .trips()
        .iter()
        .filter(|t| t.phase == TripPhase::Completed)
        .count();
    assert!(finished > 0);
    for vehicle in &store.snapshot().vehicles {
        assert!(vehicle.current_load_tons <= vehicle.capacity_tons);
        assert!((0.0..=100.0).contains(&vehicle.fuel_level_percent));
    }
    assert!(store.decision_latency().samples > 0);
}

#[test]
fn concurrent_matchers_never_double_book() {
    let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
    store.initialize(8, 8).expect("synthetic fleet");
    let snapshot = store.snapshot();

    let created: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = Arc::clone(&snapshot);
                let store = &store;
                scope.spawn(move || store.run_matcher_on(snapshot).trips_created.len())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("matcher thread"))
            .sum()
    });

    let state = store.snapshot();
    assert_eq!(created, state.active_trips.len());
    assert_single_assignment(&state);
}

#[test]
fn dashboard_follows_the_published_state() {
    let oracle = Arc::new(ScriptedOracle::accepting(&[("truck_001", "load_001")]));
    let store = store_with(quiet_config(), oracle, manual_clock());
    store
        .load_fleet(
            vec![
                VehicleBuilder::new("truck_001")
                    .with_km(100.0, 80.0)
                    .with_idle_minutes(12.5)
                    .build(),
                VehicleBuilder::new("truck_002")
                    .at(city("Mumbai"))
                    .with_km(200.0, 100.0)
                    .with_idle_minutes(30.25)
                    .build(),
                VehicleBuilder::new("truck_003")
                    .with_status(VehicleStatus::Offline)
                    .build(),
            ],
            vec![
                LoadBuilder::new("load_001").between(city("Jaipur"), city("Lucknow")).build(),
                LoadBuilder::new("load_002").build(),
            ],
        )
        .expect("valid fleet");
    let report = store.run_matcher();
    let trip = &report.trips_created[0];

    let metrics = compute_dashboard_metrics(&report.state);

    assert_eq!(metrics.snapshot_at, TEST_NOW_MS);
    assert_eq!(metrics.total_vehicles, 3);
    assert_eq!(metrics.available_vehicles, 1);
    assert_eq!(metrics.available_loads, 1);
    assert_eq!(metrics.active_trips, 1);
    assert_eq!(metrics.fleet_utilization_rate, 0.65);
    assert_eq!(metrics.total_idle_minutes, 42.75);
    // Delhi to Jaipur is about 31 % of the route.
    assert_eq!(metrics.empty_return_rate, 1.0);
    let expected_rpk = trip.estimated_revenue / trip.total_route_km();
    assert!((metrics.revenue_per_km - expected_rpk).abs() < 1e-3);
    assert!((metrics.avg_profit_margin - trip.profit_margin()).abs() < 1e-3);
}

#[test]
fn recommendations_flag_low_fuel_tired_drivers_and_low_utilization() {
    let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
    store
        .load_fleet(
            vec![
                VehicleBuilder::new("truck_001").with_fuel(12.0).with_km(100.0, 50.0).build(),
                VehicleBuilder::new("truck_002").with_hours(1.5).build(),
            ],
            Vec::new(),
        )
        .expect("valid fleet");

    let recommendations = store.recommendations();

    assert_eq!(
        recommendations,
        vec![
            Recommendation::Refuel {
                vehicle_id: vid("truck_001"),
                fuel_level_percent: 12.0,
            },
            Recommendation::RestDriver {
                vehicle_id: vid("truck_002"),
                hours_remaining: 1.5,
            },
            Recommendation::RaiseUtilization {
                current: 0.5,
                target: 0.85,
            },
        ]
    );
}
