mod support;

use std::collections::HashSet;
use std::sync::Arc;

use fleet_core::model::{EventKind, Location, VehicleStatus};
use fleet_core::oracle::RuleBasedOracle;
use fleet_core::test_helpers::{city, TEST_NOW_MS};
use proptest::prelude::*;
use support::{event, manual_clock, quiet_config, store_with, vid, LoadBuilder, VehicleBuilder};

const CITY_NAMES: [&str; 5] = ["Delhi", "Jaipur", "Lucknow", "Mumbai", "Ahmedabad"];

fn status() -> impl Strategy<Value = VehicleStatus> {
    prop_oneof![
        4 => Just(VehicleStatus::Idle),
        1 => Just(VehicleStatus::Maintenance),
        1 => Just(VehicleStatus::Offline),
        1 => Just(VehicleStatus::AtPickup),
    ]
}

#[derive(Debug, Clone)]
struct VehicleParams {
    status: VehicleStatus,
    city: usize,
    capacity: f64,
    fuel: f64,
    hours: f64,
}

fn vehicle_params() -> impl Strategy<Value = VehicleParams> {
    (status(), 0..CITY_NAMES.len(), 5.0..30.0f64, 0.0..100.0f64, 0.0..10.0f64).prop_map(
        |(status, city, capacity, fuel, hours)| VehicleParams {
            status,
            city,
            capacity,
            fuel,
            hours,
        },
    )
}

fn load_params() -> impl Strategy<Value = (usize, usize, f64)> {
    (0..CITY_NAMES.len(), 1..CITY_NAMES.len(), 1.0..35.0f64)
        .prop_map(|(origin, offset, weight)| (origin, (origin + offset) % CITY_NAMES.len(), weight))
}

fn at(index: usize) -> Location {
    city(CITY_NAMES[index])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn matching_respects_availability_capacity_and_single_assignment(
        vehicles in prop::collection::vec(vehicle_params(), 1..7),
        loads in prop::collection::vec(load_params(), 1..7),
    ) {
        let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
        let fleet: Vec<_> = vehicles
            .iter()
            .enumerate()
            .map(|(i, params)| {
                VehicleBuilder::new(&format!("truck_{i:03}"))
                    .at(at(params.city))
                    .with_status(params.status)
                    .with_capacity(params.capacity)
                    .with_fuel(params.fuel)
                    .with_hours(params.hours)
                    .build()
            })
            .collect();
        let board: Vec<_> = loads
            .iter()
            .enumerate()
            .map(|(i, &(origin, destination, weight))| {
                LoadBuilder::new(&format!("load_{i:03}"))
                    .between(at(origin), at(destination))
                    .with_weight(weight)
                    .build()
            })
            .collect();
        let available: HashSet<_> = fleet
            .iter()
            .filter(|v| v.is_available())
            .map(|v| v.vehicle_id.clone())
            .collect();
        store.load_fleet(fleet.clone(), board.clone()).expect("valid fleet");

        let report = store.run_matcher();

        let mut seen_vehicles = HashSet::new();
        let mut seen_loads = HashSet::new();
        for trip in &report.state.active_trips {
            prop_assert!(seen_vehicles.insert(trip.vehicle_id.clone()));
            prop_assert!(seen_loads.insert(trip.load_id.clone()));
            prop_assert!(available.contains(&trip.vehicle_id));
            let vehicle = fleet.iter().find(|v| v.vehicle_id == trip.vehicle_id).expect("vehicle");
            let load = board.iter().find(|l| l.load_id == trip.load_id).expect("load");
            prop_assert!(load.weight_tons <= vehicle.capacity_tons);
        }
        for vehicle in &report.state.vehicles {
            prop_assert!(vehicle.current_load_tons <= vehicle.capacity_tons);
        }
    }

    #[test]
    fn availability_gate_closes_on_any_failing_condition(
        status in status(),
        fuel in 0.0..100.0f64,
        hours in 0.0..10.0f64,
        load_tons in prop_oneof![Just(0.0), 0.5..10.0f64],
    ) {
        let vehicle = VehicleBuilder::new("truck_001")
            .with_status(status)
            .with_fuel(fuel)
            .with_hours(hours)
            .with_load_tons(load_tons)
            .build();
        let expected = status == VehicleStatus::Idle
            && fuel > 15.0
            && hours > 1.0
            && load_tons == 0.0;
        prop_assert_eq!(vehicle.is_available(), expected);
    }

    #[test]
    fn monitor_snapshot_keeps_at_most_fifty_events(pings in 0u64..140) {
        let store = store_with(quiet_config(), Arc::new(RuleBasedOracle::default()), manual_clock());
        store
            .load_fleet(vec![VehicleBuilder::new("truck_001").build()], Vec::new())
            .expect("valid fleet");
        for i in 0..pings {
            store
                .ingest(event(i, EventKind::VehiclePositionUpdate {
                    vehicle_id: vid("truck_001"),
                    location: city("Jaipur"),
                }))
                .expect("valid ping");
        }

        let report = store.run_monitor_cycle();

        prop_assert_eq!(report.events_collected as u64, pings);
        prop_assert_eq!(report.state.recent_events.len() as u64, pings.min(50));
        if pings > 0 {
            let last = report.state.recent_events.last().expect("newest event");
            prop_assert_eq!(last.timestamp_ms, TEST_NOW_MS + pings - 1);
        }
    }

    #[test]
    fn republishing_filters_the_same_way(
        statuses in prop::collection::vec(0usize..6, 1..10),
    ) {
        use fleet_core::model::LoadStatus;
        const STATUSES: [LoadStatus; 6] = [
            LoadStatus::Available,
            LoadStatus::Matched,
            LoadStatus::InTransit,
            LoadStatus::Delivered,
            LoadStatus::Cancelled,
            LoadStatus::Expired,
        ];
        let loads: Vec<_> = statuses
            .iter()
            .enumerate()
            .map(|(i, &s)| LoadBuilder::new(&format!("load_{i:03}")).with_status(STATUSES[s]).build())
            .collect();
        let once = fleet_core::state::FleetState::publish(0, Vec::new(), loads, Vec::new(), Vec::new(), 50);
        let twice = fleet_core::state::FleetState::publish(
            0,
            once.vehicles.clone(),
            once.active_loads.clone(),
            once.active_trips.clone(),
            once.recent_events.clone(),
            50,
        );
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.active_loads.iter().all(|l| l.status.is_active()));
    }
}
