//! Fixtures shared by unit tests, integration tests, and benches.

use crate::clock::ONE_HOUR_MS;
use crate::feed::CITIES;
use crate::model::{Load, LoadId, LoadStatus, Location, Vehicle, VehicleId, VehicleStatus};
use crate::spatial::{distance_km, round_to};

/// Fixed "now" used across fixtures (2023-11-14T22:13:20Z).
pub const TEST_NOW_MS: u64 = 1_700_000_000_000;

/// Location of a city in the synthetic feed's list.
///
/// # Panics
///
/// Panics if `name` is not one of the feed's cities.
pub fn city(name: &str) -> Location {
    CITIES
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.location())
        .unwrap_or_else(|| panic!("unknown test city {name}"))
}

/// Dispatchable IDLE vehicle: empty, full tank, a full shift of hours left.
pub fn idle_vehicle(id: &str, location: Location) -> Vehicle {
    Vehicle {
        vehicle_id: VehicleId::new(id),
        driver_id: format!("driver_{id}"),
        status: VehicleStatus::Idle,
        current_location: location,
        capacity_tons: 20.0,
        current_load_tons: 0.0,
        total_km_today: 0.0,
        loaded_km_today: 0.0,
        idle_minutes_today: 0.0,
        fuel_level_percent: 90.0,
        max_driving_hours_remaining: 8.0,
        home_depot: None,
        last_updated_at_ms: TEST_NOW_MS,
    }
}

/// AVAILABLE load with a pickup window open for four hours after
/// [`TEST_NOW_MS`]. Distance is the great-circle distance.
pub fn available_load(id: &str, origin: Location, destination: Location, weight_tons: f64) -> Load {
    let distance = round_to(distance_km(&origin, &destination), 1);
    Load {
        load_id: LoadId::new(id),
        status: LoadStatus::Available,
        origin,
        destination,
        weight_tons,
        pickup_window_start_ms: TEST_NOW_MS,
        pickup_window_end_ms: TEST_NOW_MS + 4 * ONE_HOUR_MS,
        delivery_deadline_ms: TEST_NOW_MS + 24 * ONE_HOUR_MS,
        offered_rate_per_km: 50.0,
        distance_km: distance,
        assigned_vehicle_id: None,
    }
}
