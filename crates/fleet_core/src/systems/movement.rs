//! Movement simulation: advances every active trip by a fixed progress step.
//!
//! Phases follow progress: PICKUP_LEG until the pickup share of the route is
//! covered, LOADED_LEG after, COMPLETED at 100 %. A trip whose load was
//! cancelled or expired fails and frees its vehicle. Vehicles left AT_DELIVERY
//! by the previous step unload and become IDLE.

use bevy_ecs::prelude::{Res, ResMut, Resource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::PipelineRng;
use crate::clock::CycleTime;
use crate::config::FleetConfig;
use crate::model::{
    Event, EventId, EventKind, Load, LoadStatus, Location, Trip, TripId, TripPhase, Vehicle,
    VehicleStatus,
};
use crate::routing::{RouteProvider, RouteProviderResource};
use crate::spatial::point_at_fraction;
use crate::state::FleetRecords;

/// Percentage points of progress per step.
pub const PROGRESS_STEP_PERCENT: f64 = 5.0;

/// Fuel burned per km, in percent of a full tank (0.3 l/km from a 400 l tank).
pub const FUEL_PERCENT_PER_KM: f64 = 0.3 / 400.0 * 100.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Resource)]
pub struct MovementReport {
    pub advanced: usize,
    pub picked_up: usize,
    pub completed: usize,
    pub failed: usize,
    pub released: usize,
}

/// Waypoints start → pickup → destination, from the provider when it answers
/// and straight segments otherwise. Also returns the index of the pickup
/// waypoint, where the loaded leg begins.
fn plan_route(routes: &dyn RouteProvider, trip: &Trip, load: &Load) -> (Vec<(f64, f64)>, usize) {
    let leg = |from: &Location, to: &Location| match routes.route(from, to) {
        Some(route) if route.waypoints.len() >= 2 => route.waypoints,
        _ => vec![from.as_lat_lng(), to.as_lat_lng()],
    };
    let mut points = leg(&trip.start_location, &load.origin);
    points.dedup();
    let pickup_index = points.len().saturating_sub(1);
    let mut loaded = leg(&load.origin, &load.destination);
    loaded.dedup();
    if points.last() == loaded.first() {
        loaded.remove(0);
    }
    points.extend(loaded);
    (points, pickup_index)
}

/// Position after `fraction` of the trip. The pickup leg spans `[0, share]`
/// of progress and the loaded leg `[share, 1]`, each interpolated along its
/// own part of the route.
fn position_on_route(
    route: &[(f64, f64)],
    pickup_index: usize,
    share: f64,
    fraction: f64,
) -> Option<(f64, f64)> {
    let pickup_index = pickup_index.min(route.len().checked_sub(1)?);
    if fraction < share {
        point_at_fraction(&route[..=pickup_index], fraction / share)
    } else if share < 1.0 {
        point_at_fraction(&route[pickup_index..], (fraction - share) / (1.0 - share))
    } else {
        route.get(pickup_index).copied()
    }
}

/// Trip closed as FAILED with its vehicle unloaded and IDLE.
fn fail_trip(records: &mut FleetRecords, trip: Trip, vehicle: Vehicle, now_ms: u64) {
    records.put_trip(Trip {
        phase: TripPhase::Failed,
        completed_at_ms: Some(now_ms),
        ..trip
    });
    records.put_vehicle(Vehicle {
        status: VehicleStatus::Idle,
        current_load_tons: 0.0,
        last_updated_at_ms: now_ms,
        ..vehicle
    });
}

pub fn release_delivered_vehicles_system(
    mut records: ResMut<FleetRecords>,
    now: Res<CycleTime>,
    mut report: ResMut<MovementReport>,
) {
    let delivered: Vec<Vehicle> = records
        .vehicles
        .values()
        .filter(|v| v.status == VehicleStatus::AtDelivery)
        .filter(|v| records.active_trip_for_vehicle(&v.vehicle_id).is_none())
        .cloned()
        .collect();
    for vehicle in delivered {
        debug!(vehicle_id = %vehicle.vehicle_id, "vehicle unloaded and idle");
        records.put_vehicle(Vehicle {
            status: VehicleStatus::Idle,
            current_load_tons: 0.0,
            last_updated_at_ms: now.0,
            ..vehicle
        });
        report.released += 1;
    }
}

pub fn advance_trips_system(
    mut records: ResMut<FleetRecords>,
    routes: Res<RouteProviderResource>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    mut rng: ResMut<PipelineRng>,
    mut report: ResMut<MovementReport>,
) {
    let trip_ids: Vec<TripId> = records.active_trips().map(|t| t.trip_id.clone()).collect();
    let mut events = Vec::new();

    for trip_id in trip_ids {
        let Some(trip) = records.trips.get(&trip_id).cloned() else {
            continue;
        };
        let vehicle = records.vehicles.get(&trip.vehicle_id).cloned();
        let load = records.loads.get(&trip.load_id).cloned();
        let (Some(vehicle), Some(load)) = (vehicle, load) else {
            debug!(trip_id = %trip_id, "trip references a missing vehicle or load; failing it");
            records.put_trip(Trip {
                phase: TripPhase::Failed,
                completed_at_ms: Some(now.0),
                ..trip
            });
            report.failed += 1;
            continue;
        };

        if matches!(load.status, LoadStatus::Cancelled | LoadStatus::Expired) {
            info!(trip_id = %trip_id, load_id = %load.load_id, "load withdrawn; trip failed");
            fail_trip(&mut records, trip, vehicle, now.0);
            report.failed += 1;
            continue;
        }

        let (route, pickup_index) = match (&trip.route_coordinates, trip.route_pickup_index) {
            (Some(points), Some(index)) => (points.clone(), index),
            _ => plan_route(routes.0.as_ref(), &trip, &load),
        };

        let previous = trip.progress_percent.unwrap_or(0.0);
        let progress = (previous + PROGRESS_STEP_PERCENT).min(100.0);
        let share = trip.pickup_share();
        let total_km = trip.total_route_km();
        let step_km = total_km * (progress - previous) / 100.0;
        let loaded_fraction = (progress / 100.0 - (previous / 100.0).max(share)).max(0.0);
        let loaded_km = total_km * loaded_fraction;

        let phase = if progress >= 100.0 {
            TripPhase::Completed
        } else if progress / 100.0 >= share {
            TripPhase::LoadedLeg
        } else {
            TripPhase::PickupLeg
        };

        let mut moved = Vehicle {
            total_km_today: vehicle.total_km_today + step_km,
            loaded_km_today: vehicle.loaded_km_today + loaded_km,
            fuel_level_percent: (vehicle.fuel_level_percent - step_km * FUEL_PERCENT_PER_KM)
                .max(0.0),
            max_driving_hours_remaining: (vehicle.max_driving_hours_remaining
                - step_km / config.cost.avg_speed_kmh.max(1.0))
            .max(0.0),
            last_updated_at_ms: now.0,
            ..vehicle
        };
        if let Some((lat, lng)) = position_on_route(&route, pickup_index, share, progress / 100.0)
        {
            moved.current_location = Location {
                lat,
                lng,
                name: None,
            };
        }

        let mut updated_load = load.clone();
        if phase != TripPhase::PickupLeg && load.status == LoadStatus::Matched {
            if let Some(in_transit) = load.transitioned(LoadStatus::InTransit) {
                updated_load = in_transit;
                moved.status = VehicleStatus::EnRouteLoaded;
                report.picked_up += 1;
                debug!(trip_id = %trip_id, load_id = %load.load_id, "load picked up");
            }
        }

        let mut updated_trip = Trip {
            phase,
            progress_percent: Some(progress),
            route_coordinates: Some(route),
            route_pickup_index: Some(pickup_index),
            ..trip
        };

        if phase == TripPhase::Completed {
            let Some(delivered) = updated_load.transitioned(LoadStatus::Delivered) else {
                warn!(
                    trip_id = %trip_id,
                    load_id = %load.load_id,
                    status = ?updated_load.status,
                    "load cannot be delivered from its status; trip failed"
                );
                fail_trip(&mut records, updated_trip, moved, now.0);
                report.failed += 1;
                continue;
            };
            updated_load = delivered;
            moved.status = VehicleStatus::AtDelivery;
            moved.current_load_tons = 0.0;
            moved.current_location = load.destination.clone();
            updated_trip.completed_at_ms = Some(now.0);
            events.push(Event::new(
                EventId::generate(&mut rng.0),
                now.0,
                EventKind::TripCompleted {
                    trip_id: trip_id.clone(),
                    vehicle_id: moved.vehicle_id.clone(),
                    load_id: load.load_id.clone(),
                },
            ));
            info!(
                trip_id = %trip_id,
                vehicle_id = %moved.vehicle_id,
                profit = updated_trip.estimated_profit,
                "trip completed"
            );
            report.completed += 1;
        }

        records.put_vehicle(moved);
        records.put_load(updated_load);
        records.put_trip(updated_trip);
        report.advanced += 1;
    }

    records.events.append(events, config.matcher.event_log_bound);
}
