//! World feed: where vehicles, loads, position pings, and traffic alerts come from.
//!
//! [`SyntheticFeed`] is a seeded generator over ten Indian cities. A telematics
//! integration implements [`WorldFeed`] and the pipelines run unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::ONE_HOUR_MS;
use crate::model::{
    Event, EventId, EventKind, Load, LoadId, LoadStatus, Location, Vehicle, VehicleId,
    VehicleStatus,
};
use crate::spatial::{haversine_km, round_to};

/// Source of external fleet data consumed by initialization and the Monitor.
pub trait WorldFeed: Send + Sync {
    fn generate_initial_fleet(&mut self, count: usize, now_ms: u64) -> Vec<Vehicle>;

    fn generate_available_loads(&mut self, count: usize, now_ms: u64) -> Vec<Load>;

    /// A position report for a moving vehicle, off by at most `drift_degrees`
    /// per axis.
    fn simulate_position_update(
        &mut self,
        vehicle: &Vehicle,
        drift_degrees: f64,
        now_ms: u64,
    ) -> Event;

    /// A traffic alert on some corridor.
    fn simulate_traffic_alert(&mut self, now_ms: u64) -> Event;
}

#[derive(Debug, Clone, Copy)]
pub struct City {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl City {
    pub fn location(&self) -> Location {
        Location {
            lat: self.lat,
            lng: self.lng,
            name: Some(self.name.to_string()),
        }
    }
}

pub const CITIES: [City; 10] = [
    City { name: "Delhi", lat: 28.6139, lng: 77.2090 },
    City { name: "Mumbai", lat: 19.0760, lng: 72.8777 },
    City { name: "Bangalore", lat: 12.9716, lng: 77.5946 },
    City { name: "Chennai", lat: 13.0827, lng: 80.2707 },
    City { name: "Hyderabad", lat: 17.3850, lng: 78.4867 },
    City { name: "Kolkata", lat: 22.5726, lng: 88.3639 },
    City { name: "Pune", lat: 18.5204, lng: 73.8567 },
    City { name: "Jaipur", lat: 26.9124, lng: 75.7873 },
    City { name: "Lucknow", lat: 26.8467, lng: 80.9462 },
    City { name: "Ahmedabad", lat: 22.5726, lng: 72.8311 },
];

/// Road distances in km between city pairs, keyed alphabetically.
const ROAD_DISTANCES_KM: [(&str, &str, f64); 20] = [
    ("Delhi", "Mumbai", 1412.0),
    ("Bangalore", "Delhi", 2150.0),
    ("Chennai", "Delhi", 2180.0),
    ("Delhi", "Hyderabad", 1750.0),
    ("Delhi", "Kolkata", 1470.0),
    ("Delhi", "Pune", 1380.0),
    ("Delhi", "Jaipur", 270.0),
    ("Delhi", "Lucknow", 470.0),
    ("Ahmedabad", "Delhi", 960.0),
    ("Bangalore", "Mumbai", 840.0),
    ("Chennai", "Mumbai", 1340.0),
    ("Hyderabad", "Mumbai", 730.0),
    ("Mumbai", "Pune", 155.0),
    ("Ahmedabad", "Mumbai", 440.0),
    ("Bangalore", "Chennai", 340.0),
    ("Bangalore", "Hyderabad", 570.0),
    ("Chennai", "Hyderabad", 630.0),
    ("Kolkata", "Lucknow", 1030.0),
    ("Hyderabad", "Pune", 580.0),
    ("Ahmedabad", "Jaipur", 540.0),
];

pub const TRAFFIC_CORRIDORS: [&str; 6] = [
    "Delhi-NH8-Gurgaon",
    "Mumbai-NH4-Pune",
    "Bangalore-NH44-Hyderabad",
    "Chennai-NH16-Vijayawada",
    "Delhi-NH58-Meerut",
    "Kolkata-NH12-Ranchi",
];

pub const TRAFFIC_CAUSES: [&str; 4] = ["accident", "roadwork", "flooding", "protest"];

/// Road distance for a known city pair, haversine otherwise.
pub fn road_distance_km(origin: &City, destination: &City) -> f64 {
    let (a, b) = if origin.name <= destination.name {
        (origin.name, destination.name)
    } else {
        (destination.name, origin.name)
    };
    ROAD_DISTANCES_KM
        .iter()
        .find(|(x, y, _)| *x == a && *y == b)
        .map(|(_, _, km)| *km)
        .unwrap_or_else(|| {
            round_to(
                haversine_km((origin.lat, origin.lng), (destination.lat, destination.lng)),
                1,
            )
        })
}

fn hours_to_ms(hours: f64) -> u64 {
    (hours * ONE_HOUR_MS as f64).round() as u64
}

/// Seeded synthetic world.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    rng: StdRng,
    depot: City,
    /// Loads generated so far; numbering continues across calls.
    loads_posted: usize,
}

impl SyntheticFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            depot: CITIES[0],
            loads_posted: 0,
        }
    }

    pub fn with_depot(mut self, depot: City) -> Self {
        self.depot = depot;
        self
    }

    fn pick_city(&mut self) -> City {
        CITIES[self.rng.gen_range(0..CITIES.len())]
    }

    fn pick_route(&mut self) -> (City, City) {
        let origin = self.rng.gen_range(0..CITIES.len());
        // Shift by 1..len so the destination always differs from the origin.
        let offset = self.rng.gen_range(1..CITIES.len());
        (CITIES[origin], CITIES[(origin + offset) % CITIES.len()])
    }
}

impl WorldFeed for SyntheticFeed {
    fn generate_initial_fleet(&mut self, count: usize, now_ms: u64) -> Vec<Vehicle> {
        (0..count)
            .map(|i| {
                let city = self.pick_city();
                let total_km = round_to(self.rng.gen_range(0.0..=300.0), 1);
                let loaded_km = round_to(self.rng.gen_range(0.0..=total_km.min(200.0)), 1);
                Vehicle {
                    vehicle_id: VehicleId::new(format!("truck_{:03}", i + 1)),
                    driver_id: format!("driver_{:03}", i + 1),
                    status: VehicleStatus::Idle,
                    current_location: city.location(),
                    capacity_tons: round_to(self.rng.gen_range(10.0..=25.0), 1),
                    current_load_tons: 0.0,
                    total_km_today: total_km,
                    loaded_km_today: loaded_km.min(total_km),
                    idle_minutes_today: round_to(self.rng.gen_range(0.0..=90.0), 1),
                    fuel_level_percent: round_to(self.rng.gen_range(60.0..=100.0), 1),
                    max_driving_hours_remaining: round_to(self.rng.gen_range(4.0..=10.0), 1),
                    home_depot: Some(self.depot.location()),
                    last_updated_at_ms: now_ms,
                }
            })
            .collect()
    }

    fn generate_available_loads(&mut self, count: usize, now_ms: u64) -> Vec<Load> {
        let first = self.loads_posted + 1;
        self.loads_posted += count;
        (first..first + count)
            .map(|n| {
                let (origin, destination) = self.pick_route();
                let distance_km = road_distance_km(&origin, &destination);
                let window_end = now_ms + hours_to_ms(self.rng.gen_range(2.0..=6.0));
                let slack_hours = self.rng.gen_range(1.0..=4.0);
                Load {
                    load_id: LoadId::new(format!("load_{n:03}")),
                    status: LoadStatus::Available,
                    origin: origin.location(),
                    destination: destination.location(),
                    weight_tons: round_to(self.rng.gen_range(2.0..=20.0), 1),
                    pickup_window_start_ms: now_ms,
                    pickup_window_end_ms: window_end,
                    delivery_deadline_ms: window_end + hours_to_ms(distance_km / 60.0 + slack_hours),
                    offered_rate_per_km: round_to(self.rng.gen_range(35.0..=80.0), 2),
                    distance_km,
                    assigned_vehicle_id: None,
                }
            })
            .collect()
    }

    fn simulate_position_update(
        &mut self,
        vehicle: &Vehicle,
        drift_degrees: f64,
        now_ms: u64,
    ) -> Event {
        let here = &vehicle.current_location;
        let drift = drift_degrees.abs();
        let lat = round_to(here.lat + self.rng.gen_range(-drift..=drift), 4).clamp(-90.0, 90.0);
        let lng = round_to(here.lng + self.rng.gen_range(-drift..=drift), 4).clamp(-180.0, 180.0);
        Event::new(
            EventId::generate(&mut self.rng),
            now_ms,
            EventKind::VehiclePositionUpdate {
                vehicle_id: vehicle.vehicle_id.clone(),
                location: here.moved_to(lat, lng),
            },
        )
    }

    fn simulate_traffic_alert(&mut self, now_ms: u64) -> Event {
        let corridor = TRAFFIC_CORRIDORS[self.rng.gen_range(0..TRAFFIC_CORRIDORS.len())];
        let cause = TRAFFIC_CAUSES[self.rng.gen_range(0..TRAFFIC_CAUSES.len())];
        Event::new(
            EventId::generate(&mut self.rng),
            now_ms,
            EventKind::TrafficAlert {
                corridor: corridor.to_string(),
                delay_minutes: self.rng.gen_range(15..=90),
                cause: cause.to_string(),
                vehicle_id: None,
            },
        )
    }
}
