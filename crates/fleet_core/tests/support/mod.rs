#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_core::clock::{ManualClock, ONE_HOUR_MS};
use fleet_core::config::FleetConfig;
use fleet_core::error::OracleError;
use fleet_core::feed::SyntheticFeed;
use fleet_core::model::{
    Event, EventId, EventKind, Load, LoadId, LoadStatus, Location, Vehicle, VehicleId,
    VehicleStatus,
};
use fleet_core::oracle::{Decision, DecisionOracle, OracleRequest};
use fleet_core::routing::StraightLineRouteProvider;
use fleet_core::store::FleetStore;
use fleet_core::test_helpers::{available_load, city, idle_vehicle, TEST_NOW_MS};

/// Defaults with every random condition switched off.
pub fn quiet_config() -> FleetConfig {
    FleetConfig::default()
        .with_traffic_alert_probability(0.0)
        .with_traffic_delay_probability(0.0)
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(TEST_NOW_MS))
}

/// Store on a manual clock with straight-line routing and a seeded feed.
pub fn store_with(
    config: FleetConfig,
    oracle: Arc<dyn DecisionOracle>,
    clock: Arc<ManualClock>,
) -> FleetStore {
    FleetStore::new(config, Box::new(SyntheticFeed::new(7)), oracle)
        .with_clock(clock)
        .with_route_provider(Arc::new(StraightLineRouteProvider))
}

pub fn vid(id: &str) -> VehicleId {
    VehicleId::new(id)
}

pub fn lid(id: &str) -> LoadId {
    LoadId::new(id)
}

pub fn event(i: u64, kind: EventKind) -> Event {
    Event::new(EventId::new(format!("evt_{i:08x}")), TEST_NOW_MS + i, kind)
}

/// Builder for vehicle fixtures. Starts IDLE and dispatchable in Delhi.
#[derive(Clone, Debug)]
pub struct VehicleBuilder {
    vehicle: Vehicle,
}

impl VehicleBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            vehicle: idle_vehicle(id, city("Delhi")),
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.vehicle.current_location = location;
        self
    }

    pub fn with_status(mut self, status: VehicleStatus) -> Self {
        self.vehicle.status = status;
        self
    }

    pub fn with_capacity(mut self, tons: f64) -> Self {
        self.vehicle.capacity_tons = tons;
        self
    }

    pub fn with_load_tons(mut self, tons: f64) -> Self {
        self.vehicle.current_load_tons = tons;
        self
    }

    pub fn with_fuel(mut self, percent: f64) -> Self {
        self.vehicle.fuel_level_percent = percent;
        self
    }

    pub fn with_hours(mut self, hours: f64) -> Self {
        self.vehicle.max_driving_hours_remaining = hours;
        self
    }

    pub fn with_idle_minutes(mut self, minutes: f64) -> Self {
        self.vehicle.idle_minutes_today = minutes;
        self
    }

    pub fn with_km(mut self, total: f64, loaded: f64) -> Self {
        self.vehicle.total_km_today = total;
        self.vehicle.loaded_km_today = loaded;
        self
    }

    pub fn build(self) -> Vehicle {
        self.vehicle
    }
}

/// Builder for load fixtures. Starts AVAILABLE, Delhi to Jaipur, 10 t.
#[derive(Clone, Debug)]
pub struct LoadBuilder {
    load: Load,
}

impl LoadBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            load: available_load(id, city("Delhi"), city("Jaipur"), 10.0),
        }
    }

    /// Origin and destination; distance follows the great circle.
    pub fn between(self, origin: Location, destination: Location) -> Self {
        let weight = self.load.weight_tons;
        let id = self.load.load_id.to_string();
        let mut load = available_load(&id, origin, destination, weight);
        load.offered_rate_per_km = self.load.offered_rate_per_km;
        load.status = self.load.status;
        Self { load }
    }

    pub fn with_weight(mut self, tons: f64) -> Self {
        self.load.weight_tons = tons;
        self
    }

    /// Billed distance, independent of the endpoints' geometry.
    pub fn with_distance_km(mut self, km: f64) -> Self {
        self.load.distance_km = km;
        self
    }

    pub fn with_rate(mut self, rate_per_km: f64) -> Self {
        self.load.offered_rate_per_km = rate_per_km;
        self
    }

    pub fn with_status(mut self, status: LoadStatus) -> Self {
        self.load.status = status;
        self
    }

    /// Pickup window closing `hours` after the fixture clock's start. Negative
    /// values close it in the past.
    pub fn window_closing_in_hours(mut self, hours: i64) -> Self {
        let offset = hours.unsigned_abs() * ONE_HOUR_MS;
        self.load.pickup_window_start_ms = TEST_NOW_MS - 12 * ONE_HOUR_MS;
        self.load.pickup_window_end_ms = if hours >= 0 {
            TEST_NOW_MS + offset
        } else {
            TEST_NOW_MS - offset
        };
        self
    }

    pub fn build(self) -> Load {
        self.load
    }
}

/// Oracle answering from a fixed script, in order. Records every request.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<Decision, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Result<Decision, OracleError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn accepting(pairs: &[(&str, &str)]) -> Self {
        Self::new(vec![Ok(accept(pairs))])
    }

    pub fn failing(err: OracleError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl DecisionOracle for ScriptedOracle {
    fn propose(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Unavailable("script exhausted".to_string())))
    }
}

pub fn accept(pairs: &[(&str, &str)]) -> Decision {
    Decision::Accept {
        pairs: pairs.iter().map(|(v, l)| (vid(v), lid(l))).collect(),
        rationale: "scripted acceptance".to_string(),
    }
}
