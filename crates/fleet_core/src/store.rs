//! Fleet State Store: the single writer over the records.
//!
//! Writers serialize on one mutex and replace the records wholesale after each
//! pipeline run. Readers take the latest published [`FleetState`] as an
//! `Arc` and never see a half-applied cycle.
//!
//! Oracle calls never happen under the writer lock. The Matcher decides on a
//! snapshot and re-validates every accepted pair when it applies them; route
//! adaptation decides on the tuple it was given and applies the resulting
//! action to whatever the trip looks like at commit time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::FleetConfig;
use crate::error::ValidationError;
use crate::feed::WorldFeed;
use crate::metrics::{
    compute_dashboard_metrics, decision_latency, recommendations, DashboardMetrics,
    LatencySummary, Recommendation,
};
use crate::model::{
    Event, EventId, EventKind, EventType, Load, LoadId, Trip, TripId, TripPhase, Vehicle,
    VehicleId,
};
use crate::opportunity::DetourOpportunity;
use crate::oracle::{BoundedOracle, DecisionOracle, OracleResource};
use crate::routing::{build_route_provider, RouteProvider, RouteProviderKind, RouteProviderResource};
use crate::runner;
use crate::state::{FleetRecords, FleetState};
use crate::systems::matcher::SkippedPair;
use crate::systems::monitor::MonitorCycle;
use crate::systems::movement::MovementReport;
use crate::systems::route_adaptation::{apply_route_action, AdaptationInput, RouteAction};
use crate::systems::{FeedResource, SharedFeed};

/// Oracle latencies kept for the latency summary.
const LATENCY_HISTORY: usize = 1_000;

#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub events_collected: usize,
    pub position_updates: usize,
    pub traffic_alerts: usize,
    pub idle_alerts: Vec<Event>,
    pub state: Arc<FleetState>,
}

#[derive(Debug, Clone)]
pub struct MatchReport {
    pub opportunities_found: usize,
    pub candidates_presented: usize,
    /// Pairs the oracle accepted, whether or not they became trips.
    pub accepted_pairs: Vec<(VehicleId, LoadId)>,
    pub trips_created: Vec<Trip>,
    pub skipped: Vec<SkippedPair>,
    pub rationale: String,
    pub oracle_failed: bool,
    pub decision_latency_ms: u64,
    pub state: Arc<FleetState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdaptationOutcome {
    pub trip_id: TripId,
    pub action: RouteAction,
    /// Human-readable form of `action`.
    pub action_taken: String,
    pub updated_trip: Trip,
    pub rationale: String,
    pub delay_minutes: u32,
    pub delay_causes: Vec<String>,
    pub events: Vec<Event>,
    pub opportunities: Vec<DetourOpportunity>,
    pub decision_latency_ms: u64,
    /// False when the trip was unknown to the store or already finished.
    pub applied: bool,
}

struct StoreInner {
    records: FleetRecords,
    rng: StdRng,
    /// Submitted events waiting for the next monitor cycle.
    inbound: Vec<Event>,
    latencies_ms: Vec<u64>,
}

impl StoreInner {
    fn record_latency(&mut self, latency_ms: u64) {
        self.latencies_ms.push(latency_ms);
        if self.latencies_ms.len() > LATENCY_HISTORY {
            let excess = self.latencies_ms.len() - LATENCY_HISTORY;
            self.latencies_ms.drain(..excess);
        }
    }
}

pub struct FleetStore {
    config: FleetConfig,
    clock: Arc<dyn Clock>,
    feed: SharedFeed,
    oracle: OracleResource,
    routes: RouteProviderResource,
    inner: Mutex<StoreInner>,
    published: RwLock<Arc<FleetState>>,
}

impl FleetStore {
    /// Empty store. Every oracle call is bounded by `config.oracle_timeout()`.
    pub fn new(
        config: FleetConfig,
        feed: Box<dyn WorldFeed>,
        oracle: Arc<dyn DecisionOracle>,
    ) -> Self {
        let bounded = BoundedOracle::new(oracle, config.oracle_timeout());
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            clock: Arc::new(SystemClock),
            feed: Arc::new(Mutex::new(feed)),
            oracle: OracleResource::new(Arc::new(bounded)),
            routes: RouteProviderResource(build_route_provider(&RouteProviderKind::default())),
            inner: Mutex::new(StoreInner {
                records: FleetRecords::default(),
                rng,
                inbound: Vec::new(),
                latencies_ms: Vec::new(),
            }),
            published: RwLock::new(Arc::new(FleetState::default())),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_route_provider(mut self, routes: Arc<dyn RouteProvider>) -> Self {
        self.routes = RouteProviderResource(routes);
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, records: &FleetRecords, now_ms: u64, event_bound: usize) -> Arc<FleetState> {
        self.install(Arc::new(records.publish(now_ms, event_bound)))
    }

    fn install(&self, state: Arc<FleetState>) -> Arc<FleetState> {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        *published = Arc::clone(&state);
        state
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<FleetState> {
        let published = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&published)
    }

    /// Replace the whole fleet with `num_vehicles` vehicles and `num_loads`
    /// loads drawn from the feed.
    pub fn initialize(
        &self,
        num_vehicles: usize,
        num_loads: usize,
    ) -> Result<Arc<FleetState>, ValidationError> {
        let now = self.clock.now_ms();
        let (vehicles, loads) = {
            let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
            (
                feed.generate_initial_fleet(num_vehicles, now),
                feed.generate_available_loads(num_loads, now),
            )
        };
        let state = self.load_fleet(vehicles, loads)?;
        info!(
            vehicles = num_vehicles,
            loads = num_loads,
            "fleet initialized"
        );
        Ok(state)
    }

    /// Replace the whole fleet with the given records. Nothing changes if any
    /// record is invalid or an ID repeats.
    pub fn load_fleet(
        &self,
        vehicles: Vec<Vehicle>,
        loads: Vec<Load>,
    ) -> Result<Arc<FleetState>, ValidationError> {
        let mut records = FleetRecords::default();
        for vehicle in vehicles {
            vehicle.validate()?;
            if records.vehicles.contains_key(&vehicle.vehicle_id) {
                return Err(ValidationError::DuplicateId {
                    kind: "vehicle",
                    id: vehicle.vehicle_id.to_string(),
                });
            }
            records.put_vehicle(vehicle);
        }
        for load in loads {
            load.validate()?;
            if records.loads.contains_key(&load.load_id) {
                return Err(ValidationError::DuplicateId {
                    kind: "load",
                    id: load.load_id.to_string(),
                });
            }
            records.put_load(load);
        }

        let now = self.clock.now_ms();
        let mut inner = self.lock();
        inner.records = records;
        inner.inbound.clear();
        Ok(self.publish(&inner.records, now, self.config.monitor.event_log_bound))
    }

    /// Queue an external event for the next monitor cycle. Payload coordinates
    /// and posted loads are validated here; unknown IDs are not an error.
    pub fn ingest(&self, event: Event) -> Result<(), ValidationError> {
        match &event.kind {
            EventKind::VehiclePositionUpdate { location, .. }
            | EventKind::VehicleIdleTimeout { location, .. } => location.validate()?,
            EventKind::LoadPosted { load } => load.validate()?,
            _ => {}
        }
        debug!(event_type = ?event.event_type(), "event queued");
        self.lock().inbound.push(event);
        Ok(())
    }

    /// Draw `count` fresh loads from the feed and queue them as LOAD_POSTED events.
    pub fn post_synthetic_loads(&self, count: usize) -> Result<Vec<LoadId>, ValidationError> {
        let now = self.clock.now_ms();
        let loads = {
            let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
            feed.generate_available_loads(count, now)
        };
        for load in &loads {
            load.validate()?;
        }
        let ids = loads.iter().map(|l| l.load_id.clone()).collect();
        let mut inner = self.lock();
        for load in loads {
            let event_id = EventId::generate(&mut inner.rng);
            inner.inbound.push(Event::new(
                event_id,
                now,
                EventKind::LoadPosted {
                    load: Box::new(load),
                },
            ));
        }
        Ok(ids)
    }

    pub fn run_monitor_cycle(&self) -> MonitorReport {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        let seed = inner.rng.gen();
        let inbound = std::mem::take(&mut inner.inbound);
        let run = runner::run_monitor(
            &inner.records,
            MonitorCycle::with_inbound(inbound),
            FeedResource(Arc::clone(&self.feed)),
            &self.config,
            now,
            seed,
        );
        inner.records = run.records;
        let cycle = run.cycle;

        let state = match cycle.snapshot.clone() {
            Some(snapshot) => self.install(Arc::new(snapshot)),
            None => self.publish(&inner.records, now, self.config.monitor.event_log_bound),
        };
        let report = MonitorReport {
            events_collected: cycle.collected.len(),
            position_updates: cycle.count_collected(EventType::VehiclePositionUpdate),
            traffic_alerts: cycle.count_collected(EventType::TrafficAlert),
            idle_alerts: cycle.triggered,
            state,
        };
        info!(
            events = report.events_collected,
            idle_alerts = report.idle_alerts.len(),
            "monitor cycle complete"
        );
        report
    }

    /// Match against the latest snapshot.
    pub fn run_matcher(&self) -> MatchReport {
        self.run_matcher_on(self.snapshot())
    }

    /// Decide on `state`, then apply the accepted pairs to the live records.
    /// A failed oracle call or an empty acceptance list changes nothing.
    pub fn run_matcher_on(&self, state: Arc<FleetState>) -> MatchReport {
        let (decide_seed, apply_seed) = {
            let mut inner = self.lock();
            (inner.rng.gen(), inner.rng.gen())
        };
        let work = runner::decide_matches(state, self.oracle.clone(), &self.config, decide_seed);
        let consulted = work.candidates_presented > 0;

        let mut inner = self.lock();
        if consulted {
            inner.record_latency(work.decision_latency_ms);
        }

        if work.oracle_failed || work.accepted.is_empty() {
            if work.oracle_failed {
                warn!(rationale = %work.rationale, "matcher made no changes");
            }
            return MatchReport {
                opportunities_found: work.opportunities.len(),
                candidates_presented: work.candidates_presented,
                accepted_pairs: work.accepted,
                trips_created: Vec::new(),
                skipped: Vec::new(),
                rationale: work.rationale,
                oracle_failed: work.oracle_failed,
                decision_latency_ms: work.decision_latency_ms,
                state: self.snapshot(),
            };
        }

        let now = self.clock.now_ms();
        let run = runner::apply_matches(&inner.records, work, &self.config, now, apply_seed);
        inner.records = run.records;
        let state = self.publish(&inner.records, now, self.config.matcher.event_log_bound);
        let work = run.work;
        info!(
            accepted = work.accepted.len(),
            created = work.created.len(),
            skipped = work.skipped.len(),
            "matcher run complete"
        );
        MatchReport {
            opportunities_found: work.opportunities.len(),
            candidates_presented: work.candidates_presented,
            accepted_pairs: work.accepted,
            trips_created: work.created,
            skipped: work.skipped,
            rationale: work.rationale,
            oracle_failed: false,
            decision_latency_ms: work.decision_latency_ms,
            state,
        }
    }

    /// Adapt one in-flight trip. The decision is made on the given tuple; the
    /// resulting action is applied to the store's current version of the trip.
    pub fn run_route_adaptation(
        &self,
        trip: Trip,
        vehicle: Vehicle,
        load: Load,
        candidates: Vec<Load>,
    ) -> AdaptationOutcome {
        let seed = self.lock().rng.gen();
        let now = self.clock.now_ms();
        let trip_id = trip.trip_id.clone();
        let original = trip.clone();
        let work = runner::adapt_route(
            AdaptationInput {
                trip,
                vehicle,
                load,
                candidates,
            },
            self.oracle.clone(),
            &self.config,
            now,
            seed,
        );
        let action = work.action.clone().unwrap_or(RouteAction::Continue);

        let mut inner = self.lock();
        inner.record_latency(work.decision_latency_ms);
        let current = inner
            .records
            .trips
            .get(&trip_id)
            .filter(|t| t.is_active())
            .cloned();

        let (updated_trip, applied) = match current {
            Some(current) => {
                let updated =
                    apply_route_action(&current, &action, work.delay_minutes, &self.config.cost);
                inner.records.put_trip(updated.clone());
                inner
                    .records
                    .events
                    .append(work.events.iter().cloned(), self.config.matcher.event_log_bound);
                self.publish(&inner.records, now, self.config.matcher.event_log_bound);
                (updated, true)
            }
            None => {
                debug!(trip_id = %trip_id, "trip not active in store; adaptation not applied");
                let updated = work.updated_trip.clone().unwrap_or(original);
                (updated, false)
            }
        };

        info!(trip_id = %trip_id, action = %action, applied, "route adaptation complete");
        AdaptationOutcome {
            trip_id,
            action_taken: action.to_string(),
            action,
            updated_trip,
            rationale: work.rationale,
            delay_minutes: work.delay_minutes,
            delay_causes: work.delay_causes,
            events: work.events,
            opportunities: work.opportunities,
            decision_latency_ms: work.decision_latency_ms,
            applied,
        }
    }

    /// Run route adaptation for every trip currently on the road, offering
    /// the snapshot's open loads as detour candidates.
    pub fn adapt_en_route_trips(&self) -> Vec<AdaptationOutcome> {
        let state = self.snapshot();
        let candidates: Vec<Load> = state.available_loads().cloned().collect();
        let mut outcomes = Vec::new();
        for trip in &state.active_trips {
            if !matches!(trip.phase, TripPhase::PickupLeg | TripPhase::LoadedLeg) {
                continue;
            }
            let (Some(vehicle), Some(load)) = (state.vehicle(&trip.vehicle_id), state.load(&trip.load_id))
            else {
                continue;
            };
            outcomes.push(self.run_route_adaptation(
                trip.clone(),
                vehicle.clone(),
                load.clone(),
                candidates.clone(),
            ));
        }
        outcomes
    }

    /// Advance every active trip by one movement step.
    pub fn simulate_movement(&self) -> MovementReport {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        let seed = inner.rng.gen();
        let run = runner::run_movement(&inner.records, self.routes.clone(), &self.config, now, seed);
        inner.records = run.records;
        self.publish(&inner.records, now, self.config.matcher.event_log_bound);
        debug!(
            advanced = run.report.advanced,
            completed = run.report.completed,
            "movement step complete"
        );
        run.report
    }

    pub fn dashboard(&self) -> DashboardMetrics {
        compute_dashboard_metrics(&self.snapshot())
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        recommendations(&self.snapshot(), &self.config.targets)
    }

    pub fn decision_latency(&self) -> LatencySummary {
        decision_latency(&self.lock().latencies_ms)
    }

    /// Any vehicle ever loaded.
    pub fn vehicle(&self, vehicle_id: &VehicleId) -> Option<Vehicle> {
        self.lock().records.vehicles.get(vehicle_id).cloned()
    }

    /// Any load ever seen, including cancelled and delivered ones.
    pub fn load(&self, load_id: &LoadId) -> Option<Load> {
        self.lock().records.loads.get(load_id).cloned()
    }

    pub fn trip(&self, trip_id: &TripId) -> Option<Trip> {
        self.lock().records.trips.get(trip_id).cloned()
    }

    pub fn trips(&self) -> Vec<Trip> {
        self.lock().records.trips.values().cloned().collect()
    }
}
