//! Route adaptation pipeline for one in-flight (trip, vehicle, load):
//! DetectConditions → SearchOpportunities → consult oracle → ExecuteDecision.
//!
//! Every stage degrades to CONTINUE. A detour only marks the trip for
//! re-planning; it never creates a trip or reserves the named load.

use std::fmt;
use std::time::Instant;

use bevy_ecs::prelude::{Res, ResMut, Resource};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PipelineRng;
use crate::clock::CycleTime;
use crate::config::{CostModel, FleetConfig};
use crate::model::{Event, EventId, EventKind, Load, LoadId, Trip, TripPhase, Vehicle};
use crate::opportunity::{search_detours, DetourOpportunity};
use crate::oracle::{AdaptationContext, Decision, OracleRequest, OracleResource};
use crate::pricing::delay_cost;

pub const ROAD_CONDITIONS: [&str; 4] = [
    "Heavy traffic on highway",
    "Road construction ahead",
    "Accident blocking lane",
    "Weather conditions slow",
];

/// The tuple one invocation works on.
#[derive(Debug, Clone, Resource)]
pub struct AdaptationInput {
    pub trip: Trip,
    pub vehicle: Vehicle,
    pub load: Load,
    pub candidates: Vec<Load>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteAction {
    Continue,
    Detour(LoadId),
    Adjust,
    /// The oracle failed; the trip carries on unchanged.
    Fallback,
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteAction::Continue => f.write_str("CONTINUE on current route"),
            RouteAction::Detour(load_id) => write!(f, "DETOUR to pickup {load_id}"),
            RouteAction::Adjust => f.write_str("ROUTE_ADJUSTED for traffic"),
            RouteAction::Fallback => f.write_str("CONTINUE (fallback due to error)"),
        }
    }
}

/// Trip after `action`: a detour sends it back to PLANNING and records the
/// target; an adjustment books the delay and its driver cost.
pub fn apply_route_action(
    trip: &Trip,
    action: &RouteAction,
    delay_minutes: u32,
    cost: &CostModel,
) -> Trip {
    let mut updated = trip.clone();
    match action {
        RouteAction::Detour(load_id) => {
            updated.phase = TripPhase::Planning;
            updated.detour_load_id = Some(load_id.clone());
        }
        RouteAction::Adjust => {
            updated.delay_minutes = updated.delay_minutes.saturating_add(delay_minutes);
            updated.estimated_cost += delay_cost(cost, delay_minutes);
            updated.estimated_profit = updated.estimated_revenue - updated.estimated_cost;
        }
        RouteAction::Continue | RouteAction::Fallback => {}
    }
    updated
}

#[derive(Debug, Default, Resource)]
pub struct AdaptationWork {
    pub delay_minutes: u32,
    pub delay_causes: Vec<String>,
    pub events: Vec<Event>,
    pub opportunities: Vec<DetourOpportunity>,
    pub decision: Option<Decision>,
    pub action: Option<RouteAction>,
    pub updated_trip: Option<Trip>,
    pub rationale: String,
    pub decision_latency_ms: u64,
}

/// Traffic (random) and low fuel (threshold) delays. Delays add up.
pub fn detect_conditions_system(
    input: Res<AdaptationInput>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    mut rng: ResMut<PipelineRng>,
    mut work: ResMut<AdaptationWork>,
) {
    let route = &config.route;
    let rng = &mut rng.0;

    if rng.gen_bool(route.traffic_delay_probability.clamp(0.0, 1.0)) {
        let (low, high) = route.traffic_delay_minutes;
        let delay = rng.gen_range(low.min(high)..=high.max(low));
        let cause = ROAD_CONDITIONS[rng.gen_range(0..ROAD_CONDITIONS.len())];
        work.delay_minutes += delay;
        work.delay_causes.push(format!("{cause} (+{delay} min)"));
        let event = Event::new(
            EventId::generate(rng),
            now.0,
            EventKind::TrafficAlert {
                corridor: format!(
                    "{} to {}",
                    input.load.origin.label(),
                    input.load.destination.label()
                ),
                delay_minutes: delay,
                cause: cause.to_string(),
                vehicle_id: Some(input.vehicle.vehicle_id.clone()),
            },
        );
        work.events.push(event);
    }

    if input.vehicle.fuel_level_percent < route.low_fuel_percent {
        let penalty = route.low_fuel_penalty_minutes;
        work.delay_minutes += penalty;
        work.delay_causes.push(format!(
            "Low fuel ({:.1}%) needs a refuelling stop (+{penalty} min)",
            input.vehicle.fuel_level_percent
        ));
        let event = Event::new(
            EventId::generate(rng),
            now.0,
            EventKind::DeliveryDelay {
                vehicle_id: input.vehicle.vehicle_id.clone(),
                trip_id: input.trip.trip_id.clone(),
                delay_minutes: penalty,
                reason: "low fuel".to_string(),
            },
        );
        work.events.push(event);
    }

    if work.delay_minutes > 0 {
        debug!(
            trip_id = %input.trip.trip_id,
            delay_minutes = work.delay_minutes,
            "delay detected"
        );
    }
}

pub fn search_opportunities_system(
    input: Res<AdaptationInput>,
    config: Res<FleetConfig>,
    mut work: ResMut<AdaptationWork>,
) {
    work.opportunities = search_detours(
        &input.load,
        &input.candidates,
        &config.cost,
        config.route.max_detour_km,
    );
}

/// Shows the full, unranked opportunity list to the oracle.
pub fn consult_route_oracle_system(
    input: Res<AdaptationInput>,
    oracle: Res<OracleResource>,
    mut work: ResMut<AdaptationWork>,
) {
    let request = OracleRequest::RouteAdaptation {
        context: AdaptationContext {
            trip: input.trip.clone(),
            vehicle: input.vehicle.clone(),
            load: input.load.clone(),
            delay_minutes: work.delay_minutes,
            delay_causes: work.delay_causes.clone(),
        },
        opportunities: work.opportunities.clone(),
    };
    let started = Instant::now();
    let decision = match oracle.propose(&request) {
        Ok(decision) => decision,
        Err(err) => {
            warn!(
                trip_id = %input.trip.trip_id,
                error = %err,
                "route oracle failed; continuing"
            );
            Decision::failed(&err)
        }
    };
    work.decision_latency_ms = started.elapsed().as_millis() as u64;
    work.decision = Some(decision);
}

pub fn execute_decision_system(
    input: Res<AdaptationInput>,
    config: Res<FleetConfig>,
    mut work: ResMut<AdaptationWork>,
) {
    let (action, rationale) = match work.decision.take() {
        Some(Decision::Detour { load_id, rationale }) => {
            if work.opportunities.iter().any(|o| o.load_id == load_id) {
                (RouteAction::Detour(load_id), rationale)
            } else {
                (
                    RouteAction::Continue,
                    format!("Detour target {load_id} is not a nearby profitable load; {rationale}"),
                )
            }
        }
        Some(Decision::Adjust { rationale }) => (RouteAction::Adjust, rationale),
        Some(Decision::Continue { rationale }) => (RouteAction::Continue, rationale),
        Some(Decision::Failed { reason }) => (RouteAction::Fallback, reason),
        Some(Decision::Accept { rationale, .. }) => (
            RouteAction::Continue,
            format!("Route oracle answered with a matching decision; ignored: {rationale}"),
        ),
        None => (
            RouteAction::Continue,
            "Route oracle was not consulted".to_string(),
        ),
    };

    let updated = apply_route_action(&input.trip, &action, work.delay_minutes, &config.cost);
    debug!(trip_id = %updated.trip_id, action = %action, "route decision executed");
    work.updated_trip = Some(updated);
    work.action = Some(action);
    work.rationale = rationale;
}
