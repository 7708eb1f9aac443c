//! Matcher pipeline.
//!
//! Decision half (runs against a published snapshot, outside the writer lock):
//! AnalyzeOpportunities → consult oracle → collect acceptances.
//! Apply half (runs under the writer lock against the live records): CreateTrips.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::{Res, ResMut, Resource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::PipelineRng;
use crate::clock::CycleTime;
use crate::config::FleetConfig;
use crate::model::{
    Event, EventId, EventKind, Load, LoadId, LoadStatus, Trip, TripId, TripPhase, Vehicle,
    VehicleId, VehicleStatus,
};
use crate::opportunity::{analyze_opportunities, Opportunity};
use crate::oracle::{Decision, MatchConstraints, OracleRequest, OracleResource};
use crate::pricing::trip_economics;
use crate::spatial::distance_km;
use crate::state::{FleetRecords, FleetState};

/// Snapshot the decision half reads.
#[derive(Debug, Clone, Resource)]
pub struct MatchInput(pub Arc<FleetState>);

/// Why an accepted pair was not turned into a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    UnknownVehicle,
    UnknownLoad,
    VehicleBusy,
    LoadUnavailable,
    LoadExpired,
    OverCapacity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::UnknownVehicle => "unknown vehicle",
            SkipReason::UnknownLoad => "unknown load",
            SkipReason::VehicleBusy => "vehicle is no longer idle and empty",
            SkipReason::LoadUnavailable => "load is no longer available",
            SkipReason::LoadExpired => "pickup window has closed",
            SkipReason::OverCapacity => "load exceeds vehicle capacity",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub reason: SkipReason,
}

#[derive(Debug, Default, Resource)]
pub struct MatchWork {
    pub opportunities: Vec<Opportunity>,
    pub candidates_presented: usize,
    pub decision: Option<Decision>,
    pub accepted: Vec<(VehicleId, LoadId)>,
    pub rationale: String,
    pub oracle_failed: bool,
    pub decision_latency_ms: u64,
    pub created: Vec<Trip>,
    pub skipped: Vec<SkippedPair>,
}

/// Every feasible pairing in the snapshot, best margin first.
pub fn analyze_opportunities_system(
    input: Res<MatchInput>,
    config: Res<FleetConfig>,
    mut work: ResMut<MatchWork>,
) {
    work.opportunities = analyze_opportunities(&input.0, &config.cost);
    debug!(opportunities = work.opportunities.len(), "analyzed opportunities");
}

/// Shows the top candidates to the oracle. A failed call becomes
/// `Decision::Failed`; nothing is raised.
pub fn consult_matching_oracle_system(
    input: Res<MatchInput>,
    config: Res<FleetConfig>,
    oracle: Res<OracleResource>,
    mut work: ResMut<MatchWork>,
) {
    if work.opportunities.is_empty() {
        work.decision = Some(Decision::Accept {
            pairs: Vec::new(),
            rationale: "No feasible vehicle-load opportunities".to_string(),
        });
        return;
    }

    let candidates: Vec<Opportunity> = work
        .opportunities
        .iter()
        .take(config.matcher.top_candidates)
        .cloned()
        .collect();
    work.candidates_presented = candidates.len();
    let constraints = MatchConstraints {
        total_vehicles: input.0.vehicles.len(),
        available_vehicles: input.0.available_vehicles().count(),
        available_loads: input.0.available_loads().count(),
        target_utilization: config.targets.utilization_rate,
        min_profit_margin: config.targets.min_profit_margin,
    };

    let started = Instant::now();
    let decision = match oracle.propose(&OracleRequest::Matching {
        candidates,
        constraints,
    }) {
        Ok(decision) => decision,
        Err(err) => {
            warn!(error = %err, "matching oracle failed; accepting no matches");
            Decision::failed(&err)
        }
    };
    work.decision_latency_ms = started.elapsed().as_millis() as u64;
    work.decision = Some(decision);
}

pub fn collect_acceptances_system(mut work: ResMut<MatchWork>) {
    match work.decision.take() {
        Some(Decision::Accept { pairs, rationale }) => {
            work.accepted = pairs;
            work.rationale = rationale;
        }
        Some(Decision::Failed { reason }) => {
            work.accepted.clear();
            work.oracle_failed = true;
            work.rationale = format!("Oracle failure, no matches accepted: {reason}");
        }
        Some(other) => {
            work.accepted.clear();
            work.rationale = format!(
                "Matching oracle answered with a route decision; ignored: {}",
                other.rationale()
            );
        }
        None => {
            work.accepted.clear();
            work.rationale = "Matching oracle was not consulted".to_string();
        }
    }
}

/// Preconditions re-checked against the live records at application time.
fn validate_pair(
    records: &FleetRecords,
    vehicle_id: &VehicleId,
    load_id: &LoadId,
    now_ms: u64,
) -> Result<(Vehicle, Load), SkipReason> {
    let vehicle = records
        .vehicles
        .get(vehicle_id)
        .ok_or(SkipReason::UnknownVehicle)?;
    let load = records.loads.get(load_id).ok_or(SkipReason::UnknownLoad)?;
    if vehicle.status != VehicleStatus::Idle
        || vehicle.current_load_tons > 0.0
        || records.active_trip_for_vehicle(vehicle_id).is_some()
    {
        return Err(SkipReason::VehicleBusy);
    }
    if load.status != LoadStatus::Available || records.active_trip_for_load(load_id).is_some() {
        return Err(SkipReason::LoadUnavailable);
    }
    if load.is_expired_at(now_ms) {
        return Err(SkipReason::LoadExpired);
    }
    if !vehicle.can_carry(load.weight_tons) {
        return Err(SkipReason::OverCapacity);
    }
    Ok((vehicle.clone(), load.clone()))
}

/// Turns accepted pairs into PLANNING trips. Pairs whose vehicle or load was
/// consumed in the meantime are skipped.
pub fn create_trips_system(
    mut records: ResMut<FleetRecords>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    mut rng: ResMut<PipelineRng>,
    mut work: ResMut<MatchWork>,
) {
    let accepted = std::mem::take(&mut work.accepted);
    let mut events = Vec::new();

    for (vehicle_id, load_id) in &accepted {
        let (vehicle, load) = match validate_pair(&records, vehicle_id, load_id, now.0) {
            Ok(pair) => pair,
            Err(reason) => {
                debug!(
                    vehicle_id = %vehicle_id,
                    load_id = %load_id,
                    reason = %reason,
                    "accepted pair skipped"
                );
                work.skipped.push(SkippedPair {
                    vehicle_id: vehicle_id.clone(),
                    load_id: load_id.clone(),
                    reason,
                });
                continue;
            }
        };

        let pickup_km = distance_km(&vehicle.current_location, &load.origin);
        let economics = trip_economics(
            pickup_km,
            load.distance_km,
            load.offered_rate_per_km,
            &config.cost,
        );
        let trip = Trip {
            trip_id: TripId::generate(&mut rng.0),
            vehicle_id: vehicle_id.clone(),
            load_id: load_id.clone(),
            phase: TripPhase::Planning,
            start_location: vehicle.current_location.clone(),
            pickup_leg_km: economics.empty_km,
            loaded_leg_km: economics.loaded_km,
            estimated_revenue: economics.revenue,
            estimated_cost: economics.cost,
            estimated_profit: economics.profit,
            started_at_ms: now.0,
            completed_at_ms: None,
            progress_percent: None,
            route_coordinates: None,
            route_pickup_index: None,
            delay_minutes: 0,
            detour_load_id: None,
        };

        let Some(matched) = load.transitioned(LoadStatus::Matched) else {
            continue;
        };
        records.put_load(Load {
            assigned_vehicle_id: Some(vehicle_id.clone()),
            ..matched
        });
        records.put_vehicle(Vehicle {
            status: VehicleStatus::EnRouteEmpty,
            current_load_tons: load.weight_tons,
            last_updated_at_ms: now.0,
            ..vehicle
        });

        events.push(Event::new(
            EventId::generate(&mut rng.0),
            now.0,
            EventKind::TripStarted {
                trip_id: trip.trip_id.clone(),
                vehicle_id: vehicle_id.clone(),
                load_id: load_id.clone(),
                estimated_profit: trip.estimated_profit,
            },
        ));
        events.push(Event::new(
            EventId::generate(&mut rng.0),
            now.0,
            EventKind::LoadMatched {
                load_id: load_id.clone(),
                vehicle_id: vehicle_id.clone(),
                trip_id: trip.trip_id.clone(),
            },
        ));

        info!(
            trip_id = %trip.trip_id,
            vehicle_id = %vehicle_id,
            load_id = %load_id,
            profit = trip.estimated_profit,
            "trip created"
        );
        records.put_trip(trip.clone());
        work.created.push(trip);
    }

    records.events.append(events, config.matcher.event_log_bound);
    work.accepted = accepted;
}
