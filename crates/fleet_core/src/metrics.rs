//! Read-side KPIs over a published snapshot.
//!
//! Nothing here touches the store; every function takes the state (or plain
//! numbers) it reports on.

use serde::{Deserialize, Serialize};

use crate::config::MetricTargets;
use crate::model::{Trip, Vehicle, VehicleId};
use crate::spatial::round_to;
use crate::state::FleetState;

/// Pickup share above which a trip counts as an empty return.
pub const EMPTY_LEG_SHARE: f64 = 0.20;

/// Fuel level under which a vehicle is flagged for refuelling.
pub const LOW_FUEL_PERCENT: f64 = 20.0;

/// Remaining driving hours under which a driver is flagged for rest.
pub const LOW_HOURS_REMAINING: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub snapshot_at: u64,
    pub total_vehicles: usize,
    pub available_vehicles: usize,
    pub available_loads: usize,
    pub active_trips: usize,
    pub fleet_utilization_rate: f64,
    pub empty_return_rate: f64,
    pub revenue_per_km: f64,
    pub total_idle_minutes: f64,
    pub avg_profit_margin: f64,
}

pub fn compute_dashboard_metrics(state: &FleetState) -> DashboardMetrics {
    DashboardMetrics {
        snapshot_at: state.snapshot_at_ms,
        total_vehicles: state.vehicles.len(),
        available_vehicles: state.available_vehicles().count(),
        available_loads: state.available_loads().count(),
        active_trips: state.active_trips.len(),
        fleet_utilization_rate: fleet_utilization_rate(&state.vehicles),
        empty_return_rate: empty_return_rate(&state.active_trips),
        revenue_per_km: revenue_per_km(&state.active_trips),
        total_idle_minutes: total_idle_minutes(&state.vehicles),
        avg_profit_margin: average_profit_margin(&state.active_trips),
    }
}

/// Mean utilization over vehicles that have driven today.
pub fn fleet_utilization_rate(vehicles: &[Vehicle]) -> f64 {
    let rates: Vec<f64> = vehicles
        .iter()
        .filter(|v| v.total_km_today > 0.0)
        .map(|v| round_to(v.utilization_rate(), 4))
        .collect();
    if rates.is_empty() {
        return 0.0;
    }
    round_to(rates.iter().sum::<f64>() / rates.len() as f64, 4)
}

/// Share of trips whose pickup leg is more than a fifth of the route.
pub fn empty_return_rate(trips: &[Trip]) -> f64 {
    if trips.is_empty() {
        return 0.0;
    }
    let empty = trips
        .iter()
        .filter(|t| t.total_route_km() > 0.0 && t.pickup_share() > EMPTY_LEG_SHARE)
        .count();
    round_to(empty as f64 / trips.len() as f64, 4)
}

pub fn revenue_per_km(trips: &[Trip]) -> f64 {
    let total_km: f64 = trips.iter().map(Trip::total_route_km).sum();
    if total_km <= 0.0 {
        return 0.0;
    }
    let revenue: f64 = trips.iter().map(|t| t.estimated_revenue).sum();
    round_to(revenue / total_km, 4)
}

pub fn total_idle_minutes(vehicles: &[Vehicle]) -> f64 {
    round_to(vehicles.iter().map(|v| v.idle_minutes_today).sum(), 2)
}

pub fn average_profit_margin(trips: &[Trip]) -> f64 {
    if trips.is_empty() {
        return 0.0;
    }
    let sum: f64 = trips.iter().map(|t| round_to(t.profit_margin(), 4)).sum();
    round_to(sum / trips.len() as f64, 4)
}

/// Matched over offered loads, 0 when nothing was offered.
pub fn load_acceptance_rate(loads_offered: usize, loads_matched: usize) -> f64 {
    if loads_offered == 0 {
        return 0.0;
    }
    round_to(loads_matched as f64 / loads_offered as f64, 4)
}

/// Extra cost of driving `actual_km` instead of `planned_km`. Shorter routes cost nothing.
pub fn route_deviation_cost(planned_km: f64, actual_km: f64, cost_per_km: f64) -> f64 {
    round_to((actual_km - planned_km).max(0.0) * cost_per_km, 2)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

/// Nearest-rank summary of oracle call latencies.
pub fn decision_latency(samples_ms: &[u64]) -> LatencySummary {
    if samples_ms.is_empty() {
        return LatencySummary::default();
    }
    let mut sorted = samples_ms.to_vec();
    sorted.sort_unstable();
    let rank = |p: f64| {
        let idx = ((p * sorted.len() as f64).ceil() as usize).max(1) - 1;
        sorted[idx.min(sorted.len() - 1)]
    };
    LatencySummary {
        samples: sorted.len(),
        mean_ms: round_to(
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            3,
        ),
        p50_ms: rank(0.50),
        p95_ms: rank(0.95),
        max_ms: sorted[sorted.len() - 1],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Refuel {
        vehicle_id: VehicleId,
        fuel_level_percent: f64,
    },
    RestDriver {
        vehicle_id: VehicleId,
        hours_remaining: f64,
    },
    RaiseUtilization {
        current: f64,
        target: f64,
    },
    ReduceEmptyLegs {
        current: f64,
        target: f64,
    },
}

/// Operator hints for the current snapshot, vehicles first in ID order.
pub fn recommendations(state: &FleetState, targets: &MetricTargets) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let mut vehicles: Vec<&Vehicle> = state.vehicles.iter().collect();
    vehicles.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));

    for v in vehicles {
        if v.fuel_level_percent < LOW_FUEL_PERCENT {
            out.push(Recommendation::Refuel {
                vehicle_id: v.vehicle_id.clone(),
                fuel_level_percent: v.fuel_level_percent,
            });
        }
        if v.max_driving_hours_remaining < LOW_HOURS_REMAINING {
            out.push(Recommendation::RestDriver {
                vehicle_id: v.vehicle_id.clone(),
                hours_remaining: v.max_driving_hours_remaining,
            });
        }
    }

    let utilization = fleet_utilization_rate(&state.vehicles);
    if state.vehicles.iter().any(|v| v.total_km_today > 0.0)
        && utilization < targets.utilization_rate
    {
        out.push(Recommendation::RaiseUtilization {
            current: utilization,
            target: targets.utilization_rate,
        });
    }
    let empty = empty_return_rate(&state.active_trips);
    if empty > targets.empty_return_rate {
        out.push(Recommendation::ReduceEmptyLegs {
            current: empty,
            target: targets.empty_return_rate,
        });
    }
    out
}
