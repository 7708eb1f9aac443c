//! Leg-based revenue, cost, and profit.
//!
//! Revenue is earned on the loaded leg only. Cost covers every km driven:
//! fuel per km plus driver time at the average speed.

use serde::{Deserialize, Serialize};

use crate::config::CostModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripEconomics {
    /// Distance driven without cargo (pickup leg or detour).
    pub empty_km: f64,
    /// Distance driven with cargo.
    pub loaded_km: f64,
    pub total_km: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    /// Profit over revenue, 0 when there is no revenue.
    pub profit_margin: f64,
    /// Loaded over total distance, 0 when nothing is driven.
    pub utilization: f64,
}

pub fn fuel_cost(cost: &CostModel, km: f64) -> f64 {
    km * cost.fuel_cost_per_km
}

pub fn driver_time_cost(cost: &CostModel, km: f64) -> f64 {
    if cost.avg_speed_kmh <= 0.0 {
        return 0.0;
    }
    (km / cost.avg_speed_kmh) * cost.driver_cost_per_hour
}

/// Driver cost of `minutes` spent standing still or crawling.
pub fn delay_cost(cost: &CostModel, minutes: u32) -> f64 {
    f64::from(minutes) / 60.0 * cost.driver_cost_per_hour
}

pub fn trip_economics(
    empty_km: f64,
    loaded_km: f64,
    rate_per_km: f64,
    cost: &CostModel,
) -> TripEconomics {
    let total_km = empty_km + loaded_km;
    let revenue = rate_per_km * loaded_km;
    let trip_cost = fuel_cost(cost, total_km) + driver_time_cost(cost, total_km);
    let profit = revenue - trip_cost;
    TripEconomics {
        empty_km,
        loaded_km,
        total_km,
        revenue,
        cost: trip_cost,
        profit,
        profit_margin: if revenue == 0.0 { 0.0 } else { profit / revenue },
        utilization: if total_km == 0.0 { 0.0 } else { loaded_km / total_km },
    }
}
