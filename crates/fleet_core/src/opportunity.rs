//! Candidate pairings and detours with their precomputed economics.

use serde::{Deserialize, Serialize};

use crate::config::CostModel;
use crate::model::{Load, LoadId, LoadStatus, Vehicle, VehicleId};
use crate::pricing::{trip_economics, TripEconomics};
use crate::spatial::distance_km;
use crate::state::FleetState;

/// A (vehicle, load) pairing that has not been committed to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub vehicle_location: String,
    pub load_origin: String,
    pub load_destination: String,
    pub load_weight_tons: f64,
    pub vehicle_capacity_tons: f64,
    pub pickup_distance_km: f64,
    pub delivery_distance_km: f64,
    pub total_distance_km: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub profit_margin: f64,
    pub utilization: f64,
}

impl Opportunity {
    pub fn evaluate(vehicle: &Vehicle, load: &Load, cost: &CostModel) -> Self {
        let pickup_km = distance_km(&vehicle.current_location, &load.origin);
        let economics = trip_economics(pickup_km, load.distance_km, load.offered_rate_per_km, cost);
        Self::from_economics(vehicle, load, &economics)
    }

    fn from_economics(vehicle: &Vehicle, load: &Load, e: &TripEconomics) -> Self {
        Self {
            vehicle_id: vehicle.vehicle_id.clone(),
            load_id: load.load_id.clone(),
            vehicle_location: vehicle.current_location.label(),
            load_origin: load.origin.label(),
            load_destination: load.destination.label(),
            load_weight_tons: load.weight_tons,
            vehicle_capacity_tons: vehicle.capacity_tons,
            pickup_distance_km: e.empty_km,
            delivery_distance_km: e.loaded_km,
            total_distance_km: e.total_km,
            revenue: e.revenue,
            cost: e.cost,
            profit: e.profit,
            profit_margin: e.profit_margin,
            utilization: e.utilization,
        }
    }
}

/// Every feasible pairing of an available vehicle with an available load,
/// sorted by profit margin, best first. Feasible means the load fits the
/// vehicle and its pickup window is still open. Unprofitable pairings are kept.
pub fn analyze_opportunities(state: &FleetState, cost: &CostModel) -> Vec<Opportunity> {
    let loads: Vec<&Load> = state.available_loads().collect();
    let mut opportunities: Vec<Opportunity> = state
        .available_vehicles()
        .flat_map(|vehicle| {
            loads
                .iter()
                .filter(move |load| vehicle.can_carry(load.weight_tons))
                .map(move |load| Opportunity::evaluate(vehicle, load, cost))
        })
        .collect();
    sort_by_margin(&mut opportunities);
    opportunities
}

/// Stable sort, highest margin first.
pub fn sort_by_margin(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| b.profit_margin.total_cmp(&a.profit_margin));
}

/// A load that could be picked up after the current delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetourOpportunity {
    pub load_id: LoadId,
    pub origin: String,
    pub destination: String,
    pub weight_tons: f64,
    /// Empty distance from the current load's destination to this load's origin.
    pub detour_km: f64,
    pub delivery_km: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
}

/// Profitable AVAILABLE loads whose origin lies within `max_detour_km` of the
/// current load's destination. Unranked; order follows `candidates`.
pub fn search_detours(
    current: &Load,
    candidates: &[Load],
    cost: &CostModel,
    max_detour_km: f64,
) -> Vec<DetourOpportunity> {
    candidates
        .iter()
        .filter(|c| c.status == LoadStatus::Available && c.load_id != current.load_id)
        .filter_map(|candidate| {
            let detour_km = distance_km(&current.destination, &candidate.origin);
            if detour_km > max_detour_km {
                return None;
            }
            let e = trip_economics(
                detour_km,
                candidate.distance_km,
                candidate.offered_rate_per_km,
                cost,
            );
            (e.profit > 0.0).then(|| DetourOpportunity {
                load_id: candidate.load_id.clone(),
                origin: candidate.origin.label(),
                destination: candidate.destination.label(),
                weight_tons: candidate.weight_tons,
                detour_km,
                delivery_km: candidate.distance_km,
                revenue: e.revenue,
                cost: e.cost,
                profit: e.profit,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleStatus;
    use crate::test_helpers::{available_load, city, idle_vehicle, TEST_NOW_MS};

    #[test]
    fn pairings_rank_by_margin_and_keep_losers() {
        let mut busy = idle_vehicle("truck_003", city("Delhi"));
        busy.status = VehicleStatus::Offline;
        let mut cheap = available_load("load_003", city("Kolkata"), city("Chennai"), 5.0);
        cheap.offered_rate_per_km = 1.0;
        let state = FleetState::publish(
            TEST_NOW_MS,
            [
                idle_vehicle("truck_001", city("Delhi")),
                idle_vehicle("truck_002", city("Mumbai")),
                busy,
            ],
            [
                available_load("load_001", city("Delhi"), city("Jaipur"), 10.0),
                available_load("load_002", city("Jaipur"), city("Lucknow"), 25.0),
                cheap,
            ],
            Vec::new(),
            Vec::new(),
            50,
        );

        let opportunities = analyze_opportunities(&state, &CostModel::default());

        assert_eq!(opportunities.len(), 4);
        assert!(opportunities
            .windows(2)
            .all(|w| w[0].profit_margin >= w[1].profit_margin));
        assert_eq!(opportunities[0].vehicle_id.as_str(), "truck_001");
        assert_eq!(opportunities[0].load_id.as_str(), "load_001");
        assert_eq!(opportunities[0].pickup_distance_km, 0.0);
        assert!(opportunities.iter().all(|o| o.load_id.as_str() != "load_002"));
        assert!(opportunities.iter().all(|o| o.vehicle_id.as_str() != "truck_003"));
        assert!(opportunities
            .iter()
            .any(|o| o.load_id.as_str() == "load_003" && o.profit < 0.0));
    }

    #[test]
    fn detours_start_near_the_drop_off_and_pay() {
        let current = available_load("load_001", city("Delhi"), city("Jaipur"), 10.0);
        let mut taken = available_load("load_004", city("Jaipur"), city("Delhi"), 5.0);
        taken.status = LoadStatus::Matched;
        let mut cheap = available_load("load_005", city("Jaipur"), city("Ahmedabad"), 5.0);
        cheap.offered_rate_per_km = 1.0;
        let candidates = vec![
            current.clone(),
            available_load("load_002", city("Jaipur"), city("Ahmedabad"), 5.0),
            available_load("load_003", city("Kolkata"), city("Chennai"), 5.0),
            taken,
            cheap,
        ];

        let detours = search_detours(&current, &candidates, &CostModel::default(), 100.0);

        assert_eq!(detours.len(), 1);
        assert_eq!(detours[0].load_id.as_str(), "load_002");
        assert_eq!(detours[0].detour_km, 0.0);
        assert!(detours[0].profit > 0.0);
    }
}
