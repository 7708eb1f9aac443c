use serde::{Deserialize, Serialize};

use super::{LoadId, Location, TripId, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripPhase {
    Planning,
    PickupLeg,
    LoadedLeg,
    Completed,
    Failed,
}

impl TripPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: TripId,
    pub vehicle_id: VehicleId,
    pub load_id: LoadId,
    pub phase: TripPhase,
    /// Vehicle position when the trip was created; start of the pickup leg.
    pub start_location: Location,
    pub pickup_leg_km: f64,
    pub loaded_leg_km: f64,
    pub estimated_revenue: f64,
    pub estimated_cost: f64,
    pub estimated_profit: f64,
    pub started_at_ms: u64,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    /// (lat, lng) waypoints cached on the first movement step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_coordinates: Option<Vec<(f64, f64)>>,
    /// Index into `route_coordinates` of the pickup waypoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_pickup_index: Option<usize>,
    /// Accumulated delay accepted through route adjustments.
    #[serde(default)]
    pub delay_minutes: u32,
    /// Load named by the last detour decision. Recorded only; never reserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour_load_id: Option<LoadId>,
}

impl Trip {
    pub fn total_route_km(&self) -> f64 {
        self.pickup_leg_km + self.loaded_leg_km
    }

    pub fn profit_margin(&self) -> f64 {
        if self.estimated_revenue == 0.0 {
            return 0.0;
        }
        self.estimated_profit / self.estimated_revenue
    }

    pub fn is_active(&self) -> bool {
        !self.phase.is_terminal()
    }

    /// Fraction of the route at which the pickup happens.
    pub fn pickup_share(&self) -> f64 {
        let total = self.total_route_km();
        if total <= 0.0 {
            return 0.0;
        }
        self.pickup_leg_km / total
    }
}
