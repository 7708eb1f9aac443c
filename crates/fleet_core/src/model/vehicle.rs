use serde::{Deserialize, Serialize};

use super::{Location, VehicleId};
use crate::error::ValidationError;

/// Hours of driving that must remain for a vehicle to take new work.
pub const MIN_HOURS_FOR_DISPATCH: f64 = 1.0;
/// Fuel percentage that must be exceeded for a vehicle to take new work.
pub const MIN_FUEL_FOR_DISPATCH: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Idle,
    EnRouteLoaded,
    EnRouteEmpty,
    AtPickup,
    AtDelivery,
    Maintenance,
    Offline,
}

impl VehicleStatus {
    pub fn is_en_route(self) -> bool {
        matches!(self, Self::EnRouteLoaded | Self::EnRouteEmpty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: VehicleId,
    pub driver_id: String,
    pub status: VehicleStatus,
    pub current_location: Location,
    pub capacity_tons: f64,
    pub current_load_tons: f64,
    pub total_km_today: f64,
    pub loaded_km_today: f64,
    pub idle_minutes_today: f64,
    pub fuel_level_percent: f64,
    pub max_driving_hours_remaining: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_depot: Option<Location>,
    pub last_updated_at_ms: u64,
}

impl Vehicle {
    /// Share of today's distance that carried cargo, 0 when nothing was driven.
    pub fn utilization_rate(&self) -> f64 {
        if self.total_km_today <= 0.0 {
            return 0.0;
        }
        self.loaded_km_today / self.total_km_today
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, VehicleStatus::Idle | VehicleStatus::EnRouteEmpty)
            && self.current_load_tons == 0.0
            && self.max_driving_hours_remaining > MIN_HOURS_FOR_DISPATCH
            && self.fuel_level_percent > MIN_FUEL_FOR_DISPATCH
    }

    pub fn can_carry(&self, weight_tons: f64) -> bool {
        weight_tons <= self.capacity_tons
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let id = || self.vehicle_id.to_string();
        self.current_location.validate()?;
        if let Some(depot) = &self.home_depot {
            depot.validate()?;
        }
        if !(self.capacity_tons > 0.0) {
            return Err(ValidationError::Capacity {
                vehicle_id: id(),
                capacity_tons: self.capacity_tons,
            });
        }
        if self.current_load_tons > self.capacity_tons {
            return Err(ValidationError::OverCapacity {
                vehicle_id: id(),
                load_tons: self.current_load_tons,
                capacity_tons: self.capacity_tons,
            });
        }
        if !(0.0..=100.0).contains(&self.fuel_level_percent) {
            return Err(ValidationError::FuelLevel {
                vehicle_id: id(),
                fuel_percent: self.fuel_level_percent,
            });
        }
        let counters = [
            ("current_load_tons", self.current_load_tons),
            ("total_km_today", self.total_km_today),
            ("loaded_km_today", self.loaded_km_today),
            ("idle_minutes_today", self.idle_minutes_today),
            ("max_driving_hours_remaining", self.max_driving_hours_remaining),
        ];
        for (field, value) in counters {
            if !(value >= 0.0) {
                return Err(ValidationError::NegativeCounter {
                    vehicle_id: id(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}
