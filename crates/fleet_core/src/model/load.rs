use serde::{Deserialize, Serialize};

use super::{LoadId, Location, VehicleId};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    Available,
    Matched,
    InTransit,
    Delivered,
    Cancelled,
    Expired,
}

impl LoadStatus {
    /// Loads that still belong in a published snapshot.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Available | Self::Matched | Self::InTransit)
    }

    /// Forward-only lifecycle: AVAILABLE → MATCHED → IN_TRANSIT → DELIVERED,
    /// with CANCELLED and EXPIRED reachable from AVAILABLE or MATCHED.
    pub fn can_transition_to(self, next: LoadStatus) -> bool {
        use LoadStatus::*;
        matches!(
            (self, next),
            (Available, Matched)
                | (Matched, InTransit)
                | (InTransit, Delivered)
                | (Available | Matched, Cancelled | Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub load_id: LoadId,
    pub status: LoadStatus,
    pub origin: Location,
    pub destination: Location,
    pub weight_tons: f64,
    pub pickup_window_start_ms: u64,
    pub pickup_window_end_ms: u64,
    pub delivery_deadline_ms: u64,
    pub offered_rate_per_km: f64,
    /// Origin to destination road distance, fixed when the load is posted.
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_vehicle_id: Option<VehicleId>,
}

impl Load {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.pickup_window_end_ms
    }

    pub fn total_offered_revenue(&self) -> f64 {
        self.offered_rate_per_km * self.distance_km
    }

    /// Copy of this load moved to `next`, or `None` when the lifecycle forbids it.
    pub fn transitioned(&self, next: LoadStatus) -> Option<Load> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        Some(Load {
            status: next,
            ..self.clone()
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let id = || self.load_id.to_string();
        self.origin.validate()?;
        self.destination.validate()?;
        if !(self.weight_tons > 0.0) {
            return Err(ValidationError::Weight {
                load_id: id(),
                weight_tons: self.weight_tons,
            });
        }
        for (field, value) in [
            ("offered_rate_per_km", self.offered_rate_per_km),
            ("distance_km", self.distance_km),
        ] {
            if !(value >= 0.0) {
                return Err(ValidationError::NegativeLoadField {
                    load_id: id(),
                    field,
                    value,
                });
            }
        }
        if self.pickup_window_end_ms < self.pickup_window_start_ms {
            return Err(ValidationError::PickupWindow { load_id: id() });
        }
        Ok(())
    }
}
