use serde::{Deserialize, Serialize};

use super::{EventId, Load, LoadId, Location, TripId, VehicleId};

/// Closed set of event types the core produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    VehiclePositionUpdate,
    LoadPosted,
    LoadCancelled,
    TrafficAlert,
    FuelPriceChange,
    DeliveryDelay,
    VehicleIdleTimeout,
    TripStarted,
    LoadMatched,
    TripCompleted,
}

/// Payload of an event, one variant per [`EventType`] with its required fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    VehiclePositionUpdate {
        vehicle_id: VehicleId,
        location: Location,
    },
    LoadPosted {
        load: Box<Load>,
    },
    LoadCancelled {
        load_id: LoadId,
    },
    TrafficAlert {
        corridor: String,
        delay_minutes: u32,
        cause: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vehicle_id: Option<VehicleId>,
    },
    FuelPriceChange {
        fuel_cost_per_km: f64,
    },
    DeliveryDelay {
        vehicle_id: VehicleId,
        trip_id: TripId,
        delay_minutes: u32,
        reason: String,
    },
    VehicleIdleTimeout {
        vehicle_id: VehicleId,
        idle_minutes: f64,
        location: Location,
    },
    TripStarted {
        trip_id: TripId,
        vehicle_id: VehicleId,
        load_id: LoadId,
        estimated_profit: f64,
    },
    LoadMatched {
        load_id: LoadId,
        vehicle_id: VehicleId,
        trip_id: TripId,
    },
    TripCompleted {
        trip_id: TripId,
        vehicle_id: VehicleId,
        load_id: LoadId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(event_id: EventId, timestamp_ms: u64, kind: EventKind) -> Self {
        Self {
            event_id,
            timestamp_ms,
            kind,
        }
    }

    pub fn event_type(&self) -> EventType {
        match &self.kind {
            EventKind::VehiclePositionUpdate { .. } => EventType::VehiclePositionUpdate,
            EventKind::LoadPosted { .. } => EventType::LoadPosted,
            EventKind::LoadCancelled { .. } => EventType::LoadCancelled,
            EventKind::TrafficAlert { .. } => EventType::TrafficAlert,
            EventKind::FuelPriceChange { .. } => EventType::FuelPriceChange,
            EventKind::DeliveryDelay { .. } => EventType::DeliveryDelay,
            EventKind::VehicleIdleTimeout { .. } => EventType::VehicleIdleTimeout,
            EventKind::TripStarted { .. } => EventType::TripStarted,
            EventKind::LoadMatched { .. } => EventType::LoadMatched,
            EventKind::TripCompleted { .. } => EventType::TripCompleted,
        }
    }

    /// Vehicle the event is about, if any.
    pub fn vehicle_id(&self) -> Option<&VehicleId> {
        match &self.kind {
            EventKind::VehiclePositionUpdate { vehicle_id, .. }
            | EventKind::DeliveryDelay { vehicle_id, .. }
            | EventKind::VehicleIdleTimeout { vehicle_id, .. }
            | EventKind::TripStarted { vehicle_id, .. }
            | EventKind::LoadMatched { vehicle_id, .. }
            | EventKind::TripCompleted { vehicle_id, .. } => Some(vehicle_id),
            EventKind::TrafficAlert { vehicle_id, .. } => vehicle_id.as_ref(),
            EventKind::LoadPosted { .. }
            | EventKind::LoadCancelled { .. }
            | EventKind::FuelPriceChange { .. } => None,
        }
    }
}
