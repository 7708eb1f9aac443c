//! Error types.
//!
//! Only boundary validation and configuration loading surface errors to the
//! caller. Oracle failures are folded into pipeline reports as rationale text.

use std::time::Duration;

/// Rejected external data at the point it enters the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("vehicle {vehicle_id}: capacity must be positive, got {capacity_tons}")]
    Capacity { vehicle_id: String, capacity_tons: f64 },

    #[error("vehicle {vehicle_id}: load of {load_tons} t exceeds capacity {capacity_tons} t")]
    OverCapacity {
        vehicle_id: String,
        load_tons: f64,
        capacity_tons: f64,
    },

    #[error("vehicle {vehicle_id}: fuel level {fuel_percent} is outside [0, 100]")]
    FuelLevel { vehicle_id: String, fuel_percent: f64 },

    #[error("vehicle {vehicle_id}: {field} must be non-negative, got {value}")]
    NegativeCounter {
        vehicle_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("load {load_id}: weight must be positive, got {weight_tons}")]
    Weight { load_id: String, weight_tons: f64 },

    #[error("load {load_id}: {field} must be non-negative, got {value}")]
    NegativeLoadField {
        load_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("load {load_id}: pickup window ends before it starts")]
    PickupWindow { load_id: String },

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: String },
}

/// Failure of a decision oracle call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle backend error: {0}")]
    Backend(String),

    #[error("oracle worker disconnected before answering")]
    Disconnected,
}

/// Environment variable present but unparseable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value} is not a valid value: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}
