//! Fleet data model: locations, vehicles, loads, trips, and events.
//!
//! Records are plain values. Pipelines never edit a record that another reader
//! can see; they build a changed copy and replace the whole record.

pub mod event;
pub mod ids;
pub mod load;
pub mod location;
pub mod trip;
pub mod vehicle;

pub use event::{Event, EventKind, EventType};
pub use ids::{EventId, LoadId, TripId, VehicleId};
pub use load::{Load, LoadStatus};
pub use location::Location;
pub use trip::{Trip, TripPhase};
pub use vehicle::{Vehicle, VehicleStatus, MIN_FUEL_FOR_DISPATCH, MIN_HOURS_FOR_DISPATCH};
