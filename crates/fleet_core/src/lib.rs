//! Logistics fleet core: state store, monitor, matcher, and route adaptation
//! pipelines over a fleet of trucks and a board of posted loads.

pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod model;
pub mod opportunity;
pub mod oracle;
pub mod pricing;
pub mod routing;
pub mod runner;
pub mod spatial;
pub mod state;
pub mod store;
pub mod systems;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::FleetConfig;
pub use error::{ConfigError, OracleError, ValidationError};
pub use store::{AdaptationOutcome, FleetStore, MatchReport, MonitorReport};
