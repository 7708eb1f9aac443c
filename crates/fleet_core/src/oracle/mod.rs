//! Decision oracle: the collaborator that picks among computed opportunities.
//!
//! Pipelines hand it an [`OracleRequest`] and receive a typed [`Decision`].
//! Three implementations ship with the crate:
//!
//! - **[`RuleBasedOracle`]**: maximum-profit assignment plus a simple detour rule.
//! - **[`TextOracle`]**: renders a prompt for a text-generating backend and
//!   parses its free-text answer.
//! - **[`BoundedOracle`]**: wraps any oracle with a hard timeout.

pub mod bounded;
pub mod rule_based;
pub mod text;

use std::sync::Arc;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::model::{Load, LoadId, Trip, Vehicle, VehicleId};
use crate::opportunity::{DetourOpportunity, Opportunity};

pub use bounded::BoundedOracle;
pub use rule_based::RuleBasedOracle;
pub use text::{parse_acceptances, parse_route_decision, CompletionBackend, TextOracle};

/// Business constraints shown to the oracle next to the matching candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConstraints {
    pub total_vehicles: usize,
    pub available_vehicles: usize,
    pub available_loads: usize,
    pub target_utilization: f64,
    pub min_profit_margin: f64,
}

/// State of one in-flight trip as seen by the route adaptation oracle call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationContext {
    pub trip: Trip,
    pub vehicle: Vehicle,
    pub load: Load,
    /// Sum of all delays detected in this invocation.
    pub delay_minutes: u32,
    pub delay_causes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OracleRequest {
    /// Ranked candidates, best margin first, already capped.
    Matching {
        candidates: Vec<Opportunity>,
        constraints: MatchConstraints,
    },
    /// Every profitable detour, unranked.
    RouteAdaptation {
        context: AdaptationContext,
        opportunities: Vec<DetourOpportunity>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Accept {
        pairs: Vec<(VehicleId, LoadId)>,
        rationale: String,
    },
    Detour {
        load_id: LoadId,
        rationale: String,
    },
    Adjust {
        rationale: String,
    },
    Continue {
        rationale: String,
    },
    Failed {
        reason: String,
    },
}

impl Decision {
    pub fn rationale(&self) -> &str {
        match self {
            Decision::Accept { rationale, .. }
            | Decision::Detour { rationale, .. }
            | Decision::Adjust { rationale }
            | Decision::Continue { rationale } => rationale,
            Decision::Failed { reason } => reason,
        }
    }

    pub fn failed(err: &OracleError) -> Self {
        Decision::Failed {
            reason: err.to_string(),
        }
    }
}

/// Anything that can turn a request into a decision. Implementations must be
/// `Send + Sync` so a single oracle can serve every pipeline.
pub trait DecisionOracle: Send + Sync {
    fn propose(&self, request: &OracleRequest) -> Result<Decision, OracleError>;
}

/// ECS resource wrapping the shared oracle.
#[derive(Resource, Clone)]
pub struct OracleResource(pub Arc<dyn DecisionOracle>);

impl OracleResource {
    pub fn new(oracle: Arc<dyn DecisionOracle>) -> Self {
        Self(oracle)
    }
}

impl std::ops::Deref for OracleResource {
    type Target = dyn DecisionOracle;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
