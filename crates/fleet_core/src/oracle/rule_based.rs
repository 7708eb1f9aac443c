//! Deterministic oracle: no external service, same contract.
//!
//! Matching solves a maximum-profit bipartite assignment over the offered
//! candidates with Kuhn-Munkres, so each vehicle and each load is used at most
//! once. Route adaptation adjusts on long delays and detours only when the
//! best detour earns a meaningful share of the current trip's profit.

use std::collections::BTreeSet;

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

use super::{AdaptationContext, Decision, DecisionOracle, MatchConstraints, OracleRequest};
use crate::error::OracleError;
use crate::model::{LoadId, VehicleId};
use crate::opportunity::{DetourOpportunity, Opportunity};

/// Scale factor from currency units to integer weights.
const SCALE: f64 = 100.0;

/// Weight for pairs that were not offered. Never part of an accepted answer.
const INFEASIBLE: i64 = -1_000_000_000_000_i64;

/// Dense matrix implementing pathfinding's `Weights` for i64.
struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(
            self.0
                .iter()
                .map(|r| r.iter().map(|&x| x.saturating_neg()).collect())
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuleBasedOracle {
    /// Detected delay at which the answer becomes ADJUST.
    pub adjust_after_delay_minutes: u32,
    /// Detour profit needed, as a share of the current trip's estimated profit.
    pub detour_profit_share: f64,
}

impl Default for RuleBasedOracle {
    fn default() -> Self {
        Self {
            adjust_after_delay_minutes: 60,
            detour_profit_share: 0.5,
        }
    }
}

impl RuleBasedOracle {
    pub fn with_adjust_after_delay_minutes(mut self, minutes: u32) -> Self {
        self.adjust_after_delay_minutes = minutes;
        self
    }

    pub fn with_detour_profit_share(mut self, share: f64) -> Self {
        self.detour_profit_share = share;
        self
    }

    fn score(profit: f64) -> i64 {
        let w = profit * SCALE;
        if w >= i64::MAX as f64 {
            i64::MAX
        } else {
            w as i64
        }
    }

    fn decide_matches(
        &self,
        candidates: &[Opportunity],
        constraints: &MatchConstraints,
    ) -> Decision {
        let eligible: Vec<&Opportunity> = candidates
            .iter()
            .filter(|o| o.profit > 0.0 && o.profit_margin >= constraints.min_profit_margin)
            .collect();
        if eligible.is_empty() {
            return Decision::Accept {
                pairs: Vec::new(),
                rationale: format!(
                    "No candidate meets the {:.0}% minimum margin",
                    constraints.min_profit_margin * 100.0
                ),
            };
        }

        let vehicles: Vec<&VehicleId> = eligible
            .iter()
            .map(|o| &o.vehicle_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let loads: Vec<&LoadId> = eligible
            .iter()
            .map(|o| &o.load_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // Kuhn-Munkres needs rows <= columns; put the smaller side on rows.
        let vehicles_are_rows = vehicles.len() <= loads.len();
        let (rows, cols) = if vehicles_are_rows {
            (vehicles.len(), loads.len())
        } else {
            (loads.len(), vehicles.len())
        };
        let mut matrix = vec![vec![INFEASIBLE; cols]; rows];
        for o in &eligible {
            let v = vehicles.iter().position(|id| *id == &o.vehicle_id);
            let l = loads.iter().position(|id| *id == &o.load_id);
            if let (Some(v), Some(l)) = (v, l) {
                let (r, c) = if vehicles_are_rows { (v, l) } else { (l, v) };
                matrix[r][c] = matrix[r][c].max(Self::score(o.profit));
            }
        }

        let weights = I64Weights(matrix);
        let (_, assignment) = kuhn_munkres(&weights);

        let mut pairs = Vec::new();
        let mut total_profit = 0.0;
        for (row, col) in assignment.into_iter().enumerate() {
            if weights.at(row, col) == INFEASIBLE {
                continue;
            }
            let (v, l) = if vehicles_are_rows { (row, col) } else { (col, row) };
            let (vehicle_id, load_id) = (vehicles[v], loads[l]);
            if let Some(o) = eligible
                .iter()
                .find(|o| &o.vehicle_id == vehicle_id && &o.load_id == load_id)
            {
                total_profit += o.profit;
            }
            pairs.push((vehicle_id.clone(), load_id.clone()));
        }
        pairs.sort();

        let rationale = format!(
            "Accepted {} of {} candidates by maximum-profit assignment (min margin {:.0}%, expected profit {:.2})",
            pairs.len(),
            candidates.len(),
            constraints.min_profit_margin * 100.0,
            total_profit
        );
        Decision::Accept { pairs, rationale }
    }

    fn decide_route(
        &self,
        context: &AdaptationContext,
        opportunities: &[DetourOpportunity],
    ) -> Decision {
        if context.delay_minutes >= self.adjust_after_delay_minutes {
            return Decision::Adjust {
                rationale: format!(
                    "{} min of delay ({}); adjusting route",
                    context.delay_minutes,
                    context.delay_causes.join("; ")
                ),
            };
        }

        let best = opportunities
            .iter()
            .filter(|o| o.weight_tons <= context.vehicle.capacity_tons)
            .max_by(|a, b| a.profit.total_cmp(&b.profit));
        let threshold = context.trip.estimated_profit.max(0.0) * self.detour_profit_share;
        match best {
            Some(best) if best.profit >= threshold => Decision::Detour {
                load_id: best.load_id.clone(),
                rationale: format!(
                    "{} is {:.1} km from the drop-off and adds {:.2} profit",
                    best.load_id, best.detour_km, best.profit
                ),
            },
            _ => Decision::Continue {
                rationale: "No delay worth adjusting for and no detour worth taking".to_string(),
            },
        }
    }
}

impl DecisionOracle for RuleBasedOracle {
    fn propose(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        Ok(match request {
            OracleRequest::Matching {
                candidates,
                constraints,
            } => self.decide_matches(candidates, constraints),
            OracleRequest::RouteAdaptation {
                context,
                opportunities,
            } => self.decide_route(context, opportunities),
        })
    }
}
