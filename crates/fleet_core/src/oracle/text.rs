//! Text-model oracle: prompt rendering and free-text answer parsing.
//!
//! Matching answers are read line by line. A line counts when it has a `→` or
//! `->` separator with a vehicle token before it and a load token after it
//! (anything after a `:` on the load side is the reason and is ignored).
//! Route answers are read by intent keyword.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use super::{AdaptationContext, Decision, DecisionOracle, MatchConstraints, OracleRequest};
use crate::error::OracleError;
use crate::model::{LoadId, VehicleId};
use crate::opportunity::{DetourOpportunity, Opportunity};

/// Anything that completes a prompt with text.
pub trait CompletionBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

impl<F> CompletionBackend for F
where
    F: Fn(&str) -> Result<String, OracleError> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self(prompt)
    }
}

pub struct TextOracle<B> {
    backend: B,
}

impl<B: CompletionBackend> TextOracle<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: CompletionBackend> DecisionOracle for TextOracle<B> {
    fn propose(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        let prompt = render_prompt(request);
        let answer = self.backend.complete(&prompt)?;
        Ok(match request {
            OracleRequest::Matching { .. } => Decision::Accept {
                pairs: parse_acceptances(&answer),
                rationale: answer,
            },
            OracleRequest::RouteAdaptation { .. } => parse_route_decision(&answer),
        })
    }
}

/// Vehicle token families in priority order.
fn vehicle_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)truck_\d+").expect("static pattern"),
            Regex::new(r"(?i)vehicle_\d+").expect("static pattern"),
            Regex::new(r"(?i)v\d+").expect("static pattern"),
        ]
    })
}

/// Load token families in priority order.
fn load_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)load_\d+").expect("static pattern"),
            Regex::new(r"(?i)l\d+").expect("static pattern"),
        ]
    })
}

/// Detour targets are only recognised in the canonical lowercase form.
fn detour_load_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"load_\d+").expect("static pattern"))
}

fn first_match(patterns: &[Regex], haystack: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.find(haystack))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Accepted (vehicle, load) pairs found in a free-text answer. Lines that do
/// not parse are skipped.
pub fn parse_acceptances(answer: &str) -> Vec<(VehicleId, LoadId)> {
    answer
        .lines()
        .filter_map(|line| {
            let (vehicle_part, rest) = line
                .split_once('→')
                .or_else(|| line.split_once("->"))?;
            let load_part = rest.split(':').next().unwrap_or(rest);
            let vehicle = first_match(vehicle_patterns(), vehicle_part)?;
            let load = first_match(load_patterns(), load_part)?;
            Some((VehicleId::new(vehicle), LoadId::new(load)))
        })
        .collect()
}

/// Intent from a free-text route answer. Keywords are case-sensitive.
pub fn parse_route_decision(answer: &str) -> Decision {
    let rationale = answer.trim().to_string();
    if answer.contains("DETOUR") {
        return match detour_load_pattern().find(answer) {
            Some(m) => Decision::Detour {
                load_id: LoadId::new(m.as_str()),
                rationale,
            },
            None => Decision::Continue {
                rationale: format!("could not parse load ID from detour answer: {rationale}"),
            },
        };
    }
    if answer.contains("ADJUST") {
        return Decision::Adjust { rationale };
    }
    Decision::Continue { rationale }
}

pub fn render_prompt(request: &OracleRequest) -> String {
    match request {
        OracleRequest::Matching {
            candidates,
            constraints,
        } => render_matching_prompt(candidates, constraints),
        OracleRequest::RouteAdaptation {
            context,
            opportunities,
        } => render_route_prompt(context, opportunities),
    }
}

fn render_matching_prompt(candidates: &[Opportunity], constraints: &MatchConstraints) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "You are the load matching agent for a trucking fleet.");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Fleet: {} vehicles, {} available. Loads available: {}.",
        constraints.total_vehicles, constraints.available_vehicles, constraints.available_loads
    );
    let _ = writeln!(
        out,
        "Targets: utilization >= {:.0}%, profit margin >= {:.0}%.",
        constraints.target_utilization * 100.0,
        constraints.min_profit_margin * 100.0
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Top opportunities by profit margin:");
    for (i, o) in candidates.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} at {} → {} ({} → {}), {:.1} t of {:.1} t, pickup {:.1} km, delivery {:.1} km, revenue {:.2}, cost {:.2}, profit {:.2}, margin {:.1}%, utilization {:.1}%",
            i + 1,
            o.vehicle_id,
            o.vehicle_location,
            o.load_id,
            o.load_origin,
            o.load_destination,
            o.load_weight_tons,
            o.vehicle_capacity_tons,
            o.pickup_distance_km,
            o.delivery_distance_km,
            o.revenue,
            o.cost,
            o.profit,
            o.profit_margin * 100.0,
            o.utilization * 100.0
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Rules:");
    let _ = writeln!(out, "- Each vehicle takes at most one load.");
    let _ = writeln!(out, "- Each load goes to at most one vehicle.");
    let _ = writeln!(out, "- Reject pairings below the minimum margin.");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Answer with one line per approved match in the form `vehicle_id → load_id: reason`."
    );
    out
}

fn render_route_prompt(context: &AdaptationContext, opportunities: &[DetourOpportunity]) -> String {
    let mut out = String::new();
    let trip = &context.trip;
    let vehicle = &context.vehicle;
    let _ = writeln!(out, "You are the route manager for an in-flight trip.");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Trip {}: {} carrying {} from {} to {}, phase {:?}, progress {:.0}%.",
        trip.trip_id,
        vehicle.vehicle_id,
        context.load.load_id,
        context.load.origin.label(),
        context.load.destination.label(),
        trip.phase,
        trip.progress_percent.unwrap_or(0.0)
    );
    let _ = writeln!(
        out,
        "Vehicle: fuel {:.1}%, {:.1} driving hours left, {:.1} t of {:.1} t loaded.",
        vehicle.fuel_level_percent,
        vehicle.max_driving_hours_remaining,
        vehicle.current_load_tons,
        vehicle.capacity_tons
    );
    if context.delay_causes.is_empty() {
        let _ = writeln!(out, "No delays detected.");
    } else {
        let _ = writeln!(out, "Detected delay: {} min.", context.delay_minutes);
        for cause in &context.delay_causes {
            let _ = writeln!(out, "- {cause}");
        }
    }
    let _ = writeln!(out);
    if opportunities.is_empty() {
        let _ = writeln!(out, "No profitable loads near the drop-off.");
    } else {
        let _ = writeln!(out, "Loads near the drop-off:");
        for o in opportunities {
            let _ = writeln!(
                out,
                "- {}: {} → {}, {:.1} t, detour {:.1} km, profit {:.2}",
                o.load_id, o.origin, o.destination, o.weight_tons, o.detour_km, o.profit
            );
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Answer with exactly one of CONTINUE, DETOUR_FOR_LOAD <load_id>, or ADJUST_ROUTE, then a short justification."
    );
    out
}
