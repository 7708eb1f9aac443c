//! Tunable constants consumed by the cost model, triggers, and pipelines.
//!
//! Every struct has a `Default` with the production values and `with_*`
//! builders for tests. [`FleetConfig::from_env`] overlays environment variables
//! on the defaults.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-km and per-hour rates used for every revenue/cost/profit computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Average road speed used to turn distance into driving time (km/h).
    pub avg_speed_kmh: f64,
    /// Fuel cost per km driven, loaded or empty.
    pub fuel_cost_per_km: f64,
    /// Driver cost per hour of driving.
    pub driver_cost_per_hour: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            avg_speed_kmh: 60.0,
            fuel_cost_per_km: 2.5,
            driver_cost_per_hour: 15.0,
        }
    }
}

impl CostModel {
    /// Combined fuel and driver-time cost of one km.
    pub fn cost_per_km(&self) -> f64 {
        if self.avg_speed_kmh <= 0.0 {
            return self.fuel_cost_per_km;
        }
        self.fuel_cost_per_km + self.driver_cost_per_hour / self.avg_speed_kmh
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Idle minutes at which an available IDLE vehicle raises a timeout.
    pub max_idle_minutes: f64,
    /// Recent events kept after a monitor cycle.
    pub event_log_bound: usize,
    /// Chance per cycle of a synthetic traffic alert.
    pub traffic_alert_probability: f64,
    /// Maximum drift per axis of a synthetic position ping, in degrees.
    pub position_drift_degrees: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_idle_minutes: 30.0,
            event_log_bound: 50,
            traffic_alert_probability: 0.3,
            position_drift_degrees: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Highest-margin opportunities shown to the oracle.
    pub top_candidates: usize,
    /// Recent events kept after the matcher appends its own.
    pub event_log_bound: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            top_candidates: 10,
            event_log_bound: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Candidate loads whose origin is farther than this from the current
    /// destination are never offered as detours.
    pub max_detour_km: f64,
    /// Chance per invocation of a detected traffic delay.
    pub traffic_delay_probability: f64,
    /// Inclusive range of a detected traffic delay in minutes.
    pub traffic_delay_minutes: (u32, u32),
    /// Fuel level below which a delivery delay is raised.
    pub low_fuel_percent: f64,
    /// Fixed delay added for low fuel.
    pub low_fuel_penalty_minutes: u32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_detour_km: 100.0,
            traffic_delay_probability: 0.3,
            traffic_delay_minutes: (15, 60),
            low_fuel_percent: 20.0,
            low_fuel_penalty_minutes: 30,
        }
    }
}

/// Business targets passed to the oracle and used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTargets {
    pub utilization_rate: f64,
    pub empty_return_rate: f64,
    pub min_profit_margin: f64,
}

impl Default for MetricTargets {
    fn default() -> Self {
        Self {
            utilization_rate: 0.85,
            empty_return_rate: 0.15,
            min_profit_margin: 0.12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct FleetConfig {
    pub cost: CostModel,
    pub monitor: MonitorConfig,
    pub matcher: MatcherConfig,
    pub route: RouteConfig,
    pub targets: MetricTargets,
    /// Upper bound on a single oracle call.
    pub oracle_timeout_secs: u64,
    /// Seed for every random draw the pipelines make.
    pub seed: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            cost: CostModel::default(),
            monitor: MonitorConfig::default(),
            matcher: MatcherConfig::default(),
            route: RouteConfig::default(),
            targets: MetricTargets::default(),
            oracle_timeout_secs: 30,
            seed: 42,
        }
    }
}

impl FleetConfig {
    /// Defaults overlaid with any of the recognised environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`FleetConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        override_with(&read, "MAX_IDLE_MINUTES", &mut config.monitor.max_idle_minutes)?;
        override_with(&read, "TARGET_UTILIZATION_RATE", &mut config.targets.utilization_rate)?;
        override_with(&read, "TARGET_EMPTY_RETURN_RATE", &mut config.targets.empty_return_rate)?;
        override_with(&read, "MIN_PROFIT_MARGIN", &mut config.targets.min_profit_margin)?;
        override_with(&read, "AVG_SPEED_KMH", &mut config.cost.avg_speed_kmh)?;
        override_with(&read, "FUEL_COST_PER_KM", &mut config.cost.fuel_cost_per_km)?;
        override_with(&read, "DRIVER_COST_PER_HOUR", &mut config.cost.driver_cost_per_hour)?;
        override_with(&read, "MAX_DETOUR_KM", &mut config.route.max_detour_km)?;
        override_with(&read, "DECISION_TIMEOUT_SECONDS", &mut config.oracle_timeout_secs)?;
        override_with(&read, "FLEET_SEED", &mut config.seed)?;

        Ok(config)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs.max(1))
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_idle_minutes(mut self, minutes: f64) -> Self {
        self.monitor.max_idle_minutes = minutes;
        self
    }

    pub fn with_traffic_alert_probability(mut self, probability: f64) -> Self {
        self.monitor.traffic_alert_probability = probability;
        self
    }

    pub fn with_position_drift_degrees(mut self, degrees: f64) -> Self {
        self.monitor.position_drift_degrees = degrees;
        self
    }

    pub fn with_traffic_delay_probability(mut self, probability: f64) -> Self {
        self.route.traffic_delay_probability = probability;
        self
    }

    pub fn with_max_detour_km(mut self, km: f64) -> Self {
        self.route.max_detour_km = km;
        self
    }

    pub fn with_min_profit_margin(mut self, margin: f64) -> Self {
        self.targets.min_profit_margin = margin;
        self
    }

    pub fn with_top_candidates(mut self, count: usize) -> Self {
        self.matcher.top_candidates = count;
        self
    }

    pub fn with_oracle_timeout_secs(mut self, secs: u64) -> Self {
        self.oracle_timeout_secs = secs;
        self
    }

    pub fn with_cost_model(mut self, cost: CostModel) -> Self {
        self.cost = cost;
        self
    }
}

fn override_with<T, F>(read: &F, name: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&'static str) -> Option<String>,
{
    let Some(raw) = read(name) else {
        return Ok(());
    };
    *slot = raw
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        })?;
    Ok(())
}
