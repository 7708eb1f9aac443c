//! Schedule builders and one-shot pipeline runs.
//!
//! Every run builds a fresh [`World`] holding its own copy of the records, runs
//! one chained single-threaded schedule, and extracts the records and work
//! resources back out. The store decides whether to swap the records in.

use std::sync::Arc;

use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{ExecutorKind, IntoSystemConfigs};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::CycleTime;
use crate::config::FleetConfig;
use crate::oracle::OracleResource;
use crate::routing::RouteProviderResource;
use crate::state::{FleetRecords, FleetState};
use crate::systems::matcher::{
    analyze_opportunities_system, collect_acceptances_system, consult_matching_oracle_system,
    create_trips_system, MatchInput, MatchWork,
};
use crate::systems::monitor::{
    alerts_triggered, check_triggers_system, collect_events_system, emit_alerts_system,
    publish_snapshot_system, update_state_system, MonitorCycle,
};
use crate::systems::movement::{
    advance_trips_system, release_delivered_vehicles_system, MovementReport,
};
use crate::systems::route_adaptation::{
    consult_route_oracle_system, detect_conditions_system, execute_decision_system,
    search_opportunities_system, AdaptationInput, AdaptationWork,
};
use crate::systems::{FeedResource, PipelineRng};

fn single_threaded() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule
}

/// CollectEvents → UpdateState → CheckTriggers → [EmitAlerts] → Publish.
pub fn monitor_schedule() -> Schedule {
    let mut schedule = single_threaded();
    schedule.add_systems(
        (
            collect_events_system,
            update_state_system,
            check_triggers_system,
            emit_alerts_system.run_if(alerts_triggered),
            publish_snapshot_system,
        )
            .chain(),
    );
    schedule
}

/// AnalyzeOpportunities → oracle → ParseAcceptances, against a snapshot.
pub fn matcher_decision_schedule() -> Schedule {
    let mut schedule = single_threaded();
    schedule.add_systems(
        (
            analyze_opportunities_system,
            consult_matching_oracle_system,
            collect_acceptances_system,
        )
            .chain(),
    );
    schedule
}

/// CreateTrips, against the live records.
pub fn matcher_apply_schedule() -> Schedule {
    let mut schedule = single_threaded();
    schedule.add_systems(create_trips_system);
    schedule
}

/// DetectConditions → SearchOpportunities → oracle → ExecuteDecision.
pub fn route_adaptation_schedule() -> Schedule {
    let mut schedule = single_threaded();
    schedule.add_systems(
        (
            detect_conditions_system,
            search_opportunities_system,
            consult_route_oracle_system,
            execute_decision_system,
        )
            .chain(),
    );
    schedule
}

/// Release last step's deliveries, then advance every active trip.
pub fn movement_schedule() -> Schedule {
    let mut schedule = single_threaded();
    schedule.add_systems((release_delivered_vehicles_system, advance_trips_system).chain());
    schedule
}

/// World with the resources every pipeline reads.
pub fn pipeline_world(config: &FleetConfig, now_ms: u64, seed: u64) -> World {
    let mut world = World::new();
    world.insert_resource(config.clone());
    world.insert_resource(CycleTime(now_ms));
    world.insert_resource(PipelineRng(StdRng::seed_from_u64(seed)));
    world
}

/// Records handed back by a run; the input copy if a system removed them.
fn take_records(world: &mut World, input: &FleetRecords) -> FleetRecords {
    world
        .remove_resource::<FleetRecords>()
        .unwrap_or_else(|| input.clone())
}

pub struct MonitorRun {
    pub records: FleetRecords,
    pub cycle: MonitorCycle,
}

pub fn run_monitor(
    records: &FleetRecords,
    cycle: MonitorCycle,
    feed: FeedResource,
    config: &FleetConfig,
    now_ms: u64,
    seed: u64,
) -> MonitorRun {
    let mut world = pipeline_world(config, now_ms, seed);
    world.insert_resource(records.clone());
    world.insert_resource(feed);
    world.insert_resource(cycle);
    monitor_schedule().run(&mut world);
    MonitorRun {
        records: take_records(&mut world, records),
        cycle: world.remove_resource::<MonitorCycle>().unwrap_or_default(),
    }
}

/// Decision half of the Matcher. Touches no record.
pub fn decide_matches(
    state: Arc<FleetState>,
    oracle: OracleResource,
    config: &FleetConfig,
    seed: u64,
) -> MatchWork {
    let mut world = pipeline_world(config, state.snapshot_at_ms, seed);
    world.insert_resource(MatchInput(state));
    world.insert_resource(oracle);
    world.insert_resource(MatchWork::default());
    matcher_decision_schedule().run(&mut world);
    world.remove_resource::<MatchWork>().unwrap_or_default()
}

pub struct ApplyRun {
    pub records: FleetRecords,
    pub work: MatchWork,
}

/// Apply half of the Matcher: turns `work.accepted` into trips on a copy of `records`.
pub fn apply_matches(
    records: &FleetRecords,
    work: MatchWork,
    config: &FleetConfig,
    now_ms: u64,
    seed: u64,
) -> ApplyRun {
    let mut world = pipeline_world(config, now_ms, seed);
    world.insert_resource(records.clone());
    world.insert_resource(work);
    matcher_apply_schedule().run(&mut world);
    ApplyRun {
        records: take_records(&mut world, records),
        work: world.remove_resource::<MatchWork>().unwrap_or_default(),
    }
}

/// One route adaptation pass. The trip in `input` is not touched; the
/// proposed version comes back in `work.updated_trip`.
pub fn adapt_route(
    input: AdaptationInput,
    oracle: OracleResource,
    config: &FleetConfig,
    now_ms: u64,
    seed: u64,
) -> AdaptationWork {
    let mut world = pipeline_world(config, now_ms, seed);
    world.insert_resource(input);
    world.insert_resource(oracle);
    world.insert_resource(AdaptationWork::default());
    route_adaptation_schedule().run(&mut world);
    world.remove_resource::<AdaptationWork>().unwrap_or_default()
}

pub struct MovementRun {
    pub records: FleetRecords,
    pub report: MovementReport,
}

pub fn run_movement(
    records: &FleetRecords,
    routes: RouteProviderResource,
    config: &FleetConfig,
    now_ms: u64,
    seed: u64,
) -> MovementRun {
    let mut world = pipeline_world(config, now_ms, seed);
    world.insert_resource(records.clone());
    world.insert_resource(routes);
    world.insert_resource(MovementReport::default());
    movement_schedule().run(&mut world);
    MovementRun {
        records: take_records(&mut world, records),
        report: world.remove_resource::<MovementReport>().unwrap_or_default(),
    }
}
