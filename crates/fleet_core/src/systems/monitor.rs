//! Monitor pipeline: CollectEvents → UpdateState → CheckTriggers →
//! [EmitAlerts] → Publish.
//!
//! No stage fails. Events naming unknown vehicles or loads are dropped, and
//! cancellations the load lifecycle forbids are ignored.

use bevy_ecs::prelude::{Res, ResMut, Resource};
use rand::Rng;
use tracing::{debug, info};

use super::{FeedResource, PipelineRng};
use crate::clock::CycleTime;
use crate::config::FleetConfig;
use crate::model::{Event, EventId, EventKind, EventType, LoadStatus, Vehicle, VehicleStatus};
use crate::state::{FleetRecords, FleetState};

/// Working set of one monitor cycle.
#[derive(Debug, Default, Resource)]
pub struct MonitorCycle {
    /// Externally submitted events waiting to be folded in this cycle.
    pub inbound: Vec<Event>,
    /// Every event folded by UpdateState, inbound first.
    pub collected: Vec<Event>,
    /// Alerts raised by CheckTriggers.
    pub triggered: Vec<Event>,
    pub snapshot: Option<FleetState>,
}

impl MonitorCycle {
    pub fn with_inbound(inbound: Vec<Event>) -> Self {
        Self {
            inbound,
            ..Default::default()
        }
    }

    pub fn count_collected(&self, event_type: EventType) -> usize {
        self.collected
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

/// Run condition for the EmitAlerts branch.
pub fn alerts_triggered(cycle: Res<MonitorCycle>) -> bool {
    !cycle.triggered.is_empty()
}

/// Gathers this cycle's events: inbound submissions, one position ping per
/// moving vehicle, and sometimes a traffic alert. Touches no record.
pub fn collect_events_system(
    records: Res<FleetRecords>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    feed: Res<FeedResource>,
    mut rng: ResMut<PipelineRng>,
    mut cycle: ResMut<MonitorCycle>,
) {
    let mut collected = std::mem::take(&mut cycle.inbound);
    let mut feed = feed.lock();

    let drift = config.monitor.position_drift_degrees;
    for vehicle in records.vehicles.values().filter(|v| v.status.is_en_route()) {
        collected.push(feed.simulate_position_update(vehicle, drift, now.0));
    }

    let probability = config.monitor.traffic_alert_probability.clamp(0.0, 1.0);
    if rng.0.gen_bool(probability) {
        collected.push(feed.simulate_traffic_alert(now.0));
    }

    debug!(events = collected.len(), "collected monitor events");
    cycle.collected = collected;
}

/// Folds collected events into the records and appends them to the log.
pub fn update_state_system(
    mut records: ResMut<FleetRecords>,
    config: Res<FleetConfig>,
    cycle: Res<MonitorCycle>,
) {
    for event in &cycle.collected {
        apply_event(&mut records, event);
    }
    records
        .events
        .append(cycle.collected.iter().cloned(), config.monitor.event_log_bound);
}

fn apply_event(records: &mut FleetRecords, event: &Event) {
    match &event.kind {
        EventKind::VehiclePositionUpdate {
            vehicle_id,
            location,
        } => {
            let Some(vehicle) = records.vehicles.get(vehicle_id) else {
                debug!(vehicle_id = %vehicle_id, "position update for unknown vehicle dropped");
                return;
            };
            let updated = Vehicle {
                current_location: location.clone(),
                last_updated_at_ms: event.timestamp_ms,
                ..vehicle.clone()
            };
            records.put_vehicle(updated);
        }
        EventKind::LoadPosted { load } => {
            let mut posted = load.as_ref().clone();
            // A re-post refreshes the listing; lifecycle past AVAILABLE stays with the store.
            if let Some(existing) = records.loads.get(&posted.load_id) {
                if existing.status != LoadStatus::Available {
                    debug!(
                        load_id = %posted.load_id,
                        status = ?existing.status,
                        "re-posted load keeps its lifecycle status and assignment"
                    );
                    posted.status = existing.status;
                    posted.assigned_vehicle_id = existing.assigned_vehicle_id.clone();
                }
            }
            records.put_load(posted);
        }
        EventKind::LoadCancelled { load_id } => {
            let Some(load) = records.loads.get(load_id) else {
                debug!(load_id = %load_id, "cancellation for unknown load dropped");
                return;
            };
            match load.transitioned(LoadStatus::Cancelled) {
                Some(cancelled) => records.put_load(cancelled),
                None => debug!(
                    load_id = %load_id,
                    status = ?load.status,
                    "cancellation ignored for load past the cancellable states"
                ),
            }
        }
        _ => {}
    }
}

/// Raises one idle-timeout alert per available IDLE vehicle at or over the threshold.
pub fn check_triggers_system(
    records: Res<FleetRecords>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    mut rng: ResMut<PipelineRng>,
    mut cycle: ResMut<MonitorCycle>,
) {
    let threshold = config.monitor.max_idle_minutes;
    let triggered: Vec<Event> = records
        .vehicles
        .values()
        .filter(|v| {
            v.status == VehicleStatus::Idle && v.idle_minutes_today >= threshold && v.is_available()
        })
        .map(|v| {
            Event::new(
                EventId::generate(&mut rng.0),
                now.0,
                EventKind::VehicleIdleTimeout {
                    vehicle_id: v.vehicle_id.clone(),
                    idle_minutes: v.idle_minutes_today,
                    location: v.current_location.clone(),
                },
            )
        })
        .collect();
    cycle.triggered = triggered;
}

pub fn emit_alerts_system(
    mut records: ResMut<FleetRecords>,
    config: Res<FleetConfig>,
    cycle: Res<MonitorCycle>,
) {
    for alert in &cycle.triggered {
        if let Some(vehicle_id) = alert.vehicle_id() {
            info!(vehicle_id = %vehicle_id, "vehicle idle timeout");
        }
    }
    records
        .events
        .append(cycle.triggered.iter().cloned(), config.monitor.event_log_bound);
}

pub fn publish_snapshot_system(
    records: Res<FleetRecords>,
    config: Res<FleetConfig>,
    now: Res<CycleTime>,
    mut cycle: ResMut<MonitorCycle>,
) {
    cycle.snapshot = Some(records.publish(now.0, config.monitor.event_log_bound));
}
