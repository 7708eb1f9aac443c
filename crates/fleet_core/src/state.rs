//! Authoritative records and the published snapshot.
//!
//! [`FleetRecords`] holds every vehicle, load, and trip ever seen in this run
//! plus the bounded event log. [`FleetState`] is the read-only view handed to
//! pipelines and callers: active loads and trips only, events truncated.

use std::collections::{BTreeMap, VecDeque};

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::model::{Event, Load, LoadId, LoadStatus, Trip, TripId, Vehicle, VehicleId};

/// Append-only recent-event history, oldest first. Eviction drops from the front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Append `events` in order, then evict the oldest until at most `bound` remain.
    pub fn append(&mut self, events: impl IntoIterator<Item = Event>, bound: usize) {
        self.events.extend(events);
        self.truncate(bound);
    }

    pub fn truncate(&mut self, bound: usize) {
        while self.events.len() > bound {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.back()
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }
}

/// Everything the store owns. Pipelines work on a clone and hand it back whole.
#[derive(Debug, Clone, Default, Resource)]
pub struct FleetRecords {
    pub vehicles: BTreeMap<VehicleId, Vehicle>,
    pub loads: BTreeMap<LoadId, Load>,
    pub trips: BTreeMap<TripId, Trip>,
    pub events: EventLog,
}

impl FleetRecords {
    /// Replace a vehicle record wholesale.
    pub fn put_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.vehicle_id.clone(), vehicle);
    }

    pub fn put_load(&mut self, load: Load) {
        self.loads.insert(load.load_id.clone(), load);
    }

    pub fn put_trip(&mut self, trip: Trip) {
        self.trips.insert(trip.trip_id.clone(), trip);
    }

    pub fn active_trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values().filter(|t| t.is_active())
    }

    pub fn active_trip_for_vehicle(&self, vehicle_id: &VehicleId) -> Option<&Trip> {
        self.active_trips().find(|t| &t.vehicle_id == vehicle_id)
    }

    pub fn active_trip_for_load(&self, load_id: &LoadId) -> Option<&Trip> {
        self.active_trips().find(|t| &t.load_id == load_id)
    }

    /// Snapshot of the current records with the given event bound.
    pub fn publish(&self, snapshot_at_ms: u64, event_bound: usize) -> FleetState {
        FleetState::publish(
            snapshot_at_ms,
            self.vehicles.values().cloned(),
            self.loads.values().cloned(),
            self.trips.values().cloned(),
            self.events.iter().cloned(),
            event_bound,
        )
    }
}

/// Point-in-time, read-only view of the fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetState {
    pub snapshot_at_ms: u64,
    pub vehicles: Vec<Vehicle>,
    /// Loads that are AVAILABLE, MATCHED, or IN_TRANSIT.
    pub active_loads: Vec<Load>,
    /// Trips that are neither COMPLETED nor FAILED.
    pub active_trips: Vec<Trip>,
    /// Most recent events, oldest first.
    pub recent_events: Vec<Event>,
}

impl FleetState {
    /// Assemble a coherent snapshot: loads filtered to the active subset,
    /// trips to non-terminal ones, events to the newest `event_bound`.
    pub fn publish(
        snapshot_at_ms: u64,
        vehicles: impl IntoIterator<Item = Vehicle>,
        loads: impl IntoIterator<Item = Load>,
        trips: impl IntoIterator<Item = Trip>,
        events: impl IntoIterator<Item = Event>,
        event_bound: usize,
    ) -> Self {
        let mut recent: Vec<Event> = events.into_iter().collect();
        if recent.len() > event_bound {
            recent.drain(..recent.len() - event_bound);
        }
        Self {
            snapshot_at_ms,
            vehicles: vehicles.into_iter().collect(),
            active_loads: loads
                .into_iter()
                .filter(|l| l.status.is_active())
                .collect(),
            active_trips: trips.into_iter().filter(|t| t.is_active()).collect(),
            recent_events: recent,
        }
    }

    pub fn available_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().filter(|v| v.is_available())
    }

    /// AVAILABLE loads whose pickup window is still open at `snapshot_at_ms`.
    pub fn available_loads(&self) -> impl Iterator<Item = &Load> {
        let now = self.snapshot_at_ms;
        self.active_loads
            .iter()
            .filter(move |l| l.status == LoadStatus::Available && !l.is_expired_at(now))
    }

    pub fn vehicle(&self, vehicle_id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| &v.vehicle_id == vehicle_id)
    }

    pub fn load(&self, load_id: &LoadId) -> Option<&Load> {
        self.active_loads.iter().find(|l| &l.load_id == load_id)
    }

    pub fn trip_for_vehicle(&self, vehicle_id: &VehicleId) -> Option<&Trip> {
        self.active_trips.iter().find(|t| &t.vehicle_id == vehicle_id)
    }
}
