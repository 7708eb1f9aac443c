//! Pipeline stages as ECS systems.
//!
//! Each pipeline run builds a fresh `World` holding a private copy of the
//! records plus the resources below, runs a chained schedule (see
//! [`crate::runner`]), and hands the records back for an atomic swap.

pub mod matcher;
pub mod monitor;
pub mod movement;
pub mod route_adaptation;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;

use crate::feed::WorldFeed;

/// Seeded generator for every random draw made inside one pipeline run.
#[derive(Debug, Resource)]
pub struct PipelineRng(pub StdRng);

/// Feed shared between the store and the Monitor's collect stage.
pub type SharedFeed = Arc<Mutex<Box<dyn WorldFeed>>>;

#[derive(Resource, Clone)]
pub struct FeedResource(pub SharedFeed);

impl FeedResource {
    /// Lock the feed. A poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn WorldFeed>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
