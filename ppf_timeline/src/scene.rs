//! Interface to the entity-lifecycle collaborator.
//!
//! The timeline core never owns entities. It sees them through [`Scene`]:
//! who is trackable, what they look like, and where they are right now.

use crate::snapshot::Pose;
use ppf_env::EntityId;
use serde::{Deserialize, Serialize};

/// The visual-only parts of an entity: what a proxy is allowed to copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Appearance {
    /// Mesh asset handle
    pub mesh: String,

    /// Material asset handle
    pub material: String,
}

impl Appearance {
    pub fn new(mesh: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            material: material.into(),
        }
    }
}

/// A trackable entity as listed by the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackableDesc {
    pub id: EntityId,

    /// Display name (used for proxy naming and logs)
    pub name: String,

    pub appearance: Appearance,

    /// Entity is itself a past-view stand-in and must never be proxied
    pub is_proxy: bool,
}

/// Live view of the world, read synchronously once per tick.
pub trait Scene {
    /// All entities that currently carry a trackable marker.
    fn trackables(&self) -> Vec<TrackableDesc>;

    /// Live pose of an entity; `None` once its transform is gone.
    fn pose(&self, id: EntityId) -> Option<Pose>;

    /// Whether the entity still exists.
    fn contains(&self, id: EntityId) -> bool {
        self.pose(id).is_some()
    }
}
