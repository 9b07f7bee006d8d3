//! Ground truth oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of the simulated world:
//! - True poses of all trackable entities
//! - Kinematics (drifting velocity, constant spin)
//! - A short trail of past poses per entity, for scoring the past view
//!
//! It is the [`Scene`] the timeline samples from, and announces spawns and
//! despawns on the lifecycle channel.

use nalgebra::{UnitQuaternion, Vector3};
use ppf_env::{EntityId, LifecycleEvent, LifecycleSender};
use ppf_timeline::{Appearance, Pose, Scene, TrackableDesc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

/// A ground truth entity in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthEntity {
    /// Unique entity ID
    pub id: EntityId,

    /// Spawn order
    pub index: u64,

    /// Display name, e.g. "crate_3"
    pub name: String,

    /// Entity class (e.g., "crate", "drone", "ball")
    pub class: String,

    pub pose: Pose,

    /// Velocity [vx, vy, vz] in m/s
    pub velocity: Vector3<f64>,

    /// Spin about the vertical axis (rad/s)
    pub yaw_rate: f64,

    /// Simulation time of the spawn
    pub spawned_at: f64,
}

impl GroundTruthEntity {
    fn appearance(&self) -> Appearance {
        Appearance::new(format!("{}.mesh", self.class), format!("{}_mat", self.class))
    }
}

/// The Oracle - maintains ground truth and emits lifecycle events.
pub struct Oracle {
    /// RNG for physics (velocity drift)
    physics_rng: ChaCha8Rng,

    /// All live entities, in id order for deterministic iteration
    entities: BTreeMap<EntityId, GroundTruthEntity>,

    /// Recent `(time, pose)` per entity, oldest first
    trails: BTreeMap<EntityId, VecDeque<(f64, Pose)>>,

    /// Seconds of trail retained per entity
    trail_seconds: f64,

    /// Next entity index (seeds the EntityId)
    next_index: u64,

    /// Current simulation time (seconds)
    current_time: f64,

    /// Velocity drift standard deviation (m/s per sqrt(s))
    drift_std: f64,

    /// Entities never go faster than this (m/s)
    max_speed: f64,

    lifecycle: LifecycleSender,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    ///
    /// The physics seed should be derived separately from the context seed
    /// so that role decisions don't perturb entity trajectories.
    pub fn new(physics_seed: u64, lifecycle: LifecycleSender) -> Self {
        Self {
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            entities: BTreeMap::new(),
            trails: BTreeMap::new(),
            trail_seconds: 10.0,
            next_index: 0,
            current_time: 0.0,
            drift_std: 0.3,
            max_speed: 3.0,
            lifecycle,
        }
    }

    /// Sets the velocity drift standard deviation.
    pub fn set_drift(&mut self, std_dev: f64) {
        self.drift_std = std_dev.max(0.0);
    }

    pub fn set_max_speed(&mut self, max_speed: f64) {
        self.max_speed = max_speed.max(0.0);
    }

    /// Sets how much pose history is kept for [`pose_at`](Self::pose_at).
    pub fn set_trail_seconds(&mut self, seconds: f64) {
        self.trail_seconds = seconds.max(0.0);
    }

    /// Spawns a new entity and returns its ID.
    pub fn spawn_entity(
        &mut self,
        class: &str,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        yaw_rate: f64,
    ) -> EntityId {
        let index = self.next_index;
        self.next_index += 1;
        let id = EntityId::from_seed(index);

        let entity = GroundTruthEntity {
            id,
            index,
            name: format!("{class}_{index}"),
            class: class.to_string(),
            pose: Pose::at(position),
            velocity: cap_speed(velocity, self.max_speed),
            yaw_rate,
            spawned_at: self.current_time,
        };

        let mut trail = VecDeque::new();
        trail.push_back((self.current_time, entity.pose));
        self.trails.insert(id, trail);
        self.entities.insert(id, entity);

        debug!("Oracle: spawned {} at t={:.2}", id, self.current_time);
        self.announce(LifecycleEvent::Spawned(id));
        id
    }

    /// Destroys an entity. Returns false if it wasn't alive.
    pub fn despawn_entity(&mut self, id: EntityId) -> bool {
        if self.entities.remove(&id).is_none() {
            return false;
        }
        self.trails.remove(&id);
        debug!("Oracle: despawned {} at t={:.2}", id, self.current_time);
        self.announce(LifecycleEvent::Despawned(id));
        true
    }

    /// Advances physics by dt seconds.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.current_time += dt;

        let drift = Normal::new(0.0, self.drift_std * dt.sqrt()).ok();
        for entity in self.entities.values_mut() {
            if let Some(drift) = &drift {
                let kick = Vector3::new(
                    drift.sample(&mut self.physics_rng),
                    drift.sample(&mut self.physics_rng),
                    0.0,
                );
                entity.velocity = cap_speed(entity.velocity + kick, self.max_speed);
            }

            entity.pose.position += entity.velocity * dt;
            let spin = UnitQuaternion::from_euler_angles(0.0, 0.0, entity.yaw_rate * dt);
            entity.pose.orientation = spin * entity.pose.orientation;

            if let Some(trail) = self.trails.get_mut(&entity.id) {
                trail.push_back((self.current_time, entity.pose));
                while trail
                    .front()
                    .is_some_and(|(t, _)| *t < self.current_time - self.trail_seconds)
                {
                    trail.pop_front();
                }
            }
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn entity(&self, id: EntityId) -> Option<&GroundTruthEntity> {
        self.entities.get(&id)
    }

    /// Live entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &GroundTruthEntity> + '_ {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Oldest live entity (lowest spawn order).
    pub fn oldest_entity(&self) -> Option<EntityId> {
        self.entities
            .values()
            .min_by_key(|e| e.index)
            .map(|e| e.id)
    }

    /// Ground truth pose of `id` at the trail sample nearest `time`.
    pub fn pose_at(&self, id: EntityId, time: f64) -> Option<Pose> {
        let mut best: Option<(f64, Pose)> = None;
        for (t, pose) in self.trails.get(&id)?.iter().rev() {
            let delta = (t - time).abs();
            match best {
                Some((best_delta, _)) if delta >= best_delta => {}
                _ => best = Some((delta, *pose)),
            }
        }
        best.map(|(_, pose)| pose)
    }

    fn announce(&self, event: LifecycleEvent) {
        if let Err(e) = self.lifecycle.send(event) {
            warn!("Oracle: {}", e);
        }
    }
}

fn cap_speed(velocity: Vector3<f64>, max_speed: f64) -> Vector3<f64> {
    let speed = velocity.norm();
    if speed > max_speed && speed > 0.0 {
        velocity * (max_speed / speed)
    } else {
        velocity
    }
}

impl Scene for Oracle {
    fn trackables(&self) -> Vec<TrackableDesc> {
        self.entities
            .values()
            .map(|e| TrackableDesc {
                id: e.id,
                name: e.name.clone(),
                appearance: e.appearance(),
                is_proxy: false,
            })
            .collect()
    }

    fn pose(&self, id: EntityId) -> Option<Pose> {
        self.entities.get(&id).map(|e| e.pose)
    }

    fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }
}
