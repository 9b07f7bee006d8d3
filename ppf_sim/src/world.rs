//! SimWorld - The simulation harness container.
//!
//! Owns the virtual clock, the ground truth, the role director and one
//! timeline runtime for the local viewer. Each tick advances time and
//! physics, runs the timeline, then routes lifecycle events to trackable
//! handles and the projector.

use crate::context::SimContext;
use crate::error::SimError;
use crate::oracle::Oracle;
use crate::roles::RoleDirector;

use nalgebra::Vector3;
use ppf_env::{
    lifecycle_channel, ClientId, EntityId, LifecycleEvent, LifecycleReceiver, TimelineContext,
};
use ppf_timeline::{
    DrainReport, RecorderHandle, Role, RoleCell, SessionConfig, TickReport, TimelineRuntime,
    TrackableHandle,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Tick rate in Hz
    pub tick_rate_hz: u32,

    /// Entities spawned by [`SimWorld::populate`]
    pub entity_count: usize,

    /// Velocity drift standard deviation (m/s per sqrt(s))
    pub drift_std: f64,

    /// Speed cap for every entity (m/s)
    pub max_speed: f64,

    /// How long a role assignment waits for its viewer (seconds)
    pub role_timeout_secs: f64,

    /// Timeline session settings
    pub session: SessionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 60,
            entity_count: 8,
            drift_std: 0.3,
            max_speed: 3.0,
            role_timeout_secs: 2.0,
            session: SessionConfig::default(),
        }
    }
}

impl SimConfig {
    /// Seconds per tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate_hz.max(1) as f64
    }
}

/// Everything that happened in one [`SimWorld::tick`].
#[derive(Debug)]
pub struct WorldTick {
    pub report: TickReport,

    /// Role assignments applied or timed out this tick
    pub roles: DrainReport<ClientId>,

    /// Lifecycle events routed after the timeline ran
    pub events: Vec<LifecycleEvent>,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Ground truth oracle
    pub oracle: Oracle,

    events: LifecycleReceiver,

    runtime: TimelineRuntime<SimContext>,

    /// One handle per live entity
    handles: BTreeMap<EntityId, TrackableHandle>,

    director: RoleDirector,

    /// The viewer whose screen this world renders
    local_client: ClientId,

    /// Local viewer's role (unavailable until the viewer spawns)
    local_role: RoleCell,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    ///
    /// No recorder, entities or viewer exist yet.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        // Derive separate seeds for different subsystems
        let context_seed = config.seed;
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let context = SimContext::shared(context_seed);
        let (lifecycle_tx, events) = lifecycle_channel();

        let mut oracle = Oracle::new(physics_seed, lifecycle_tx);
        oracle.set_drift(config.drift_std);
        oracle.set_max_speed(config.max_speed);
        oracle.set_trail_seconds(
            config.session.timeline.history_seconds + config.session.timeline.past_delay_seconds + 1.0,
        );

        let runtime = TimelineRuntime::new(Arc::clone(&context), config.session.clone())?;

        let max_attempts = (config.role_timeout_secs * config.tick_rate_hz as f64).ceil() as u32;
        let director = RoleDirector::new(Arc::clone(&context), max_attempts);

        Ok(Self {
            config,
            context,
            oracle,
            events,
            runtime,
            handles: BTreeMap::new(),
            director,
            local_client: ClientId(0),
            local_role: RoleCell::new(),
            tick_count: 0,
        })
    }

    /// Spawns `entity_count` entities on a grid, moving outward.
    pub fn populate(&mut self) -> Vec<EntityId> {
        (0..self.config.entity_count)
            .map(|i| {
                let count = self.config.entity_count.max(1) as f64;
                let angle = i as f64 * std::f64::consts::TAU / count;
                let position = Vector3::new((i % 4) as f64 * 5.0, (i / 4) as f64 * 5.0, 0.0);
                let velocity = Vector3::new(angle.cos(), angle.sin(), 0.0) * 1.5;
                self.spawn_entity(position, velocity, 0.4 + 0.1 * (i % 8) as f64)
            })
            .collect()
    }

    pub fn spawn_entity(
        &mut self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        yaw_rate: f64,
    ) -> EntityId {
        self.oracle.spawn_entity("crate", position, velocity, yaw_rate)
    }

    pub fn despawn_entity(&mut self, id: EntityId) -> bool {
        self.oracle.despawn_entity(id)
    }

    /// Starts the session recorder and enrolls every live entity.
    pub fn start_recorder(&mut self) -> Result<RecorderHandle, SimError> {
        let recorder = self.runtime.start()?;
        let session = self.runtime.session();
        for handle in self.handles.values_mut() {
            handle.activate(session);
        }
        Ok(recorder)
    }

    /// Tears the recorder down. Returns false if none was running.
    pub fn stop_recorder(&mut self) -> bool {
        self.runtime.session_mut().teardown()
    }

    /// Connects the local client; its role is applied once its viewer spawns.
    pub fn connect_local(&mut self) -> Role {
        self.director.connect(self.local_client)
    }

    /// Spawns the local viewer; the role reaches it on the next tick.
    pub fn spawn_local_viewer(&mut self) {
        self.local_role = self.director.spawn_viewer(self.local_client);
    }

    /// Connects, spawns and immediately assigns `role` to the local viewer.
    pub fn join_as(&mut self, role: Role) {
        self.connect_local();
        self.spawn_local_viewer();
        self.director.assign(self.local_client, role);
    }

    /// Advances one tick at the configured rate.
    pub fn tick(&mut self) -> WorldTick {
        self.tick_with_dt(self.config.dt())
    }

    /// Advances `dt` seconds in a single step (a stalled frame if large).
    pub fn tick_with_dt(&mut self, dt: f64) -> WorldTick {
        self.context.advance_time(Duration::from_secs_f64(dt.max(0.0)));
        self.oracle.step(dt);
        self.tick_count += 1;

        let roles = self.director.tick();
        let report = self.runtime.tick(&self.oracle, &self.local_role);

        let events = self.events.drain();
        for event in &events {
            self.route(*event);
        }

        WorldTick {
            report,
            roles,
            events,
        }
    }

    fn route(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Spawned(id) => {
                let mut handle = TrackableHandle::new(id);
                handle.activate(self.runtime.session());
                self.handles.insert(id, handle);
            }
            LifecycleEvent::Despawned(id) => {
                // Dropping the handle unregisters it
                if self.handles.remove(&id).is_none() {
                    debug!("SimWorld: despawn of unknown entity {}", id);
                }
            }
        }
        self.runtime.on_lifecycle(event);
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn recorder(&self) -> Option<RecorderHandle> {
        self.runtime.session().recorder()
    }

    pub fn runtime(&self) -> &TimelineRuntime<SimContext> {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut TimelineRuntime<SimContext> {
        &mut self.runtime
    }

    pub fn director_mut(&mut self) -> &mut RoleDirector {
        &mut self.director
    }

    pub fn local_client(&self) -> ClientId {
        self.local_client
    }

    pub fn local_role(&self) -> &RoleCell {
        &self.local_role
    }

    pub fn handle(&self, id: EntityId) -> Option<&TrackableHandle> {
        self.handles.get(&id)
    }

    /// Entities with a history buffer (0 without a recorder).
    pub fn tracked_count(&self) -> usize {
        self.recorder().map_or(0, |recorder| {
            recorder.try_borrow().map_or(0, |rec| rec.tracked_count())
        })
    }

    /// Number of handles currently enrolled with a live recorder.
    pub fn tracked_handles(&self) -> usize {
        let session = self.runtime.session();
        self.handles.values().filter(|h| h.is_tracked(session)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppf_timeline::{Scene, ViewMode};

    fn world() -> SimWorld {
        SimWorld::new(SimConfig {
            entity_count: 3,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_sim_world_tick() {
        let mut world = world();
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.time(), 0.0);

        world.tick();

        assert_eq!(world.tick_count(), 1);
        assert!((world.time() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_spawned_entities_enroll_after_first_tick() {
        let mut world = world();
        world.start_recorder().unwrap();
        world.populate();
        assert_eq!(world.tracked_handles(), 0);

        let tick = world.tick();
        assert_eq!(tick.events.len(), 3);
        assert_eq!(world.tracked_handles(), 3);
        assert_eq!(world.recorder().unwrap().borrow().tracked_count(), 3);
    }

    #[test]
    fn test_late_recorder_enrolls_existing_handles() {
        let mut world = world();
        world.populate();
        world.tick();
        assert_eq!(world.tracked_handles(), 0);

        world.start_recorder().unwrap();
        assert_eq!(world.tracked_handles(), 3);
    }

    #[test]
    fn test_despawn_unregisters_and_releases_proxy() {
        let mut world = world();
        world.start_recorder().unwrap();
        let ids = world.populate();
        world.join_as(Role::Past);
        world.tick();
        world.tick();
        assert_eq!(world.runtime().projector().proxy_count(), 3);

        world.despawn_entity(ids[0]);
        world.tick();

        assert!(world.handle(ids[0]).is_none());
        assert!(!world.recorder().unwrap().borrow().is_tracked(ids[0]));
        assert_eq!(world.runtime().projector().proxy_count(), 2);
    }

    #[test]
    fn test_local_viewer_role_drives_view() {
        let mut world = world();
        world.start_recorder().unwrap();
        world.populate();

        let report = world.tick().report;
        assert_eq!(report.view, ViewMode::Direct);

        world.join_as(Role::Past);
        let report = world.tick().report;
        assert_eq!(report.view, ViewMode::Proxy);
    }

    #[test]
    fn test_determinism() {
        let run = || {
            let mut world = world();
            world.start_recorder().unwrap();
            let ids = world.populate();
            for _ in 0..120 {
                world.tick();
            }
            world.oracle.pose(ids[1])
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_context_seed_matches_config() {
        let world = world();
        assert_eq!(world.context.seed(), 42);
    }
}
