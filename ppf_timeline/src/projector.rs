//! The Playback Projector - visual stand-ins for the past view.
//!
//! While the local viewer holds the delayed role, every trackable entity gets
//! a proxy that is steered toward the pose the entity had `past_delay_seconds`
//! ago. Proxies are built from an allow-list of visual data (mesh, material,
//! pose, layer), so they can never carry physics, replication, trackability
//! or audio.
//!
//! # Lifecycle
//!
//! ```text
//! role → Past      : proxies created lazily, shown, driven every tick
//! role → not Past  : proxies hidden, kept, not driven
//! entity despawned : proxy orphaned (frozen) until released
//! ```

use crate::config::{LayerConfig, ProjectorConfig};
use crate::error::TimelineError;
use crate::layers::{LayerId, LayerTable};
use crate::recorder::Recorder;
use crate::role::{RoleCell, RoleWatch};
use crate::scene::{Appearance, Scene, TrackableDesc};
use crate::snapshot::Pose;

use ppf_env::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A render-only stand-in for one tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyVisual {
    /// Entity this proxy represents
    pub source: EntityId,

    pub name: String,

    pub appearance: Appearance,

    pub pose: Pose,

    /// Render layer (the proxy layer, if defined)
    pub layer: Option<LayerId>,

    pub visible: bool,
}

/// What one [`PlaybackProjector::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorTick {
    /// Role Signal after this tick
    pub active: bool,

    /// `Some(visible)` if visibility was flipped on a role edge
    pub toggled: Option<bool>,

    /// Proxies created this tick
    pub created: usize,

    /// Proxies moved toward a recorded snapshot
    pub moved: usize,
}

/// Owns every proxy and drives them from the recorder's history.
#[derive(Debug)]
pub struct PlaybackProjector {
    config: ProjectorConfig,

    proxy_layer: Option<LayerId>,

    proxies: HashMap<EntityId, ProxyVisual>,

    watch: RoleWatch,

    /// Missing-recorder diagnostic already emitted
    reported_missing_recorder: bool,
}

impl PlaybackProjector {
    pub fn new(config: ProjectorConfig, layers: &LayerTable, layer_config: &LayerConfig) -> Self {
        let proxy_layer = layers.index_of(&layer_config.proxy_layer);
        if proxy_layer.is_none() {
            warn!(
                "PlaybackProjector: {}",
                TimelineError::misconfigured(format!(
                    "proxy layer '{}' is not defined",
                    layer_config.proxy_layer
                ))
            );
        }

        Self {
            config,
            proxy_layer,
            proxies: HashMap::new(),
            watch: RoleWatch::new(),
            reported_missing_recorder: false,
        }
    }

    /// Runs one projector tick.
    ///
    /// 1. Edge-detects the role signal and flips proxy visibility on a change.
    /// 2. While delayed: binds new trackables, then moves every proxy whose
    ///    entity still exists toward its snapshot nearest `now - delay`.
    pub fn update<S: Scene + ?Sized>(
        &mut self,
        now: f64,
        recorder: Option<&Recorder>,
        scene: &S,
        role: &RoleCell,
    ) -> ProjectorTick {
        let edge = self.watch.poll(role);
        let mut tick = ProjectorTick {
            active: edge.delayed,
            ..Default::default()
        };

        if let Some(active) = edge.changed {
            self.on_active_changed(active);
            tick.toggled = self.config.hide_when_inactive.then_some(active);
        }

        if !edge.delayed {
            return tick;
        }

        let Some(recorder) = recorder else {
            if !self.reported_missing_recorder {
                self.reported_missing_recorder = true;
                warn!(
                    "PlaybackProjector: {}",
                    TimelineError::misconfigured("no recorder available, past view is frozen")
                );
            }
            return tick;
        };

        if self.config.auto_create_proxies {
            tick.created = self.ensure_proxies(scene);
        }

        let target_time = recorder.past_view_time(now);
        let smoothing = self.config.smoothing;

        for (id, proxy) in self.proxies.iter_mut() {
            if !scene.contains(*id) {
                continue;
            }
            // NotFound keeps the last pose
            if let Ok(snapshot) = recorder.query_past(*id, target_time) {
                proxy.pose = proxy.pose.approach(&snapshot.pose(), smoothing);
                tick.moved += 1;
            }
        }

        tick
    }

    /// Binds a proxy to every trackable that has none and isn't a proxy itself.
    ///
    /// Returns the number created.
    pub fn ensure_proxies<S: Scene + ?Sized>(&mut self, scene: &S) -> usize {
        let mut created = 0;
        for desc in scene.trackables() {
            if desc.is_proxy || self.proxies.contains_key(&desc.id) {
                continue;
            }
            let pose = scene.pose(desc.id).unwrap_or_default();
            self.bind(&desc, pose);
            created += 1;
        }
        created
    }

    /// Creates the proxy for `desc` at `pose`. No-op for proxies or
    /// already-bound entities.
    pub fn bind(&mut self, desc: &TrackableDesc, pose: Pose) -> bool {
        if desc.is_proxy || self.proxies.contains_key(&desc.id) {
            return false;
        }

        let visible = !self.config.hide_when_inactive || self.watch.last();
        let proxy = ProxyVisual {
            source: desc.id,
            name: format!("{}_PROXY", desc.name),
            appearance: desc.appearance.clone(),
            pose,
            layer: self.proxy_layer,
            visible,
        };
        debug!("PlaybackProjector: created {}", proxy.name);
        self.proxies.insert(desc.id, proxy);
        true
    }

    /// Destroys the proxy of an entity that was destroyed.
    pub fn release(&mut self, id: EntityId) -> Option<ProxyVisual> {
        let proxy = self.proxies.remove(&id);
        if let Some(proxy) = &proxy {
            debug!("PlaybackProjector: released {}", proxy.name);
        }
        proxy
    }

    pub fn proxy(&self, id: EntityId) -> Option<&ProxyVisual> {
        self.proxies.get(&id)
    }

    pub fn proxies(&self) -> impl Iterator<Item = &ProxyVisual> + '_ {
        self.proxies.values()
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Role signal as of the last update.
    pub fn is_active(&self) -> bool {
        self.watch.last()
    }

    fn on_active_changed(&mut self, active: bool) {
        if !self.config.hide_when_inactive {
            return;
        }
        for proxy in self.proxies.values_mut() {
            proxy.visible = active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::role::Role;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::sync::Arc;

    #[derive(Default)]
    struct TestScene {
        entities: Vec<(TrackableDesc, Pose)>,
    }

    impl TestScene {
        fn spawn(&mut self, seed: u64, x: f64, is_proxy: bool) -> EntityId {
            let id = EntityId::from_seed(seed);
            let desc = TrackableDesc {
                id,
                name: format!("crate{seed}"),
                appearance: Appearance::new("crate.mesh", "wood"),
                is_proxy,
            };
            self.entities.push((desc, Pose::at(Vector3::new(x, 0.0, 0.0))));
            id
        }

        fn move_to(&mut self, id: EntityId, x: f64) {
            for (desc, pose) in self.entities.iter_mut() {
                if desc.id == id {
                    pose.position.x = x;
                }
            }
        }

        fn despawn(&mut self, id: EntityId) {
            self.entities.retain(|(desc, _)| desc.id != id);
        }
    }

    impl Scene for TestScene {
        fn trackables(&self) -> Vec<TrackableDesc> {
            self.entities.iter().map(|(desc, _)| desc.clone()).collect()
        }

        fn pose(&self, id: EntityId) -> Option<Pose> {
            self.entities
                .iter()
                .find(|(desc, _)| desc.id == id)
                .map(|(_, pose)| *pose)
        }
    }

    fn projector(smoothing: f64) -> PlaybackProjector {
        let layer_config = LayerConfig::default();
        let table = LayerTable::from_config(&layer_config).unwrap();
        let config = ProjectorConfig {
            smoothing,
            ..Default::default()
        };
        PlaybackProjector::new(config, &table, &layer_config)
    }

    fn recorder(delay: f64) -> Recorder {
        Recorder::new(Arc::new(TimelineConfig {
            samples_per_second: 10,
            history_seconds: 10.0,
            past_delay_seconds: delay,
            enable_debug_hud: false,
        }))
    }

    #[test]
    fn test_inactive_role_creates_nothing() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        scene.spawn(1, 0.0, false);
        let rec = recorder(1.0);
        let role = RoleCell::with_role(Role::Present);

        let tick = proj.update(1.0, Some(&rec), &scene, &role);
        assert!(!tick.active);
        assert_eq!(proj.proxy_count(), 0);
    }

    #[test]
    fn test_never_proxies_a_proxy() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let real = scene.spawn(1, 0.0, false);
        let stand_in = scene.spawn(2, 0.0, true);
        let rec = recorder(1.0);
        let role = RoleCell::with_role(Role::Past);

        let tick = proj.update(1.0, Some(&rec), &scene, &role);
        assert_eq!(tick.created, 1);
        assert!(proj.proxy(real).is_some());
        assert!(proj.proxy(stand_in).is_none());

        let desc = scene.trackables().into_iter().find(|d| d.id == stand_in).unwrap();
        assert!(!proj.bind(&desc, Pose::default()));
    }

    #[test]
    fn test_proxy_copies_visuals_and_layer() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let id = scene.spawn(7, 3.0, false);
        let rec = recorder(1.0);

        proj.update(0.0, Some(&rec), &scene, &RoleCell::with_role(Role::Past));

        let proxy = proj.proxy(id).unwrap();
        assert_eq!(proxy.name, "crate7_PROXY");
        assert_eq!(proxy.appearance, Appearance::new("crate.mesh", "wood"));
        assert_eq!(proxy.pose.position.x, 3.0);
        assert!(proxy.layer.is_some());
        assert!(proxy.visible);
    }

    #[test]
    fn test_role_toggle_flips_visibility_without_recreating() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let a = scene.spawn(1, 0.0, false);
        let b = scene.spawn(2, 5.0, false);
        let rec = recorder(1.0);
        let role = RoleCell::with_role(Role::Past);

        proj.update(0.0, Some(&rec), &scene, &role);
        assert_eq!(proj.proxy_count(), 2);

        role.set(Role::Present);
        let tick = proj.update(0.1, Some(&rec), &scene, &role);
        assert_eq!(tick.toggled, Some(false));
        assert!(proj.proxies().all(|p| !p.visible));
        assert_eq!(proj.proxy_count(), 2);

        role.set(Role::Past);
        let tick = proj.update(0.2, Some(&rec), &scene, &role);
        assert_eq!(tick.toggled, Some(true));
        assert_eq!(tick.created, 0);
        assert!(proj.proxy(a).unwrap().visible);
        assert!(proj.proxy(b).unwrap().visible);
    }

    #[test]
    fn test_proxy_smooths_toward_past_pose() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let id = scene.spawn(1, 0.0, false);
        let mut rec = recorder(1.0);
        rec.register(id);

        // x == t for t in [0, 2]
        for step in 0..=20 {
            let t = step as f64 * 0.1;
            scene.move_to(id, t);
            rec.sample_all(t, &scene);
        }

        let role = RoleCell::with_role(Role::Past);
        scene.move_to(id, 0.0);
        proj.update(2.0, Some(&rec), &scene, &role);
        // created at x=0, half-way toward the snapshot at t=1.0
        assert_relative_eq!(proj.proxy(id).unwrap().pose.position.x, 0.5, epsilon = 1e-9);

        proj.update(2.0, Some(&rec), &scene, &role);
        assert_relative_eq!(proj.proxy(id).unwrap().pose.position.x, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_is_slerped() {
        let mut proj = projector(1.0);
        let mut scene = TestScene::default();
        let id = scene.spawn(1, 0.0, false);
        let mut rec = recorder(0.0);
        rec.register(id);

        let turned = Pose::new(Vector3::zeros(), UnitQuaternion::from_euler_angles(0.0, 0.0, 0.8));
        for (desc, pose) in scene.entities.iter_mut() {
            if desc.id == id {
                *pose = turned;
            }
        }
        rec.sample_all(1.0, &scene);

        proj.update(1.0, Some(&rec), &scene, &RoleCell::with_role(Role::Past));
        assert_relative_eq!(proj.proxy(id).unwrap().pose.orientation.angle(), 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_not_found_keeps_last_pose() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let id = scene.spawn(1, 4.0, false);
        // never registered -> every query is NotFound
        let rec = recorder(1.0);

        let tick = proj.update(3.0, Some(&rec), &scene, &RoleCell::with_role(Role::Past));
        assert_eq!(tick.moved, 0);
        assert_eq!(proj.proxy(id).unwrap().pose.position.x, 4.0);
    }

    #[test]
    fn test_despawned_entity_leaves_orphan_until_released() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        let id = scene.spawn(1, 0.0, false);
        let mut rec = recorder(0.0);
        rec.register(id);
        rec.sample_all(0.0, &scene);
        let role = RoleCell::with_role(Role::Past);

        proj.update(0.0, Some(&rec), &scene, &role);
        scene.despawn(id);

        let tick = proj.update(0.1, Some(&rec), &scene, &role);
        assert_eq!(tick.moved, 0);
        assert!(proj.proxy(id).is_some());

        assert!(proj.release(id).is_some());
        assert_eq!(proj.proxy_count(), 0);
    }

    #[test]
    fn test_missing_recorder_degrades_quietly() {
        let mut proj = projector(0.5);
        let mut scene = TestScene::default();
        scene.spawn(1, 0.0, false);
        let role = RoleCell::with_role(Role::Past);

        let tick = proj.update(0.0, None, &scene, &role);
        assert!(tick.active);
        assert_eq!(tick.created, 0);
        let tick = proj.update(0.1, None, &scene, &role);
        assert_eq!(tick.created, 0);
    }

    #[test]
    fn test_manual_binding_when_auto_create_disabled() {
        let layer_config = LayerConfig::default();
        let table = LayerTable::from_config(&layer_config).unwrap();
        let config = ProjectorConfig {
            auto_create_proxies: false,
            ..Default::default()
        };
        let mut proj = PlaybackProjector::new(config, &table, &layer_config);
        let mut scene = TestScene::default();
        let id = scene.spawn(1, 0.0, false);
        let rec = recorder(1.0);
        let role = RoleCell::with_role(Role::Past);

        assert_eq!(proj.update(0.0, Some(&rec), &scene, &role).created, 0);
        assert_eq!(proj.ensure_proxies(&scene), 1);
        assert!(proj.proxy(id).unwrap().visible);
    }
}
