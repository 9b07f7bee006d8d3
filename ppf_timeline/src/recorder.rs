//! The Recorder - per-entity pose history at a fixed sampling cadence.
//!
//! Owns one [`HistoryBuffer`] per tracked entity. Entities enroll and leave
//! at runtime (spawned objects included); history for an entity is dropped
//! the moment it unregisters.

use crate::config::TimelineConfig;
use crate::diagnostics::TimelineStatus;
use crate::error::TimelineError;
use crate::history::HistoryBuffer;
use crate::scene::Scene;
use crate::snapshot::Snapshot;

use ppf_env::EntityId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Records pose snapshots for every tracked entity.
#[derive(Debug)]
pub struct Recorder {
    /// Shared, read-only recording parameters
    config: Arc<TimelineConfig>,

    /// Exactly one buffer per tracked entity
    buffers: HashMap<EntityId, HistoryBuffer>,

    /// Simulation time at which the next sample pass is due
    next_sample_time: f64,
}

impl Recorder {
    /// Creates a recorder with no tracked entities.
    ///
    /// The first sample pass is due immediately; call
    /// [`reset_sampler`](Self::reset_sampler) to start the cadence at a
    /// specific instant.
    pub fn new(config: Arc<TimelineConfig>) -> Self {
        Self {
            config,
            buffers: HashMap::new(),
            next_sample_time: f64::NEG_INFINITY,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Starts tracking an entity. No-op if already tracked.
    ///
    /// Returns true if a new buffer was allocated.
    pub fn register(&mut self, id: EntityId) -> bool {
        if self.buffers.contains_key(&id) {
            return false;
        }
        let capacity = self.config.capacity();
        self.buffers.insert(id, HistoryBuffer::new(capacity));
        debug!("Recorder: registered {} (capacity {})", id, capacity);
        true
    }

    /// Stops tracking an entity and drops its history. No-op if untracked.
    pub fn unregister(&mut self, id: EntityId) -> bool {
        let removed = self.buffers.remove(&id).is_some();
        if removed {
            debug!("Recorder: unregistered {}", id);
        }
        removed
    }

    /// Registers every non-proxy trackable currently in the scene.
    ///
    /// Returns how many were newly registered.
    pub fn discover<S: Scene + ?Sized>(&mut self, scene: &S) -> usize {
        scene
            .trackables()
            .into_iter()
            .filter(|desc| !desc.is_proxy)
            .filter(|desc| self.register(desc.id))
            .count()
    }

    /// Schedules the next sample pass one interval after `now`.
    pub fn reset_sampler(&mut self, now: f64) {
        self.next_sample_time = now + self.config.sample_interval();
    }

    pub fn next_sample_time(&self) -> f64 {
        self.next_sample_time
    }

    /// Runs a sample pass if one is due at `now`.
    ///
    /// After a pass the next one is scheduled one interval after `now`, so
    /// a long stall produces a single sample at the current instant rather
    /// than a backfill of the missed ones.
    pub fn sample_all_due<S: Scene + ?Sized>(&mut self, now: f64, scene: &S) -> bool {
        if now < self.next_sample_time {
            return false;
        }
        self.sample_all(now, scene);
        self.next_sample_time = now + self.config.sample_interval();
        true
    }

    /// Appends a snapshot at `now` for every tracked entity with a live pose.
    ///
    /// Entities whose pose can't be read are skipped and keep their old
    /// history. Returns the number of snapshots written.
    pub fn sample_all<S: Scene + ?Sized>(&mut self, now: f64, scene: &S) -> usize {
        let mut written = 0;
        for (id, buffer) in self.buffers.iter_mut() {
            if let Some(pose) = scene.pose(*id) {
                buffer.append(Snapshot::new(now, pose));
                written += 1;
            }
        }
        written
    }

    /// Snapshot of `id` nearest to `target_time`.
    pub fn query_past(&self, id: EntityId, target_time: f64) -> Result<Snapshot, TimelineError> {
        self.buffers
            .get(&id)
            .and_then(|buffer| buffer.query_nearest(target_time))
            .ok_or(TimelineError::NotFound { entity: id })
    }

    /// The instant the past view is reconstructing.
    pub fn past_view_time(&self, now: f64) -> f64 {
        now - self.config.past_delay_seconds
    }

    /// `(oldest, newest)` recorded time across all buffers.
    ///
    /// Empty buffers contribute `now`; with no buffers at all the range is
    /// `(now, now)`.
    pub fn time_range(&self, now: f64) -> (f64, f64) {
        let mut range: Option<(f64, f64)> = None;

        for buffer in self.buffers.values() {
            let oldest = buffer.oldest_time_or(now);
            let newest = buffer.newest_time_or(now);
            range = Some(match range {
                None => (oldest, newest),
                Some((o, n)) => (o.min(oldest), n.max(newest)),
            });
        }

        range.unwrap_or((now, now))
    }

    /// Point-in-time summary for diagnostics.
    pub fn status(&self, now: f64) -> TimelineStatus {
        TimelineStatus::capture(self, now)
    }

    pub fn tracked_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.buffers.contains_key(&id)
    }

    pub fn tracked_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.buffers.keys().copied()
    }

    /// Read access to one entity's history.
    pub fn history(&self, id: EntityId) -> Option<&HistoryBuffer> {
        self.buffers.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Appearance, TrackableDesc};
    use crate::snapshot::Pose;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    /// Static entities placed along the x axis.
    #[derive(Default)]
    struct LineScene {
        entities: HashMap<EntityId, (Pose, bool)>,
    }

    impl LineScene {
        fn put(&mut self, id: EntityId, x: f64) {
            self.entities.insert(id, (Pose::at(Vector3::new(x, 0.0, 0.0)), false));
        }

        fn put_proxy(&mut self, id: EntityId) {
            self.entities.insert(id, (Pose::default(), true));
        }
    }

    impl Scene for LineScene {
        fn trackables(&self) -> Vec<TrackableDesc> {
            self.entities
                .iter()
                .map(|(id, (_, is_proxy))| TrackableDesc {
                    id: *id,
                    name: id.to_string(),
                    appearance: Appearance::new("cube", "default"),
                    is_proxy: *is_proxy,
                })
                .collect()
        }

        fn pose(&self, id: EntityId) -> Option<Pose> {
            self.entities.get(&id).map(|(pose, _)| *pose)
        }
    }

    fn recorder(samples_per_second: u32, history_seconds: f64, delay: f64) -> Recorder {
        Recorder::new(Arc::new(TimelineConfig {
            samples_per_second,
            history_seconds,
            past_delay_seconds: delay,
            enable_debug_hud: false,
        }))
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut rec = recorder(15, 6.0, 1.5);
        let id = EntityId::from_seed(1);

        assert!(rec.register(id));
        assert!(!rec.register(id));
        assert_eq!(rec.tracked_count(), 1);
        assert_eq!(rec.history(id).unwrap().capacity(), 90);
    }

    #[test]
    fn test_unregister_untracked_is_noop() {
        let mut rec = recorder(15, 6.0, 1.5);
        rec.register(EntityId::from_seed(1));

        assert!(!rec.unregister(EntityId::from_seed(2)));
        assert_eq!(rec.tracked_count(), 1);
    }

    #[test]
    fn test_unregister_drops_history() {
        let mut rec = recorder(10, 1.0, 0.0);
        let mut scene = LineScene::default();
        let id = EntityId::from_seed(1);
        scene.put(id, 1.0);

        rec.register(id);
        rec.sample_all(0.0, &scene);
        assert!(rec.query_past(id, 0.0).is_ok());

        rec.unregister(id);
        rec.register(id);
        assert!(rec.query_past(id, 0.0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_past_view_time() {
        let rec = recorder(15, 6.0, 1.5);
        assert_relative_eq!(rec.past_view_time(10.0), 8.5);
    }

    #[test]
    fn test_query_untracked_is_not_found() {
        let rec = recorder(15, 6.0, 1.5);
        let err = rec.query_past(EntityId::from_seed(9), 1.0).unwrap_err();
        assert!(matches!(err, TimelineError::NotFound { .. }));
    }

    #[test]
    fn test_sampling_cadence() {
        let mut rec = recorder(10, 10.0, 0.0);
        let mut scene = LineScene::default();
        let id = EntityId::from_seed(1);
        scene.put(id, 0.0);
        rec.register(id);
        rec.reset_sampler(0.0);

        // 60 Hz frames for one second -> one pass per 0.1 s
        let mut passes = 0;
        for frame in 1..=60 {
            let now = frame as f64 / 60.0;
            if rec.sample_all_due(now, &scene) {
                passes += 1;
            }
        }

        assert!((9..=10).contains(&passes), "passes = {passes}");
        assert_eq!(rec.history(id).unwrap().len(), passes);
    }

    #[test]
    fn test_stall_snaps_forward_without_backfill() {
        let mut rec = recorder(10, 10.0, 0.0);
        let mut scene = LineScene::default();
        let id = EntityId::from_seed(1);
        scene.put(id, 0.0);
        rec.register(id);
        rec.reset_sampler(0.0);

        assert!(rec.sample_all_due(0.1, &scene));
        // 2 second stall: one sample at the current instant, nothing in between
        assert!(rec.sample_all_due(2.1, &scene));
        assert!(!rec.sample_all_due(2.15, &scene));
        assert!(rec.sample_all_due(2.25, &scene));

        let times: Vec<f64> = rec.history(id).unwrap().iter().map(|s| s.time()).collect();
        assert_eq!(times, vec![0.1, 2.1, 2.25]);
        assert_relative_eq!(rec.next_sample_time(), 2.35, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_pose_is_skipped_and_keeps_history() {
        let mut rec = recorder(10, 1.0, 0.0);
        let mut scene = LineScene::default();
        let alive = EntityId::from_seed(1);
        let gone = EntityId::from_seed(2);
        scene.put(alive, 1.0);
        scene.put(gone, 2.0);
        rec.register(alive);
        rec.register(gone);

        assert_eq!(rec.sample_all(0.0, &scene), 2);
        scene.entities.remove(&gone);
        assert_eq!(rec.sample_all(0.1, &scene), 1);

        assert_eq!(rec.history(gone).unwrap().len(), 1);
        assert_eq!(rec.history(alive).unwrap().len(), 2);
    }

    #[test]
    fn test_time_range_spans_all_buffers() {
        let mut rec = recorder(10, 1.0, 0.0);
        let mut scene = LineScene::default();
        let a = EntityId::from_seed(1);
        let b = EntityId::from_seed(2);
        scene.put(a, 0.0);
        rec.register(a);
        rec.sample_all(1.0, &scene);

        scene.put(b, 0.0);
        rec.register(b);
        rec.sample_all(2.0, &scene);
        rec.sample_all(3.0, &scene);

        assert_eq!(rec.time_range(10.0), (1.0, 3.0));
        assert_eq!(rec.status(10.0).tracked, 2);
    }

    #[test]
    fn test_time_range_fallbacks() {
        let mut rec = recorder(10, 1.0, 0.0);
        assert_eq!(rec.time_range(4.0), (4.0, 4.0));

        // an empty buffer contributes `now` on both ends
        rec.register(EntityId::from_seed(1));
        assert_eq!(rec.time_range(4.0), (4.0, 4.0));
    }

    #[test]
    fn test_discover_skips_proxies() {
        let mut rec = recorder(10, 1.0, 0.0);
        let mut scene = LineScene::default();
        let real = EntityId::from_seed(1);
        let proxy = EntityId::from_seed(2);
        scene.put(real, 0.0);
        scene.put_proxy(proxy);

        assert_eq!(rec.discover(&scene), 1);
        assert!(rec.is_tracked(real));
        assert!(!rec.is_tracked(proxy));
        assert_eq!(rec.discover(&scene), 0);
    }
}
