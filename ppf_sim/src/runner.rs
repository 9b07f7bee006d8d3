//! Scenario runner - drives a [`SimWorld`] through each timeline scenario
//! and checks the past view against ground truth.

use crate::error::SimError;
use crate::exporter::{EntityFrame, PoseRecord, SimEvent, SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld, WorldTick};

use nalgebra::Vector3;
use ppf_env::{ClientId, LifecycleEvent};
use ppf_timeline::diagnostics::MISSING_RECORDER_TEXT;
use ppf_timeline::{Role, Scene, SessionConfig, ViewMode};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Seconds a proxy gets to converge after it starts following history.
const SETTLE_SECS: f64 = 0.5;

/// Slack on top of the motion-derived error bounds.
const ERROR_SLACK: f64 = 0.05;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of live entities at end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Recorder sample passes
    pub sample_passes: u64,

    pub proxies_created: u64,
    pub proxies_released: u64,

    /// Proxy visibility flips on role edges
    pub visibility_toggles: u64,

    /// Deferred role assignments applied / timed out
    pub roles_applied: u64,
    pub role_timeouts: u64,

    /// Proxy poses compared against ground truth at the delayed time
    pub error_samples: u64,

    /// Comparisons outside the motion-derived bound
    pub error_violations: u64,

    /// Largest proxy position error (m)
    pub max_proxy_error: f64,

    /// Mean proxy position error (m)
    pub mean_proxy_error: f64,

    /// Largest proxy heading error (rad)
    pub max_angle_error: f64,
}

/// Runs timeline scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Requested duration in seconds (scenarios may run longer)
    duration_secs: f64,

    /// Session settings every scenario starts from
    session: SessionConfig,

    /// Ticks between exported frames
    export_every: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 60,
            duration_secs: 10.0,
            session: SessionConfig::default(),
            export_every: 6,
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the requested duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Sets the session configuration.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Sets how many ticks pass between exported frames.
    pub fn with_export_every(mut self, ticks: u64) -> Self {
        self.export_every = ticks.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None)
    }

    /// Runs a scenario, recording frames into `export`.
    pub fn run_exported(&self, scenario: ScenarioId, export: &mut SimExport) -> ScenarioResult {
        let result = self.execute(scenario, Some(&mut *export));
        let max_error = (result.metrics.error_samples > 0).then_some(result.metrics.max_proxy_error);
        export.finalize(result.passed, max_error);
        result
    }

    /// The world configuration a scenario runs with.
    pub fn sim_config(&self, scenario: ScenarioId) -> SimConfig {
        let mut session = self.session.clone();
        if scenario == ScenarioId::Overflow {
            session.timeline.history_seconds = 1.0;
            session.timeline.past_delay_seconds = session.timeline.past_delay_seconds.max(1.5);
        }

        SimConfig {
            seed: self.seed,
            tick_rate_hz: self.tick_rate_hz,
            entity_count: match scenario {
                ScenarioId::SpawnChurn => 4,
                ScenarioId::LateJoin => 6,
                _ => 8,
            },
            session,
            ..Default::default()
        }
    }

    fn execute(&self, scenario: ScenarioId, export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let config = self.sim_config(scenario);
        let duration = self
            .duration_secs
            .max(scenario.min_duration_secs() + config.session.timeline.past_delay_seconds);

        let world = match SimWorld::new(config) {
            Ok(world) => world,
            Err(e) => return self.setup_failure(scenario, e),
        };

        let mut run = Run::new(world, export, self.export_every);
        let verdict = match scenario {
            ScenarioId::Baseline => run_baseline(&mut run, duration),
            ScenarioId::RoleFlip => run_role_flip(&mut run, duration),
            ScenarioId::SpawnChurn => run_spawn_churn(&mut run, duration),
            ScenarioId::Stall => run_stall(&mut run, duration),
            ScenarioId::LateJoin => run_late_join(&mut run, duration),
            ScenarioId::Overflow => run_overflow(&mut run, duration),
        }
        .and_then(|()| run.check_error_bound());

        run.finish(scenario, self.seed, verdict)
    }

    fn setup_failure(&self, scenario: ScenarioId, error: SimError) -> ScenarioResult {
        warn!("Scenario {} failed to set up: {}", scenario, error);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            final_entity_count: 0,
            failure_reason: Some(error.to_string()),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// One scenario in progress.
struct Run<'a> {
    world: SimWorld,
    metrics: ScenarioMetrics,
    export: Option<&'a mut SimExport>,
    export_every: u64,

    /// Proxy error is only compared from this time on
    measure_from: Option<f64>,

    /// When the past view last became active
    active_since: Option<f64>,

    error_sum: f64,
}

impl<'a> Run<'a> {
    fn new(world: SimWorld, export: Option<&'a mut SimExport>, export_every: u64) -> Self {
        Self {
            world,
            metrics: ScenarioMetrics::default(),
            export,
            export_every,
            measure_from: None,
            active_since: None,
            error_sum: 0.0,
        }
    }

    fn delay(&self) -> f64 {
        self.world.config.session.timeline.past_delay_seconds
    }

    fn sample_interval(&self) -> f64 {
        self.world.config.session.timeline.sample_interval()
    }

    /// Compares proxies to ground truth once the history reaching back
    /// `delay` from `now` was recorded after `start`.
    fn measure_after(&mut self, start: f64) {
        self.measure_from = Some(start + self.delay() + SETTLE_SECS);
    }

    fn start_recorder(&mut self) -> Result<(), String> {
        self.world.start_recorder().map_err(|e| e.to_string())?;
        let now = self.world.time();
        self.measure_after(now);
        Ok(())
    }

    fn step(&mut self) -> WorldTick {
        let dt = self.world.config.dt();
        self.step_with_dt(dt, Vec::new())
    }

    fn step_with_dt(&mut self, dt: f64, mut notes: Vec<SimEvent>) -> WorldTick {
        let proxies_before = self.world.runtime().projector().proxy_count();
        let tick = self.world.tick_with_dt(dt);
        let report = &tick.report;

        let created = report.projector.created;
        let proxies_after = self.world.runtime().projector().proxy_count();

        let metrics = &mut self.metrics;
        metrics.sample_passes += u64::from(report.sampled);
        metrics.proxies_created += created as u64;
        metrics.proxies_released += (proxies_before + created).saturating_sub(proxies_after) as u64;
        metrics.visibility_toggles += u64::from(report.projector.toggled.is_some());
        metrics.roles_applied += tick.roles.applied.len() as u64;
        metrics.role_timeouts += tick.roles.timed_out.len() as u64;

        for error in &tick.roles.timed_out {
            notes.push(SimEvent::warn(error.to_string()));
        }
        for event in &tick.events {
            notes.push(SimEvent::info(match event {
                LifecycleEvent::Spawned(id) => format!("spawned {id}"),
                LifecycleEvent::Despawned(id) => format!("despawned {id}"),
            }));
        }

        self.measure_error(report.now, report.projector.active);

        if self.export.is_some() && (report.tick % self.export_every == 0 || !notes.is_empty()) {
            let frame = self.frame(report.now, report.view, notes);
            if let Some(export) = self.export.as_mut() {
                export.add_frame(frame);
            }
        }

        tick
    }

    fn measure_error(&mut self, now: f64, active: bool) {
        if !active {
            self.active_since = None;
            return;
        }
        let since = *self.active_since.get_or_insert(now);
        let Some(from) = self.measure_from else {
            return;
        };
        if now < from || now - since < SETTLE_SECS {
            return;
        }

        let delay = self.delay();
        // Worst case: half a sample gap of quantization plus one gap of smoothing lag
        let window = 2.0 * self.sample_interval() + self.world.config.dt();
        let position_bound = self.world.config.max_speed * window + ERROR_SLACK;

        for proxy in self.world.runtime().projector().proxies() {
            let Some(entity) = self.world.oracle.entity(proxy.source) else {
                continue;
            };
            if now - entity.spawned_at < delay + SETTLE_SECS {
                continue;
            }
            let Some(truth) = self.world.oracle.pose_at(proxy.source, now - delay) else {
                continue;
            };

            let position_error = (proxy.pose.position - truth.position).norm();
            let angle_error = proxy.pose.orientation.angle_to(&truth.orientation);
            let angle_bound = entity.yaw_rate.abs() * window + ERROR_SLACK;

            self.metrics.error_samples += 1;
            self.error_sum += position_error;
            self.metrics.max_proxy_error = self.metrics.max_proxy_error.max(position_error);
            self.metrics.max_angle_error = self.metrics.max_angle_error.max(angle_error);

            if position_error > position_bound || angle_error > angle_bound {
                self.metrics.error_violations += 1;
                debug!(
                    "t={:.2}: proxy {} off by {:.3}m / {:.3}rad",
                    now, proxy.name, position_error, angle_error
                );
            }
        }
    }

    fn check_error_bound(&self) -> Result<(), String> {
        if self.metrics.error_violations > 0 {
            return Err(format!(
                "{} of {} proxy poses strayed from ground truth (max {:.3}m, {:.3}rad)",
                self.metrics.error_violations,
                self.metrics.error_samples,
                self.metrics.max_proxy_error,
                self.metrics.max_angle_error
            ));
        }
        Ok(())
    }

    fn frame(&self, now: f64, view: ViewMode, events: Vec<SimEvent>) -> SimFrame {
        let projector = self.world.runtime().projector();
        let entities = self
            .world
            .oracle
            .entities()
            .map(|entity| {
                let proxy = projector.proxy(entity.id);
                EntityFrame {
                    id: entity.id.to_string(),
                    name: entity.name.clone(),
                    present: PoseRecord::from(&entity.pose),
                    past: proxy.map(|p| PoseRecord::from(&p.pose)),
                    proxy_visible: proxy.is_some_and(|p| p.visible),
                }
            })
            .collect();

        SimFrame {
            time_sec: now,
            view: format!("{view:?}"),
            role: self.world.local_role().get().map(|role| role.to_string()),
            tracked: self.world.tracked_count(),
            entities,
            events,
        }
    }

    fn finish(mut self, scenario: ScenarioId, seed: u64, verdict: Result<(), String>) -> ScenarioResult {
        if self.metrics.error_samples > 0 {
            self.metrics.mean_proxy_error = self.error_sum / self.metrics.error_samples as f64;
        }

        let passed = verdict.is_ok();
        if let Err(reason) = &verdict {
            warn!("Scenario {} failed: {}", scenario, reason);
        }
        info!(
            "Scenario {} finished: ticks={} samples={} max_error={:.3}m",
            scenario,
            self.world.tick_count(),
            self.metrics.sample_passes,
            self.metrics.max_proxy_error
        );

        ScenarioResult {
            scenario,
            seed,
            passed,
            total_ticks: self.world.tick_count(),
            final_time_secs: self.world.time(),
            final_entity_count: self.world.oracle.entity_count(),
            failure_reason: verdict.err(),
            metrics: self.metrics,
        }
    }
}

fn ticks_for(run: &Run<'_>, secs: f64) -> u64 {
    (secs * run.world.config.tick_rate_hz as f64).round().max(1.0) as u64
}

/// Steady Past view: proxies trail ground truth by the delay.
fn run_baseline(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    run.world.populate();
    run.start_recorder()?;
    run.world.join_as(Role::Past);

    for _ in 0..ticks_for(run, duration) {
        let tick = run.step();
        if tick.report.view != ViewMode::Proxy {
            return Err(format!("t={:.2}: Past viewer sees {:?}", tick.report.now, tick.report.view));
        }
    }

    if run.metrics.error_samples == 0 {
        return Err("no proxy poses were compared".to_string());
    }
    let expected = run.world.config.entity_count as u64;
    if run.metrics.proxies_created != expected {
        return Err(format!(
            "created {} proxies for {} entities",
            run.metrics.proxies_created, expected
        ));
    }
    Ok(())
}

/// Past/Present swap every 2 seconds.
fn run_role_flip(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    const FLIP_SECS: f64 = 2.0;

    run.world.populate();
    run.start_recorder()?;
    run.world.join_as(Role::Past);

    let local = run.world.local_client();
    let hides = run.world.config.session.projector.hide_when_inactive;
    let flip_every = ticks_for(run, FLIP_SECS);
    let mut role = Role::Past;
    let mut assignments = 1u64;

    for i in 1..=ticks_for(run, duration) {
        if i % flip_every == 0 {
            role = if role == Role::Past { Role::Present } else { Role::Past };
            run.world.director_mut().assign(local, role);
            assignments += 1;
        }

        let tick = run.step();
        let active = tick.report.projector.active;
        if active != (role == Role::Past) {
            return Err(format!("t={:.2}: projector active={} for {}", tick.report.now, active, role));
        }

        let expected_view = if active { ViewMode::Proxy } else { ViewMode::Direct };
        if tick.report.view != expected_view {
            return Err(format!("t={:.2}: {} sees {:?}", tick.report.now, role, tick.report.view));
        }

        let projector = run.world.runtime().projector();
        let visible = !hides || active;
        if let Some(proxy) = projector.proxies().find(|p| p.visible != visible) {
            return Err(format!(
                "t={:.2}: {} visible={} while past view active={}",
                tick.report.now, proxy.name, proxy.visible, active
            ));
        }
    }

    let entities = run.world.config.entity_count as u64;
    if run.metrics.proxies_created != entities {
        return Err(format!(
            "proxies re-created across flips ({} for {} entities)",
            run.metrics.proxies_created, entities
        ));
    }
    let expected_toggles = if hides { assignments } else { 0 };
    if run.metrics.visibility_toggles != expected_toggles {
        return Err(format!(
            "{} visibility toggles for {} role changes",
            run.metrics.visibility_toggles, assignments
        ));
    }
    Ok(())
}

/// Spawns and despawns while the Past view is up; no proxy outlives its entity.
fn run_spawn_churn(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    run.world.populate();
    run.start_recorder()?;
    run.world.join_as(Role::Past);

    let spawn_every = ticks_for(run, 0.5);
    let despawn_every = ticks_for(run, 0.75);
    let mut spawned = run.world.config.entity_count as u64;
    let mut despawned = 0u64;

    for i in 1..=ticks_for(run, duration) {
        if i % spawn_every == 0 {
            let k = spawned as f64;
            run.world.spawn_entity(
                Vector3::new(k * 2.0, -5.0, 0.0),
                Vector3::new(1.0, 0.5 * (k % 3.0 - 1.0), 0.0),
                0.3,
            );
            spawned += 1;
        }
        if i % despawn_every == 0 && run.world.oracle.entity_count() > 1 {
            if let Some(oldest) = run.world.oracle.oldest_entity() {
                run.world.despawn_entity(oldest);
                despawned += 1;
            }
        }

        let tick = run.step();
        let now = tick.report.now;
        let live = run.world.oracle.entity_count();

        let tracked = run.world.tracked_count();
        if tracked != live {
            return Err(format!("t={now:.2}: recorder tracks {tracked} of {live} entities"));
        }

        let projector = run.world.runtime().projector();
        if let Some(orphan) = projector.proxies().find(|p| !run.world.oracle.contains(p.source)) {
            return Err(format!("t={now:.2}: orphaned proxy {}", orphan.name));
        }
        if projector.proxy_count() != live {
            return Err(format!(
                "t={now:.2}: {} proxies for {live} entities",
                projector.proxy_count()
            ));
        }
    }

    if run.metrics.proxies_released != despawned {
        return Err(format!(
            "released {} proxies for {} despawns",
            run.metrics.proxies_released, despawned
        ));
    }
    if despawned == 0 {
        return Err("no entity was despawned".to_string());
    }
    Ok(())
}

/// One 2-second frame: a single sample at the stall, then the cadence
/// resumes one interval later.
fn run_stall(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    const STALL_SECS: f64 = 2.0;

    run.world.populate();
    run.start_recorder()?;
    run.world.join_as(Role::Past);

    let stall_at = run.delay() + 1.0;
    let Some(probe) = run.world.oracle.oldest_entity() else {
        return Err("no entities".to_string());
    };

    while run.world.time() < stall_at {
        run.step();
    }

    let newest_time = |run: &Run<'_>| {
        run.world.recorder().and_then(|recorder| {
            let recorder = recorder.borrow();
            recorder.history(probe).and_then(|h| h.newest()).map(|s| s.time())
        })
    };
    let before = newest_time(run).ok_or("probe entity has no history before the stall")?;

    // History across the gap isn't comparable to the trail
    run.measure_from = None;
    let note = SimEvent::warn(format!("frame stall of {STALL_SECS}s"));
    let tick = run.step_with_dt(STALL_SECS, vec![note]);
    let now = tick.report.now;
    run.measure_after(now);

    if !tick.report.sampled {
        return Err(format!("t={now:.2}: no sample pass after the stall"));
    }

    {
        let Some(recorder) = run.world.recorder() else {
            return Err("recorder vanished".to_string());
        };
        let recorder = recorder.borrow();
        let interval = recorder.config().sample_interval();

        let expected_next = now + interval;
        if (recorder.next_sample_time() - expected_next).abs() > 1e-9 {
            return Err(format!(
                "next sample at {:.4}, expected {:.4}",
                recorder.next_sample_time(),
                expected_next
            ));
        }

        let Some(history) = recorder.history(probe) else {
            return Err("probe entity lost its history".to_string());
        };
        let after_gap: Vec<f64> = history
            .iter()
            .map(|s| s.time())
            .filter(|t| *t > before)
            .collect();
        if after_gap != [now] {
            return Err(format!("expected one sample at {now:.3} after the stall, got {after_gap:?}"));
        }
    }

    let mut last_sample = now;
    while run.world.time() < duration {
        let tick = run.step();
        if tick.report.sampled {
            let gap = tick.report.now - last_sample;
            if gap + 1e-6 < run.sample_interval() {
                return Err(format!("t={:.2}: samples only {gap:.4}s apart", tick.report.now));
            }
            last_sample = tick.report.now;
        }
    }
    Ok(())
}

/// Recorder starts after the world, the viewer spawns after its role was
/// assigned, and a client whose viewer never appears times out.
fn run_late_join(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    const VIEWER_AT: f64 = 0.5;
    const RECORDER_AT: f64 = 1.0;
    let ghost = ClientId(1);

    run.world.populate();
    let local = run.world.local_client();
    run.world.connect_local();
    run.world.director_mut().assign(local, Role::Past);
    run.world.director_mut().connect(ghost);

    let hud_enabled = run.world.config.session.timeline.enable_debug_hud;
    let entities = run.world.config.entity_count;
    let mut missing_huds = 0u32;
    let mut viewer_spawned = false;
    let mut applied_at = None;

    while run.world.time() < duration {
        let now = run.world.time();
        if !viewer_spawned && now >= VIEWER_AT {
            run.world.spawn_local_viewer();
            viewer_spawned = true;
        }
        if !run.world.runtime().session().has_recorder() && now >= RECORDER_AT {
            run.start_recorder()?;
        }

        let tick = run.step();
        let now = tick.report.now;
        let recording = run.world.runtime().session().has_recorder();

        if tick.roles.applied.contains(&local) {
            applied_at = Some(now);
        }

        if recording {
            if run.world.tracked_handles() != entities {
                return Err(format!(
                    "t={now:.2}: {} of {entities} handles enrolled after recorder start",
                    run.world.tracked_handles()
                ));
            }
        } else {
            if run.world.tracked_handles() != 0 {
                return Err(format!("t={now:.2}: handles enrolled without a recorder"));
            }
            if let Some(text) = &tick.report.hud {
                if text != MISSING_RECORDER_TEXT {
                    return Err(format!("t={now:.2}: HUD shows {text:?} without a recorder"));
                }
                missing_huds += 1;
            }
        }
    }

    match applied_at {
        Some(at) if at >= VIEWER_AT => {}
        Some(at) => return Err(format!("role applied at {at:.2}, before the viewer spawned")),
        None => return Err("local role was never applied".to_string()),
    }
    if hud_enabled && missing_huds == 0 {
        return Err("HUD never reported the missing recorder".to_string());
    }
    if run.metrics.role_timeouts != 1 {
        return Err(format!(
            "expected the ghost client to time out once, saw {} timeouts",
            run.metrics.role_timeouts
        ));
    }
    if run.world.runtime().view().mode() != ViewMode::Proxy {
        return Err("late viewer never switched to the past view".to_string());
    }
    let proxies = run.world.runtime().projector().proxy_count();
    if proxies != entities {
        return Err(format!("{proxies} proxies for {entities} entities"));
    }
    Ok(())
}

/// Delay longer than the history: buffers stay full and queries clamp to
/// the oldest sample.
fn run_overflow(run: &mut Run<'_>, duration: f64) -> Result<(), String> {
    run.world.populate();
    run.world.start_recorder().map_err(|e| e.to_string())?;
    run.world.join_as(Role::Past);

    let timeline = run.world.config.session.timeline.clone();
    let capacity = timeline.capacity();
    let full_after = 2.0 * timeline.history_seconds + 0.5;
    let mut full_checks = 0u32;

    for _ in 0..ticks_for(run, duration) {
        let tick = run.step();
        let now = tick.report.now;

        let Some(recorder) = run.world.recorder() else {
            return Err("recorder vanished".to_string());
        };
        let recorder = recorder.borrow();
        let target = recorder.past_view_time(now);

        for id in recorder.tracked_ids() {
            let Some(history) = recorder.history(id) else {
                continue;
            };
            if history.len() > capacity {
                return Err(format!("t={now:.2}: {} samples in a buffer of {capacity}", history.len()));
            }
            if now < full_after {
                continue;
            }
            if history.len() != capacity {
                return Err(format!("t={now:.2}: buffer holds {} of {capacity}", history.len()));
            }

            let oldest = history.oldest().map(|s| s.time());
            let answer = recorder.query_past(id, target).map(|s| s.time()).ok();
            if answer != oldest {
                return Err(format!(
                    "t={now:.2}: query at {target:.2} returned {answer:?}, oldest is {oldest:?}"
                ));
            }
            full_checks += 1;
        }
    }

    if full_checks == 0 {
        return Err("run too short to fill the history".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(42).with_duration(0.0)
    }

    fn assert_passes(scenario: ScenarioId) -> ScenarioResult {
        let result = runner().run(scenario);
        assert!(
            result.passed,
            "{} failed: {:?}",
            scenario,
            result.failure_reason
        );
        result
    }

    #[test]
    fn test_baseline_tracks_ground_truth() {
        let result = assert_passes(ScenarioId::Baseline);
        assert!(result.metrics.error_samples > 0);
        assert!(result.metrics.max_proxy_error < 0.5);
        assert_eq!(result.metrics.proxies_created, 8);
    }

    #[test]
    fn test_role_flip_toggles_without_recreation() {
        let result = assert_passes(ScenarioId::RoleFlip);
        assert_eq!(result.metrics.proxies_created, 8);
        assert!(result.metrics.visibility_toggles >= 3);
    }

    #[test]
    fn test_spawn_churn_leaves_no_orphans() {
        let result = assert_passes(ScenarioId::SpawnChurn);
        assert!(result.metrics.proxies_released > 0);
    }

    #[test]
    fn test_stall_snaps_forward() {
        assert_passes(ScenarioId::Stall);
    }

    #[test]
    fn test_late_join_defers_and_times_out() {
        let result = assert_passes(ScenarioId::LateJoin);
        assert_eq!(result.metrics.role_timeouts, 1);
        assert!(result.metrics.roles_applied >= 1);
    }

    #[test]
    fn test_overflow_clamps_to_oldest() {
        assert_passes(ScenarioId::Overflow);
    }

    #[test]
    fn test_duration_covers_delay() {
        let result = runner().run(ScenarioId::Baseline);
        let expected = ScenarioId::Baseline.min_duration_secs() + 1.5;
        assert!(result.final_time_secs >= expected - 0.02);
    }

    #[test]
    fn test_overflow_config_shrinks_history() {
        let config = runner().sim_config(ScenarioId::Overflow);
        assert_eq!(config.session.timeline.history_seconds, 1.0);
        assert!(config.session.timeline.past_delay_seconds >= 1.5);
        assert_eq!(runner().sim_config(ScenarioId::Baseline).session, SessionConfig::default());
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = ScenarioRunner::new(9).with_duration(0.0).run(ScenarioId::SpawnChurn);
        let b = ScenarioRunner::new(9).with_duration(0.0).run(ScenarioId::SpawnChurn);
        assert_eq!(a.total_ticks, b.total_ticks);
        assert_eq!(a.metrics.max_proxy_error, b.metrics.max_proxy_error);
        assert_eq!(a.final_entity_count, b.final_entity_count);
    }

    #[test]
    fn test_export_collects_frames() {
        let mut export = SimExport::new("baseline", 42);
        let result = runner().with_export_every(30).run_exported(ScenarioId::Baseline, &mut export);

        assert!(!export.frames.is_empty());
        assert_eq!(export.passed, result.passed);
        assert!(export.max_proxy_error.is_some());
        let frame = export.frames.last().unwrap();
        assert_eq!(frame.entities.len(), 8);
        assert!(frame.entities.iter().all(|e| e.past.is_some() && e.proxy_visible));
    }
}
