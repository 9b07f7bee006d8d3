//! Timeline Runtime - drives one session's timeline from an environment context.
//!
//! The integration layer between the pure timeline components (recorder,
//! projector, view selector, HUD) and the environment abstraction
//! ([`TimelineContext`]).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TimelineRuntime                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: TimelineContext                 │   │
//! │  │  • now() → timestamp for every snapshot              │   │
//! │  │  • sleep() → frame pacing (realtime mode)            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                               │
//! │  ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌─────────────┐    │
//! │  │ RECORDER │ │ PROJECTOR │ │   VIEW   │ │  DEBUG HUD  │    │
//! │  │ (session)│ │ (proxies) │ │ (layers) │ │  (status)   │    │
//! │  └──────────┘ └───────────┘ └──────────┘ └─────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ppf_timeline::{SessionConfig, TimelineRuntime};
//! use ppf_env::TokioContext;
//!
//! let mut runtime = TimelineRuntime::new(Arc::new(TokioContext::new()), SessionConfig::default())?;
//! runtime.start()?;
//!
//! loop {
//!     let report = runtime.tick(&scene, &role);
//!     camera.set_culling_mask(report.culling_mask);
//! }
//! ```

use crate::config::SessionConfig;
use crate::diagnostics::DebugHud;
use crate::error::TimelineError;
use crate::layers::{LayerMask, LayerTable};
use crate::projector::{PlaybackProjector, ProjectorTick};
use crate::role::RoleCell;
use crate::scene::Scene;
use crate::session::{RecorderHandle, Session};
use crate::view::{ViewMode, ViewSelector};

use ppf_env::{LifecycleEvent, TimelineContext};
use std::sync::Arc;
use tracing::debug;

/// What happened during one [`TimelineRuntime::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Tick number (1-based)
    pub tick: u64,

    /// Context time the tick ran at
    pub now: f64,

    /// A sample pass ran this tick
    pub sampled: bool,

    pub projector: ProjectorTick,

    pub view: ViewMode,

    /// Camera culling mask for this frame
    pub culling_mask: LayerMask,

    /// Fresh HUD text, if the HUD refreshed
    pub hud: Option<String>,
}

/// One session's timeline, generic over the clock it runs on.
pub struct TimelineRuntime<Ctx: TimelineContext> {
    /// Environment context
    context: Arc<Ctx>,

    session: Session,

    layers: LayerTable,

    projector: PlaybackProjector,

    view: ViewSelector,

    hud: DebugHud,

    /// Current tick number
    tick_count: u64,
}

impl<Ctx: TimelineContext> TimelineRuntime<Ctx> {
    /// Builds the runtime and its render layers from `config`.
    ///
    /// No recorder exists until [`start`](Self::start).
    pub fn new(context: Arc<Ctx>, config: SessionConfig) -> Result<Self, TimelineError> {
        let layers = LayerTable::from_config(&config.layers)?;
        Self::with_layers(context, config, layers)
    }

    /// Builds the runtime against an existing layer table.
    ///
    /// Layers missing from `layers` degrade the projector and view selector
    /// to the direct view.
    pub fn with_layers(
        context: Arc<Ctx>,
        config: SessionConfig,
        layers: LayerTable,
    ) -> Result<Self, TimelineError> {
        let session = Session::new(config)?;
        let config = session.config();

        let projector = PlaybackProjector::new(config.projector.clone(), &layers, &config.layers);
        let view = ViewSelector::new(&layers, &config.layers);
        let hud = DebugHud::new(&config.hud, config.timeline.enable_debug_hud);

        Ok(Self {
            context,
            session,
            layers,
            projector,
            view,
            hud,
            tick_count: 0,
        })
    }

    /// Starts the session recorder at the current context time.
    pub fn start(&mut self) -> Result<RecorderHandle, TimelineError> {
        let now = self.now_secs();
        self.session.start_recorder(now)
    }

    /// Returns the current context time in seconds.
    pub fn now_secs(&self) -> f64 {
        self.context.now_secs()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Runs one frame: sample, project, select view, refresh HUD.
    pub fn tick<S: Scene + ?Sized>(&mut self, scene: &S, role: &RoleCell) -> TickReport {
        self.tick_count += 1;
        let now = self.now_secs();
        let handle = self.session.recorder();

        let sampled = handle
            .as_ref()
            .and_then(RecorderHandle::try_borrow_mut)
            .map_or(false, |mut recorder| recorder.sample_all_due(now, scene));

        let recorder = handle.as_ref().and_then(RecorderHandle::try_borrow);
        let projector = self.projector.update(now, recorder.as_deref(), scene, role);
        let culling_mask = self.view.select(role);
        let hud = self.hud.poll(now, recorder.as_deref()).map(str::to_owned);

        TickReport {
            tick: self.tick_count,
            now,
            sampled,
            projector,
            view: self.view.mode(),
            culling_mask,
            hud,
        }
    }

    /// Applies an entity lifecycle event to the runtime-owned state.
    ///
    /// A despawned entity's proxy is released. Recorder enrollment is owned
    /// by the entity's [`TrackableHandle`](crate::TrackableHandle).
    pub fn on_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Spawned(id) => debug!("TimelineRuntime: {} spawned", id),
            LifecycleEvent::Despawned(id) => {
                self.projector.release(id);
            }
        }
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    pub fn projector(&self) -> &PlaybackProjector {
        &self.projector
    }

    pub fn projector_mut(&mut self) -> &mut PlaybackProjector {
        &mut self.projector
    }

    pub fn view(&self) -> &ViewSelector {
        &self.view
    }

    pub fn hud_mut(&mut self) -> &mut DebugHud {
        &mut self.hud
    }
}
