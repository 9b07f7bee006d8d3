//! PPF Timeline - Temporal Snapshot Recording and Past-View Projection
//!
//! This library lets one viewer see the shared world as it was a fixed delay
//! ago while everyone else sees it live:
//! 1. **Recording**: every trackable entity's pose is sampled into a bounded
//!    ring buffer at a fixed cadence
//! 2. **Projection**: while the viewer holds the delayed role, render-only
//!    proxies are steered toward the poses recorded `past_delay_seconds` ago
//! 3. **View selection**: the viewer's camera renders either the live layer
//!    or the proxy layer, never both

pub mod config;
pub mod deferred;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod layers;
pub mod projector;
pub mod recorder;
pub mod role;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod snapshot;
pub mod trackable;
pub mod view;

// Re-export key types for convenience
pub use config::{HudConfig, LayerConfig, ProjectorConfig, SessionConfig, TimelineConfig};
pub use deferred::{DeferredQueue, DrainReport};
pub use diagnostics::{DebugHud, TimelineStatus};
pub use error::TimelineError;
pub use history::HistoryBuffer;
pub use layers::{LayerId, LayerMask, LayerTable};
pub use projector::{PlaybackProjector, ProjectorTick, ProxyVisual};
pub use recorder::Recorder;
pub use role::{Role, RoleCell, RoleWatch};
pub use runtime::{TickReport, TimelineRuntime};
pub use scene::{Appearance, Scene, TrackableDesc};
pub use session::{RecorderHandle, Session, WeakRecorder};
pub use snapshot::{Pose, Snapshot};
pub use trackable::TrackableHandle;
pub use view::{ViewMode, ViewSelector};
