//! Past/Present Deterministic Simulation Harness
//!
//! Runs the timeline core against a seeded, virtual-clock world so the past
//! view can be checked against exact ground truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: Virtual clock advances only when the world ticks
//! - **Motion**: Entity drift derived from a single 64-bit seed
//! - **Roles**: Scripted director stands in for the host's role service
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      SimWorld                        │
//! │  ┌────────────┐   lifecycle   ┌───────────────────┐  │
//! │  │   Oracle   │──────────────►│ TrackableHandles  │  │
//! │  │ (physics)  │               └─────────┬─────────┘  │
//! │  └─────┬──────┘                         │ register   │
//! │        │ Scene                ┌─────────▼─────────┐  │
//! │        └─────────────────────►│  TimelineRuntime  │  │
//! │  ┌──────────────┐  RoleCell   │ recorder/projector│  │
//! │  │ RoleDirector │────────────►│  view / HUD       │  │
//! │  └──────────────┘             └───────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ppf_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Baseline);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod oracle;
mod roles;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{EntityFrame, PoseRecord, SimEvent, SimExport, SimFrame};
pub use oracle::{GroundTruthEntity, Oracle};
pub use roles::{RoleDirector, ROLE_POOL};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld, WorldTick};
