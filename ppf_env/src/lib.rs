//! Past/Present Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the timeline core run in
//! both **Production** (tokio wall clock) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! The timeline core never reads a clock or a socket on its own. Everything
//! that comes from "outside" is routed through this crate:
//! - Time (`now()`, `sleep()`)
//! - Entity lifecycle (`Spawned` / `Despawned` notifications)
//! - Identities (`EntityId`, `ClientId`)
//!
//! # Example
//!
//! ```ignore
//! use ppf_env::{TimelineContext, lifecycle_channel};
//!
//! async fn frame_loop<Ctx: TimelineContext>(ctx: &Ctx) {
//!     let (_spawner, mut events) = lifecycle_channel();
//!     loop {
//!         for event in events.drain() {
//!             handle(event);
//!         }
//!         tick(ctx.now_secs());
//!         ctx.sleep(Duration::from_millis(16)).await;
//!     }
//! }
//! ```

mod context;
mod lifecycle;
mod types;
mod error;
mod tokio_impl;

pub use context::TimelineContext;
pub use lifecycle::{lifecycle_channel, LifecycleEvent, LifecycleReceiver, LifecycleSender};
pub use types::{ClientId, EntityId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
