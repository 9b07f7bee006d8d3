//! Core environment context trait for the timeline runtime.

use async_trait::async_trait;
use std::time::Duration;

/// The central interface for clock access.
///
/// This trait abstracts the "real world" so the recorder and projector can
/// run against a wall clock in production and a virtual clock in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext`, session time on the tokio timer
/// - **Simulation**: `SimContext` - manually advanced virtual clock
#[async_trait]
pub trait TimelineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// This is the simulation clock every snapshot is stamped with.
    fn now(&self) -> Duration;

    /// Returns `now()` as fractional seconds.
    fn now_secs(&self) -> f64 {
        self.now().as_secs_f64()
    }

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
