//! Simulation context implementing TimelineContext for deterministic testing.

use async_trait::async_trait;
use ppf_env::{EnvError, TimelineContext};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `TimelineContext` using:
/// - A virtual clock that only moves when advanced
/// - A seeded ChaCha8 RNG shared by every clone
/// - Simulated sleep that advances virtual time
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Deterministic RNG for scripted decisions
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = lock(&self.virtual_time_ns);
        *time += duration.as_nanos() as u64;
    }

    /// Sets the virtual time to a specific value.
    ///
    /// # Returns
    /// * `Err(EnvError::ContextError)` - `time_ns` is earlier than the current
    ///   time; the virtual clock never runs backwards
    pub fn set_time(&self, time_ns: u64) -> Result<(), EnvError> {
        let mut time = lock(&self.virtual_time_ns);
        if time_ns < *time {
            return Err(EnvError::context(format!(
                "cannot rewind virtual clock from {}ns to {}ns",
                *time, time_ns
            )));
        }
        *time = time_ns;
        Ok(())
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *lock(&self.virtual_time_ns)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn pick_index(&self, len: usize) -> usize {
        lock(&self.rng).gen_range(0..len)
    }
}

/// A poisoned clock is still a valid clock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
        }
    }
}

#[async_trait]
impl TimelineContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
