//! Deferred application queue.
//!
//! Operations whose target may not exist yet (e.g. a role assignment for a
//! viewer that hasn't spawned) wait here and are retried once per drain. Each
//! retry spends one attempt; when the budget runs out the operation is
//! dropped and reported as [`TimelineError::DeferredTimeout`].

use crate::error::TimelineError;

use std::fmt::Display;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Pending<K, Op> {
    key: K,
    op: Op,
    attempts: u32,
}

/// Outcome of one [`DeferredQueue::drain`].
#[derive(Debug, Default)]
pub struct DrainReport<K> {
    /// Keys whose operation was applied and removed
    pub applied: Vec<K>,

    /// Operations that exhausted their budget
    pub timed_out: Vec<TimelineError>,
}

/// Keyed pending operations with a bounded retry budget.
#[derive(Debug, Clone)]
pub struct DeferredQueue<K, Op> {
    pending: Vec<Pending<K, Op>>,
    max_attempts: u32,
}

impl<K, Op> DeferredQueue<K, Op>
where
    K: PartialEq + Clone + Display,
{
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: Vec::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pending.iter().any(|p| &p.key == key)
    }

    /// Queues `op` for `key`, replacing any older pending op for that key.
    ///
    /// A replaced op's attempt count starts over.
    pub fn push(&mut self, key: K, op: Op) {
        if let Some(slot) = self.pending.iter_mut().find(|p| p.key == key) {
            debug!("DeferredQueue: replaced pending op for {}", key);
            slot.op = op;
            slot.attempts = 0;
            return;
        }
        self.pending.push(Pending {
            key,
            op,
            attempts: 0,
        });
    }

    /// Drops the pending op for `key`, if any.
    pub fn cancel(&mut self, key: &K) -> Option<Op> {
        let index = self.pending.iter().position(|p| &p.key == key)?;
        Some(self.pending.remove(index).op)
    }

    /// Tries every pending op once, in insertion order.
    ///
    /// `apply` returns true when the target was available and the op took
    /// effect.
    pub fn drain<F>(&mut self, mut apply: F) -> DrainReport<K>
    where
        F: FnMut(&K, &Op) -> bool,
    {
        let mut report = DrainReport {
            applied: Vec::new(),
            timed_out: Vec::new(),
        };
        let max_attempts = self.max_attempts;

        self.pending.retain_mut(|pending| {
            if apply(&pending.key, &pending.op) {
                report.applied.push(pending.key.clone());
                return false;
            }

            pending.attempts += 1;
            if pending.attempts >= max_attempts {
                let err = TimelineError::DeferredTimeout {
                    key: pending.key.to_string(),
                    attempts: pending.attempts,
                };
                warn!("DeferredQueue: {}", err);
                report.timed_out.push(err);
                return false;
            }
            true
        });

        report
    }
}
