//! Fixed-capacity circular history of snapshots for one entity.
//!
//! Lookups are a linear nearest-time scan. Capacity is bounded by
//! `samples_per_second * history_seconds` (a few hundred entries at most),
//! so the scan stays cheap.

use crate::snapshot::Snapshot;

/// Ring buffer of [`Snapshot`]s, oldest overwritten first.
///
/// Entries are ordered by insertion, not by timestamp. Timestamps are
/// expected to be non-decreasing but this is not validated.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    /// Backing storage, grows to `capacity` then is overwritten in place
    storage: Vec<Snapshot>,

    /// Maximum number of entries
    capacity: usize,

    /// Next write index
    head: usize,

    /// Number of valid entries (<= capacity)
    count: usize,
}

impl HistoryBuffer {
    /// Creates an empty buffer.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "HistoryBuffer capacity must be at least 1");
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Appends a snapshot, overwriting the oldest one when full.
    pub fn append(&mut self, snapshot: Snapshot) {
        if self.storage.len() < self.capacity {
            self.storage.push(snapshot);
        } else {
            self.storage[self.head] = snapshot;
        }
        self.head = (self.head + 1) % self.capacity;

        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// Returns the snapshot closest in time to `target_time`.
    ///
    /// Scans newest to oldest and only replaces the best candidate on a
    /// strictly smaller time difference, so equidistant candidates resolve
    /// to the most recently recorded one. `None` iff the buffer is empty.
    pub fn query_nearest(&self, target_time: f64) -> Option<Snapshot> {
        let mut best: Option<(f64, &Snapshot)> = None;

        for i in 0..self.count {
            let snapshot = &self.storage[self.newest_minus(i)];
            let delta = (snapshot.time() - target_time).abs();

            match best {
                Some((best_delta, _)) if delta >= best_delta => {}
                _ => best = Some((delta, snapshot)),
            }
        }

        best.map(|(_, snapshot)| *snapshot)
    }

    /// Most recently appended snapshot.
    pub fn newest(&self) -> Option<&Snapshot> {
        if self.count == 0 {
            return None;
        }
        Some(&self.storage[self.newest_minus(0)])
    }

    /// Oldest retained snapshot.
    pub fn oldest(&self) -> Option<&Snapshot> {
        if self.count == 0 {
            return None;
        }
        Some(&self.storage[self.newest_minus(self.count - 1)])
    }

    pub fn newest_time_or(&self, fallback: f64) -> f64 {
        self.newest().map_or(fallback, Snapshot::time)
    }

    pub fn oldest_time_or(&self, fallback: f64) -> f64 {
        self.oldest().map_or(fallback, Snapshot::time)
    }

    /// Iterates valid entries oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + '_ {
        (0..self.count)
            .rev()
            .map(move |back| &self.storage[self.newest_minus(back)])
    }

    /// Storage index of the entry `back` steps before the newest one.
    fn newest_minus(&self, back: usize) -> usize {
        (self.head + self.capacity - 1 - back) % self.capacity
    }
}
