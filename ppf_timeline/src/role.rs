//! Role value shared with the role-assignment collaborator.
//!
//! The collaborator writes, the core only reads. Each consumer keeps its own
//! [`RoleWatch`] and detects transitions by comparing against the value it
//! saw last tick.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Perspective assigned to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    None,
    Past,
    Present,
    Future,
}

impl Role {
    /// True only for the delayed perspective.
    pub fn is_delayed(&self) -> bool {
        matches!(self, Role::Past)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::None => "None",
            Role::Past => "Past",
            Role::Present => "Present",
            Role::Future => "Future",
        }
    }

    fn encode(role: Option<Role>) -> u8 {
        match role {
            None => 0,
            Some(Role::None) => 1,
            Some(Role::Past) => 2,
            Some(Role::Present) => 3,
            Some(Role::Future) => 4,
        }
    }

    fn decode(raw: u8) -> Option<Role> {
        match raw {
            1 => Some(Role::None),
            2 => Some(Role::Past),
            3 => Some(Role::Present),
            4 => Some(Role::Future),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Observed role value for one viewer.
///
/// `None` means the source is unavailable (not connected, player object not
/// spawned yet). Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct RoleCell {
    value: Arc<AtomicU8>,
}

impl RoleCell {
    /// Creates a cell whose source is not yet available.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(role: Role) -> Self {
        let cell = Self::new();
        cell.set(role);
        cell
    }

    /// Writer side: publish a role.
    pub fn set(&self, role: Role) {
        self.value.store(Role::encode(Some(role)), Ordering::Release);
    }

    /// Writer side: mark the source unavailable (disconnect).
    pub fn clear(&self) {
        self.value.store(Role::encode(None), Ordering::Release);
    }

    pub fn get(&self) -> Option<Role> {
        Role::decode(self.value.load(Ordering::Acquire))
    }

    /// The Role Signal: true iff the source is available and holds `Past`.
    pub fn is_delayed(&self) -> bool {
        self.get().is_some_and(|role| role.is_delayed())
    }
}

/// Result of one [`RoleWatch::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleEdge {
    /// Current Role Signal
    pub delayed: bool,

    /// `Some(new)` on a rising or falling edge
    pub changed: Option<bool>,
}

/// Per-consumer edge detector over a [`RoleCell`].
#[derive(Debug, Clone, Default)]
pub struct RoleWatch {
    previous: bool,
}

impl RoleWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, cell: &RoleCell) -> RoleEdge {
        let delayed = cell.is_delayed();
        let changed = (delayed != self.previous).then_some(delayed);
        self.previous = delayed;
        RoleEdge { delayed, changed }
    }

    /// Signal value seen at the last poll.
    pub fn last(&self) -> bool {
        self.previous
    }
}
