//! Scripted role assignment for simulated viewers.
//!
//! Stands in for the host-authoritative role service: each connecting client
//! gets one of Past / Present / Future (unique while any are free), and the
//! role is written into that client's [`RoleCell`] once its viewer exists.
//! Assignments for viewers that haven't spawned yet wait in a
//! [`DeferredQueue`] and time out if the viewer never shows up.

use crate::context::SimContext;

use ppf_env::ClientId;
use ppf_timeline::{DeferredQueue, DrainReport, Role, RoleCell};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Roles handed out to connecting clients.
pub const ROLE_POOL: [Role; 3] = [Role::Past, Role::Present, Role::Future];

pub struct RoleDirector {
    /// Shared context (deterministic RNG for role choice)
    context: Arc<SimContext>,

    /// Never hand out a role twice while another is free
    enforce_unique: bool,

    /// Role per connected client
    assigned: BTreeMap<ClientId, Role>,

    /// Role cells of clients whose viewer has spawned
    viewers: BTreeMap<ClientId, RoleCell>,

    /// Assignments waiting for a viewer to spawn
    pending: DeferredQueue<ClientId, Role>,
}

impl RoleDirector {
    /// `max_attempts` is the number of ticks an assignment may wait for
    /// its viewer.
    pub fn new(context: Arc<SimContext>, max_attempts: u32) -> Self {
        Self {
            context,
            enforce_unique: true,
            assigned: BTreeMap::new(),
            viewers: BTreeMap::new(),
            pending: DeferredQueue::new(max_attempts),
        }
    }

    /// Allows duplicate roles (random pick from the whole pool).
    pub fn with_unique_roles(mut self, enforce_unique: bool) -> Self {
        self.enforce_unique = enforce_unique;
        self
    }

    /// Assigns a role to a newly connected client.
    ///
    /// Reconnecting keeps the role the client already has.
    pub fn connect(&mut self, client: ClientId) -> Role {
        if let Some(role) = self.assigned.get(&client).copied() {
            self.apply(client, role);
            return role;
        }

        let role = self.choose_role();
        self.assigned.insert(client, role);
        info!("RoleDirector: assigned {} to {}", role, client);
        self.apply(client, role);
        role
    }

    /// Forgets the client, its pending assignment and its viewer.
    pub fn disconnect(&mut self, client: ClientId) {
        self.assigned.remove(&client);
        self.pending.cancel(&client);
        if let Some(cell) = self.viewers.remove(&client) {
            cell.clear();
        }
        debug!("RoleDirector: {} disconnected", client);
    }

    /// Scripted reassignment (e.g. a role swap mid-session).
    pub fn assign(&mut self, client: ClientId, role: Role) {
        self.assigned.insert(client, role);
        info!("RoleDirector: reassigned {} to {}", role, client);
        self.apply(client, role);
    }

    /// Spawns the client's viewer and returns its role cell.
    ///
    /// The cell stays unavailable until the next [`tick`](Self::tick)
    /// applies the pending assignment.
    pub fn spawn_viewer(&mut self, client: ClientId) -> RoleCell {
        let cell = RoleCell::new();
        self.viewers.insert(client, cell.clone());
        debug!("RoleDirector: viewer for {} spawned", client);
        cell
    }

    /// Applies every pending assignment whose viewer now exists.
    pub fn tick(&mut self) -> DrainReport<ClientId> {
        let viewers = &self.viewers;
        self.pending.drain(|client, role| match viewers.get(client) {
            Some(cell) => {
                cell.set(*role);
                true
            }
            None => false,
        })
    }

    pub fn role_of(&self, client: ClientId) -> Option<Role> {
        self.assigned.get(&client).copied()
    }

    pub fn viewer(&self, client: ClientId) -> Option<&RoleCell> {
        self.viewers.get(&client)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn apply(&mut self, client: ClientId, role: Role) {
        match self.viewers.get(&client) {
            Some(cell) => {
                self.pending.cancel(&client);
                cell.set(role);
            }
            None => self.pending.push(client, role),
        }
    }

    fn choose_role(&self) -> Role {
        if !self.enforce_unique {
            return ROLE_POOL[self.context.pick_index(ROLE_POOL.len())];
        }

        let used: HashSet<Role> = self.assigned.values().copied().collect();
        let available: Vec<Role> = ROLE_POOL
            .iter()
            .copied()
            .filter(|role| !used.contains(role))
            .collect();

        if available.is_empty() {
            // More clients than roles
            return Role::Past;
        }
        available[self.context.pick_index(available.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppf_timeline::TimelineError;

    fn director(max_attempts: u32) -> RoleDirector {
        RoleDirector::new(SimContext::shared(42), max_attempts)
    }

    #[test]
    fn test_first_three_clients_get_unique_roles() {
        let mut director = director(10);
        let roles: HashSet<Role> = (0..3).map(|i| director.connect(ClientId(i))).collect();
        assert_eq!(roles.len(), 3);
        assert!(roles.iter().all(|r| ROLE_POOL.contains(r)));

        assert_eq!(director.connect(ClientId(3)), Role::Past);
    }

    #[test]
    fn test_reconnect_keeps_role() {
        let mut director = director(10);
        let role = director.connect(ClientId(1));
        assert_eq!(director.connect(ClientId(1)), role);
    }

    #[test]
    fn test_assignment_waits_for_viewer() {
        let mut director = director(10);
        let role = director.connect(ClientId(1));
        assert_eq!(director.pending_count(), 1);

        let cell = director.spawn_viewer(ClientId(1));
        assert_eq!(cell.get(), None);

        let report = director.tick();
        assert_eq!(report.applied, vec![ClientId(1)]);
        assert_eq!(cell.get(), Some(role));
    }

    #[test]
    fn test_existing_viewer_is_set_immediately() {
        let mut director = director(10);
        let cell = director.spawn_viewer(ClientId(1));
        director.connect(ClientId(1));
        director.assign(ClientId(1), Role::Future);

        assert_eq!(cell.get(), Some(Role::Future));
        assert_eq!(director.pending_count(), 0);
    }

    #[test]
    fn test_missing_viewer_times_out() {
        let mut director = director(3);
        director.connect(ClientId(5));

        assert!(director.tick().timed_out.is_empty());
        assert!(director.tick().timed_out.is_empty());
        let report = director.tick();
        assert_eq!(report.timed_out.len(), 1);
        assert!(matches!(
            report.timed_out[0],
            TimelineError::DeferredTimeout { attempts: 3, .. }
        ));
        assert_eq!(director.pending_count(), 0);
    }

    #[test]
    fn test_disconnect_clears_viewer() {
        let mut director = director(10);
        let cell = director.spawn_viewer(ClientId(1));
        director.connect(ClientId(1));
        assert!(cell.get().is_some());

        director.disconnect(ClientId(1));
        assert_eq!(cell.get(), None);
        assert_eq!(director.role_of(ClientId(1)), None);
    }

    #[test]
    fn test_non_unique_mode_draws_from_pool() {
        let mut director = director(10).with_unique_roles(false);
        for i in 0..10 {
            assert!(ROLE_POOL.contains(&director.connect(ClientId(i))));
        }
    }
}
