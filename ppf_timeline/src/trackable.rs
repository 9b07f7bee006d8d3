//! Trackable Handle - one entity's enrollment in the session recorder.
//!
//! The handle lives as long as the entity it represents. Activation enrolls
//! the entity with whatever recorder the session has at that moment;
//! deactivation (or drop) takes it back out.

use crate::error::TimelineError;
use crate::session::{Session, WeakRecorder};

use ppf_env::EntityId;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct TrackableHandle {
    id: EntityId,

    /// Recorder enrolled with on the last successful activation
    enrolled: Option<WeakRecorder>,

    active: bool,

    /// Missing-recorder diagnostic already emitted
    reported_missing: bool,
}

impl TrackableHandle {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            enrolled: None,
            active: false,
            reported_missing: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Marks the entity active and registers it with the session recorder.
    ///
    /// Without a recorder the entity stays untracked; there is no retry when
    /// one appears later. Returns whether the entity is now tracked.
    pub fn activate(&mut self, session: &Session) -> bool {
        self.active = true;

        let Some(recorder) = session.recorder() else {
            if !self.reported_missing {
                self.reported_missing = true;
                warn!(
                    "{}",
                    TimelineError::misconfigured(format!(
                        "no recorder in session, {} stays untracked",
                        self.id
                    ))
                );
            }
            self.enrolled = None;
            return false;
        };

        let registered = match recorder.try_borrow_mut() {
            Some(mut rec) => {
                rec.register(self.id);
                true
            }
            None => false,
        };

        if registered {
            self.enrolled = Some(recorder.downgrade());
            debug!("Trackable {} enrolled", self.id);
        } else {
            warn!("Trackable {}: recorder busy, enrollment skipped", self.id);
            self.enrolled = None;
        }
        registered
    }

    /// Marks the entity inactive and unregisters it.
    ///
    /// No-op if the recorder it enrolled with is already gone.
    pub fn deactivate(&mut self) {
        self.active = false;
        let Some(recorder) = self.enrolled.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let unregistered = match recorder.try_borrow_mut() {
            Some(mut rec) => {
                rec.unregister(self.id);
                true
            }
            None => false,
        };
        if !unregistered {
            warn!("Trackable {}: recorder busy, unregistration skipped", self.id);
        }
    }

    /// True while active and enrolled with the session's current recorder.
    ///
    /// A recorder kept alive by an outside handle after
    /// [`Session::teardown`] no longer counts.
    pub fn is_tracked(&self, session: &Session) -> bool {
        if !self.active {
            return false;
        }
        let Some(current) = session.recorder() else {
            return false;
        };
        let enrolled_here = self
            .enrolled
            .as_ref()
            .and_then(WeakRecorder::upgrade)
            .is_some_and(|recorder| recorder.same_as(&current));

        enrolled_here && current.try_borrow().is_some_and(|rec| rec.is_tracked(self.id))
    }
}

impl Drop for TrackableHandle {
    fn drop(&mut self) {
        if self.active {
            self.deactivate();
        }
    }
}
