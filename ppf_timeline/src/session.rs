//! Session - the owning context for one play session's recorder.
//!
//! Entities never reach for a process-wide recorder. They are handed the
//! session (or a [`RecorderHandle`] taken from it) and enroll through that.
//! A session owns at most one recorder at a time.

use crate::config::{SessionConfig, TimelineConfig};
use crate::error::TimelineError;
use crate::recorder::Recorder;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared single-threaded handle to the active recorder.
#[derive(Debug, Clone)]
pub struct RecorderHandle(Rc<RefCell<Recorder>>);

impl RecorderHandle {
    fn new(recorder: Recorder) -> Self {
        Self(Rc::new(RefCell::new(recorder)))
    }

    /// # Panics
    /// If the recorder is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Recorder> {
        self.0.borrow()
    }

    /// # Panics
    /// If the recorder is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Recorder> {
        self.0.borrow_mut()
    }

    /// Non-panicking variant of [`borrow`](Self::borrow).
    pub fn try_borrow(&self) -> Option<Ref<'_, Recorder>> {
        self.0.try_borrow().ok()
    }

    /// Non-panicking variant of [`borrow_mut`](Self::borrow_mut).
    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, Recorder>> {
        self.0.try_borrow_mut().ok()
    }

    pub fn downgrade(&self) -> WeakRecorder {
        WeakRecorder(Rc::downgrade(&self.0))
    }

    /// True if both handles point at the same recorder instance.
    pub fn same_as(&self, other: &RecorderHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Non-owning reference held by enrolled entities.
#[derive(Debug, Clone, Default)]
pub struct WeakRecorder(Weak<RefCell<Recorder>>);

impl WeakRecorder {
    /// `None` once the session has torn the recorder down.
    pub fn upgrade(&self) -> Option<RecorderHandle> {
        self.0.upgrade().map(RecorderHandle)
    }
}

/// Per-session owner of configuration and the single active recorder.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,

    /// Recording parameters shared with every buffer allocation
    timeline: Arc<TimelineConfig>,

    recorder: Option<RecorderHandle>,
}

impl Session {
    /// Creates a session from a validated configuration.
    pub fn new(config: SessionConfig) -> Result<Self, TimelineError> {
        config.validate()?;
        let timeline = Arc::new(config.timeline.clone());
        Ok(Self {
            config,
            timeline,
            recorder: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates the session's recorder, sampling cadence starting at `now`.
    ///
    /// # Returns
    /// * `Err(TimelineError::DuplicateSingleton)` - a recorder is already
    ///   active; the request is discarded and the existing one is untouched
    pub fn start_recorder(&mut self, now: f64) -> Result<RecorderHandle, TimelineError> {
        if self.recorder.is_some() {
            warn!("Session: recorder already active, discarding duplicate");
            return Err(TimelineError::DuplicateSingleton);
        }

        let mut recorder = Recorder::new(Arc::clone(&self.timeline));
        recorder.reset_sampler(now);
        let handle = RecorderHandle::new(recorder);
        self.recorder = Some(handle.clone());

        info!(
            "Session: recorder started ({} Hz, {:.1}s history, {:.2}s delay)",
            self.timeline.samples_per_second,
            self.timeline.history_seconds,
            self.timeline.past_delay_seconds
        );
        Ok(handle)
    }

    /// The active recorder, if any.
    pub fn recorder(&self) -> Option<RecorderHandle> {
        self.recorder.clone()
    }

    pub fn has_recorder(&self) -> bool {
        self.recorder.is_some()
    }

    /// Drops the session's reference to the recorder so a later
    /// [`start_recorder`](Self::start_recorder) creates a fresh one.
    ///
    /// Returns true if a recorder was active.
    pub fn teardown(&mut self) -> bool {
        let had = self.recorder.take().is_some();
        if had {
            info!("Session: recorder torn down");
        }
        had
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppf_env::EntityId;

    #[test]
    fn test_second_recorder_is_rejected() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let first = session.start_recorder(0.0).unwrap();
        first.borrow_mut().register(EntityId::from_seed(1));

        let second = session.start_recorder(1.0);
        assert!(matches!(second, Err(TimelineError::DuplicateSingleton)));

        // Existing recorder unaffected
        let active = session.recorder().unwrap();
        assert!(active.same_as(&first));
        assert_eq!(active.borrow().tracked_count(), 1);
    }

    #[test]
    fn test_teardown_allows_fresh_recorder() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let first = session.start_recorder(0.0).unwrap();
        let weak = first.downgrade();
        drop(first);

        assert!(session.teardown());
        assert!(!session.has_recorder());
        assert!(weak.upgrade().is_none());

        let second = session.start_recorder(5.0).unwrap();
        assert_eq!(second.borrow().tracked_count(), 0);
        assert_eq!(second.borrow().next_sample_time(), 5.0 + 1.0 / 15.0);
    }

    #[test]
    fn test_invalid_config_rejected_at_session_creation() {
        let mut config = SessionConfig::default();
        config.timeline.samples_per_second = 0;
        assert!(matches!(Session::new(config), Err(TimelineError::InvalidConfig(_))));

        // A history window too large to allocate never reaches the recorder
        let mut config = SessionConfig::default();
        config.timeline.history_seconds = 1.0e12;
        assert!(matches!(Session::new(config), Err(TimelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_recorder_shares_session_timeline_config() {
        let mut config = SessionConfig::default();
        config.timeline.past_delay_seconds = 2.0;
        let mut session = Session::new(config).unwrap();
        let recorder = session.start_recorder(0.0).unwrap();

        assert_eq!(recorder.borrow().config().past_delay_seconds, 2.0);
        assert_eq!(recorder.borrow().past_view_time(3.0), 1.0);
    }
}
