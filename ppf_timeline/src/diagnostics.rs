//! Timeline Diagnostics
//! ====================
//!
//! A point-in-time [`TimelineStatus`] of the recorder and a rate-limited
//! [`DebugHud`] that renders it as text.

use crate::config::HudConfig;
use crate::recorder::Recorder;

use serde::Serialize;
use std::fmt;

/// Shortest accepted HUD refresh interval (seconds).
pub const MIN_HUD_INTERVAL_SECS: f64 = 0.02;

/// HUD text shown when the session has no recorder.
pub const MISSING_RECORDER_TEXT: &str = "Timeline: (missing)";

// =============================================================================
// STATUS
// =============================================================================

/// Recorder state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineStatus {
    /// Number of tracked entities
    pub tracked: usize,

    pub now: f64,

    /// `now - past_delay_seconds`
    pub past_view_time: f64,

    /// Oldest recorded time across all buffers
    pub oldest: f64,

    /// Newest recorded time across all buffers
    pub newest: f64,
}

impl TimelineStatus {
    pub fn capture(recorder: &Recorder, now: f64) -> Self {
        let (oldest, newest) = recorder.time_range(now);
        Self {
            tracked: recorder.tracked_count(),
            now,
            past_view_time: recorder.past_view_time(now),
            oldest,
            newest,
        }
    }

    /// Seconds of history currently available.
    pub fn span(&self) -> f64 {
        self.newest - self.oldest
    }
}

impl fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timeline: (ok)")?;
        writeln!(f, "Tracked: {}", self.tracked)?;
        writeln!(f, "Now: {:.2}", self.now)?;
        writeln!(f, "Past view: {:.2}", self.past_view_time)?;
        write!(f, "History: {:.2} .. {:.2}", self.oldest, self.newest)
    }
}

// =============================================================================
// DEBUG HUD
// =============================================================================

/// On-screen timeline readout, refreshed at most once per interval.
#[derive(Debug, Clone)]
pub struct DebugHud {
    visible: bool,
    interval: f64,
    next_update: f64,
    text: String,
}

impl DebugHud {
    pub fn new(config: &HudConfig, visible: bool) -> Self {
        Self {
            visible,
            interval: config.update_interval_secs.max(MIN_HUD_INTERVAL_SECS),
            next_update: f64::NEG_INFINITY,
            text: String::new(),
        }
    }

    /// Refreshes the text if visible and due.
    ///
    /// Returns the new text on refresh, `None` otherwise.
    pub fn poll(&mut self, now: f64, recorder: Option<&Recorder>) -> Option<&str> {
        if !self.visible || now < self.next_update {
            return None;
        }
        self.next_update = now + self.interval;

        self.text = match recorder {
            Some(recorder) => TimelineStatus::capture(recorder, now).to_string(),
            None => MISSING_RECORDER_TEXT.to_string(),
        };
        Some(&self.text)
    }

    /// Last rendered text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Showing the HUD again refreshes it on the next poll.
    pub fn set_visible(&mut self, visible: bool) {
        if visible && !self.visible {
            self.next_update = f64::NEG_INFINITY;
        }
        self.visible = visible;
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::scene::{Appearance, Scene, TrackableDesc};
    use crate::snapshot::Pose;
    use approx::assert_relative_eq;
    use ppf_env::EntityId;
    use std::sync::Arc;

    struct Still(EntityId);

    impl Scene for Still {
        fn trackables(&self) -> Vec<TrackableDesc> {
            vec![TrackableDesc {
                id: self.0,
                name: "still".to_string(),
                appearance: Appearance::new("cube", "default"),
                is_proxy: false,
            }]
        }

        fn pose(&self, id: EntityId) -> Option<Pose> {
            (id == self.0).then(Pose::default)
        }
    }

    fn recorder() -> Recorder {
        Recorder::new(Arc::new(TimelineConfig::default()))
    }

    #[test]
    fn test_status_capture() {
        let mut rec = recorder();
        let scene = Still(EntityId::from_seed(1));
        rec.discover(&scene);
        rec.sample_all(4.0, &scene);
        rec.sample_all(10.0, &scene);

        let status = TimelineStatus::capture(&rec, 10.0);
        assert_eq!(status.tracked, 1);
        assert_relative_eq!(status.past_view_time, 8.5);
        assert_eq!((status.oldest, status.newest), (4.0, 10.0));
        assert_relative_eq!(status.span(), 6.0);

        let text = status.to_string();
        assert!(text.starts_with("Timeline: (ok)"));
        assert!(text.contains("Tracked: 1"));
        assert!(text.contains("Past view: 8.50"));
        assert!(text.contains("History: 4.00 .. 10.00"));
    }

    #[test]
    fn test_hud_without_recorder_shows_missing() {
        let mut hud = DebugHud::new(&HudConfig::default(), true);
        assert_eq!(hud.poll(0.0, None), Some(MISSING_RECORDER_TEXT));
    }

    #[test]
    fn test_hud_is_rate_limited() {
        let rec = recorder();
        let mut hud = DebugHud::new(&HudConfig::default(), true);

        assert!(hud.poll(1.0, Some(&rec)).is_some());
        assert!(hud.poll(1.05, Some(&rec)).is_none());
        assert!(hud.poll(1.2, Some(&rec)).is_some());
    }

    #[test]
    fn test_hud_interval_has_floor() {
        let hud = DebugHud::new(
            &HudConfig {
                update_interval_secs: 0.0,
            },
            true,
        );
        assert_eq!(hud.interval(), MIN_HUD_INTERVAL_SECS);
    }

    #[test]
    fn test_hidden_hud_does_not_refresh() {
        let rec = recorder();
        let mut hud = DebugHud::new(&HudConfig::default(), false);
        assert!(hud.poll(0.0, Some(&rec)).is_none());
        assert_eq!(hud.text(), "");

        hud.set_visible(true);
        assert!(hud.poll(0.01, Some(&rec)).is_some());
        assert!(hud.text().contains("Tracked: 0"));
    }
}
