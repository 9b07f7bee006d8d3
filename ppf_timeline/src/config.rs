//! Session configuration.
//!
//! Loaded once before the recorder is created and treated as immutable for
//! the rest of the session.

use crate::error::TimelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest history window accepted by validation (seconds).
pub const MIN_HISTORY_SECONDS: f64 = 0.01;

/// Largest per-entity ring buffer accepted by validation (snapshots).
pub const MAX_CAPACITY: usize = 1 << 16;

/// Recording parameters shared by every history buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Snapshots per second per tracked entity (>= 1)
    pub samples_per_second: u32,

    /// Seconds of history kept in each ring buffer
    pub history_seconds: f64,

    /// How far behind the past view runs (seconds)
    pub past_delay_seconds: f64,

    /// Show the on-screen timeline status
    pub enable_debug_hud: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            samples_per_second: 15,
            history_seconds: 6.0,
            past_delay_seconds: 1.5,
            enable_debug_hud: true,
        }
    }
}

impl TimelineConfig {
    /// Ring buffer capacity: `ceil(samples_per_second * history_seconds)`, at least 1.
    pub fn capacity(&self) -> usize {
        let raw = (self.samples_per_second as f64 * self.history_seconds).ceil();
        if raw.is_finite() && raw >= 1.0 {
            raw as usize
        } else {
            1
        }
    }

    /// Seconds between two sample passes.
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.samples_per_second.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.samples_per_second == 0 {
            return Err(TimelineError::invalid_config(
                "samples_per_second must be at least 1",
            ));
        }
        if !(self.history_seconds >= MIN_HISTORY_SECONDS) {
            return Err(TimelineError::invalid_config(format!(
                "history_seconds must be at least {MIN_HISTORY_SECONDS}, got {}",
                self.history_seconds
            )));
        }
        let wanted = (self.samples_per_second as f64 * self.history_seconds).ceil();
        if !(wanted <= MAX_CAPACITY as f64) {
            return Err(TimelineError::invalid_config(format!(
                "{} Hz over {}s needs {wanted} snapshots per entity, limit is {MAX_CAPACITY}",
                self.samples_per_second, self.history_seconds
            )));
        }
        if !(self.past_delay_seconds >= 0.0) || !self.past_delay_seconds.is_finite() {
            return Err(TimelineError::invalid_config(format!(
                "past_delay_seconds must be a finite value >= 0, got {}",
                self.past_delay_seconds
            )));
        }
        Ok(())
    }
}

/// Names of the render layers the projector and view selector work with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Layer holding the live entities
    pub direct_layer: String,

    /// Layer holding the past-view proxies
    pub proxy_layer: String,

    /// Always-visible UI layer
    pub ui_layer: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            direct_layer: "WorldReal".to_string(),
            proxy_layer: "WorldProxy".to_string(),
            ui_layer: "UI".to_string(),
        }
    }
}

/// Playback projector behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Create proxies for every trackable as it appears
    pub auto_create_proxies: bool,

    /// Hide proxies (without destroying them) when the role is not Past
    pub hide_when_inactive: bool,

    /// Fraction of the remaining distance covered per tick, in (0, 1]
    pub smoothing: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            auto_create_proxies: true,
            hide_when_inactive: true,
            smoothing: 0.5,
        }
    }
}

/// Debug HUD refresh behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    /// Seconds between HUD refreshes (clamped to >= 0.02)
    pub update_interval_secs: f64,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 0.1,
        }
    }
}

/// Everything a session reads at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeline: TimelineConfig,
    pub layers: LayerConfig,
    pub projector: ProjectorConfig,
    pub hud: HudConfig,
}

impl SessionConfig {
    /// Loads and validates a JSON config file. Missing sections use defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TimelineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, TimelineError> {
        let config: SessionConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TimelineError> {
        self.timeline.validate()?;

        let s = self.projector.smoothing;
        if !(s > 0.0 && s <= 1.0) {
            return Err(TimelineError::invalid_config(format!(
                "projector.smoothing must be in (0, 1], got {s}"
            )));
        }
        if self.layers.direct_layer == self.layers.proxy_layer {
            return Err(TimelineError::invalid_config(
                "direct_layer and proxy_layer must differ",
            ));
        }
        Ok(())
    }
}
