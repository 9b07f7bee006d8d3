//! JSON exporter for offline inspection.
//!
//! Exports simulation frames with each entity's live pose next to its
//! past-view proxy pose, so the two timelines can be plotted side by side.

use crate::error::SimError;

use ppf_timeline::Pose;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Position plus heading of one pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Rotation about the vertical axis (radians)
    pub yaw: f64,
}

impl From<&Pose> for PoseRecord {
    fn from(pose: &Pose) -> Self {
        Self {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
            yaw: pose.orientation.euler_angles().2,
        }
    }
}

/// One entity in one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFrame {
    pub id: String,
    pub name: String,

    /// Live pose
    pub present: PoseRecord,

    /// Proxy pose, if the entity has a proxy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past: Option<PoseRecord>,

    pub proxy_visible: bool,
}

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// "Direct" or "Proxy"
    pub view: String,

    /// Local viewer's role, if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Entities tracked by the recorder
    pub tracked: usize,

    pub entities: Vec<EntityFrame>,

    /// Events (spawns, role changes, stalls, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Largest proxy position error observed, if measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_proxy_error: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            max_proxy_error: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, max_proxy_error: Option<f64>) {
        self.passed = passed;
        self.max_proxy_error = max_proxy_error;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
