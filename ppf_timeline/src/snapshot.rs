//! Pose and Snapshot value types.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Position + orientation of an entity in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position [x, y, z] in meters
    pub position: Vector3<f64>,

    /// Unit orientation
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Pose at `position` with identity orientation.
    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Moves a fraction `t` of the way toward `target`.
    ///
    /// Position is lerped, orientation slerped; `t = 1.0` lands exactly on
    /// the target.
    pub fn approach(&self, target: &Pose, t: f64) -> Pose {
        let t = t.clamp(0.0, 1.0);
        Pose {
            position: self.position.lerp(&target.position, t),
            orientation: self
                .orientation
                .try_slerp(&target.orientation, t, 1.0e-9)
                .unwrap_or(target.orientation),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

/// A pose recorded at a specific simulation time.
///
/// Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    time: f64,
    pose: Pose,
}

impl Snapshot {
    pub fn new(time: f64, pose: Pose) -> Self {
        Self { time, pose }
    }

    /// Simulation time (seconds) the pose was sampled at.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn position(&self) -> Vector3<f64> {
        self.pose.position
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.pose.orientation
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_approach_half_way() {
        let from = Pose::at(Vector3::new(0.0, 0.0, 0.0));
        let to = Pose::new(
            Vector3::new(2.0, 4.0, -2.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0),
        );

        let mid = from.approach(&to, 0.5);

        assert_relative_eq!(mid.position.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(mid.position.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(mid.position.z, -1.0, epsilon = 1e-9);
        assert_relative_eq!(mid.orientation.angle(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_approach_full_step_lands_on_target() {
        let from = Pose::default();
        let to = Pose::at(Vector3::new(3.0, 0.0, 0.0));

        let end = from.approach(&to, 1.0);
        assert_relative_eq!(end.position.x, 3.0, epsilon = 1e-12);
    }
}
