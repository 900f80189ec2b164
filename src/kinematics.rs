// Delta-arm geometry after the classic delta fk-ik sample:
// https://www.marginallyclever.com/other/samples/fk-ik-test.html

use defmt::Format;
use libm::{atan2f, sqrtf};

/// Full motor steps per joint revolution (microstepping x gear ratio).
pub const STEPS_PER_REV: i32 = 3200;

/// Physical dimensions of the delta mechanism, in millimetres.
#[derive(Clone, Copy, Debug, Format, PartialEq)]
pub struct DeltaDimensions {
    pub effector_radius: f32,
    pub base_radius: f32,
    pub forearm_length: f32,
    pub bicep_length: f32,
    /// Distance from the motor plane down to the work surface.
    pub base_to_floor: f32,
}

impl Default for DeltaDimensions {
    fn default() -> Self {
        Self {
            effector_radius: 35.0,
            base_radius: 100.0,
            forearm_length: 280.0,
            bicep_length: 285.0,
            base_to_floor: 200.0,
        }
    }
}

/// A target effector position, millimetres in the base frame.
///
/// z is negative below the motor plane.
#[derive(Clone, Copy, Debug, Format, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Shoulder joint angles in degrees, one per arm.
#[derive(Clone, Copy, Debug, Format, PartialEq)]
pub struct JointAngles {
    pub theta1: f32,
    pub theta2: f32,
    pub theta3: f32,
}

/// Identifies one of the three arms, spaced 120 degrees apart.
#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum Arm {
    One,
    Two,
    Three,
}

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum KinematicsError {
    /// The requested pose is outside the arm's reachable envelope.
    Unreachable { arm: Arm },
}

impl crate::error::Error for KinematicsError {}

/// Inverse kinematics solver for the three-arm delta mechanism.
///
/// Rotation constants for the 120 degree arm spacing are computed once at
/// construction.
pub struct DeltaKinematics {
    dims: DeltaDimensions,
    sin120: f32,
    cos120: f32,
    tan30: f32,
}

impl DeltaKinematics {
    pub fn new(dims: DeltaDimensions) -> Self {
        let sqrt3 = sqrtf(3.0);

        Self {
            dims,
            sin120: sqrt3 / 2.0,
            cos120: -0.5,
            tan30: 1.0 / sqrt3,
        }
    }

    pub fn dims(&self) -> &DeltaDimensions {
        &self.dims
    }

    /// Solves the shoulder angle for one arm, with the target already rotated
    /// into that arm's frame.
    ///
    /// Returns `None` when the knee has no real solution (the target is
    /// unreachable for this arm).
    pub fn solve_arm(&self, x0: f32, y0: f32, z0: f32) -> Option<f32> {
        let DeltaDimensions {
            effector_radius,
            base_radius,
            forearm_length,
            bicep_length,
            ..
        } = self.dims;

        let y1 = -0.5 * self.tan30 * base_radius;
        // shift the target from the effector centroid to its mounting edge
        let y0 = y0 - 0.5 * self.tan30 * effector_radius;

        let a = (x0 * x0 + y0 * y0 + z0 * z0 + bicep_length * bicep_length
            - forearm_length * forearm_length
            - y1 * y1)
            / (2.0 * z0);
        let b = (y1 - y0) / z0;

        let d = -(a + b * y1) * (a + b * y1) + bicep_length * (b * b * bicep_length + bicep_length);
        // a non-finite discriminant (z0 == 0 divides by zero) is unreachable too
        if !d.is_finite() || d < 0.0 {
            return None;
        }

        let yj = (y1 - a * b - sqrtf(d)) / (b * b + 1.0);
        let zj = a + b * yj;

        Some(atan2f(-zj, y1 - yj).to_degrees())
    }

    /// Solves all three shoulder angles for an effector pose.
    ///
    /// Fails fast on the first arm without a solution; no partial angle set
    /// is ever returned.
    pub fn solve(&self, pose: &Pose) -> Result<JointAngles, KinematicsError> {
        let Pose { x, y, z } = *pose;

        let theta1 = self
            .solve_arm(x, y, z)
            .ok_or(KinematicsError::Unreachable { arm: Arm::One })?;

        let theta2 = self
            .solve_arm(
                x * self.cos120 + y * self.sin120,
                y * self.cos120 - x * self.sin120,
                z,
            )
            .ok_or(KinematicsError::Unreachable { arm: Arm::Two })?;

        let theta3 = self
            .solve_arm(
                x * self.cos120 - y * self.sin120,
                y * self.cos120 + x * self.sin120,
                z,
            )
            .ok_or(KinematicsError::Unreachable { arm: Arm::Three })?;

        Ok(JointAngles {
            theta1,
            theta2,
            theta3,
        })
    }

    /// Solves a pose straight through to per-motor step targets.
    pub fn pose_to_steps(&self, pose: &Pose) -> Result<[i32; 3], KinematicsError> {
        let angles = self.solve(pose)?;

        Ok([
            angle_to_step(angles.theta1),
            angle_to_step(angles.theta2),
            angle_to_step(angles.theta3),
        ])
    }
}

/// Converts a joint angle in degrees to a motor step count, truncating
/// toward zero.
///
/// Out-of-range angles are not validated here; reachability is checked by
/// the solver upstream.
pub fn angle_to_step(theta: f32) -> i32 {
    (theta * STEPS_PER_REV as f32 / 360.0) as i32
}
