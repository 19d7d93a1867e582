//! Joint limits and the pure geometric checks built on them.
//!
//! Conventions:
//! - lengths are metres, angles degrees, forces kN;
//! - `min_length == 0` / `max_length == 0` disable that bound;
//! - an angle limit of `0` locks the end: only numeric noise is tolerated;
//! - a break force or torque of `0` means the joint never breaks.

use serde::{Deserialize, Serialize};

use crate::constants::LOCKED_ANGLE_TOLERANCE;
use crate::failure::LinkFailure;
use crate::math::Pose;

/// Configured limits of one joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointLimits {
    pub min_length: f32,
    pub max_length: f32,
    /// Freedom at the source end, degrees.
    pub source_angle_limit: f32,
    /// Freedom at the target end, degrees.
    pub target_angle_limit: f32,
    pub break_force: f32,
    pub break_torque: f32,
    /// Spring strength for spring joints.
    pub spring_force: f32,
    pub spring_damper: f32,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            min_length: 0.0,
            max_length: 0.0,
            source_angle_limit: 0.0,
            target_angle_limit: 0.0,
            break_force: 0.0,
            break_torque: 0.0,
            spring_force: 0.0,
            spring_damper: 0.0,
        }
    }
}

impl JointLimits {
    /// Check the separation between the two nodes.
    pub fn check_length_limit(&self, source: &Pose, target: &Pose) -> Result<(), LinkFailure> {
        let length = source.position.distance(&target.position);
        if self.min_length > 0.0 && length < self.min_length {
            return Err(LinkFailure::TooShort {
                length,
                min: self.min_length,
            });
        }
        if self.max_length > 0.0 && length > self.max_length {
            return Err(LinkFailure::TooLong {
                length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    /// Angle between the source node's forward axis and the link.
    pub fn check_angle_limit_at_source(
        &self,
        source: &Pose,
        target: &Pose,
    ) -> Result<(), LinkFailure> {
        let angle = source
            .forward()
            .angle_deg(&(target.position - source.position));
        if exceeds(angle, self.source_angle_limit) {
            return Err(LinkFailure::SourceAngle {
                angle,
                limit: self.source_angle_limit,
            });
        }
        Ok(())
    }

    /// Angle between the target node's forward axis and the link, seen from the target.
    pub fn check_angle_limit_at_target(
        &self,
        source: &Pose,
        target: &Pose,
    ) -> Result<(), LinkFailure> {
        let angle = target
            .forward()
            .angle_deg(&(source.position - target.position));
        if exceeds(angle, self.target_angle_limit) {
            return Err(LinkFailure::TargetAngle {
                angle,
                limit: self.target_angle_limit,
            });
        }
        Ok(())
    }

    /// All geometric checks in order; the first failure wins.
    pub fn check_all(&self, source: &Pose, target: &Pose) -> Result<(), LinkFailure> {
        self.check_length_limit(source, target)?;
        self.check_angle_limit_at_source(source, target)?;
        self.check_angle_limit_at_target(source, target)
    }

    pub fn effective_break_force(&self) -> f32 {
        unbounded_if_zero(self.break_force)
    }

    pub fn effective_break_torque(&self) -> f32 {
        unbounded_if_zero(self.break_torque)
    }

    /// Clamp a length into the configured bounds.
    pub fn clamp_length(&self, length: f32) -> f32 {
        let mut l = length;
        if self.min_length > 0.0 {
            l = l.max(self.min_length);
        }
        if self.max_length > 0.0 {
            l = l.min(self.max_length);
        }
        l
    }
}

fn exceeds(angle: f32, limit: f32) -> bool {
    angle > limit.max(LOCKED_ANGLE_TOLERANCE)
}

fn unbounded_if_zero(value: f32) -> f32 {
    if value <= 0.0 {
        f32::INFINITY
    } else {
        value
    }
}
