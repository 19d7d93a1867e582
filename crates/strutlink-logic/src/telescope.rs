//! Telescoping pipe layout.
//!
//! A telescoping pipe is `piston_count` equal pistons that slide inside
//! each other. Fully collapsed they overlap completely, so the pipe is one
//! piston long. Fully extended, neighbours still overlap by `min_overlap`.
//! In between, the extension is shared evenly between the pistons.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelescopeLayout {
    pub piston_count: u32,
    pub piston_length: f32,
    pub min_overlap: f32,
}

/// One piston, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PistonSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl TelescopeLayout {
    pub fn min_length(&self) -> f32 {
        self.piston_length
    }

    pub fn max_length(&self) -> f32 {
        let n = self.piston_count.max(1) as f32;
        n * self.piston_length - (n - 1.0) * self.min_overlap
    }

    pub fn clamp_length(&self, length: f32) -> f32 {
        length.clamp(self.min_length(), self.max_length().max(self.min_length()))
    }

    /// Lay the pistons out from `start` towards `end`.
    ///
    /// Returns the segments and the clamped total length. The pipe always
    /// starts at `start`; if the requested distance is out of range the far
    /// end stops short of, or overshoots, `end`.
    pub fn layout(&self, start: Vec3, end: Vec3) -> (Vec<PistonSegment>, f32) {
        let dir = (end - start).normalize();
        let dir = if dir == Vec3::ZERO { Vec3::FORWARD } else { dir };
        let length = self.clamp_length(start.distance(&end));
        let count = self.piston_count.max(1);
        let step = if count > 1 {
            (length - self.piston_length) / (count - 1) as f32
        } else {
            0.0
        };

        let segments = (0..count)
            .map(|i| {
                let offset = step * i as f32;
                PistonSegment {
                    start: start + dir * offset,
                    end: start + dir * (offset + self.piston_length),
                }
            })
            .collect();
        (segments, length)
    }
}
