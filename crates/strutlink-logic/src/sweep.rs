//! Straight-line collider sweep between two link anchors.
//!
//! Obstacles are axis-aligned boxes. The sweep uses the slab method: the
//! segment is clipped against each pair of parallel planes and it hits the
//! box when the clipped interval stays non-empty.

use serde::{Deserialize, Serialize};

use crate::constants::MIN_SWEEP_LENGTH;
use crate::math::Vec3;

/// An axis-aligned obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub name: String,
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Obstacle {
    pub fn new(name: impl Into<String>, center: Vec3, half_extents: Vec3) -> Self {
        Self {
            name: name.into(),
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }
}

/// Parametric entry point (0..=1) of the segment `from → to` into the box,
/// or `None` if it misses.
pub fn segment_hits_box(from: Vec3, to: Vec3, obstacle: &Obstacle) -> Option<f32> {
    let dir = to - from;
    let lo = obstacle.min();
    let hi = obstacle.max();

    let mut t_min = 0.0_f32;
    let mut t_max = 1.0_f32;
    for (origin, d, min, max) in [
        (from.x, dir.x, lo.x, hi.x),
        (from.y, dir.y, lo.y, hi.y),
        (from.z, dir.z, lo.z, hi.z),
    ] {
        if d.abs() < f32::EPSILON {
            // Parallel to this slab: must already be inside it.
            if origin < min || origin > max {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = {
            let a = (min - origin) * inv;
            let b = (max - origin) * inv;
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        };
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Nearest obstacle crossed by the segment, if any.
pub fn first_obstruction<'a>(
    from: Vec3,
    to: Vec3,
    obstacles: &'a [Obstacle],
) -> Option<&'a Obstacle> {
    if from.distance(&to) < MIN_SWEEP_LENGTH {
        return None;
    }
    obstacles
        .iter()
        .filter_map(|o| segment_hits_box(from, to, o).map(|t| (t, o)))
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, o)| o)
}
