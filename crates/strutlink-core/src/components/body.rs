//! Bodies: the simulated parts endpoints live on.

use serde::{Deserialize, Serialize};
use strutlink_logic::math::{Pose, Vec3};
use strutlink_logic::sweep::Obstacle;

/// Persistent body identifier. Survives save/load, unlike `hecs::Entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// Identifier of an assembly of bodies that move as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VesselId(pub u32);

/// A simulated body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub name: String,
    pub vessel: VesselId,
    /// Structural parent. Parent edges are permanent; links come and go.
    pub parent: Option<BodyId>,
    /// World pose
    pub pose: Pose,
    /// Half extents of an axis-aligned collider around `pose.position`.
    pub collider: Option<Vec3>,
}

impl Body {
    pub fn obstacle(&self) -> Option<Obstacle> {
        self.collider
            .map(|half| Obstacle::new(self.name.clone(), self.pose.position, half))
    }
}

/// Everything needed to spawn a body.
#[derive(Debug, Clone, Default)]
pub struct BodySpec {
    pub name: String,
    pub parent: Option<BodyId>,
    pub pose: Pose,
    pub collider: Option<Vec3>,
}

impl BodySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.pose.position = position;
        self
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_collider(mut self, half_extents: Vec3) -> Self {
        self.collider = Some(half_extents);
        self
    }

    /// Structurally attach to `parent`; the body joins the parent's vessel.
    pub fn attached_to(mut self, parent: BodyId) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_spec_builder() {
        let spec = BodySpec::new("tank")
            .at(Vec3::new(1.0, 2.0, 3.0))
            .with_collider(Vec3::new(0.5, 0.5, 0.5))
            .attached_to(BodyId(7));
        assert_eq!(spec.name, "tank");
        assert_eq!(spec.pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(spec.parent, Some(BodyId(7)));
    }

    #[test]
    fn test_obstacle_only_with_collider() {
        let mut body = Body {
            id: BodyId(1),
            name: "antenna".into(),
            vessel: VesselId(1),
            parent: None,
            pose: Pose::IDENTITY,
            collider: None,
        };
        assert!(body.obstacle().is_none());
        body.collider = Some(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(body.obstacle().map(|o| o.name), Some("antenna".to_string()));
    }
}
