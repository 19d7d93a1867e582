//! Joint controller: builds, adjusts and tears down the physical joint of
//! one link.
//!
//! The two-stage joint needs one physics step between spawning its anchors
//! and connecting them. That wait is an explicit [`JointStage::Settling`]
//! record which the engine consumes from `fixed_update`, not a suspended
//! routine.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use strutlink_logic::constants::JOINT_SETTLE_STEPS;
use strutlink_logic::failure::LinkFailure;
use strutlink_logic::limits::JointLimits;
use strutlink_logic::math::{Pose, Quat};

use crate::physics::{AnchorHandle, ConstraintEnd, ConstraintHandle, ConstraintKind, PhysicsScene};

/// How the two bodies are held together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JointKind {
    /// No relative motion.
    #[default]
    Rigid,
    /// Springy connection bounded by the length limits.
    Spring,
    /// Ball joint at each end plus a slider between them.
    TwoStage,
}

/// One side of a joint: the body and the node's world pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointEnd {
    pub body: Entity,
    pub node: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointStage {
    /// Nothing built.
    Idle,
    /// Anchors exist; the slider is added once the scene reaches `ready_at`.
    Settling { ready_at: u64 },
    /// Fully connected.
    Active,
}

/// Joint record, stored on the source endpoint.
#[derive(Debug, Clone)]
pub struct JointController {
    pub kind: JointKind,
    pub limits: JointLimits,
    stage: JointStage,
    ends: Option<(JointEnd, JointEnd)>,
    constraints: Vec<ConstraintHandle>,
    /// `[source, target]` for two-stage joints.
    anchors: Vec<AnchorHandle>,
    unbreakable: bool,
    baseline: Option<Quat>,
}

impl JointController {
    pub fn new(kind: JointKind, limits: JointLimits) -> Self {
        Self {
            kind,
            limits,
            stage: JointStage::Idle,
            ends: None,
            constraints: Vec::new(),
            anchors: Vec::new(),
            unbreakable: false,
            baseline: None,
        }
    }

    pub fn stage(&self) -> JointStage {
        self.stage
    }

    pub fn ends(&self) -> Option<(JointEnd, JointEnd)> {
        self.ends
    }

    pub fn constraints(&self) -> &[ConstraintHandle] {
        &self.constraints
    }

    pub fn anchors(&self) -> &[AnchorHandle] {
        &self.anchors
    }

    pub fn is_unbreakable(&self) -> bool {
        self.unbreakable
    }

    /// Relative rotation between the anchors captured on connection.
    pub fn baseline(&self) -> Option<Quat> {
        self.baseline
    }

    pub fn owns(&self, handle: ConstraintHandle) -> bool {
        self.constraints.contains(&handle)
    }

    pub fn check_length_limit(&self, source: &Pose, target: &Pose) -> Result<(), LinkFailure> {
        self.limits.check_length_limit(source, target)
    }

    pub fn check_angle_limit_at_source(&self, source: &Pose, target: &Pose) -> Result<(), LinkFailure> {
        self.limits.check_angle_limit_at_source(source, target)
    }

    pub fn check_angle_limit_at_target(&self, source: &Pose, target: &Pose) -> Result<(), LinkFailure> {
        self.limits.check_angle_limit_at_target(source, target)
    }

    /// Build the joint between the two ends. Any previous joint is torn
    /// down first, so calling this twice leaves one joint.
    pub fn setup_joint(&mut self, scene: &mut PhysicsScene, source: JointEnd, target: JointEnd) {
        self.cleanup_joint(scene);
        self.ends = Some((source, target));

        match self.kind {
            JointKind::Rigid => {
                let h = scene.add_constraint(
                    ConstraintEnd::Body(source.body),
                    ConstraintEnd::Body(target.body),
                    ConstraintKind::Fixed,
                );
                self.constraints.push(h);
                self.stage = JointStage::Active;
            }
            JointKind::Spring => {
                let length = source.node.position.distance(&target.node.position);
                let h = scene.add_constraint(
                    ConstraintEnd::Body(source.body),
                    ConstraintEnd::Body(target.body),
                    ConstraintKind::Spring {
                        spring: self.limits.spring_force,
                        damper: self.limits.spring_damper,
                        min_length: self.limits.clamp_length(0.0),
                        max_length: if self.limits.max_length > 0.0 {
                            self.limits.max_length
                        } else {
                            length
                        },
                    },
                );
                self.constraints.push(h);
                self.stage = JointStage::Active;
            }
            JointKind::TwoStage => {
                let sa = scene.spawn_anchor(source.body, source.node);
                let ta = scene.spawn_anchor(target.body, target.node);
                let s_ball = scene.add_constraint(
                    ConstraintEnd::Body(source.body),
                    ConstraintEnd::Anchor(sa),
                    ConstraintKind::Spherical {
                        angle_limit: self.limits.source_angle_limit,
                    },
                );
                let t_ball = scene.add_constraint(
                    ConstraintEnd::Body(target.body),
                    ConstraintEnd::Anchor(ta),
                    ConstraintKind::Spherical {
                        angle_limit: self.limits.target_angle_limit,
                    },
                );
                self.anchors = vec![sa, ta];
                self.constraints = vec![s_ball, t_ball];
                self.stage = JointStage::Settling {
                    ready_at: scene.tick() + JOINT_SETTLE_STEPS,
                };
                if scene.settles_immediately {
                    self.connect_anchors(scene);
                }
            }
        }
        self.apply_thresholds(scene);
        log::debug!("Joint {:?} set up, stage {:?}", self.kind, self.stage);
    }

    /// Finish a settling joint once its step has passed. Returns true when
    /// the joint became active in this call.
    pub fn complete_pending(&mut self, scene: &mut PhysicsScene) -> bool {
        match self.stage {
            JointStage::Settling { ready_at } if scene.tick() >= ready_at => {
                self.connect_anchors(scene);
                self.apply_thresholds(scene);
                true
            }
            _ => false,
        }
    }

    fn connect_anchors(&mut self, scene: &mut PhysicsScene) {
        let (Some(&sa), Some(&ta)) = (self.anchors.first(), self.anchors.get(1)) else {
            log::error!("Two-stage joint has no anchors to connect");
            return;
        };
        let (Some(a), Some(b)) = (scene.anchor(sa).copied(), scene.anchor(ta).copied()) else {
            log::error!("Two-stage joint anchors vanished before connecting");
            return;
        };

        let dir = b.pose.position - a.pose.position;
        let rot_sa = Quat::look_rotation(dir);
        let rot_ta = Quat::look_rotation(-dir);
        scene.set_anchor_rotation(sa, rot_sa);
        scene.set_anchor_rotation(ta, rot_ta);

        let slider = scene.add_constraint(
            ConstraintEnd::Anchor(sa),
            ConstraintEnd::Anchor(ta),
            ConstraintKind::Prismatic {
                min_length: self.limits.min_length,
                max_length: self.limits.max_length,
            },
        );
        let baseline = rot_sa.inverse() * rot_ta;
        scene.set_baseline(slider, baseline);
        self.baseline = Some(baseline);
        self.constraints.push(slider);
        self.stage = JointStage::Active;
    }

    /// Destroy every constraint and anchor. Safe to call on an idle joint.
    pub fn cleanup_joint(&mut self, scene: &mut PhysicsScene) {
        for h in self.constraints.drain(..) {
            scene.remove_constraint(h);
        }
        for a in self.anchors.drain(..) {
            scene.remove_anchor(a);
        }
        self.stage = JointStage::Idle;
        self.ends = None;
        self.baseline = None;
    }

    /// Make the joint unbreakable and locked, or restore its configured
    /// thresholds and free axes.
    pub fn adjust_joint(&mut self, scene: &mut PhysicsScene, unbreakable: bool) {
        self.unbreakable = unbreakable;
        self.apply_thresholds(scene);
    }

    fn apply_thresholds(&self, scene: &mut PhysicsScene) {
        let (force, torque) = if self.unbreakable {
            (f32::INFINITY, f32::INFINITY)
        } else {
            (
                self.limits.effective_break_force(),
                self.limits.effective_break_torque(),
            )
        };
        for &h in &self.constraints {
            scene.set_break_thresholds(h, force, torque);
            scene.set_locked(h, self.unbreakable);
        }
    }
}
