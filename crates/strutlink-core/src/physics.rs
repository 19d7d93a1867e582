//! Minimal physics scene: the constraint store joints are built from.
//!
//! This is the seam to the host physics engine. It keeps constraint and
//! kinematic-anchor records, break thresholds and axis locks, and it
//! evaluates breakage once per [`step`](PhysicsScene::step). Loads are
//! queued by the host (or by tests) and judged on the *next* step, the same
//! way an engine reports a broken joint a frame late.

use std::collections::HashMap;

use hecs::Entity;
use strutlink_logic::math::{Pose, Quat};

/// Key of a constraint inside the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(u32);

/// Key of a kinematic anchor inside the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorHandle(u32);

/// One side of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintEnd {
    Body(Entity),
    Anchor(AnchorHandle),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    /// No relative motion.
    Fixed,
    /// Ball joint with a cone limit, degrees. Zero locks it.
    Spherical { angle_limit: f32 },
    /// Slider along the link axis.
    Prismatic { min_length: f32, max_length: f32 },
    /// Spring holding the separation between `min_length` and `max_length`.
    Spring {
        spring: f32,
        damper: f32,
        min_length: f32,
        max_length: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub a: ConstraintEnd,
    pub b: ConstraintEnd,
    pub kind: ConstraintKind,
    pub break_force: f32,
    pub break_torque: f32,
    /// All free axes locked (e.g. while physics is suspended).
    pub locked: bool,
    /// Relative rotation `a → b` captured when the constraint was connected.
    /// Angle limits are measured from here.
    pub baseline: Quat,
    pub created_at: u64,
}

/// A kinematic point pinned to a body; it has a pose but no mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicAnchor {
    pub body: Entity,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Load {
    force: f32,
    torque: f32,
}

#[derive(Debug, Default)]
pub struct PhysicsScene {
    tick: u64,
    next_handle: u32,
    constraints: HashMap<ConstraintHandle, Constraint>,
    anchors: HashMap<AnchorHandle, KinematicAnchor>,
    loads: HashMap<ConstraintHandle, Load>,
    forced_breaks: Vec<ConstraintHandle>,
    /// Poses settle in the same step they are set, so deferred joint
    /// construction can finish immediately.
    pub settles_immediately: bool,
}

impl PhysicsScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed physics steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    /// Add an unbreakable, unlocked constraint.
    pub fn add_constraint(
        &mut self,
        a: ConstraintEnd,
        b: ConstraintEnd,
        kind: ConstraintKind,
    ) -> ConstraintHandle {
        let handle = ConstraintHandle(self.next_id());
        self.constraints.insert(
            handle,
            Constraint {
                a,
                b,
                kind,
                break_force: f32::INFINITY,
                break_torque: f32::INFINITY,
                locked: false,
                baseline: Quat::IDENTITY,
                created_at: self.tick,
            },
        );
        handle
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(&handle)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Option<Constraint> {
        self.loads.remove(&handle);
        self.forced_breaks.retain(|h| *h != handle);
        self.constraints.remove(&handle)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn set_break_thresholds(&mut self, handle: ConstraintHandle, force: f32, torque: f32) {
        if let Some(c) = self.constraints.get_mut(&handle) {
            c.break_force = force;
            c.break_torque = torque;
        }
    }

    pub fn set_locked(&mut self, handle: ConstraintHandle, locked: bool) {
        if let Some(c) = self.constraints.get_mut(&handle) {
            c.locked = locked;
        }
    }

    pub fn set_baseline(&mut self, handle: ConstraintHandle, baseline: Quat) {
        if let Some(c) = self.constraints.get_mut(&handle) {
            c.baseline = baseline;
        }
    }

    pub fn spawn_anchor(&mut self, body: Entity, pose: Pose) -> AnchorHandle {
        let handle = AnchorHandle(self.next_id());
        self.anchors.insert(handle, KinematicAnchor { body, pose });
        handle
    }

    pub fn anchor(&self, handle: AnchorHandle) -> Option<&KinematicAnchor> {
        self.anchors.get(&handle)
    }

    pub fn set_anchor_rotation(&mut self, handle: AnchorHandle, rotation: Quat) {
        if let Some(a) = self.anchors.get_mut(&handle) {
            a.pose.rotation = rotation;
        }
    }

    pub fn remove_anchor(&mut self, handle: AnchorHandle) -> Option<KinematicAnchor> {
        self.anchors.remove(&handle)
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Queue a load on a constraint; the largest load per step counts.
    pub fn apply_load(&mut self, handle: ConstraintHandle, force: f32, torque: f32) {
        if !self.constraints.contains_key(&handle) {
            return;
        }
        let load = self.loads.entry(handle).or_default();
        load.force = load.force.max(force);
        load.torque = load.torque.max(torque);
    }

    /// Forget every queued load. Forced breaks stay queued.
    pub fn clear_loads(&mut self) {
        self.loads.clear();
    }

    /// Break a constraint at the next step regardless of its thresholds.
    pub fn force_break(&mut self, handle: ConstraintHandle) {
        if self.constraints.contains_key(&handle) && !self.forced_breaks.contains(&handle) {
            self.forced_breaks.push(handle);
        }
    }

    /// Advance one physics step. Broken constraints are removed and returned.
    pub fn step(&mut self) -> Vec<ConstraintHandle> {
        self.tick += 1;

        let mut broken: Vec<ConstraintHandle> = std::mem::take(&mut self.forced_breaks);
        for (handle, load) in self.loads.drain() {
            let Some(c) = self.constraints.get(&handle) else {
                continue;
            };
            if (load.force > c.break_force || load.torque > c.break_torque)
                && !broken.contains(&handle)
            {
                broken.push(handle);
            }
        }
        broken.sort();
        for handle in &broken {
            self.constraints.remove(handle);
            log::debug!("Constraint {:?} broke at tick {}", handle, self.tick);
        }
        broken
    }
}
