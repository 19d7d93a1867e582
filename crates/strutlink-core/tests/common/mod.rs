//! Shared rigs for the integration tests.

#![allow(dead_code)]

use hecs::Entity;
use strutlink_core::prelude::*;
use strutlink_core::renderer::RendererKind;
use strutlink_logic::limits::JointLimits;
use strutlink_logic::math::{Pose, Quat, Vec3};

pub fn strut_limits() -> JointLimits {
    JointLimits {
        min_length: 0.1,
        max_length: 2.0,
        source_angle_limit: 15.0,
        target_angle_limit: 15.0,
        break_force: 40.0,
        break_torque: 40.0,
        ..Default::default()
    }
}

pub fn strut_config(joint: JointKind) -> SourceConfig {
    SourceConfig {
        joint,
        limits: strut_limits(),
        renderer: RendererKind::default(),
        allow_same_vessel: false,
    }
}

/// Node facing back along -Z, tilted by `tilt` degrees.
pub fn facing_back(tilt: f32) -> Pose {
    Pose::new(
        Vec3::ZERO,
        Quat::look_rotation(-Vec3::FORWARD) * Quat::from_axis_angle(Vec3::UP, tilt),
    )
}

/// A source body at the origin and a target body `distance` ahead.
pub struct Rig {
    pub engine: LinkEngine,
    pub log: EventLog,
    pub source_body: Entity,
    pub target_body: Entity,
    pub source: Entity,
    pub target: Entity,
}

pub fn rig_with(distance: f32, joint: JointKind) -> Rig {
    let mut engine = LinkEngine::new();
    let log = EventLog::new();
    engine.bus.add_listener(Box::new(log.clone()));

    let source_body = engine.spawn_body(BodySpec::new("tank"));
    let target_body = engine.spawn_body(BodySpec::new("truss").at(Vec3::new(0.0, 0.0, distance)));
    let source = engine
        .add_endpoint(source_body, EndpointSpec::source("strut", strut_config(joint)))
        .unwrap();
    let target = engine
        .add_endpoint(target_body, EndpointSpec::target("strut").at(facing_back(5.0)))
        .unwrap();
    engine.start().unwrap();

    Rig {
        engine,
        log,
        source_body,
        target_body,
        source,
        target,
    }
}

pub fn rig(distance: f32) -> Rig {
    rig_with(distance, JointKind::Rigid)
}

/// Rig already linked by the API.
pub fn linked_rig(joint: JointKind) -> Rig {
    let mut r = rig_with(0.5, joint);
    r.engine.link(r.source, r.target, LinkActor::Api).unwrap();
    r
}
