//! End-to-end link scenarios driven through `LinkEngine`.
//!
//! Exercises: linking mode → validation → link → sibling locking →
//! physics / user / decouple breaks → vessel split.

mod common;

use common::*;
use strutlink_core::bus::RecordedEvent;
use strutlink_core::config::load_presets;
use strutlink_core::joint::JointController;
use strutlink_core::prelude::*;
use strutlink_core::renderer::RendererKind;
use strutlink_logic::failure::LinkFailure;
use strutlink_logic::math::{Pose, Vec3};
use strutlink_logic::telescope::TelescopeLayout;

const PRESETS_JSON: &str = include_str!("../../../data/link_presets.json");

fn first_constraint(engine: &LinkEngine, source: hecs::Entity) -> strutlink_core::physics::ConstraintHandle {
    engine.world.get::<&JointController>(source).unwrap().constraints()[0]
}

// ── Linking ────────────────────────────────────────────────────────────

#[test]
fn strut_half_metre_links() {
    let mut r = rig(0.5);
    r.engine.start_linking(r.source, LinkMode::Api).unwrap();
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::AcceptingLinks));
    assert!(r.engine.is_highlighted(r.target));
    assert!(r.engine.has_attach_point(r.source));

    assert_eq!(r.engine.check_can_link_to(r.source, r.target), Ok(()));
    r.engine.link_to_target(r.source, r.target, LinkActor::Player).unwrap();

    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::Linked));
    assert_eq!(r.engine.partner(r.source), Some(r.target));
    assert_eq!(r.engine.partner(r.target), Some(r.source));
    assert!(r.engine.has_joint(r.source));
    assert!(r.engine.renderer_started(r.source));
    assert!(!r.engine.is_highlighted(r.target));
    assert_eq!(r.engine.vessel_of(r.source_body), r.engine.vessel_of(r.target_body));
    assert!((r.engine.rendered_length(r.source) - 0.5).abs() < 1e-4);
    assert!(r.engine.take_messages().is_empty());

    let events = r.log.events();
    let created = r.log.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].source, r.source);
    assert!(events.contains(&RecordedEvent::LinkAccepted(created[0])));
    assert!(events.contains(&RecordedEvent::LinkingStopped(r.source)));
}

#[test]
fn check_can_link_to_is_pure() {
    let mut r = rig(0.5);
    r.engine.start_linking(r.source, LinkMode::Api).unwrap();
    let before = (
        r.engine.link_state(r.source),
        r.engine.link_state(r.target),
        r.log.events().len(),
    );
    for _ in 0..5 {
        assert_eq!(r.engine.check_can_link_to(r.source, r.target), Ok(()));
    }
    let after = (
        r.engine.link_state(r.source),
        r.engine.link_state(r.target),
        r.log.events().len(),
    );
    assert_eq!(before, after);
    assert!(!r.engine.has_joint(r.source));
}

#[test]
fn three_metres_is_too_long() {
    let mut r = rig(3.0);
    r.engine.start_linking(r.source, LinkMode::Api).unwrap();

    let verdict = r.engine.check_can_link_to(r.source, r.target);
    assert!(matches!(
        verdict,
        Err(LinkError::Rejected(LinkFailure::TooLong { max, .. })) if max == 2.0
    ));
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linking));
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::AcceptingLinks));

    let err = r.engine.link_to_target(r.source, r.target, LinkActor::Player).unwrap_err();
    assert!(matches!(err, LinkError::Rejected(LinkFailure::TooLong { .. })));
    assert!(!r.engine.has_joint(r.source));
    assert_ne!(r.engine.vessel_of(r.source_body), r.engine.vessel_of(r.target_body));
    assert_eq!(r.engine.take_messages().len(), 1);

    r.engine.cancel_linking(r.source).unwrap();
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::Available));
    assert!(!r.engine.has_attach_point(r.source));
}

#[test]
fn second_link_on_same_pair_fails() {
    let mut r = linked_rig(JointKind::Rigid);
    assert!(r.engine.link(r.source, r.target, LinkActor::Api).is_err());
    assert!(r.engine.link_to_target(r.source, r.target, LinkActor::Api).is_err());
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));
    assert_eq!(r.log.created().len(), 1);
}

#[test]
fn failed_api_link_cancels_linking_mode() {
    let mut r = rig(3.0);
    assert!(r.engine.link(r.source, r.target, LinkActor::Api).is_err());
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::Available));
}

#[test]
fn angle_and_type_checks() {
    let mut r = rig(0.5);
    // 40 degrees is over the 15 degree limit.
    let tilted = r
        .engine
        .add_endpoint(r.target_body, EndpointSpec::target("strut").named("tilted").at(facing_back(40.0)))
        .unwrap();
    let hose = r
        .engine
        .add_endpoint(r.target_body, EndpointSpec::target("hose").named("hose"))
        .unwrap();
    r.engine.start_linking(r.source, LinkMode::Api).unwrap();

    assert!(matches!(
        r.engine.check_can_link_to(r.source, tilted),
        Err(LinkError::Rejected(LinkFailure::TargetAngle { .. }))
    ));
    assert!(matches!(
        r.engine.check_can_link_to(r.source, hose),
        Err(LinkError::Rejected(LinkFailure::IncompatibleType { .. }))
    ));
    assert_eq!(r.engine.link_state(hose), Some(LinkState::RejectingLinks));
    assert!(matches!(
        r.engine.check_can_link_to(r.target, r.source),
        Err(LinkError::WrongRole { .. })
    ));
}

#[test]
fn obstruction_blocks_link() {
    let mut r = rig(2.0);
    r.engine.spawn_body(
        BodySpec::new("girder")
            .at(Vec3::new(0.0, 0.0, 1.0))
            .with_collider(Vec3::new(0.3, 0.3, 0.1)),
    );
    r.engine.start_linking(r.source, LinkMode::Api).unwrap();
    assert_eq!(
        r.engine.check_can_link_to(r.source, r.target),
        Err(LinkError::Rejected(LinkFailure::Obstructed {
            obstacle: "girder".into()
        }))
    );
}

#[test]
fn same_vessel_needs_permission() {
    let mut engine = LinkEngine::new();
    let root = engine.spawn_body(BodySpec::new("root"));
    let root_id = engine.world.get::<&Body>(root).unwrap().id;
    let arm = engine.spawn_body(BodySpec::new("arm").at(Vec3::new(0.0, 0.0, 1.0)).attached_to(root_id));

    let mut config = strut_config(JointKind::Rigid);
    let strict = engine
        .add_endpoint(root, EndpointSpec::source("strut", config.clone()).named("strict"))
        .unwrap();
    config.allow_same_vessel = true;
    let relaxed = engine
        .add_endpoint(root, EndpointSpec::source("strut", config).named("relaxed"))
        .unwrap();
    let target = engine
        .add_endpoint(arm, EndpointSpec::target("strut").at(facing_back(0.0)))
        .unwrap();
    engine.start().unwrap();

    engine.start_linking(strict, LinkMode::Api).unwrap();
    assert_eq!(
        engine.check_can_link_to(strict, target),
        Err(LinkError::Rejected(LinkFailure::SameVessel))
    );
    engine.cancel_linking(strict).unwrap();

    engine.link(relaxed, target, LinkActor::Api).unwrap();
    assert!(engine.break_current_link(relaxed, false).unwrap());
    // Still one vessel through the parent edge.
    assert_eq!(engine.vessel_of(root), engine.vessel_of(arm));
}

#[test]
fn eva_mode_needs_an_actor() {
    let mut r = rig(0.5);
    assert_eq!(
        r.engine.start_linking(r.source, LinkMode::Eva),
        Err(LinkError::Rejected(LinkFailure::ActorUnavailable))
    );
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));

    r.engine.set_eva_active(true);
    r.engine.start_linking(r.source, LinkMode::Eva).unwrap();
    assert_eq!(
        r.engine.start_linking(r.source, LinkMode::Eva),
        Err(LinkError::Rejected(LinkFailure::SourceNotReady(LinkState::Linking)))
    );
}

#[test]
fn cancel_outside_linking_is_a_noop() {
    let mut r = rig(0.5);
    r.engine.cancel_linking(r.source).unwrap();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));
    assert!(matches!(
        r.engine.cancel_linking(r.target),
        Err(LinkError::WrongRole { .. })
    ));
}

// ── Siblings ───────────────────────────────────────────────────────────

#[test]
fn linked_sibling_ignores_third_party_broadcast() {
    let mut engine = LinkEngine::new();
    let shared = engine.spawn_body(BodySpec::new("shared"));
    let far = engine.spawn_body(BodySpec::new("far").at(Vec3::new(0.0, 0.0, 1.0)));
    let other = engine.spawn_body(BodySpec::new("other").at(Vec3::new(5.0, 0.0, 0.0)));
    let third = engine.spawn_body(BodySpec::new("third").at(Vec3::new(-5.0, 0.0, 0.0)));

    let strut = engine
        .add_endpoint(shared, EndpointSpec::source("strut", strut_config(JointKind::Rigid)).named("strut"))
        .unwrap();
    let hose = engine
        .add_endpoint(shared, EndpointSpec::source("hose", strut_config(JointKind::Rigid)).named("hose"))
        .unwrap();
    let target = engine
        .add_endpoint(far, EndpointSpec::target("strut").at(facing_back(0.0)))
        .unwrap();
    let hose_caller = engine
        .add_endpoint(other, EndpointSpec::source("hose", strut_config(JointKind::Rigid)))
        .unwrap();
    let pipe_caller = engine
        .add_endpoint(third, EndpointSpec::source("pipe", strut_config(JointKind::Rigid)))
        .unwrap();
    engine.start().unwrap();

    engine.link(strut, target, LinkActor::Api).unwrap();
    // Different type: it stays Available but cannot link while its body is linked.
    assert_eq!(engine.link_state(hose), Some(LinkState::Available));
    assert_eq!(
        engine.start_linking(hose, LinkMode::Api),
        Err(LinkError::Rejected(LinkFailure::BodyAlreadyLinked))
    );

    engine.start_linking(hose_caller, LinkMode::Api).unwrap();
    assert_eq!(engine.link_state(strut), Some(LinkState::Linked));
    assert_eq!(engine.link_state(hose), Some(LinkState::RejectingLinks));
    engine.cancel_linking(hose_caller).unwrap();
    assert_eq!(engine.link_state(hose), Some(LinkState::Available));

    engine.start_linking(pipe_caller, LinkMode::Api).unwrap();
    assert_eq!(engine.link_state(strut), Some(LinkState::Linked));
    assert_eq!(engine.link_state(hose), Some(LinkState::Available));
}

#[test]
fn siblings_lock_and_unlock() {
    let mut r = rig(0.5);
    let spare_target = r
        .engine
        .add_endpoint(r.source_body, EndpointSpec::target("strut").named("spare"))
        .unwrap();
    let far_twin = r
        .engine
        .add_endpoint(r.target_body, EndpointSpec::target("strut").named("twin").at(facing_back(0.0)))
        .unwrap();

    r.engine.start_linking(r.source, LinkMode::Api).unwrap();
    assert_eq!(r.engine.link_state(spare_target), Some(LinkState::RejectingLinks));
    assert_eq!(r.engine.link_state(far_twin), Some(LinkState::AcceptingLinks));

    r.engine.link_to_target(r.source, r.target, LinkActor::Api).unwrap();
    assert_eq!(r.engine.link_state(spare_target), Some(LinkState::Locked));
    assert_eq!(r.engine.link_state(far_twin), Some(LinkState::Locked));
    assert!(!r.engine.is_highlighted(far_twin));

    assert!(r.engine.break_current_link(r.source, false).unwrap());
    assert_eq!(r.engine.link_state(spare_target), Some(LinkState::Available));
    assert_eq!(r.engine.link_state(far_twin), Some(LinkState::Available));
}

#[test]
fn second_link_on_same_body_is_refused() {
    let mut engine = LinkEngine::new();
    let shared = engine.spawn_body(BodySpec::new("shared"));
    let strut_end = engine.spawn_body(BodySpec::new("strut-end").at(Vec3::new(0.0, 0.0, 0.5)));
    let hose_end = engine.spawn_body(BodySpec::new("hose-end").at(Vec3::new(0.0, 0.0, 0.8)));

    let strut = engine
        .add_endpoint(shared, EndpointSpec::source("strut", strut_config(JointKind::Rigid)).named("strut"))
        .unwrap();
    let hose = engine
        .add_endpoint(shared, EndpointSpec::source("hose", strut_config(JointKind::Rigid)).named("hose"))
        .unwrap();
    let t1 = engine
        .add_endpoint(strut_end, EndpointSpec::target("strut").at(facing_back(0.0)))
        .unwrap();
    let t2 = engine
        .add_endpoint(hose_end, EndpointSpec::target("hose").at(facing_back(0.0)))
        .unwrap();
    engine.start().unwrap();

    engine.link(strut, t1, LinkActor::Api).unwrap();
    assert_eq!(
        engine.link(hose, t2, LinkActor::Api),
        Err(LinkError::Rejected(LinkFailure::BodyAlreadyLinked))
    );
    assert_eq!(engine.link_state(strut), Some(LinkState::Linked));
    assert_eq!(engine.link_state(hose), Some(LinkState::Available));
    assert_eq!(engine.link_state(t2), Some(LinkState::Available));
    assert!(!engine.has_joint(hose));

    // Free again once the first link is gone.
    assert!(engine.break_current_link(strut, false).unwrap());
    engine.link(hose, t2, LinkActor::Api).unwrap();
    assert_eq!(engine.link_state(hose), Some(LinkState::Linked));
}

#[test]
fn late_endpoint_on_linked_body_starts_locked() {
    let mut r = linked_rig(JointKind::Rigid);
    let late = r
        .engine
        .add_endpoint(r.target_body, EndpointSpec::target("strut").named("late"))
        .unwrap();
    assert_eq!(r.engine.link_state(late), Some(LinkState::Locked));
    assert_eq!(r.engine.bus.subscription_count(late), 0);

    assert!(r.engine.break_current_link(r.source, false).unwrap());
    assert_eq!(r.engine.link_state(late), Some(LinkState::Available));
}

#[test]
fn one_linking_session_at_a_time() {
    let mut engine = LinkEngine::new();
    let a = engine.spawn_body(BodySpec::new("a"));
    let b = engine.spawn_body(BodySpec::new("b").at(Vec3::new(5.0, 0.0, 0.0)));
    let ta = engine.spawn_body(BodySpec::new("ta").at(Vec3::new(0.0, 0.0, 0.5)));
    let tb = engine.spawn_body(BodySpec::new("tb").at(Vec3::new(5.0, 0.0, 0.5)));

    let strut = engine
        .add_endpoint(a, EndpointSpec::source("strut", strut_config(JointKind::Rigid)))
        .unwrap();
    let hose = engine
        .add_endpoint(b, EndpointSpec::source("hose", strut_config(JointKind::Rigid)))
        .unwrap();
    engine
        .add_endpoint(ta, EndpointSpec::target("strut").at(facing_back(0.0)))
        .unwrap();
    let hose_target = engine
        .add_endpoint(tb, EndpointSpec::target("hose").at(facing_back(0.0)))
        .unwrap();
    engine.start().unwrap();

    engine.start_linking(strut, LinkMode::Api).unwrap();
    assert_eq!(engine.link_state(hose_target), Some(LinkState::RejectingLinks));
    assert_eq!(
        engine.start_linking(hose, LinkMode::Api),
        Err(LinkError::Rejected(LinkFailure::LinkingInProgress))
    );
    assert_eq!(engine.link_state(hose), Some(LinkState::Available));

    engine.cancel_linking(strut).unwrap();
    assert_eq!(engine.link_state(hose_target), Some(LinkState::Available));

    engine.start_linking(hose, LinkMode::Api).unwrap();
    assert_eq!(engine.link_state(hose_target), Some(LinkState::AcceptingLinks));
    engine.link_to_target(hose, hose_target, LinkActor::Api).unwrap();
    assert_eq!(engine.link_state(hose), Some(LinkState::Linked));
}

// ── Breaking ───────────────────────────────────────────────────────────

#[test]
fn physics_break_is_external() {
    let mut r = linked_rig(JointKind::Rigid);
    let handle = first_constraint(&r.engine, r.source);

    r.engine.physics.apply_load(handle, 10.0, 0.0);
    r.engine.fixed_update();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));

    r.engine.physics.apply_load(handle, 100.0, 0.0);
    r.engine.fixed_update();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::Available));
    assert!(!r.engine.has_joint(r.source));
    assert_eq!(r.engine.physics.constraint_count(), 0);
    assert!(!r.engine.renderer_started(r.source));

    let broken = r.log.broken();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].actor, LinkActor::Physics);
    assert!(broken[0].externally_caused());
    assert_ne!(r.engine.vessel_of(r.source_body), r.engine.vessel_of(r.target_body));
}

#[test]
fn break_from_either_side() {
    for from_target in [false, true] {
        let mut r = linked_rig(JointKind::Spring);
        let at = if from_target { r.target } else { r.source };
        assert!(r.engine.break_link_at(at, LinkActor::Player).unwrap());
        assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));
        assert_eq!(r.engine.link_state(r.target), Some(LinkState::Available));
        assert_eq!(r.engine.partner(r.source), None);
        assert_eq!(r.engine.partner(r.target), None);
        assert!(!r.engine.has_joint(r.source));
        assert!(!r.log.broken()[0].externally_caused());

        // Idempotent.
        assert!(!r.engine.break_link_at(at, LinkActor::Player).unwrap());
        assert!(!r.engine.sever_link(r.source, LinkActor::Api, false).unwrap());
    }
}

#[test]
fn break_current_link_rules() {
    let mut r = rig(0.5);
    assert!(!r.engine.break_current_link(r.source, false).unwrap());
    assert!(matches!(
        r.engine.break_current_link(r.target, false),
        Err(LinkError::WrongRole { .. })
    ));
}

#[test]
fn break_with_focus_moves_to_target_vessel() {
    let mut r = rig(0.5);
    let original_target_vessel = r.engine.vessel_of(r.target_body);
    r.engine.set_focus(r.engine.vessel_of(r.source_body));
    r.engine.link(r.source, r.target, LinkActor::Api).unwrap();

    assert!(r.engine.break_current_link(r.source, true).unwrap());
    assert_eq!(r.engine.vessel_of(r.target_body), original_target_vessel);
    assert_eq!(r.engine.focused_vessel(), original_target_vessel);
}

#[test]
fn decouple_breaks_links_externally() {
    let mut r = linked_rig(JointKind::Rigid);
    assert_eq!(r.engine.decouple(r.target_body).unwrap(), 1);
    let broken = r.log.broken();
    assert_eq!(broken[0].actor, LinkActor::Decouple);
    assert!(broken[0].externally_caused());
    assert_eq!(r.engine.decouple(r.target_body).unwrap(), 0);
}

#[test]
fn destroying_a_body_breaks_its_link() {
    let mut r = linked_rig(JointKind::Rigid);
    r.engine.destroy_body(r.target_body).unwrap();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Available));
    assert_eq!(r.engine.link_state(r.target), None);
    assert_eq!(r.log.broken()[0].actor, LinkActor::Api);
    assert_eq!(r.engine.physics.constraint_count(), 0);
}

// ── Joints ─────────────────────────────────────────────────────────────

#[test]
fn packed_joint_never_breaks() {
    let mut r = linked_rig(JointKind::Rigid);
    let handle = first_constraint(&r.engine, r.source);

    r.engine.set_packed(true);
    assert!(r.engine.physics.constraint(handle).unwrap().locked);
    r.engine.physics.apply_load(handle, 1e6, 1e6);
    r.engine.fixed_update();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));

    // Loads from the suspended period are gone after resume.
    r.engine.set_packed(false);
    let c = r.engine.physics.constraint(handle).unwrap();
    assert!(!c.locked);
    assert_eq!(c.break_force, 40.0);
    r.engine.fixed_update();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));

    // So is a load queued right before suspending.
    r.engine.physics.apply_load(handle, 1e6, 1e6);
    r.engine.set_packed(true);
    r.engine.set_packed(false);
    r.engine.fixed_update();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));
    assert!(r.log.broken().is_empty());
}

#[test]
fn two_stage_joint_completes_after_one_step() {
    let mut r = linked_rig(JointKind::TwoStage);
    assert!(matches!(
        r.engine.joint_stage(r.source),
        Some(JointStage::Settling { .. })
    ));
    assert_eq!(r.engine.physics.anchor_count(), 2);

    r.engine.fixed_update();
    assert_eq!(r.engine.joint_stage(r.source), Some(JointStage::Active));
    assert_eq!(r.engine.physics.constraint_count(), 3);

    r.engine.break_current_link(r.source, false).unwrap();
    assert_eq!(r.engine.physics.anchor_count(), 0);
    assert_eq!(r.engine.physics.constraint_count(), 0);
}

#[test]
fn two_stage_joint_settles_immediately_when_scene_allows() {
    let mut r = rig_with(0.5, JointKind::TwoStage);
    r.engine.physics.settles_immediately = true;
    r.engine.link(r.source, r.target, LinkActor::Api).unwrap();
    assert_eq!(r.engine.joint_stage(r.source), Some(JointStage::Active));
}

// ── Renderers ──────────────────────────────────────────────────────────

#[test]
fn telescopic_renderer_follows_bodies() {
    let layout = TelescopeLayout {
        piston_count: 4,
        piston_length: 0.4,
        min_overlap: 0.05,
    };
    let mut engine = LinkEngine::new();
    let a = engine.spawn_body(BodySpec::new("a"));
    let b = engine.spawn_body(BodySpec::new("b").at(Vec3::new(0.0, 0.0, 0.8)));
    let mut config = strut_config(JointKind::Rigid);
    config.renderer = RendererKind::Telescopic(layout);
    let s = engine.add_endpoint(a, EndpointSpec::source("strut", config)).unwrap();
    let t = engine
        .add_endpoint(b, EndpointSpec::target("strut").at(facing_back(0.0)))
        .unwrap();
    engine.start().unwrap();
    engine.link(s, t, LinkActor::Api).unwrap();
    assert!((engine.rendered_length(s) - 0.8).abs() < 1e-4);

    engine.set_body_pose(b, Pose::at(Vec3::new(0.0, 0.0, 1.2))).unwrap();
    engine.update(1.0 / 60.0);
    assert!((engine.rendered_length(s) - 1.2).abs() < 1e-4);

    engine.set_body_pose(b, Pose::at(Vec3::new(0.0, 0.0, 9.0))).unwrap();
    engine.update(1.0 / 60.0);
    assert!((engine.rendered_length(s) - layout.max_length()).abs() < 1e-4);
}

// ── Lifecycle ──────────────────────────────────────────────────────────

#[test]
fn stop_then_start_uses_explicit_state() {
    let mut r = rig(0.5);
    for initial in [LinkState::Locked, LinkState::RejectingLinks, LinkState::Available] {
        r.engine.stop_endpoint(r.target).unwrap();
        assert_eq!(r.engine.link_state(r.target), None);
        assert_eq!(r.engine.bus.subscription_count(r.target), 0);
        r.engine.start_endpoint(r.target, initial).unwrap();
        assert_eq!(r.engine.link_state(r.target), Some(initial));
    }
}

#[test]
fn stopping_a_linked_endpoint_breaks_its_link() {
    let mut r = linked_rig(JointKind::Rigid);
    r.engine.stop_endpoint(r.source).unwrap();
    assert_eq!(r.engine.link_state(r.source), None);
    assert!(!r.engine.has_joint(r.source));
    assert_eq!(r.engine.physics.constraint_count(), 0);
    assert_eq!(r.engine.partner(r.target), None);
    assert_eq!(r.engine.link_state(r.target), Some(LinkState::Available));
    assert_eq!(r.log.broken().len(), 1);

    // No leftover link after a restart.
    r.engine.start_endpoint(r.source, LinkState::Available).unwrap();
    assert_eq!(r.engine.partner(r.source), None);
    r.engine.link(r.source, r.target, LinkActor::Api).unwrap();
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));
}

#[test]
fn illegal_transition_is_rejected() {
    let mut r = rig(0.5);
    // A target can't enter linking mode.
    assert!(matches!(
        r.engine.start_linking(r.target, LinkMode::Api),
        Err(LinkError::WrongRole { .. })
    ));
    r.engine.link(r.source, r.target, LinkActor::Api).unwrap();
    assert_eq!(
        r.engine.start_linking(r.source, LinkMode::Api),
        Err(LinkError::Rejected(LinkFailure::SourceNotReady(LinkState::Linked)))
    );
    assert_eq!(r.engine.link_state(r.source), Some(LinkState::Linked));
}

// ── Presets ────────────────────────────────────────────────────────────

#[test]
fn shipped_presets_link() {
    let catalog = load_presets(PRESETS_JSON).unwrap();
    assert!(catalog.len() >= 4);

    let mut engine = LinkEngine::new();
    let a = engine.spawn_body(BodySpec::new("a"));
    let b = engine.spawn_body(BodySpec::new("b").at(Vec3::new(0.0, 0.0, 0.5)));
    let s = engine.add_endpoint(a, catalog.spec("strut-source").unwrap()).unwrap();
    let t = engine.add_endpoint(b, catalog.spec("strut-target").unwrap()).unwrap();
    engine.start().unwrap();

    engine.link(s, t, LinkActor::Api).unwrap();
    assert_eq!(engine.link_state(t), Some(LinkState::Linked));
    assert_eq!(engine.endpoint_named(b, "strut-anchor"), Some(t));
}
