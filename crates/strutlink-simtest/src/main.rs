//! StrutLink Headless Simulation Harness
//!
//! Drives the link engine through whole scenarios with the stand-in
//! physics scene. No host engine, no rendering.
//!
//! Usage:
//!   cargo run -p strutlink-simtest
//!   cargo run -p strutlink-simtest -- --verbose

use hecs::Entity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strutlink_core::config::{load_presets, PresetCatalog};
use strutlink_core::joint::JointController;
use strutlink_core::prelude::*;
use strutlink_logic::failure::LinkFailure;
use strutlink_logic::limits::JointLimits;
use strutlink_logic::link_state::{allowed_transitions, is_allowed};
use strutlink_logic::math::{Pose, Quat, Vec3};
use strutlink_logic::state_machine::StateMachine;

// ── Presets (same JSON hosts load) ──────────────────────────────────────
const PRESETS_JSON: &str = include_str!("../../../data/link_presets.json");

const SWEEP_SEED: u64 = 0x5742_5554;
const SWEEP_ROUNDS: usize = 500;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    env_logger::Builder::from_default_env()
        .filter_level(if verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Off
        })
        .init();
    println!("=== StrutLink Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Preset catalog validation
    let catalog = match load_presets(PRESETS_JSON) {
        Ok(c) => Some(c),
        Err(e) => {
            results.push(check("presets_parse", false, format!("{}", e)));
            None
        }
    };
    if let Some(catalog) = &catalog {
        results.extend(validate_presets(catalog));
    }

    // 2. Transition table sweep
    results.extend(validate_transition_tables());

    // 3. Random transition fuzzing
    results.extend(validate_random_transitions());

    // 4. Link lifecycle on shipped presets
    if let Some(catalog) = &catalog {
        results.extend(validate_link_lifecycle(catalog));
    }

    // 5. Check purity sweep
    results.extend(validate_check_purity());

    // 6. Physics breakage & packing
    results.extend(validate_physics_breaks());

    // 7. Save/load round trip
    results.extend(validate_persistence());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Scene helpers ───────────────────────────────────────────────────────

struct Scene {
    engine: LinkEngine,
    log: EventLog,
    source: Entity,
    target: Entity,
}

/// Two bodies `distance` apart with one endpoint each, already started.
fn build_scene(source: EndpointSpec, target: EndpointSpec, distance: f32) -> Result<Scene, LinkError> {
    let mut engine = LinkEngine::new();
    let log = EventLog::new();
    engine.bus.add_listener(Box::new(log.clone()));

    let a = engine.spawn_body(BodySpec::new("tank"));
    let b = engine.spawn_body(BodySpec::new("truss").at(Vec3::new(0.0, 0.0, distance)));
    let source = engine.add_endpoint(a, source)?;
    let target = engine.add_endpoint(b, target)?;
    engine.start()?;
    Ok(Scene {
        engine,
        log,
        source,
        target,
    })
}

fn strut_scene(catalog: &PresetCatalog, distance: f32) -> Option<Scene> {
    let source = catalog.spec("strut-source").ok()?;
    let target = catalog.spec("strut-target").ok()?;
    build_scene(source, target, distance).ok()
}

fn plain_strut_scene(joint: JointKind, distance: f32) -> Option<Scene> {
    let config = SourceConfig {
        joint,
        limits: JointLimits {
            max_length: 2.0,
            source_angle_limit: 30.0,
            target_angle_limit: 30.0,
            break_force: 40.0,
            break_torque: 40.0,
            ..Default::default()
        },
        ..Default::default()
    };
    build_scene(
        EndpointSpec::source("strut", config),
        EndpointSpec::target("strut").at(Pose::looking(Vec3::ZERO, -Vec3::FORWARD)),
        distance,
    )
    .ok()
}

fn joint_constraints(engine: &LinkEngine, source: Entity) -> Vec<strutlink_core::physics::ConstraintHandle> {
    engine
        .world
        .get::<&JointController>(source)
        .map(|j| j.constraints().to_vec())
        .unwrap_or_default()
}

// ── 1. Presets ──────────────────────────────────────────────────────────

fn validate_presets(catalog: &PresetCatalog) -> Vec<TestResult> {
    println!("--- Presets ---");
    let mut results = Vec::new();

    results.push(check(
        "presets_not_empty",
        catalog.len() >= 4,
        format!("{} presets loaded", catalog.len()),
    ));

    let names: Vec<&str> = catalog.names().collect();
    let bad_specs: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| catalog.spec(n).is_err())
        .collect();
    results.push(check(
        "presets_build_specs",
        bad_specs.is_empty(),
        if bad_specs.is_empty() {
            "every preset builds an endpoint spec".to_string()
        } else {
            format!("failed: {}", bad_specs.join(", "))
        },
    ));

    // Every source type needs at least one target of the same type.
    let orphans: Vec<String> = names
        .iter()
        .filter_map(|n| catalog.get(n))
        .filter(|p| p.role == EndpointRole::Source)
        .filter(|p| {
            !names
                .iter()
                .filter_map(|n| catalog.get(n))
                .any(|t| t.role == EndpointRole::Target && t.link_type == p.link_type)
        })
        .map(|p| p.name.clone())
        .collect();
    results.push(check(
        "presets_sources_have_targets",
        orphans.is_empty(),
        if orphans.is_empty() {
            "every source type has a matching target".to_string()
        } else {
            format!("no target for: {}", orphans.join(", "))
        },
    ));

    let bad_limits: Vec<String> = names
        .iter()
        .filter_map(|n| catalog.get(n))
        .filter_map(|p| p.source.as_ref().map(|s| (p, s)))
        .filter(|(_, s)| {
            let l = &s.limits;
            l.min_length < 0.0
                || (l.max_length > 0.0 && l.max_length < l.min_length)
                || l.source_angle_limit < 0.0
                || l.target_angle_limit < 0.0
        })
        .map(|(p, _)| p.name.clone())
        .collect();
    results.push(check(
        "presets_sane_limits",
        bad_limits.is_empty(),
        if bad_limits.is_empty() {
            "all source limits are consistent".to_string()
        } else {
            format!("bad limits: {}", bad_limits.join(", "))
        },
    ));

    results
}

// ── 2. Transition Tables ────────────────────────────────────────────────

fn validate_transition_tables() -> Vec<TestResult> {
    println!("--- Transition Tables ---");
    let mut results = Vec::new();

    for role in [EndpointRole::Source, EndpointRole::Target] {
        // Only Available may reach Linked/Locked through the transient states.
        let direct_links: Vec<LinkState> = LinkState::ALL
            .iter()
            .copied()
            .filter(|&from| from != LinkState::Linking && from != LinkState::AcceptingLinks)
            .filter(|&from| from != LinkState::Linked && is_allowed(role, from, LinkState::Linked))
            .collect();
        results.push(check(
            &format!("{:?}_linked_only_via_transient", role).to_lowercase(),
            direct_links.is_empty(),
            format!("direct routes into Linked: {:?}", direct_links),
        ));

        // Every state can get back to Available.
        let stuck: Vec<LinkState> = LinkState::ALL
            .iter()
            .copied()
            .filter(|&s| !allowed_transitions(role, s).is_empty())
            .filter(|&s| s != LinkState::Available && !is_allowed(role, s, LinkState::Available))
            .collect();
        results.push(check(
            &format!("{:?}_returns_to_available", role).to_lowercase(),
            stuck.is_empty(),
            format!("states without a way back: {:?}", stuck),
        ));
    }

    results.push(check(
        "only_sources_link",
        is_allowed(EndpointRole::Source, LinkState::Available, LinkState::Linking)
            && !is_allowed(EndpointRole::Target, LinkState::Available, LinkState::Linking),
        "Linking is a source-only state",
    ));
    results.push(check(
        "only_targets_accept",
        is_allowed(EndpointRole::Target, LinkState::Available, LinkState::AcceptingLinks)
            && !is_allowed(EndpointRole::Source, LinkState::Available, LinkState::AcceptingLinks),
        "AcceptingLinks is a target-only state",
    ));

    results
}

// ── 3. Random Transitions ───────────────────────────────────────────────

fn validate_random_transitions() -> Vec<TestResult> {
    println!("--- Random Transitions ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(SWEEP_SEED);

    for role in [EndpointRole::Source, EndpointRole::Target] {
        let mut sm: StateMachine<LinkState, ()> = StateMachine::new();
        for from in LinkState::ALL {
            sm.set_transition_constraint(from, allowed_transitions(role, from));
        }
        sm.start(&mut (), LinkState::Available);

        let mut mismatches = 0;
        let mut expected_rejections = 0;
        for _ in 0..SWEEP_ROUNDS {
            let from = sm.current_state().unwrap_or(LinkState::Available);
            let to = LinkState::ALL[rng.gen_range(0..LinkState::ALL.len())];
            let legal = is_allowed(role, from, to);
            if !legal {
                expected_rejections += 1;
            }
            let switched = sm.try_switch_to(&mut (), to);
            let now = sm.current_state();
            if switched != legal || (legal && now != Some(to)) || (!legal && now != Some(from)) {
                mismatches += 1;
            }
        }
        results.push(check(
            &format!("{:?}_random_walk", role).to_lowercase(),
            mismatches == 0 && sm.rejections() == expected_rejections,
            format!(
                "{} steps, {} refused, {} mismatches",
                SWEEP_ROUNDS,
                sm.rejections(),
                mismatches
            ),
        ));
    }

    results
}

// ── 4. Link Lifecycle ───────────────────────────────────────────────────

fn validate_link_lifecycle(catalog: &PresetCatalog) -> Vec<TestResult> {
    println!("--- Link Lifecycle ---");
    let mut results = Vec::new();

    let Some(mut scene) = strut_scene(catalog, 0.5) else {
        results.push(check("lifecycle_scene", false, "could not build preset scene"));
        return results;
    };
    let (s, t) = (scene.source, scene.target);

    let started = scene.engine.start_linking(s, LinkMode::Interactive);
    results.push(check(
        "lifecycle_start_linking",
        started.is_ok()
            && scene.engine.link_state(s) == Some(LinkState::Linking)
            && scene.engine.link_state(t) == Some(LinkState::AcceptingLinks)
            && scene.engine.is_highlighted(t),
        format!(
            "source {:?}, target {:?}",
            scene.engine.link_state(s),
            scene.engine.link_state(t)
        ),
    ));

    let linked = scene.engine.link_to_target(s, t, LinkActor::Player);
    results.push(check(
        "lifecycle_link",
        linked.is_ok()
            && scene.engine.link_state(s) == Some(LinkState::Linked)
            && scene.engine.link_state(t) == Some(LinkState::Linked)
            && scene.engine.partner(s) == Some(t)
            && scene.engine.partner(t) == Some(s),
        format!("{:?}", linked),
    ));

    let tank = scene.engine.body_of(s);
    let truss = scene.engine.body_of(t);
    let merged = tank.and_then(|b| scene.engine.vessel_of(b)) == truss.and_then(|b| scene.engine.vessel_of(b));
    results.push(check(
        "lifecycle_vessels_merged",
        merged,
        "linking couples the target into the source vessel",
    ));

    scene.engine.update(1.0 / 60.0);
    let length = scene.engine.rendered_length(s);
    results.push(check(
        "lifecycle_renderer",
        scene.engine.renderer_started(s) && (length - 0.5).abs() < 1e-3,
        format!("rendered length {:.3} m", length),
    ));

    results.push(check(
        "lifecycle_created_event",
        scene.log.created().len() == 1 && !scene.log.created()[0].externally_caused(),
        format!("{} created events", scene.log.created().len()),
    ));

    // A connector added to a linked part joins its locked siblings.
    let late = tank.and_then(|b| {
        scene
            .engine
            .add_endpoint(b, EndpointSpec::source("hose", SourceConfig::default()))
            .ok()
    });
    let late_state = late.and_then(|e| scene.engine.link_state(e));
    results.push(check(
        "lifecycle_late_endpoint_locked",
        late_state == Some(LinkState::Locked),
        format!("{:?}", late_state),
    ));

    let broke = scene.engine.break_current_link(s, false);
    results.push(check(
        "lifecycle_break",
        matches!(broke, Ok(true))
            && scene.engine.link_state(s) == Some(LinkState::Available)
            && scene.engine.link_state(t) == Some(LinkState::Available)
            && !scene.engine.has_joint(s)
            && !scene.engine.renderer_started(s),
        format!("{:?}", broke),
    ));
    let split = tank.and_then(|b| scene.engine.vessel_of(b)) != truss.and_then(|b| scene.engine.vessel_of(b));
    let late_state = late.and_then(|e| scene.engine.link_state(e));
    results.push(check(
        "lifecycle_late_endpoint_unlocked",
        late_state == Some(LinkState::Available),
        format!("{:?}", late_state),
    ));
    results.push(check(
        "lifecycle_vessels_split",
        split,
        "breaking restores the target's vessel",
    ));

    // Out of reach: preset strut is 2 m max.
    if let Some(mut far) = strut_scene(catalog, 3.0) {
        let res = far.engine.link(far.source, far.target, LinkActor::Api);
        results.push(check(
            "lifecycle_too_long",
            matches!(res, Err(LinkError::Rejected(LinkFailure::TooLong { .. })))
                && far.engine.link_state(far.source) == Some(LinkState::Available),
            format!("{:?}", res),
        ));
    }

    results
}

// ── 5. Check Purity ─────────────────────────────────────────────────────

fn validate_check_purity() -> Vec<TestResult> {
    println!("--- Check Purity ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(SWEEP_SEED + 1);

    let Some(mut scene) = plain_strut_scene(JointKind::Rigid, 1.0) else {
        results.push(check("purity_scene", false, "could not build scene"));
        return results;
    };
    let (s, t) = (scene.source, scene.target);
    let target_body = scene.engine.body_of(t);
    if scene.engine.start_linking(s, LinkMode::Api).is_err() {
        results.push(check("purity_start", false, "start_linking failed"));
        return results;
    }

    let mut changed = 0;
    let mut accepted = 0;
    let mut inconsistent = 0;
    for _ in 0..SWEEP_ROUNDS {
        let pos = Vec3::new(
            rng.gen_range(-0.6..0.6),
            rng.gen_range(-0.6..0.6),
            rng.gen_range(0.05..3.0),
        );
        let yaw: f32 = rng.gen_range(-45.0..45.0);
        let pose = Pose::new(pos, Quat::from_axis_angle(Vec3::UP, yaw));
        if let Some(b) = target_body {
            let _ = scene.engine.set_body_pose(b, pose);
        }

        let before = (
            scene.engine.link_state(s),
            scene.engine.link_state(t),
            scene.engine.world.len(),
            scene.engine.physics.constraint_count(),
        );
        let verdict = scene.engine.check_can_link_to(s, t);
        let after = (
            scene.engine.link_state(s),
            scene.engine.link_state(t),
            scene.engine.world.len(),
            scene.engine.physics.constraint_count(),
        );
        if before != after {
            changed += 1;
        }
        if verdict.is_ok() {
            accepted += 1;
            let length = scene
                .engine
                .node_pose(s)
                .and_then(|a| scene.engine.node_pose(t).map(|b| a.position.distance(&b.position)))
                .unwrap_or(f32::MAX);
            if length > 2.0 + 1e-4 {
                inconsistent += 1;
            }
        }
    }

    results.push(check(
        "purity_no_side_effects",
        changed == 0,
        format!("{} of {} checks changed state", changed, SWEEP_ROUNDS),
    ));
    results.push(check(
        "purity_verdicts_consistent",
        inconsistent == 0 && accepted > 0,
        format!("{} accepted, {} beyond max length", accepted, inconsistent),
    ));

    results
}

// ── 6. Physics Breaks ───────────────────────────────────────────────────

fn validate_physics_breaks() -> Vec<TestResult> {
    println!("--- Physics Breaks ---");
    let mut results = Vec::new();

    let Some(mut scene) = plain_strut_scene(JointKind::Rigid, 0.5) else {
        results.push(check("physics_scene", false, "could not build scene"));
        return results;
    };
    let (s, t) = (scene.source, scene.target);
    if scene.engine.link(s, t, LinkActor::Api).is_err() {
        results.push(check("physics_link", false, "link failed"));
        return results;
    }

    // Below the threshold nothing happens.
    for handle in joint_constraints(&scene.engine, s) {
        scene.engine.physics.apply_load(handle, 10.0, 0.0);
    }
    scene.engine.fixed_update();
    results.push(check(
        "physics_light_load_holds",
        scene.engine.link_state(s) == Some(LinkState::Linked),
        "10 kN against a 40 kN joint",
    ));

    // Packed joints hold, and nothing queued while packed survives the resume.
    scene.engine.set_packed(true);
    for handle in joint_constraints(&scene.engine, s) {
        scene.engine.physics.apply_load(handle, 1000.0, 1000.0);
    }
    scene.engine.fixed_update();
    let held_while_packed = scene.engine.link_state(s) == Some(LinkState::Linked);
    scene.engine.set_packed(false);
    scene.engine.fixed_update();
    results.push(check(
        "physics_packed_holds",
        held_while_packed && scene.engine.link_state(s) == Some(LinkState::Linked),
        "1000 kN while packed",
    ));

    for handle in joint_constraints(&scene.engine, s) {
        scene.engine.physics.apply_load(handle, 100.0, 0.0);
    }
    scene.engine.fixed_update();
    let broken = scene.log.broken();
    results.push(check(
        "physics_overload_breaks",
        scene.engine.link_state(s) == Some(LinkState::Available)
            && scene.engine.link_state(t) == Some(LinkState::Available)
            && broken.len() == 1
            && broken[0].externally_caused(),
        format!("{} broken events", broken.len()),
    ));

    // Two-stage joints settle after one physics step.
    if let Some(mut two) = plain_strut_scene(JointKind::TwoStage, 0.5) {
        two.engine.physics.settles_immediately = false;
        let ok = two.engine.link(two.source, two.target, LinkActor::Api).is_ok();
        let settling = matches!(two.engine.joint_stage(two.source), Some(JointStage::Settling { .. }));
        two.engine.fixed_update();
        let active = two.engine.joint_stage(two.source) == Some(JointStage::Active);
        results.push(check(
            "physics_two_stage_settles",
            ok && settling && active,
            format!("settling {}, active after step {}", settling, active),
        ));
    }

    results
}

// ── 7. Persistence ──────────────────────────────────────────────────────

fn validate_persistence() -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let Some(mut scene) = plain_strut_scene(JointKind::Spring, 0.8) else {
        results.push(check("persist_scene", false, "could not build scene"));
        return results;
    };
    let (s, t) = (scene.source, scene.target);
    if scene.engine.link(s, t, LinkActor::Api).is_err() {
        results.push(check("persist_link", false, "link failed"));
        return results;
    }

    let mut buf = Vec::new();
    if let Err(e) = scene.engine.save(&mut buf) {
        results.push(check("persist_save", false, format!("{}", e)));
        return results;
    }
    results.push(check(
        "persist_save",
        !buf.is_empty(),
        format!("{} bytes", buf.len()),
    ));

    let mut loaded = LinkEngine::new();
    match loaded.load(&buf[..]) {
        Ok(report) => {
            results.push(check(
                "persist_report",
                report.links_restored == 1 && report.links_reset == 0,
                format!("{:?}", report),
            ));
            let linked = loaded
                .world
                .query::<&Endpoint>()
                .iter()
                .filter(|(_, ep)| ep.state() == Some(LinkState::Linked))
                .count();
            results.push(check(
                "persist_states",
                linked == 2,
                format!("{} linked endpoints after load", linked),
            ));
        }
        Err(e) => results.push(check("persist_load", false, format!("{}", e))),
    }

    // Truncated data is refused, not half-applied.
    let mut broken = LinkEngine::new();
    let truncated = broken.load(&buf[..buf.len() / 2]);
    results.push(check(
        "persist_truncated_refused",
        truncated.is_err() && broken.world.len() == 0,
        format!("{:?}", truncated.err().map(|e| e.to_string())),
    ));

    results
}
