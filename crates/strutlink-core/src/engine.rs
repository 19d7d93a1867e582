//! Link engine - owns the world and drives endpoints through the host's
//! frame and physics callbacks.

use std::collections::HashMap;

use hecs::{Entity, World};
use strutlink_logic::link_state::{EndpointRole, LinkState};
use strutlink_logic::math::Pose;
use strutlink_logic::sweep::Obstacle;

use crate::bus::{Channel, EventBus, LinkActor};
use crate::components::*;
use crate::error::LinkError;
use crate::joint::{JointController, JointStage};
use crate::physics::PhysicsScene;
use crate::renderer::{make_renderer, RendererSlot};

/// Live link, stored on the source endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub target: Entity,
    pub actor: LinkActor,
    /// Vessel id the target half gets back when the link is broken.
    pub restore_vessel: Option<VesselId>,
}

/// Main link engine
pub struct LinkEngine {
    /// ECS world holding bodies and endpoints
    pub world: World,
    /// Link broadcasts and observers
    pub bus: EventBus,
    /// Joint constraints
    pub physics: PhysicsScene,
    pub(crate) bodies: HashMap<BodyId, Entity>,
    pub(crate) next_body: u32,
    pub(crate) next_vessel: u32,
    pub(crate) focused_vessel: Option<VesselId>,
    pub(crate) eva_active: bool,
    pub(crate) packed: bool,
    pub(crate) started: bool,
    pub(crate) messages: Vec<String>,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self {
            world: World::new(),
            bus: EventBus::new(),
            physics: PhysicsScene::new(),
            bodies: HashMap::new(),
            next_body: 1,
            next_vessel: 1,
            focused_vessel: None,
            eva_active: false,
            packed: false,
            started: false,
            messages: Vec::new(),
        }
    }

    // ── Bodies and endpoints ───────────────────────────────────────────

    pub(crate) fn allocate_vessel(&mut self) -> VesselId {
        let id = VesselId(self.next_vessel);
        self.next_vessel += 1;
        id
    }

    /// Spawn a body. A body with a parent joins the parent's vessel;
    /// otherwise it starts a vessel of its own.
    pub fn spawn_body(&mut self, spec: BodySpec) -> Entity {
        let id = BodyId(self.next_body);
        self.next_body += 1;

        let parent_vessel = spec
            .parent
            .and_then(|p| self.bodies.get(&p))
            .and_then(|e| self.world.get::<&Body>(*e).ok().map(|b| b.vessel));
        if spec.parent.is_some() && parent_vessel.is_none() {
            log::warn!("Body {:?} has an unknown parent {:?}", spec.name, spec.parent);
        }
        let vessel = match parent_vessel {
            Some(v) => v,
            None => self.allocate_vessel(),
        };

        let entity = self.world.spawn((Body {
            id,
            name: spec.name,
            vessel,
            parent: spec.parent,
            pose: spec.pose,
            collider: spec.collider,
        },));
        self.bodies.insert(id, entity);
        entity
    }

    /// Attach an endpoint to `body`. Once the engine is started, new
    /// endpoints start right away: Locked if the body already carries a
    /// live link, Available otherwise.
    pub fn add_endpoint(&mut self, body: Entity, mut spec: EndpointSpec) -> Result<Entity, LinkError> {
        if self.world.get::<&Body>(body).is_err() {
            return Err(LinkError::MissingBody(body));
        }
        if spec.role == EndpointRole::Source && spec.source_config.is_none() {
            log::warn!("Source {:?} has no configuration, using defaults", spec.node_name);
            spec.source_config = Some(SourceConfig::default());
        }

        let renderer = spec
            .source_config
            .as_ref()
            .filter(|_| spec.role == EndpointRole::Source)
            .map(|c| make_renderer(&c.renderer));
        let entity = self.world.spawn((Endpoint::new(body, spec),));
        if let Some(r) = renderer {
            let _ = self.world.insert_one(entity, RendererSlot(r));
        }

        if self.started {
            let initial = if self.body_has_live_link(body) {
                LinkState::Locked
            } else {
                LinkState::Available
            };
            self.start_endpoint(entity, initial)?;
        }
        Ok(entity)
    }

    /// Start every endpoint that is not running yet, in Available.
    pub fn start(&mut self) -> Result<(), LinkError> {
        self.started = true;
        let mut pending: Vec<Entity> = self
            .world
            .query::<&Endpoint>()
            .iter()
            .filter(|(_, ep)| !ep.is_started())
            .map(|(e, _)| e)
            .collect();
        pending.sort_by_key(|e| e.id());
        for e in pending {
            self.start_endpoint(e, LinkState::Available)?;
        }
        Ok(())
    }

    /// Start (or restart) one endpoint in `initial`.
    pub fn start_endpoint(&mut self, endpoint: Entity, initial: LinkState) -> Result<(), LinkError> {
        let mut effects = EffectList::new();
        self.endpoint_mut(endpoint)?.start(&mut effects, initial);
        self.apply_effects(endpoint, effects);
        Ok(())
    }

    /// Stop an endpoint's machine, dropping its subscriptions. A live link
    /// on the endpoint is broken first.
    pub fn stop_endpoint(&mut self, endpoint: Entity) -> Result<(), LinkError> {
        if self.link_state(endpoint) == Some(LinkState::Linked) {
            self.break_link_at(endpoint, LinkActor::Api)?;
        }
        let mut effects = EffectList::new();
        self.endpoint_mut(endpoint)?.stop(&mut effects);
        self.apply_effects(endpoint, effects);
        Ok(())
    }

    /// Remove a body and its endpoints, breaking their links first.
    pub fn destroy_body(&mut self, body: Entity) -> Result<(), LinkError> {
        let id = self
            .world
            .get::<&Body>(body)
            .map_err(|_| LinkError::MissingBody(body))?
            .id;

        for ep in self.endpoints_on(body) {
            self.break_link_at(ep, LinkActor::Api)?;
        }
        for ep in self.endpoints_on(body) {
            self.stop_endpoint(ep)?;
            let _ = self.world.despawn(ep);
        }
        let _ = self.world.despawn(body);
        self.bodies.remove(&id);
        log::info!("Destroyed body {:?}", id);
        Ok(())
    }

    pub fn set_body_pose(&mut self, body: Entity, pose: Pose) -> Result<(), LinkError> {
        let mut b = self
            .world
            .get::<&mut Body>(body)
            .map_err(|_| LinkError::MissingBody(body))?;
        b.pose = pose;
        Ok(())
    }

    // ── Host state ─────────────────────────────────────────────────────

    pub fn set_eva_active(&mut self, active: bool) {
        self.eva_active = active;
    }

    pub fn set_focus(&mut self, vessel: Option<VesselId>) {
        self.focused_vessel = vessel;
    }

    pub fn focused_vessel(&self) -> Option<VesselId> {
        self.focused_vessel
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Suspend or resume physics. Suspended joints are locked and can't break;
    /// loads queued before the switch are dropped.
    pub fn set_packed(&mut self, packed: bool) {
        if self.packed == packed {
            return;
        }
        self.packed = packed;
        self.physics.clear_loads();
        for (_, joint) in self.world.query_mut::<&mut JointController>() {
            joint.adjust_joint(&mut self.physics, packed);
        }
        log::debug!("Physics {}", if packed { "suspended" } else { "resumed" });
    }

    /// Messages meant for the user, oldest first. Draining.
    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    // ── Frame callbacks ────────────────────────────────────────────────

    /// Per-frame refresh of every started renderer.
    pub fn update(&mut self, _delta_seconds: f32) {
        let sources: Vec<Entity> = self
            .world
            .query::<(&Endpoint, &RendererSlot)>()
            .iter()
            .filter(|(_, (ep, slot))| ep.partner.is_some() && slot.0.is_started())
            .map(|(e, _)| e)
            .collect();
        for source in sources {
            let Some((s, t)) = self.link_poses(source) else {
                continue;
            };
            if let Ok(mut slot) = self.world.get::<&mut RendererSlot>(source) {
                slot.0.update_link(&s, &t);
            }
        }
    }

    /// One physics step. Pending two-stage joints finish first, then
    /// broken joints are severed.
    pub fn fixed_update(&mut self) {
        if self.packed {
            return;
        }
        let broken = self.physics.step();

        for (_, joint) in self.world.query_mut::<&mut JointController>() {
            if joint.complete_pending(&mut self.physics) {
                log::debug!("Two-stage joint connected at tick {}", self.physics.tick());
            }
        }

        if broken.is_empty() {
            return;
        }
        let mut sources: Vec<Entity> = self
            .world
            .query::<&JointController>()
            .iter()
            .filter(|(_, joint)| broken.iter().any(|h| joint.owns(*h)))
            .map(|(e, _)| e)
            .collect();
        sources.sort_by_key(|e| e.id());
        for source in sources {
            log::warn!("Joint of {:?} broke under load", source);
            if let Err(e) = self.sever_link(source, LinkActor::Physics, false) {
                log::error!("Failed to sever broken link {:?}: {}", source, e);
            }
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn body_entity(&self, id: BodyId) -> Option<Entity> {
        self.bodies.get(&id).copied()
    }

    pub fn link_state(&self, endpoint: Entity) -> Option<LinkState> {
        self.world
            .get::<&Endpoint>(endpoint)
            .ok()
            .and_then(|ep| ep.link_state())
    }

    pub fn partner(&self, endpoint: Entity) -> Option<Entity> {
        self.world
            .get::<&Endpoint>(endpoint)
            .ok()
            .and_then(|ep| ep.linked_partner())
    }

    pub fn vessel_of(&self, body: Entity) -> Option<VesselId> {
        self.world.get::<&Body>(body).ok().map(|b| b.vessel)
    }

    pub fn body_of(&self, endpoint: Entity) -> Option<Entity> {
        self.world.get::<&Endpoint>(endpoint).ok().map(|ep| ep.body)
    }

    pub fn has_joint(&self, source: Entity) -> bool {
        self.world.get::<&JointController>(source).is_ok()
    }

    pub fn joint_stage(&self, source: Entity) -> Option<JointStage> {
        self.world.get::<&JointController>(source).ok().map(|j| j.stage())
    }

    pub fn is_highlighted(&self, endpoint: Entity) -> bool {
        self.world
            .get::<&Endpoint>(endpoint)
            .is_ok_and(|ep| ep.is_highlighted())
    }

    pub fn has_attach_point(&self, endpoint: Entity) -> bool {
        self.world
            .get::<&Endpoint>(endpoint)
            .is_ok_and(|ep| ep.attach_point().is_some())
    }

    pub fn renderer_started(&self, source: Entity) -> bool {
        self.world
            .get::<&RendererSlot>(source)
            .is_ok_and(|slot| slot.0.is_started())
    }

    pub fn rendered_length(&self, source: Entity) -> f32 {
        self.world
            .get::<&RendererSlot>(source)
            .map_or(0.0, |slot| slot.0.rendered_length())
    }

    pub fn rejections(&self, endpoint: Entity) -> u32 {
        self.world
            .get::<&Endpoint>(endpoint)
            .map_or(0, |ep| ep.rejections())
    }

    /// Endpoints on `body`, in creation order.
    pub fn endpoints_on(&self, body: Entity) -> Vec<Entity> {
        let mut eps: Vec<Entity> = self
            .world
            .query::<&Endpoint>()
            .iter()
            .filter(|(_, ep)| ep.body == body)
            .map(|(e, _)| e)
            .collect();
        eps.sort_by_key(|e| e.id());
        eps
    }

    pub fn endpoint_named(&self, body: Entity, node_name: &str) -> Option<Entity> {
        self.world
            .query::<&Endpoint>()
            .iter()
            .find(|(_, ep)| ep.body == body && ep.node_name == node_name)
            .map(|(e, _)| e)
    }

    /// World pose of an endpoint's node.
    pub fn node_pose(&self, endpoint: Entity) -> Result<Pose, LinkError> {
        let ep = self
            .world
            .get::<&Endpoint>(endpoint)
            .map_err(|_| LinkError::MissingEndpoint(endpoint))?;
        let body = self
            .world
            .get::<&Body>(ep.body)
            .map_err(|_| LinkError::MissingBody(ep.body))?;
        Ok(ep.world_node(&body.pose))
    }

    /// Colliders of every body except `exclude`.
    pub fn obstacles(&self, exclude: &[Entity]) -> Vec<Obstacle> {
        self.world
            .query::<&Body>()
            .iter()
            .filter(|(e, _)| !exclude.contains(e))
            .filter_map(|(_, b)| b.obstacle())
            .collect()
    }

    // ── Internals ──────────────────────────────────────────────────────

    pub(crate) fn endpoint_mut(&self, endpoint: Entity) -> Result<hecs::RefMut<'_, Endpoint>, LinkError> {
        self.world
            .get::<&mut Endpoint>(endpoint)
            .map_err(|_| LinkError::MissingEndpoint(endpoint))
    }

    /// Direct transition; an illegal one is an error.
    pub(crate) fn set_state(&mut self, endpoint: Entity, to: LinkState) -> Result<(), LinkError> {
        let mut effects = EffectList::new();
        self.endpoint_mut(endpoint)?.set_state(&mut effects, to)?;
        self.apply_effects(endpoint, effects);
        Ok(())
    }

    /// Checked transition; an illegal one is logged and refused.
    pub(crate) fn try_switch(&mut self, endpoint: Entity, to: LinkState) -> Result<bool, LinkError> {
        let mut effects = EffectList::new();
        let switched = self.endpoint_mut(endpoint)?.try_switch_to(&mut effects, to);
        self.apply_effects(endpoint, effects);
        Ok(switched)
    }

    /// Source and target node poses of a linked source.
    fn link_poses(&self, source: Entity) -> Option<(Pose, Pose)> {
        let target = self.partner(source)?;
        Some((self.node_pose(source).ok()?, self.node_pose(target).ok()?))
    }

    pub(crate) fn apply_effects(&mut self, endpoint: Entity, effects: EffectList) {
        for effect in effects {
            match effect {
                EndpointEffect::Subscribe(channel) => self.bus.subscribe(channel, endpoint),
                EndpointEffect::Unsubscribe(channel) => self.bus.unsubscribe(channel, endpoint),
                EndpointEffect::BroadcastLinkingStarted => self.dispatch_linking_started(endpoint),
                EndpointEffect::BroadcastLinkingStopped => self.dispatch_linking_stopped(endpoint),
                EndpointEffect::CreateAttachPoint => {
                    let pose = self.node_pose(endpoint).ok();
                    if let Ok(mut ep) = self.endpoint_mut(endpoint) {
                        ep.attach_point = pose.map(|pose| AttachPoint { pose });
                    }
                }
                EndpointEffect::DropAttachPoint => {
                    if let Ok(mut ep) = self.endpoint_mut(endpoint) {
                        ep.attach_point = None;
                    }
                }
                EndpointEffect::StartRenderer => match self.link_poses(endpoint) {
                    Some((s, t)) => {
                        if let Ok(mut slot) = self.world.get::<&mut RendererSlot>(endpoint) {
                            slot.0.start_renderer(&s, &t);
                        }
                    }
                    None => log::warn!("Renderer of {:?} started without a partner", endpoint),
                },
                EndpointEffect::StopRenderer => {
                    if let Ok(mut slot) = self.world.get::<&mut RendererSlot>(endpoint) {
                        slot.0.stop_renderer();
                    }
                }
                EndpointEffect::Highlight(on) => {
                    if let Ok(mut ep) = self.endpoint_mut(endpoint) {
                        ep.highlighted = on;
                    }
                }
            }
        }
    }

    /// A source entered linking mode: every Available subscriber decides
    /// whether it could take part.
    fn dispatch_linking_started(&mut self, source: Entity) {
        let Ok((source_body, source_type)) = self
            .world
            .get::<&Endpoint>(source)
            .map(|ep| (ep.body, ep.link_type.clone()))
        else {
            return;
        };

        for sub in self.bus.subscribers(Channel::LinkingStarted) {
            if sub == source {
                continue;
            }
            let Ok((role, state, body, matches)) = self.world.get::<&Endpoint>(sub).map(|ep| {
                (ep.role, ep.state(), ep.body, ep.link_type == source_type)
            }) else {
                continue;
            };
            if state != Some(LinkState::Available) {
                continue;
            }
            let next = match role {
                EndpointRole::Target if matches && body != source_body => LinkState::AcceptingLinks,
                EndpointRole::Target => LinkState::RejectingLinks,
                EndpointRole::Source if matches => LinkState::RejectingLinks,
                EndpointRole::Source => continue,
            };
            if let Err(e) = self.try_switch(sub, next) {
                log::error!("Linking-started dispatch to {:?} failed: {}", sub, e);
            }
        }
        self.bus.notify_linking_started(source);
    }

    fn dispatch_linking_stopped(&mut self, source: Entity) {
        for sub in self.bus.subscribers(Channel::LinkingStopped) {
            let state = self.link_state(sub);
            if matches!(
                state,
                Some(LinkState::AcceptingLinks) | Some(LinkState::RejectingLinks)
            ) {
                if let Err(e) = self.try_switch(sub, LinkState::Available) {
                    log::error!("Linking-stopped dispatch to {:?} failed: {}", sub, e);
                }
            }
        }
        self.bus.notify_linking_stopped(source);
    }

    /// Build the joint record for a source/target pair.
    pub(crate) fn build_joint(&mut self, source: Entity, target: Entity) -> Result<(), LinkError> {
        let config = self
            .world
            .get::<&Endpoint>(source)
            .map_err(|_| LinkError::MissingEndpoint(source))?
            .source_config
            .clone()
            .unwrap_or_default();
        let source_end = crate::joint::JointEnd {
            body: self.body_of(source).ok_or(LinkError::MissingEndpoint(source))?,
            node: self.node_pose(source)?,
        };
        let target_end = crate::joint::JointEnd {
            body: self.body_of(target).ok_or(LinkError::MissingEndpoint(target))?,
            node: self.node_pose(target)?,
        };

        let mut joint = JointController::new(config.joint, config.limits);
        joint.setup_joint(&mut self.physics, source_end, target_end);
        if self.packed {
            joint.adjust_joint(&mut self.physics, true);
        }
        let _ = self.world.insert_one(source, joint);
        Ok(())
    }
}
