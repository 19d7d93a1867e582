//! Link operations: linking mode, validation, link creation and the single
//! sever path every unlink goes through.

use hecs::Entity;
use strutlink_logic::failure::LinkFailure;
use strutlink_logic::link_state::{EndpointRole, LinkState};
use strutlink_logic::sweep::first_obstruction;

use crate::assembly;
use crate::bus::{LinkActor, LinkEvent};
use crate::components::{Endpoint, Linkable};
use crate::engine::{LinkEngine, LinkRecord};
use crate::error::LinkError;
use crate::joint::JointController;
use crate::renderer::RendererSlot;

/// How linking mode was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Program call; no actor needed.
    Api,
    /// User picking a target with the pointer.
    Interactive,
    /// A kerbal on EVA carries the cable; needs an active EVA actor.
    Eva,
}

/// Where a refused link is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporting {
    pub log: bool,
    pub notify_user: bool,
}

impl Reporting {
    pub const SILENT: Reporting = Reporting {
        log: false,
        notify_user: false,
    };
    pub const LOG: Reporting = Reporting {
        log: true,
        notify_user: false,
    };
    pub const USER: Reporting = Reporting {
        log: true,
        notify_user: true,
    };
}

impl LinkEngine {
    fn source_endpoint(&self, endpoint: Entity) -> Result<hecs::Ref<'_, Endpoint>, LinkError> {
        let ep = self
            .world
            .get::<&Endpoint>(endpoint)
            .map_err(|_| LinkError::MissingEndpoint(endpoint))?;
        if ep.role != EndpointRole::Source {
            return Err(LinkError::WrongRole {
                endpoint,
                expected: EndpointRole::Source,
                actual: ep.role,
            });
        }
        Ok(ep)
    }

    /// Enter linking mode. Compatible targets start accepting and every
    /// other interested endpoint starts rejecting.
    ///
    /// Only one source may be linking at a time, and a body carries at
    /// most one live link.
    pub fn start_linking(&mut self, source: Entity, mode: LinkMode) -> Result<(), LinkError> {
        let (state, body) = {
            let ep = self.source_endpoint(source)?;
            (ep.state().ok_or(LinkError::NotStarted(source))?, ep.body)
        };
        if mode == LinkMode::Eva && !self.eva_active {
            return Err(LinkFailure::ActorUnavailable.into());
        }
        if state == LinkState::Linking || !self.endpoint_mut(source)?.can_switch_to(LinkState::Linking) {
            return Err(LinkFailure::SourceNotReady(state).into());
        }
        if let Some(other) = self.linking_source() {
            log::warn!("{:?} cannot start linking while {:?} is linking", source, other);
            return Err(LinkFailure::LinkingInProgress.into());
        }
        if self.body_has_live_link(body) {
            return Err(LinkFailure::BodyAlreadyLinked.into());
        }
        self.set_state(source, LinkState::Linking)?;
        log::debug!("{:?} entered linking mode ({:?})", source, mode);
        Ok(())
    }

    /// Leave linking mode without linking.
    pub fn cancel_linking(&mut self, source: Entity) -> Result<(), LinkError> {
        let state = self.source_endpoint(source)?.state();
        if state != Some(LinkState::Linking) {
            log::warn!("Cannot cancel linking of {:?}: state is {:?}", source, state);
            return Ok(());
        }
        self.set_state(source, LinkState::Available)
    }

    /// Verdict on linking `source` to `target` right now. Touches nothing.
    pub fn check_can_link_to(&self, source: Entity, target: Entity) -> Result<(), LinkError> {
        let src = self.source_endpoint(source)?;
        let tgt = self
            .world
            .get::<&Endpoint>(target)
            .map_err(|_| LinkError::MissingEndpoint(target))?;
        if tgt.role != EndpointRole::Target {
            return Err(LinkError::WrongRole {
                endpoint: target,
                expected: EndpointRole::Target,
                actual: tgt.role,
            });
        }

        if !src.accepts_type(&*tgt) {
            return Err(LinkFailure::IncompatibleType {
                source_type: src.link_type.clone(),
                target_type: tgt.link_type.clone(),
            }
            .into());
        }
        if src.body == tgt.body {
            return Err(LinkFailure::SameBody.into());
        }
        let config = src.source_config.clone().unwrap_or_default();
        let same_vessel = self.vessel_of(src.body).is_some() && self.vessel_of(src.body) == self.vessel_of(tgt.body);
        if same_vessel && !config.allow_same_vessel {
            return Err(LinkFailure::SameVessel.into());
        }

        let src_state = src.state().ok_or(LinkError::NotStarted(source))?;
        if src_state != LinkState::Linking {
            return Err(LinkFailure::SourceNotReady(src_state).into());
        }
        let tgt_state = tgt.state().ok_or(LinkError::NotStarted(target))?;
        if tgt_state != LinkState::AcceptingLinks {
            return Err(LinkFailure::TargetNotReady(tgt_state).into());
        }

        let (src_body, tgt_body) = (src.body, tgt.body);
        drop(src);
        drop(tgt);
        if self.body_has_live_link(src_body) || self.body_has_live_link(tgt_body) {
            return Err(LinkFailure::BodyAlreadyLinked.into());
        }
        let s = self.node_pose(source)?;
        let t = self.node_pose(target)?;
        config.limits.check_length_limit(&s, &t)?;
        config.limits.check_angle_limit_at_source(&s, &t)?;
        config.limits.check_angle_limit_at_target(&s, &t)?;

        let obstacles = self.obstacles(&[src_body, tgt_body]);
        let hit = match self.world.get::<&RendererSlot>(source) {
            Ok(slot) => slot.0.check_collider_hits(&s, &t, &obstacles),
            Err(_) => first_obstruction(s.position, t.position, &obstacles).map(|o| o.name.clone()),
        };
        if let Some(obstacle) = hit {
            return Err(LinkFailure::Obstructed { obstacle }.into());
        }
        Ok(())
    }

    /// [`check_can_link_to`](Self::check_can_link_to) with the refusal
    /// logged and/or shown to the user.
    pub fn check_can_link_to_reported(
        &mut self,
        source: Entity,
        target: Entity,
        reporting: Reporting,
    ) -> Result<(), LinkError> {
        let verdict = self.check_can_link_to(source, target);
        if let Err(LinkError::Rejected(reason)) = &verdict {
            if reporting.log {
                log::warn!("Cannot link {:?} to {:?}: {}", source, target, reason);
            }
            if reporting.notify_user {
                self.messages.push(reason.to_string());
            }
        }
        verdict
    }

    /// Link a source in linking mode to an accepting target.
    pub fn link_to_target(&mut self, source: Entity, target: Entity, actor: LinkActor) -> Result<(), LinkError> {
        let reporting = if actor == LinkActor::Player {
            Reporting::USER
        } else {
            Reporting::LOG
        };
        self.check_can_link_to_reported(source, target, reporting)?;

        let source_body = self.body_of(source).ok_or(LinkError::MissingEndpoint(source))?;
        let target_body = self.body_of(target).ok_or(LinkError::MissingEndpoint(target))?;

        let restore_vessel = assembly::couple(&mut self.world, source_body, target_body);
        self.build_joint(source, target)?;
        let _ = self.world.insert_one(
            source,
            LinkRecord {
                target,
                actor,
                restore_vessel,
            },
        );
        self.endpoint_mut(source)?.partner = Some(target);
        self.endpoint_mut(target)?.partner = Some(source);

        let event = LinkEvent { source, target, actor };
        self.set_state(target, LinkState::Linked)?;
        self.bus.notify_link_accepted(&event);

        self.fan_out_link_created(&event, source_body, target_body);
        self.set_state(source, LinkState::Linked)?;

        log::info!("Linked {:?} -> {:?} ({:?})", source, target, actor);
        Ok(())
    }

    /// Enter linking mode and link in one call. A refused link cancels
    /// linking mode again.
    pub fn link(&mut self, source: Entity, target: Entity, actor: LinkActor) -> Result<(), LinkError> {
        self.start_linking(source, LinkMode::Api)?;
        if let Err(e) = self.link_to_target(source, target, actor) {
            self.cancel_linking(source)?;
            return Err(e);
        }
        Ok(())
    }

    /// User action: break the link of a linked source. Returns whether a
    /// link was broken.
    pub fn break_current_link(&mut self, source: Entity, move_focus: bool) -> Result<bool, LinkError> {
        let state = self.source_endpoint(source)?.state();
        if state != Some(LinkState::Linked) {
            log::warn!("Cannot break link of {:?}: state is {:?}", source, state);
            return Ok(false);
        }
        self.sever_link(source, LinkActor::Player, move_focus)
    }

    /// Break the link at either end.
    pub fn break_link_at(&mut self, endpoint: Entity, actor: LinkActor) -> Result<bool, LinkError> {
        let (role, partner) = {
            let ep = self
                .world
                .get::<&Endpoint>(endpoint)
                .map_err(|_| LinkError::MissingEndpoint(endpoint))?;
            (ep.role, ep.partner)
        };
        match (role, partner) {
            (EndpointRole::Source, _) => self.sever_link(endpoint, actor, false),
            (EndpointRole::Target, Some(source)) => self.sever_link(source, actor, false),
            (EndpointRole::Target, None) => {
                log::debug!("{:?} has no link to break", endpoint);
                Ok(false)
            }
        }
    }

    /// Break every link touching `body`. Returns how many were broken.
    pub fn decouple(&mut self, body: Entity) -> Result<usize, LinkError> {
        let mut count = 0;
        for ep in self.endpoints_on(body) {
            if self.break_link_at(ep, LinkActor::Decouple)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// The only way a link is taken apart. Idempotent: returns `false` if
    /// `source` has no link.
    pub fn sever_link(&mut self, source: Entity, actor: LinkActor, move_focus: bool) -> Result<bool, LinkError> {
        let Ok(record) = self.world.remove_one::<LinkRecord>(source) else {
            return Ok(false);
        };
        let target = record.target;
        let source_body = self.body_of(source).ok_or(LinkError::MissingEndpoint(source))?;
        let target_body = self.body_of(target);

        let event = LinkEvent { source, target, actor };
        self.fan_out_link_broken(&event, source_body, target_body);

        if let (Some(restore), Some(tb)) = (record.restore_vessel, target_body) {
            assembly::split(&mut self.world, source_body, tb, restore);
        }
        if let Ok(mut joint) = self.world.remove_one::<JointController>(source) {
            joint.cleanup_joint(&mut self.physics);
        }

        self.endpoint_mut(source)?.partner = None;
        if let Ok(mut t) = self.endpoint_mut(target) {
            t.partner = None;
        }
        self.set_state(source, LinkState::Available)?;
        if self.world.get::<&Endpoint>(target).is_ok_and(|t| t.can_switch_to(LinkState::Available)) {
            self.set_state(target, LinkState::Available)?;
        }

        if move_focus {
            self.focused_vessel = target_body.and_then(|b| self.vessel_of(b));
        }
        log::info!("Link {:?} -> {:?} broken ({:?})", source, target, actor);
        Ok(true)
    }

    /// The source currently in linking mode, if any.
    fn linking_source(&self) -> Option<Entity> {
        self.world
            .query::<&Endpoint>()
            .iter()
            .find(|(_, ep)| ep.role == EndpointRole::Source && ep.state() == Some(LinkState::Linking))
            .map(|(e, _)| e)
    }

    /// Whether `body` is one end of a live link.
    pub(crate) fn body_has_live_link(&self, body: Entity) -> bool {
        self.world
            .query::<(&Endpoint, &LinkRecord)>()
            .iter()
            .any(|(_, (ep, rec))| ep.body == body || self.body_of(rec.target) == Some(body))
    }

    fn siblings(&self, event: &LinkEvent, bodies: &[Entity]) -> Vec<Entity> {
        let mut out = Vec::new();
        for body in bodies {
            for ep in self.endpoints_on(*body) {
                if ep != event.source && ep != event.target && !out.contains(&ep) {
                    out.push(ep);
                }
            }
        }
        out
    }

    /// Lock the other endpoints on both linked bodies, then tell listeners.
    fn fan_out_link_created(&mut self, event: &LinkEvent, source_body: Entity, target_body: Entity) {
        for ep in self.siblings(event, &[source_body, target_body]) {
            let lockable = self
                .world
                .get::<&Endpoint>(ep)
                .is_ok_and(|e| e.can_switch_to(LinkState::Locked));
            if lockable {
                if let Err(e) = self.set_state(ep, LinkState::Locked) {
                    log::error!("Failed to lock {:?}: {}", ep, e);
                }
                log::debug!("{:?} locked by link {:?}", ep, event.source);
            }
        }
        self.bus.notify_link_created(event);
    }

    /// Unlock siblings whose body has no other link, then tell listeners.
    fn fan_out_link_broken(&mut self, event: &LinkEvent, source_body: Entity, target_body: Option<Entity>) {
        let bodies: Vec<Entity> = std::iter::once(source_body).chain(target_body).collect();
        for ep in self.siblings(event, &bodies) {
            if self.link_state(ep) != Some(LinkState::Locked) {
                continue;
            }
            let Some(body) = self.body_of(ep) else {
                continue;
            };
            if self.body_has_live_link(body) {
                continue;
            }
            if let Err(e) = self.set_state(ep, LinkState::Available) {
                log::error!("Failed to unlock {:?}: {}", ep, e);
            }
            log::debug!("{:?} unlocked", ep);
        }
        self.bus.notify_link_broken(event);
    }
}

