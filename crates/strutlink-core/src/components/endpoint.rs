//! Connector endpoints and their state machines.
//!
//! An endpoint's state handlers never touch the engine. They push
//! [`EndpointEffect`]s into a list which the engine applies once the
//! transition has finished, so handlers cannot re-enter the machine.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use strutlink_logic::limits::JointLimits;
use strutlink_logic::link_state::{allowed_transitions, EndpointRole, LinkState};
use strutlink_logic::math::Pose;
use strutlink_logic::state_machine::{StateHandler, StateMachine, StateMachineError};

use crate::bus::Channel;
use crate::joint::JointKind;
use crate::renderer::RendererKind;

/// Side effect requested by a state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointEffect {
    Subscribe(Channel),
    Unsubscribe(Channel),
    BroadcastLinkingStarted,
    BroadcastLinkingStopped,
    CreateAttachPoint,
    DropAttachPoint,
    StartRenderer,
    StopRenderer,
    Highlight(bool),
}

pub type EffectList = Vec<EndpointEffect>;

/// Settings only a source carries: it owns the joint and the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub joint: JointKind,
    #[serde(default)]
    pub limits: JointLimits,
    pub renderer: RendererKind,
    /// Allow linking two bodies of the same vessel.
    #[serde(default)]
    pub allow_same_vessel: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            joint: JointKind::Rigid,
            limits: JointLimits::default(),
            renderer: RendererKind::default(),
            allow_same_vessel: false,
        }
    }
}

/// Everything needed to attach an endpoint to a body.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub node_name: String,
    pub role: EndpointRole,
    pub link_type: String,
    /// Node pose relative to the body.
    pub node: Pose,
    pub source_config: Option<SourceConfig>,
}

impl EndpointSpec {
    pub fn source(link_type: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            node_name: "source".into(),
            role: EndpointRole::Source,
            link_type: link_type.into(),
            node: Pose::IDENTITY,
            source_config: Some(config),
        }
    }

    pub fn target(link_type: impl Into<String>) -> Self {
        Self {
            node_name: "target".into(),
            role: EndpointRole::Target,
            link_type: link_type.into(),
            node: Pose::IDENTITY,
            source_config: None,
        }
    }

    pub fn at(mut self, node: Pose) -> Self {
        self.node = node;
        self
    }

    pub fn named(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }
}

/// Provisional attach point shown while a source is looking for a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachPoint {
    pub pose: Pose,
}

/// Read-only view of anything that can take part in a link.
pub trait Linkable {
    fn role(&self) -> EndpointRole;
    fn link_type(&self) -> &str;
    /// `None` until started.
    fn link_state(&self) -> Option<LinkState>;
    fn linked_partner(&self) -> Option<Entity>;

    fn is_linked(&self) -> bool {
        self.link_state() == Some(LinkState::Linked)
    }

    fn accepts_type(&self, other: &dyn Linkable) -> bool {
        self.link_type() == other.link_type()
    }
}

/// Endpoint component.
pub struct Endpoint {
    pub body: Entity,
    pub node_name: String,
    pub role: EndpointRole,
    pub link_type: String,
    /// Node pose relative to `body`.
    pub node: Pose,
    pub source_config: Option<SourceConfig>,
    pub(crate) partner: Option<Entity>,
    pub(crate) highlighted: bool,
    pub(crate) attach_point: Option<AttachPoint>,
    machine: StateMachine<LinkState, EffectList>,
}

impl Endpoint {
    pub fn new(body: Entity, spec: EndpointSpec) -> Self {
        Self {
            body,
            node_name: spec.node_name,
            role: spec.role,
            link_type: spec.link_type,
            node: spec.node,
            source_config: spec.source_config,
            partner: None,
            highlighted: false,
            attach_point: None,
            machine: build_machine(spec.role),
        }
    }

    pub fn state(&self) -> Option<LinkState> {
        self.machine.current_state()
    }

    pub fn partner(&self) -> Option<Entity> {
        self.partner
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn attach_point(&self) -> Option<AttachPoint> {
        self.attach_point
    }

    pub fn is_started(&self) -> bool {
        self.machine.is_started()
    }

    pub fn can_switch_to(&self, to: LinkState) -> bool {
        self.machine.can_switch_to(to)
    }

    pub fn rejections(&self) -> u32 {
        self.machine.rejections()
    }

    pub(crate) fn start(&mut self, effects: &mut EffectList, initial: LinkState) {
        self.machine.start(effects, initial);
    }

    pub(crate) fn stop(&mut self, effects: &mut EffectList) {
        self.machine.stop(effects);
    }

    pub(crate) fn try_switch_to(&mut self, effects: &mut EffectList, to: LinkState) -> bool {
        self.machine.try_switch_to(effects, to)
    }

    pub(crate) fn set_state(
        &mut self,
        effects: &mut EffectList,
        to: LinkState,
    ) -> Result<(), StateMachineError> {
        self.machine.set_state(effects, to)
    }

    /// World pose of the node given the body's world pose.
    pub fn world_node(&self, body_pose: &Pose) -> Pose {
        body_pose.compose(&self.node)
    }
}

impl Linkable for Endpoint {
    fn role(&self) -> EndpointRole {
        self.role
    }

    fn link_type(&self) -> &str {
        &self.link_type
    }

    fn link_state(&self) -> Option<LinkState> {
        self.state()
    }

    fn linked_partner(&self) -> Option<Entity> {
        self.partner
    }
}

fn push(effects: &'static [EndpointEffect]) -> StateHandler<LinkState, EffectList> {
    Box::new(move |list: &mut EffectList, _: Option<LinkState>| list.extend_from_slice(effects))
}

/// State machine with the role's transition table and effect handlers.
fn build_machine(role: EndpointRole) -> StateMachine<LinkState, EffectList> {
    use EndpointEffect::*;

    let mut sm = StateMachine::new();
    for from in LinkState::ALL {
        sm.set_transition_constraint(from, allowed_transitions(role, from));
    }

    sm.add_state_handlers(
        LinkState::Available,
        Some(push(&[Subscribe(Channel::LinkingStarted)])),
        Some(push(&[Unsubscribe(Channel::LinkingStarted)])),
    );
    sm.add_state_handlers(
        LinkState::RejectingLinks,
        Some(push(&[Subscribe(Channel::LinkingStopped)])),
        Some(push(&[Unsubscribe(Channel::LinkingStopped)])),
    );

    match role {
        EndpointRole::Target => {
            sm.add_state_handlers(
                LinkState::AcceptingLinks,
                Some(push(&[Subscribe(Channel::LinkingStopped), Highlight(true)])),
                Some(push(&[Unsubscribe(Channel::LinkingStopped), Highlight(false)])),
            );
        }
        EndpointRole::Source => {
            sm.add_state_handlers(
                LinkState::Linking,
                Some(push(&[CreateAttachPoint, BroadcastLinkingStarted])),
                Some(Box::new(|list: &mut EffectList, next: Option<LinkState>| {
                    list.push(BroadcastLinkingStopped);
                    // The attach point becomes the joint anchor on success.
                    if next != Some(LinkState::Linked) {
                        list.push(DropAttachPoint);
                    }
                })),
            );
            sm.add_state_handlers(
                LinkState::Linked,
                Some(push(&[StartRenderer])),
                Some(push(&[StopRenderer, DropAttachPoint])),
            );
        }
    }
    sm
}
