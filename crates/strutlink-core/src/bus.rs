//! Link event bus.
//!
//! The bus is an explicit publisher object owned by the engine, not global
//! state. It carries two kinds of audience:
//! - **channel subscribers**: endpoints that react to "linking started" or
//!   "linking stopped". Endpoints subscribe and unsubscribe from their
//!   state handlers, so a subscription only lives as long as the state that
//!   needs it;
//! - **listeners**: boxed [`LinkListener`] observers (UI, audio, tests)
//!   that see every broadcast.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Broadcast channels endpoints can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    LinkingStarted,
    LinkingStopped,
}

/// Who or what made or broke a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkActor {
    /// Program call.
    Api,
    /// Explicit user action.
    Player,
    /// The physics engine broke the joint.
    Physics,
    /// The host decoupled one of the bodies.
    Decouple,
}

impl LinkActor {
    /// True when the change did not come from a deliberate request.
    pub fn is_external(&self) -> bool {
        matches!(self, LinkActor::Physics | LinkActor::Decouple)
    }
}

/// An immutable (source, target) pair broadcast when a link is made or broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEvent {
    pub source: Entity,
    pub target: Entity,
    pub actor: LinkActor,
}

impl LinkEvent {
    pub fn externally_caused(&self) -> bool {
        self.actor.is_external()
    }
}

/// Observer of link activity. Every hook defaults to doing nothing.
pub trait LinkListener {
    fn on_linking_started(&mut self, _source: Entity) {}
    fn on_linking_stopped(&mut self, _source: Entity) {}
    fn on_link_accepted(&mut self, _event: &LinkEvent) {}
    fn on_link_created(&mut self, _event: &LinkEvent) {}
    fn on_link_broken(&mut self, _event: &LinkEvent) {}
}

/// Handle returned by [`EventBus::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<Channel, Vec<Entity>>,
    listeners: Vec<(ListenerId, Box<dyn LinkListener>)>,
    next_listener: u32,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, channel: Channel, endpoint: Entity) {
        let subs = self.subscribers.entry(channel).or_default();
        if !subs.contains(&endpoint) {
            subs.push(endpoint);
        }
    }

    pub fn unsubscribe(&mut self, channel: Channel, endpoint: Entity) {
        if let Some(subs) = self.subscribers.get_mut(&channel) {
            subs.retain(|e| *e != endpoint);
        }
    }

    /// Snapshot of a channel's subscribers, in subscription order.
    pub fn subscribers(&self, channel: Channel) -> Vec<Entity> {
        self.subscribers.get(&channel).cloned().unwrap_or_default()
    }

    pub fn is_subscribed(&self, channel: Channel, endpoint: Entity) -> bool {
        self.subscribers
            .get(&channel)
            .is_some_and(|subs| subs.contains(&endpoint))
    }

    /// Number of channels `endpoint` is subscribed to.
    pub fn subscription_count(&self, endpoint: Entity) -> usize {
        self.subscribers
            .values()
            .filter(|subs| subs.contains(&endpoint))
            .count()
    }

    /// Drop every channel subscription; listeners stay.
    pub fn clear_subscriptions(&mut self) {
        self.subscribers.clear();
    }

    pub fn add_listener(&mut self, listener: Box<dyn LinkListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn notify_linking_started(&mut self, source: Entity) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_linking_started(source);
        }
    }

    pub fn notify_linking_stopped(&mut self, source: Entity) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_linking_stopped(source);
        }
    }

    pub fn notify_link_accepted(&mut self, event: &LinkEvent) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_link_accepted(event);
        }
    }

    pub fn notify_link_created(&mut self, event: &LinkEvent) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_link_created(event);
        }
    }

    pub fn notify_link_broken(&mut self, event: &LinkEvent) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_link_broken(event);
        }
    }
}

/// One observed broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedEvent {
    LinkingStarted(Entity),
    LinkingStopped(Entity),
    LinkAccepted(LinkEvent),
    LinkCreated(LinkEvent),
    LinkBroken(LinkEvent),
}

/// Listener that records everything it hears. Clones share the same log,
/// so keep one clone and hand the other to the bus.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<RecordedEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }

    pub fn created(&self) -> Vec<LinkEvent> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::LinkCreated(ev) => Some(*ev),
                _ => None,
            })
            .collect()
    }

    pub fn broken(&self) -> Vec<LinkEvent> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::LinkBroken(ev) => Some(*ev),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: RecordedEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl LinkListener for EventLog {
    fn on_linking_started(&mut self, source: Entity) {
        self.push(RecordedEvent::LinkingStarted(source));
    }
    fn on_linking_stopped(&mut self, source: Entity) {
        self.push(RecordedEvent::LinkingStopped(source));
    }
    fn on_link_accepted(&mut self, event: &LinkEvent) {
        self.push(RecordedEvent::LinkAccepted(*event));
    }
    fn on_link_created(&mut self, event: &LinkEvent) {
        self.push(RecordedEvent::LinkCreated(*event));
    }
    fn on_link_broken(&mut self, event: &LinkEvent) {
        self.push(RecordedEvent::LinkBroken(*event));
    }
}
