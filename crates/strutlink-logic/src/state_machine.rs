//! Strict finite state machine with per-state enter/leave handlers.
//!
//! The machine is generic over the state type `S` and a context `C` that
//! handlers write into. Handlers never see the machine itself, so they
//! cannot re-enter it; they record what should happen and the owner acts
//! on it once the transition is complete.
//!
//! ```
//! use strutlink_logic::state_machine::StateMachine;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Door { Open, Closed }
//!
//! let mut sm: StateMachine<Door, Vec<&'static str>> = StateMachine::new();
//! sm.set_transition_constraint(Door::Open, &[Door::Closed]);
//! sm.set_transition_constraint(Door::Closed, &[Door::Open]);
//! sm.add_state_handlers(Door::Open, Some(Box::new(|log: &mut Vec<&str>, _: Option<Door>| log.push("opened"))), None);
//!
//! let mut log = Vec::new();
//! sm.start(&mut log, Door::Closed);
//! assert!(sm.try_switch_to(&mut log, Door::Open));
//! assert_eq!(log, vec!["opened"]);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

/// Handler invoked on entering or leaving a state.
///
/// Enter handlers receive the previous state, leave handlers the next one;
/// both get `None` when the machine is starting or stopping.
pub type StateHandler<S, C> = Box<dyn FnMut(&mut C, Option<S>) + Send + Sync>;

/// Misuse of a state machine. These indicate programming defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("state machine is not started")]
    NotStarted,
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

struct Handlers<S, C> {
    on_enter: Vec<StateHandler<S, C>>,
    on_leave: Vec<StateHandler<S, C>>,
}

impl<S, C> Default for Handlers<S, C> {
    fn default() -> Self {
        Self {
            on_enter: Vec::new(),
            on_leave: Vec::new(),
        }
    }
}

/// Strict state machine: only transitions listed via
/// [`set_transition_constraint`](Self::set_transition_constraint) are legal.
pub struct StateMachine<S, C> {
    current: Option<S>,
    transitions: HashMap<S, Vec<S>>,
    handlers: HashMap<S, Handlers<S, C>>,
    rejections: u32,
}

impl<S, C> Default for StateMachine<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C> StateMachine<S, C>
where
    S: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            current: None,
            transitions: HashMap::new(),
            handlers: HashMap::new(),
            rejections: 0,
        }
    }

    /// Declare the states reachable from `from`, replacing earlier ones.
    pub fn set_transition_constraint(&mut self, from: S, to: &[S]) {
        self.transitions.insert(from, to.to_vec());
    }

    pub fn add_state_handlers(
        &mut self,
        state: S,
        enter: Option<StateHandler<S, C>>,
        leave: Option<StateHandler<S, C>>,
    ) {
        let entry = self.handlers.entry(state).or_default();
        entry.on_enter.extend(enter);
        entry.on_leave.extend(leave);
    }

    /// Begin the machine's lifetime in `initial`, running its enter handlers.
    ///
    /// Restarting a running machine stops it first.
    pub fn start(&mut self, ctx: &mut C, initial: S) {
        if self.current.is_some() {
            self.stop(ctx);
        }
        self.current = Some(initial);
        self.fire_enter(ctx, initial, None);
    }

    /// End the machine's lifetime, running the current state's leave handlers.
    pub fn stop(&mut self, ctx: &mut C) {
        if let Some(state) = self.current {
            self.fire_leave(ctx, state, None);
            self.current = None;
        }
    }

    pub fn is_started(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_state(&self) -> Option<S> {
        self.current
    }

    /// Number of transitions refused through [`try_switch_to`](Self::try_switch_to).
    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    /// Pure check: would switching to `to` be legal right now?
    pub fn can_switch_to(&self, to: S) -> bool {
        match self.current {
            None => false,
            Some(from) if from == to => true,
            Some(from) => self
                .transitions
                .get(&from)
                .is_some_and(|allowed| allowed.contains(&to)),
        }
    }

    /// Checked transition. Illegal requests are logged and leave the state alone.
    pub fn try_switch_to(&mut self, ctx: &mut C, to: S) -> bool {
        if !self.can_switch_to(to) {
            log::warn!(
                "Refusing state transition {:?} -> {:?}",
                self.current,
                to
            );
            self.rejections += 1;
            return false;
        }
        self.switch(ctx, to);
        true
    }

    /// Direct transition. An illegal request is an invariant break and
    /// comes back as an error; the state is left unchanged.
    pub fn set_state(&mut self, ctx: &mut C, to: S) -> Result<(), StateMachineError> {
        let from = self.current.ok_or(StateMachineError::NotStarted)?;
        if !self.can_switch_to(to) {
            log::error!("Illegal state transition {:?} -> {:?}", from, to);
            return Err(StateMachineError::IllegalTransition {
                from: format!("{:?}", from),
                to: format!("{:?}", to),
            });
        }
        self.switch(ctx, to);
        Ok(())
    }

    fn switch(&mut self, ctx: &mut C, to: S) {
        let Some(from) = self.current else {
            return;
        };
        if from == to {
            return;
        }
        self.fire_leave(ctx, from, Some(to));
        self.current = Some(to);
        self.fire_enter(ctx, to, Some(from));
    }

    fn fire_enter(&mut self, ctx: &mut C, state: S, previous: Option<S>) {
        if let Some(handlers) = self.handlers.get_mut(&state) {
            for handler in handlers.on_enter.iter_mut() {
                handler(ctx, previous);
            }
        }
    }

    fn fire_leave(&mut self, ctx: &mut C, state: S, next: Option<S>) {
        if let Some(handlers) = self.handlers.get_mut(&state) {
            for handler in handlers.on_leave.iter_mut() {
                handler(ctx, next);
            }
        }
    }
}
