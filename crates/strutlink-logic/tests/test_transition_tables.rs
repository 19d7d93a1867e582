//! Exhaustive checks of the link transition tables driven through the
//! generic state machine.
//!
//! Every (role, from, to) triple is attempted through both entry points;
//! the machine must agree with the table and never move on a refusal.

use strutlink_logic::link_state::{allowed_transitions, is_allowed, EndpointRole, LinkState};
use strutlink_logic::state_machine::{StateMachine, StateMachineError};

// ── Helpers ────────────────────────────────────────────────────────────

fn machine_for(role: EndpointRole) -> StateMachine<LinkState, Vec<(LinkState, LinkState)>> {
    let mut sm = StateMachine::new();
    for from in LinkState::ALL {
        sm.set_transition_constraint(from, allowed_transitions(role, from));
        // Record every completed transition as (left, entered).
        sm.add_state_handlers(
            from,
            None,
            Some(Box::new(move |log: &mut Vec<(LinkState, LinkState)>, next: Option<LinkState>| {
                if let Some(next) = next {
                    log.push((from, next));
                }
            })),
        );
    }
    sm
}

const ROLES: [EndpointRole; 2] = [EndpointRole::Source, EndpointRole::Target];

// ── Properties ─────────────────────────────────────────────────────────

#[test]
fn checked_switch_agrees_with_table() {
    for role in ROLES {
        for from in LinkState::ALL {
            for to in LinkState::ALL {
                let mut sm = machine_for(role);
                let mut log = Vec::new();
                sm.start(&mut log, from);

                let switched = sm.try_switch_to(&mut log, to);
                assert_eq!(switched, is_allowed(role, from, to), "{:?} {:?}->{:?}", role, from, to);
                if switched {
                    assert_eq!(sm.current_state(), Some(to));
                } else {
                    assert_eq!(sm.current_state(), Some(from));
                    assert_eq!(sm.rejections(), 1);
                    assert!(log.is_empty());
                }
            }
        }
    }
}

#[test]
fn direct_set_errors_on_illegal_transition() {
    for role in ROLES {
        for from in LinkState::ALL {
            for to in LinkState::ALL {
                if is_allowed(role, from, to) {
                    continue;
                }
                let mut sm = machine_for(role);
                let mut log = Vec::new();
                sm.start(&mut log, from);
                let result = sm.set_state(&mut log, to);
                assert!(matches!(
                    result,
                    Err(StateMachineError::IllegalTransition { .. })
                ));
                assert_eq!(sm.current_state(), Some(from));
            }
        }
    }
}

#[test]
fn stop_then_start_restores_explicit_state() {
    for role in ROLES {
        for initial in LinkState::ALL {
            let mut sm = machine_for(role);
            let mut log = Vec::new();
            sm.start(&mut log, LinkState::Available);
            sm.stop(&mut log);
            assert!(!sm.is_started());
            sm.start(&mut log, initial);
            assert_eq!(sm.current_state(), Some(initial));
        }
    }
}

#[test]
fn linked_only_returns_to_available() {
    for role in ROLES {
        assert_eq!(allowed_transitions(role, LinkState::Linked), &[LinkState::Available]);
    }
}
