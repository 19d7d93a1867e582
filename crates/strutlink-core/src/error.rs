//! Engine-level errors.

use hecs::Entity;
use strutlink_logic::failure::LinkFailure;
use strutlink_logic::link_state::EndpointRole;
use strutlink_logic::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// The link was refused; the reason is user-presentable.
    #[error("link refused: {0}")]
    Rejected(#[from] LinkFailure),
    #[error("no endpoint {0:?}")]
    MissingEndpoint(Entity),
    #[error("no body {0:?}")]
    MissingBody(Entity),
    #[error("endpoint {endpoint:?} is a {actual:?}, expected a {expected:?}")]
    WrongRole {
        endpoint: Entity,
        expected: EndpointRole,
        actual: EndpointRole,
    },
    #[error("endpoint {0:?} is not started")]
    NotStarted(Entity),
    /// A state machine refused a direct transition: a programming defect.
    #[error(transparent)]
    Transition(#[from] StateMachineError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("preset parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate preset {0:?}")]
    DuplicatePreset(String),
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("source preset {0:?} has no source section")]
    MissingSourceConfig(String),
}
