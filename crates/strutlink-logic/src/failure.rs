//! Reasons a link cannot be made.
//!
//! Validation never fails hard: every check hands back one of these and
//! the caller decides whether to show it, log it or try again later.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link_state::LinkState;

/// Why a source cannot link to a target. `Display` gives the human-readable reason.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum LinkFailure {
    #[error("incompatible link types: source is '{source_type}', target is '{target_type}'")]
    IncompatibleType {
        source_type: String,
        target_type: String,
    },
    #[error("cannot link a part to itself")]
    SameBody,
    #[error("cannot link to a part of the same vessel")]
    SameVessel,
    #[error("source cannot link while {0:?}")]
    SourceNotReady(LinkState),
    #[error("target cannot accept a link while {0:?}")]
    TargetNotReady(LinkState),
    #[error("link is too short: {length:.2} m < {min:.2} m")]
    TooShort { length: f32, min: f32 },
    #[error("link is too long: {length:.2} m > {max:.2} m")]
    TooLong { length: f32, max: f32 },
    #[error("link angle at source is {angle:.1}°, limit is {limit:.1}°")]
    SourceAngle { angle: f32, limit: f32 },
    #[error("link angle at target is {angle:.1}°, limit is {limit:.1}°")]
    TargetAngle { angle: f32, limit: f32 },
    #[error("link path is blocked by {obstacle}")]
    Obstructed { obstacle: String },
    #[error("this linking mode needs an active EVA actor")]
    ActorUnavailable,
    #[error("another connector on this part is already linked")]
    BodyAlreadyLinked,
    #[error("another connector is already in linking mode")]
    LinkingInProgress,
}

impl LinkFailure {
    /// Failures caused by where the parts are, as opposed to what they are.
    pub fn is_geometric(&self) -> bool {
        matches!(
            self,
            LinkFailure::TooShort { .. }
                | LinkFailure::TooLong { .. }
                | LinkFailure::SourceAngle { .. }
                | LinkFailure::TargetAngle { .. }
                | LinkFailure::Obstructed { .. }
        )
    }
}
