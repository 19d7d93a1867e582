//! Link states and the per-role transition tables.
//!
//! | From | Source may go to | Target may go to |
//! |------|------------------|------------------|
//! | Available | Linking, RejectingLinks | AcceptingLinks, RejectingLinks |
//! | Linking | Available, Linked | (none) |
//! | AcceptingLinks | (none) | Available, Linked, Locked |
//! | Linked | Available | Available |
//! | Locked | Available | Available |
//! | RejectingLinks | Available, Locked | Available, Locked |

use serde::{Deserialize, Serialize};

/// State of one connector endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkState {
    /// Idle and free to take part in a new link.
    Available,
    /// A source in interactive linking mode, looking for a target.
    Linking,
    /// Connected to a partner.
    Linked,
    /// A sibling on the same body is linked; this endpoint must stay out.
    Locked,
    /// A target that can accept the source currently linking.
    AcceptingLinks,
    /// Cannot take part in the link currently being made.
    RejectingLinks,
}

impl LinkState {
    pub const ALL: [LinkState; 6] = [
        LinkState::Available,
        LinkState::Linking,
        LinkState::Linked,
        LinkState::Locked,
        LinkState::AcceptingLinks,
        LinkState::RejectingLinks,
    ];

    /// States that only exist while some source is in linking mode.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LinkState::Linking | LinkState::AcceptingLinks | LinkState::RejectingLinks
        )
    }
}

/// Which side of a link an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointRole {
    /// Initiates links and owns the joint.
    Source,
    /// Accepts links from sources.
    Target,
}

/// States `role` may move to from `from`.
pub fn allowed_transitions(role: EndpointRole, from: LinkState) -> &'static [LinkState] {
    use LinkState::*;
    match (role, from) {
        (EndpointRole::Source, Available) => &[Linking, RejectingLinks],
        (EndpointRole::Source, Linking) => &[Available, Linked],
        (EndpointRole::Target, Available) => &[AcceptingLinks, RejectingLinks],
        (EndpointRole::Target, AcceptingLinks) => &[Available, Linked, Locked],
        (_, Linked) | (_, Locked) => &[Available],
        (_, RejectingLinks) => &[Available, Locked],
        (EndpointRole::Source, AcceptingLinks) | (EndpointRole::Target, Linking) => &[],
    }
}

/// Whether `role` may move from `from` to `to`. Staying put is always allowed.
pub fn is_allowed(role: EndpointRole, from: LinkState, to: LinkState) -> bool {
    from == to || allowed_transitions(role, from).contains(&to)
}
