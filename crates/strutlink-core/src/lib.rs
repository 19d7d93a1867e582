//! StrutLink Core - connector link runtime
//!
//! Links two endpoints that sit on separate simulated bodies: a *source*
//! that initiates and owns the joint, and a *target* that accepts it. The
//! host engine drives everything through [`LinkEngine::update`] (per frame)
//! and [`LinkEngine::fixed_update`] (per physics step).
//!
//! # Architecture
//!
//! State lives in a `hecs` world:
//! - **Bodies** carry a [`Body`](components::Body) with their vessel and pose
//! - **Endpoints** carry an [`Endpoint`](components::Endpoint) with a strict
//!   link state machine; linked sources add a
//!   [`JointController`](joint::JointController) and a
//!   [`LinkRecord`](engine::LinkRecord)
//! - The [`EventBus`](bus::EventBus) carries "linking started/stopped"
//!   to subscribed endpoints and link events to listeners
//!
//! # Example
//!
//! ```rust
//! use strutlink_core::prelude::*;
//! use strutlink_logic::math::{Pose, Vec3};
//!
//! let mut engine = LinkEngine::new();
//! let a = engine.spawn_body(BodySpec::new("tank"));
//! let b = engine.spawn_body(BodySpec::new("truss").at(Vec3::new(0.0, 0.0, 1.0)));
//!
//! let source = engine
//!     .add_endpoint(a, EndpointSpec::source("strut", SourceConfig::default()))
//!     .unwrap();
//! let target = engine
//!     .add_endpoint(b, EndpointSpec::target("strut").at(Pose::looking(Vec3::ZERO, -Vec3::FORWARD)))
//!     .unwrap();
//! engine.start().unwrap();
//!
//! engine.link(source, target, LinkActor::Api).unwrap();
//! assert_eq!(engine.link_state(source), Some(LinkState::Linked));
//!
//! engine.fixed_update();
//! engine.update(1.0 / 60.0);
//! ```

pub mod assembly;
pub mod bus;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod joint;
pub mod linking;
pub mod persistence;
pub mod physics;
pub mod renderer;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::bus::{EventLog, LinkActor, LinkEvent, LinkListener};
    pub use crate::components::*;
    pub use crate::engine::LinkEngine;
    pub use crate::error::LinkError;
    pub use crate::joint::{JointKind, JointStage};
    pub use crate::linking::{LinkMode, Reporting};
    pub use strutlink_logic::link_state::{EndpointRole, LinkState};
}
