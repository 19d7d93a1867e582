//! Pure link logic for StrutLink.
//!
//! This crate holds the parts of the connector system that do not depend on
//! any entity storage, physics engine or host runtime. Functions take plain
//! data and return results, so everything here is unit-testable on its own.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Tolerances and defaults shared by checks and renderers |
//! | [`failure`] | `LinkFailure`: human-readable reasons a link is refused |
//! | [`limits`] | Joint limits and length/angle checks |
//! | [`link_state`] | Link states, endpoint roles, allowed transitions |
//! | [`math`] | `Vec3`, `Quat`, `Pose` |
//! | [`state_machine`] | Generic strict state machine with enter/leave handlers |
//! | [`sweep`] | Segment vs. box collider sweep |
//! | [`telescope`] | Piston layout for telescoping pipes |

pub mod constants;
pub mod failure;
pub mod limits;
pub mod link_state;
pub mod math;
pub mod state_machine;
pub mod sweep;
pub mod telescope;
