//! Component definitions stored in the link world.
//!
//! Components are data attached to entities. Link behaviour lives in the
//! engine and the linking operations.

mod body;
mod endpoint;

pub use body::*;
pub use endpoint::*;
