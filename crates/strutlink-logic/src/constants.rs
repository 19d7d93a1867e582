//! Shared tolerances and defaults.

/// Deviation, in degrees, still accepted by an end whose angle limit is zero.
pub const LOCKED_ANGLE_TOLERANCE: f32 = 0.1;

/// Segments shorter than this are treated as points by the collider sweep.
pub const MIN_SWEEP_LENGTH: f32 = 1e-4;

/// Physics steps a two-stage joint waits between placing its kinematic
/// ends and connecting them.
pub const JOINT_SETTLE_STEPS: u64 = 1;

/// Default pipe diameter for renderers, metres.
pub const DEFAULT_PIPE_DIAMETER: f32 = 0.15;
