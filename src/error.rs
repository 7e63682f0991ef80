//! Error types for registration and configuration.
//!
//! Stepping never fails: degenerate geometry, near-singular systems and
//! non-finite updates are contained inside the step (see `StepReport`).

use thiserror::Error;

/// Errors returned by the registration and configuration API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// Mass must be positive and finite.
    #[error("mass must be positive and finite")]
    InvalidMass,
    /// Rest or target length must be non-negative and finite.
    #[error("length must be non-negative and finite")]
    InvalidLength,
    /// Wire radius must be positive and finite.
    #[error("radius must be positive and finite")]
    InvalidRadius,
    /// Timestep must be positive and finite.
    #[error("timestep must be positive and finite")]
    InvalidTimestep,
    /// Particle index is out of bounds.
    #[error("particle index {index} out of bounds (count: {count})")]
    ParticleOutOfBounds { index: usize, count: usize },
    /// A two-particle element was given the same particle twice.
    #[error("particle {0} cannot be constrained to itself")]
    DegenerateConstraint(usize),
    /// The constraint handle was never issued or has been removed.
    #[error("no constraint registered with id {0}")]
    UnknownConstraint(usize),
    /// The force handle was never issued or has been removed.
    #[error("no force registered with id {0}")]
    UnknownForce(usize),
    /// Obstacle corners must be finite with `min < max`, margin positive.
    #[error("obstacle needs finite corners with min < max and a positive margin")]
    InvalidObstacle,
}
