//! Configuration types for the particle system and its solvers.

use crate::error::PhysicsError;
use crate::float::Float;
use crate::integrator::Integrator;
use crate::vec::Vec2;

/// How constraints are satisfied. Picked once per system, never per constraint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverMode {
    /// Global Lagrange-multiplier solve inside every force evaluation; only
    /// ever adds forces.
    #[default]
    Lagrangian,
    /// Per-constraint position projection after each integration; overwrites
    /// positions and velocities directly.
    Projection,
}

/// Configuration for the particle system.
///
/// # Builder Pattern
/// ```
/// use tether::config::{SolverConfig, SolverMode};
/// use tether::integrator::Integrator;
/// use tether::vec::Vec2;
///
/// let config: SolverConfig<f64> = SolverConfig::new()
///     .with_gravity(Vec2::new(0.0, 25.0))
///     .with_drag(0.2)
///     .with_integrator(Integrator::Rk4)
///     .with_mode(SolverMode::Lagrangian)
///     .with_sub_steps(10);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig<F: Float> {
    /// Time-stepping scheme. Default: Verlet.
    pub integrator: Integrator,
    /// Constraint strategy. Default: Lagrangian.
    pub mode: SolverMode,
    /// Gravity acceleration vector. Default: zero (no gravity).
    pub gravity: Vec2<F>,
    /// Linear drag coefficient. Default: zero.
    pub drag: F,
    /// Fixed sub-step length in seconds. Default: 1/480.
    pub timestep: F,
    /// Maximum sub-steps run by one `advance` call. Default: 10.
    pub sub_steps: usize,
    /// Projection passes per sub-step in projection mode. Default: 4.
    pub iterations: usize,
    /// Factor applied to committed velocities. 1.0 = no damping. Default: 1.0.
    pub damping: F,
    /// Added to the diagonal of `J·W·Jᵀ` before factorization. Default: 1e-7.
    pub regularization: F,
    /// Smallest pivot magnitude allowed during elimination. Default: 1e-10.
    pub pivot_floor: F,
}

impl<F: Float> SolverConfig<F> {
    /// Create a new config with default values.
    pub fn new() -> Self {
        SolverConfig {
            integrator: Integrator::Verlet,
            mode: SolverMode::Lagrangian,
            gravity: Vec2::zero(),
            drag: F::zero(),
            timestep: F::one() / F::from_f32(480.0),
            sub_steps: 10,
            iterations: 4,
            damping: F::one(),
            regularization: F::from_f32(1e-7),
            pivot_floor: F::from_f32(1e-10),
        }
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the gravity vector.
    pub fn with_gravity(mut self, gravity: Vec2<F>) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_drag(mut self, drag: F) -> Self {
        self.drag = drag;
        self
    }

    pub fn with_timestep(mut self, timestep: F) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set the sub-step cap per `advance` call.
    pub fn with_sub_steps(mut self, sub_steps: usize) -> Self {
        self.sub_steps = sub_steps.max(1);
        self
    }

    /// Set the number of projection passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the damping factor.
    pub fn with_damping(mut self, damping: F) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_regularization(mut self, regularization: F) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_pivot_floor(mut self, pivot_floor: F) -> Self {
        self.pivot_floor = pivot_floor;
        self
    }

    /// Checks the values a system cannot step with.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.timestep.is_finite() || self.timestep <= F::zero() {
            return Err(PhysicsError::InvalidTimestep);
        }
        Ok(())
    }
}

impl<F: Float> Default for SolverConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}
