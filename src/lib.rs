//! Real-time constrained particle dynamics in 2-D.
//!
//! `tether` simulates point masses under applied forces and holonomic
//! constraints (rods and circular wires). Constraint forces come from a
//! global Lagrange-multiplier solve run inside every force evaluation, so
//! connected particles exchange momentum instead of being nudged apart one
//! constraint at a time.
//!
//! # Features
//!
//! - **Forces**: gravity, drag, damped springs with a velocity ceiling, and
//!   angular springs
//! - **Constraints**: quadratic and square-root rods, circular wires, each
//!   with a feedback spring against drift
//! - **Global solver**: `(J W Jᵀ) λ = -(J̇ v + J W Q)` with regularized
//!   partial-pivot elimination
//! - **Integrators**: Euler, predictor Euler, Störmer–Verlet, midpoint, RK4,
//!   all driven by one force-evaluation callback
//! - **Projection mode**: per-constraint position projection as an
//!   alternative strategy
//! - **Collisions, bounds and obstacles**: velocity-impulse corrections outside the solve
//! - **Observable**: Monitor physics steps via the `StepObserver` trait
//! - **`no_std` compatible**: Works in embedded and WASM environments
//!
//! # Example
//!
//! ```
//! use tether::{NoOpStepObserver, ParticleSystem, SolverConfig, Vec2};
//!
//! let config = SolverConfig::new().with_gravity(Vec2::new(0.0, 9.81));
//! let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
//! let anchor = system.add_fixed_particle(Vec2::new(0.0, 0.0));
//! let bob = system.add_particle(Vec2::new(1.0, 0.0), 1.0).unwrap();
//! system.add_rod(anchor, bob, 1.0).unwrap();
//!
//! system.advance(1.0 / 60.0, &mut NoOpStepObserver);
//! let pos = system.position(bob).unwrap();
//! assert!((pos.length() - 1.0).abs() < 1e-2);
//! ```

#![no_std]

extern crate alloc;

pub mod float;
pub mod vec;
pub mod particle;
pub mod force;
pub mod constraint;
pub mod dense;
pub mod solver;
pub mod integrator;
pub mod system;
pub mod observer;
pub mod config;
pub mod error;

// Re-export primary API
pub use float::Float;
pub use vec::Vec2;
pub use particle::{Particle, ParticleId};
pub use force::{
    AngularSpringForce, BoundsForce, CollisionForce, DragForce, Force, ForceId, GravityForce,
    ObstacleForce, SpringForce,
};
pub use constraint::{
    CircularWireConstraint, Constraint, ConstraintId, FeedbackSpring, JacobianRow, RodConstraint,
    UnitRodConstraint,
};
pub use solver::GlobalSolver;
pub use integrator::Integrator;
pub use system::ParticleSystem;
pub use config::{SolverConfig, SolverMode};
pub use observer::{NoOpStepObserver, StepObserver, StepReport};
pub use error::PhysicsError;
