//! Step observer trait for monitoring the simulation.

use crate::particle::ParticleId;

/// Trait for observing physics simulation steps.
///
/// Implement this to watch solver progress (debugging, profiling, test
/// instrumentation). All methods have default no-op implementations.
pub trait StepObserver {
    /// Called after every complete force evaluation, with the evaluation's
    /// index inside the current sub-step (0-based).
    fn on_force_evaluation(&mut self, _stage: usize) {}

    /// Called after the global solver computed multipliers for
    /// `constraints` active constraints.
    fn on_constraint_solve(&mut self, _constraints: usize) {}

    /// Called after each projection pass in projection mode.
    fn on_constraint_iteration(&mut self, _iteration: usize) {}

    /// Called when a particle's committed update was non-finite and discarded.
    fn on_rejected_update(&mut self, _particle: ParticleId) {}

    /// Called when a sub-step is fully complete.
    fn on_step_complete(&mut self) {}
}

/// A no-op observer that does nothing. Use as default when no observation needed.
pub struct NoOpStepObserver;

impl StepObserver for NoOpStepObserver {}

/// Counts and step totals gathered across integrations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Force evaluations performed.
    pub evaluations: usize,
    /// Particle updates discarded for being non-finite.
    pub rejected: usize,
}

impl StepReport {
    pub fn merge(&mut self, other: StepReport) {
        self.evaluations += other.evaluations;
        self.rejected += other.rejected;
    }
}
