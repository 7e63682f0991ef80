//! Global Lagrange-multiplier constraint solver.
//!
//! Each solve assembles, from scratch, the sparse rows of `J` and `J̇`, the
//! inverse-mass diagonal `W`, the applied force vector `Q` and the particle
//! velocities `v`, then solves
//!
//! ```text
//! (J W Jᵀ) λ = -(J̇ v + J W Q)
//! ```
//!
//! and hands back the corrective force `Q̂ = Jᵀ λ` per particle. Fixed
//! particles contribute no columns, so they never receive corrections.

use crate::config::SolverConfig;
use crate::constraint::Constraint;
use crate::dense::solve_in_place;
use crate::float::Float;
use crate::particle::Particle;
use crate::vec::Vec2;
use alloc::vec::Vec as AllocVec;

/// One non-zero 2-column block of a Jacobian row.
#[derive(Copy, Clone, Debug)]
struct RowBlock<F: Float> {
    particle: usize,
    j: Vec2<F>,
    j_dot: Vec2<F>,
}

/// Assembles and solves the constrained system every force evaluation.
///
/// The workspace buffers are reused between calls to avoid reallocating,
/// but every solve clears them first; nothing carries over between steps.
#[derive(Clone, Debug)]
pub struct GlobalSolver<F: Float> {
    blocks: AllocVec<RowBlock<F>>,
    row_starts: AllocVec<usize>,
    inv_mass: AllocVec<F>,
    applied: AllocVec<Vec2<F>>,
    matrix: AllocVec<F>,
    lambdas: AllocVec<F>,
    corrective: AllocVec<Vec2<F>>,
    regularization: F,
    pivot_floor: F,
}

impl<F: Float> GlobalSolver<F> {
    pub fn new(regularization: F, pivot_floor: F) -> Self {
        GlobalSolver {
            blocks: AllocVec::new(),
            row_starts: AllocVec::new(),
            inv_mass: AllocVec::new(),
            applied: AllocVec::new(),
            matrix: AllocVec::new(),
            lambdas: AllocVec::new(),
            corrective: AllocVec::new(),
            regularization,
            pivot_floor,
        }
    }

    pub fn from_config(config: &SolverConfig<F>) -> Self {
        Self::new(config.regularization, config.pivot_floor)
    }

    /// Computes the corrective forces without touching the particles.
    ///
    /// Returns `Q̂` indexed like `particles`. With no constraints the result
    /// is all zeros and nothing is assembled.
    pub fn solve<'a, I>(&mut self, particles: &[Particle<F>], constraints: I) -> &[Vec2<F>]
    where
        I: IntoIterator<Item = &'a Constraint<F>>,
        F: 'a,
    {
        self.clear();
        self.corrective.resize(particles.len(), Vec2::zero());

        self.assemble_rows(particles, constraints);
        let m = self.row_count();
        if m == 0 {
            return &self.corrective;
        }
        log::trace!("solving {} constraint rows over {} particles", m, particles.len());

        for p in particles {
            if p.fixed {
                self.inv_mass.push(F::zero());
                self.applied.push(Vec2::zero());
            } else {
                self.inv_mass.push(p.inv_mass);
                self.applied.push(p.force);
            }
        }

        self.assemble_system(particles);
        solve_in_place(
            &mut self.matrix,
            &mut self.lambdas,
            m,
            self.regularization,
            self.pivot_floor,
        );

        for row in 0..m {
            let lambda = self.lambdas[row];
            for b in self.row_starts[row]..self.row_starts[row + 1] {
                let block = self.blocks[b];
                self.corrective[block.particle] += block.j.scale(lambda);
            }
        }
        &self.corrective
    }

    /// Solves, adds `Q̂` to every free particle, then applies each
    /// constraint's feedback spring. Returns the number of constraint rows.
    pub fn step<'a, I>(&mut self, particles: &mut [Particle<F>], constraints: I) -> usize
    where
        I: IntoIterator<Item = &'a Constraint<F>> + Clone,
        F: 'a,
    {
        self.solve(particles, constraints.clone());
        let m = self.row_count();
        if m == 0 {
            return 0;
        }

        for (p, q) in particles.iter_mut().zip(self.corrective.iter()) {
            p.apply_force(*q);
        }
        for c in constraints {
            c.apply_feedback(particles);
        }
        m
    }

    /// Multipliers from the last solve, one per constraint.
    pub fn lambdas(&self) -> &[F] {
        &self.lambdas
    }

    /// Corrective forces from the last solve.
    pub fn corrective_forces(&self) -> &[Vec2<F>] {
        &self.corrective
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.row_starts.clear();
        self.inv_mass.clear();
        self.applied.clear();
        self.matrix.clear();
        self.lambdas.clear();
        self.corrective.clear();
    }

    fn row_count(&self) -> usize {
        self.row_starts.len().saturating_sub(1)
    }

    fn row(&self, i: usize) -> &[RowBlock<F>] {
        &self.blocks[self.row_starts[i]..self.row_starts[i + 1]]
    }

    /// Scatters each constraint's Jacobian and `J̇` blocks at its particles'
    /// columns, dropping fixed particles' blocks.
    fn assemble_rows<'a, I>(&mut self, particles: &[Particle<F>], constraints: I)
    where
        I: IntoIterator<Item = &'a Constraint<F>>,
        F: 'a,
    {
        for c in constraints {
            self.row_starts.push(self.blocks.len());
            let jacobian = c.jacobian(particles);
            let jacobian_dot = c.jacobian_dot(particles);
            for (&(id, j), &(_, j_dot)) in jacobian.blocks().iter().zip(jacobian_dot.blocks()) {
                if particles[id.0].fixed {
                    continue;
                }
                self.blocks.push(RowBlock { particle: id.0, j, j_dot });
            }
        }
        if !self.row_starts.is_empty() {
            self.row_starts.push(self.blocks.len());
        }
    }

    /// Builds `A = J W Jᵀ` and `b = -(J̇ v + J W Q)`.
    ///
    /// Two rows couple only through particles they share, so each entry sums
    /// products of blocks with matching columns.
    fn assemble_system(&mut self, particles: &[Particle<F>]) {
        let m = self.row_count();
        self.matrix.resize(m * m, F::zero());
        self.lambdas.resize(m, F::zero());

        for i in 0..m {
            for k in i..m {
                let mut sum = F::zero();
                for bi in self.row(i) {
                    for bk in self.row(k) {
                        if bi.particle == bk.particle {
                            sum += bi.j.dot(bk.j) * self.inv_mass[bi.particle];
                        }
                    }
                }
                self.matrix[i * m + k] = sum;
                self.matrix[k * m + i] = sum;
            }

            let mut rhs = F::zero();
            for b in self.row(i) {
                let w = self.inv_mass[b.particle];
                rhs += b.j_dot.dot(particles[b.particle].vel);
                rhs += b.j.dot(self.applied[b.particle]) * w;
            }
            self.lambdas[i] = -rhs;
        }
    }
}
