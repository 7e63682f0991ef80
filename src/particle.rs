//! Point-mass particles and their stable handles.

use crate::float::Float;
use crate::vec::Vec2;

/// Stable handle to a particle: its index in the owning system's arena.
///
/// Particles are never removed, so a handle stays valid for the lifetime of
/// the system that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(pub usize);

impl ParticleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A point mass with explicit velocity and a force accumulator.
///
/// `prev_pos` is only read by Verlet integration. A fixed particle has zero
/// inverse mass and is never moved by any force, constraint or integrator.
#[derive(Copy, Clone, Debug)]
pub struct Particle<F: Float> {
    pub pos: Vec2<F>,
    pub prev_pos: Vec2<F>,
    pub vel: Vec2<F>,
    pub force: Vec2<F>,
    pub mass: F,
    pub inv_mass: F,
    /// Collision radius, zero unless set.
    pub radius: F,
    pub fixed: bool,
}

impl<F: Float> Particle<F> {
    /// Callers validate `mass > 0` before construction.
    pub fn new(pos: Vec2<F>, mass: F) -> Self {
        Particle {
            pos,
            prev_pos: pos,
            vel: Vec2::zero(),
            force: Vec2::zero(),
            mass,
            inv_mass: F::one() / mass,
            radius: F::zero(),
            fixed: false,
        }
    }

    /// A fixed particle keeps a nominal unit mass; only `fixed` matters.
    pub fn fixed(pos: Vec2<F>) -> Self {
        let mut p = Particle::new(pos, F::one());
        p.fix();
        p
    }

    pub fn with_radius(mut self, radius: F) -> Self {
        self.radius = radius;
        self
    }

    pub fn apply_force(&mut self, force: Vec2<F>) {
        if !self.fixed {
            self.force += force;
        }
    }

    pub fn clear_force(&mut self) {
        self.force = Vec2::zero();
    }

    /// Current acceleration `F/m`, zero for fixed particles.
    pub fn acceleration(&self) -> Vec2<F> {
        self.force.scale(self.inv_mass)
    }

    pub fn fix(&mut self) {
        self.fixed = true;
        self.inv_mass = F::zero();
        self.vel = Vec2::zero();
        self.force = Vec2::zero();
        self.prev_pos = self.pos;
    }

    pub fn release(&mut self) {
        self.fixed = false;
        self.inv_mass = F::one() / self.mass;
        self.prev_pos = self.pos;
    }

    /// Sets the velocity and rewrites `prev_pos` so Verlet implies the same
    /// velocity over a step of `dt`.
    pub fn set_velocity(&mut self, vel: Vec2<F>, dt: F) {
        self.vel = vel;
        self.sync_history(dt);
    }

    /// Rewrites `prev_pos` so that Verlet's implied velocity matches `vel`.
    pub fn sync_history(&mut self, dt: F) {
        self.prev_pos = self.pos - self.vel.scale(dt);
    }

    /// Moves the particle and resets its Verlet history so no velocity is implied.
    pub fn teleport(&mut self, pos: Vec2<F>) {
        self.pos = pos;
        self.prev_pos = pos;
    }

    pub fn kinetic_energy(&self) -> F {
        if self.fixed {
            return F::zero();
        }
        F::half() * self.mass * self.vel.length_sq()
    }
}

/// Mutable access to two distinct particles at once.
pub(crate) fn pair_mut<F: Float>(
    particles: &mut [Particle<F>],
    a: ParticleId,
    b: ParticleId,
) -> (&mut Particle<F>, &mut Particle<F>) {
    debug_assert_ne!(a, b, "pair_mut requires distinct particles");
    if a.0 < b.0 {
        let (lo, hi) = particles.split_at_mut(b.0);
        (&mut lo[a.0], &mut hi[0])
    } else {
        let (lo, hi) = particles.split_at_mut(a.0);
        (&mut hi[0], &mut lo[b.0])
    }
}
