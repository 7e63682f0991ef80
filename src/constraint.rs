//! Holonomic constraints: quadratic rod, unit rod, circular wire.
//!
//! Every constraint reports `C`, `Ċ`, its Jacobian row and the row's time
//! derivative as pure functions of particle state. The global solver turns
//! those into corrective forces. Each constraint can alternatively project
//! particle positions straight onto its manifold, and carries a feedback
//! spring that counters drift.

use crate::float::Float;
use crate::force::spring_force;
use crate::particle::{pair_mut, Particle, ParticleId};
use crate::vec::Vec2;

/// Stable handle to a registered constraint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub usize);

/// One row of a constraint Jacobian: `∂C/∂p` for each affected particle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JacobianRow<F: Float> {
    blocks: [(ParticleId, Vec2<F>); 2],
    len: usize,
}

impl<F: Float> JacobianRow<F> {
    pub fn single(p: ParticleId, d: Vec2<F>) -> Self {
        JacobianRow {
            blocks: [(p, d), (p, Vec2::zero())],
            len: 1,
        }
    }

    pub fn pair(a: ParticleId, da: Vec2<F>, b: ParticleId, db: Vec2<F>) -> Self {
        JacobianRow {
            blocks: [(a, da), (b, db)],
            len: 2,
        }
    }

    /// `(particle, ∂C/∂position)` blocks.
    pub fn blocks(&self) -> &[(ParticleId, Vec2<F>)] {
        &self.blocks[..self.len]
    }

    /// Number of scalar columns this row spans (two per particle).
    pub fn dimension(&self) -> usize {
        self.len * 2
    }

    /// `J·v` for this row.
    pub fn dot_velocities(&self, particles: &[Particle<F>]) -> F {
        self.blocks()
            .iter()
            .fold(F::zero(), |acc, (id, j)| acc + j.dot(particles[id.0].vel))
    }
}

/// Stiffness and damping of a constraint's auxiliary drift-correcting spring.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeedbackSpring<F: Float> {
    pub stiffness: F,
    pub damping: F,
}

impl<F: Float> FeedbackSpring<F> {
    pub fn new(stiffness: F, damping: F) -> Self {
        FeedbackSpring { stiffness, damping }
    }

    /// A spring that contributes nothing.
    pub fn disabled() -> Self {
        FeedbackSpring { stiffness: F::zero(), damping: F::zero() }
    }

    fn is_disabled(&self) -> bool {
        self.stiffness == F::zero() && self.damping == F::zero()
    }
}

/// A holonomic constraint on one or two particles.
#[derive(Clone, Debug)]
pub enum Constraint<F: Float> {
    Rod(RodConstraint<F>),
    UnitRod(UnitRodConstraint<F>),
    CircularWire(CircularWireConstraint<F>),
}

impl<F: Float> Constraint<F> {
    /// `C`, zero when satisfied.
    pub fn value(&self, particles: &[Particle<F>]) -> F {
        match self {
            Constraint::Rod(c) => c.value(particles),
            Constraint::UnitRod(c) => c.value(particles),
            Constraint::CircularWire(c) => c.value(particles),
        }
    }

    /// `Ċ`.
    pub fn velocity(&self, particles: &[Particle<F>]) -> F {
        match self {
            Constraint::Rod(c) => c.velocity(particles),
            Constraint::UnitRod(c) => c.velocity(particles),
            Constraint::CircularWire(c) => c.velocity(particles),
        }
    }

    pub fn jacobian(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        match self {
            Constraint::Rod(c) => c.jacobian(particles),
            Constraint::UnitRod(c) => c.jacobian(particles),
            Constraint::CircularWire(c) => c.jacobian(particles),
        }
    }

    pub fn jacobian_dot(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        match self {
            Constraint::Rod(c) => c.jacobian_dot(particles),
            Constraint::UnitRod(c) => c.jacobian_dot(particles),
            Constraint::CircularWire(c) => c.jacobian_dot(particles),
        }
    }

    /// Adds `Jᵀλ` for this constraint alone.
    pub fn apply_multiplier(&self, lambda: F, particles: &mut [Particle<F>]) {
        let row = self.jacobian(particles);
        for &(id, j) in row.blocks() {
            particles[id.0].apply_force(j.scale(lambda));
        }
    }

    /// Moves particles directly onto the constraint manifold.
    pub fn project(&self, particles: &mut [Particle<F>]) {
        match self {
            Constraint::Rod(c) => project_distance(c.a, c.b, c.length, particles),
            Constraint::UnitRod(c) => project_distance(c.a, c.b, c.length, particles),
            Constraint::CircularWire(c) => c.project(particles),
        }
    }

    pub fn apply_feedback(&self, particles: &mut [Particle<F>]) {
        match self {
            Constraint::Rod(c) => feedback_between(c.a, c.b, c.length, &c.feedback, particles),
            Constraint::UnitRod(c) => feedback_between(c.a, c.b, c.length, &c.feedback, particles),
            Constraint::CircularWire(c) => c.apply_feedback(particles),
        }
    }

    pub fn feedback(&self) -> FeedbackSpring<F> {
        match self {
            Constraint::Rod(c) => c.feedback,
            Constraint::UnitRod(c) => c.feedback,
            Constraint::CircularWire(c) => c.feedback,
        }
    }

    pub fn set_feedback(&mut self, feedback: FeedbackSpring<F>) {
        match self {
            Constraint::Rod(c) => c.feedback = feedback,
            Constraint::UnitRod(c) => c.feedback = feedback,
            Constraint::CircularWire(c) => c.feedback = feedback,
        }
    }

    pub fn with_feedback(mut self, feedback: FeedbackSpring<F>) -> Self {
        self.set_feedback(feedback);
        self
    }

    /// Particles referenced by this constraint.
    pub fn particles(&self) -> &[ParticleId] {
        match self {
            Constraint::Rod(c) => &c.ends,
            Constraint::UnitRod(c) => &c.ends,
            Constraint::CircularWire(c) => core::slice::from_ref(&c.particle),
        }
    }
}

/// Rigid distance in quadratic form, `C = |pa - pb|² - L²`.
#[derive(Clone, Debug)]
pub struct RodConstraint<F: Float> {
    a: ParticleId,
    b: ParticleId,
    pub length: F,
    pub feedback: FeedbackSpring<F>,
    ends: [ParticleId; 2],
}

impl<F: Float> RodConstraint<F> {
    pub fn ends(&self) -> (ParticleId, ParticleId) {
        (self.a, self.b)
    }

    pub fn new(a: ParticleId, b: ParticleId, length: F) -> Self {
        RodConstraint {
            a,
            b,
            length,
            feedback: FeedbackSpring::new(F::from_f32(50.0), F::half()),
            ends: [a, b],
        }
    }

    pub fn value(&self, particles: &[Particle<F>]) -> F {
        let d = particles[self.a.0].pos - particles[self.b.0].pos;
        d.length_sq() - self.length * self.length
    }

    pub fn velocity(&self, particles: &[Particle<F>]) -> F {
        let (d, dv) = separation(self.a, self.b, particles);
        F::two() * d.dot(dv)
    }

    pub fn jacobian(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        let (d, _) = separation(self.a, self.b, particles);
        let j = d.scale(F::two());
        JacobianRow::pair(self.a, j, self.b, -j)
    }

    pub fn jacobian_dot(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        let (_, dv) = separation(self.a, self.b, particles);
        let jd = dv.scale(F::two());
        JacobianRow::pair(self.a, jd, self.b, -jd)
    }
}

/// Rigid distance in square-root form, `C = |pa - pb| - L`.
///
/// The Jacobian is the unit separation direction, so corrective forces are
/// direct projections along the rod. Its default feedback spring is softer
/// than the quadratic rod's, which leaves some visible elasticity.
#[derive(Clone, Debug)]
pub struct UnitRodConstraint<F: Float> {
    a: ParticleId,
    b: ParticleId,
    pub length: F,
    pub feedback: FeedbackSpring<F>,
    ends: [ParticleId; 2],
}

impl<F: Float> UnitRodConstraint<F> {
    pub fn ends(&self) -> (ParticleId, ParticleId) {
        (self.a, self.b)
    }

    pub fn new(a: ParticleId, b: ParticleId, length: F) -> Self {
        UnitRodConstraint {
            a,
            b,
            length,
            feedback: FeedbackSpring::new(F::from_f32(20.0), F::half()),
            ends: [a, b],
        }
    }

    /// Unit direction and distance, `None` when the endpoints coincide.
    fn direction(&self, particles: &[Particle<F>]) -> Option<(Vec2<F>, F, Vec2<F>)> {
        let (d, dv) = separation(self.a, self.b, particles);
        let dist = d.length();
        if dist.is_near_zero(F::from_f32(1e-12)) {
            return None;
        }
        Some((d.scale(F::one() / dist), dist, dv))
    }

    pub fn value(&self, particles: &[Particle<F>]) -> F {
        (particles[self.a.0].pos - particles[self.b.0].pos).length() - self.length
    }

    pub fn velocity(&self, particles: &[Particle<F>]) -> F {
        match self.direction(particles) {
            Some((n, _, dv)) => n.dot(dv),
            None => F::zero(),
        }
    }

    pub fn jacobian(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        match self.direction(particles) {
            Some((n, _, _)) => JacobianRow::pair(self.a, n, self.b, -n),
            None => JacobianRow::pair(self.a, Vec2::zero(), self.b, Vec2::zero()),
        }
    }

    /// `ṅ = (Δv - n(n·Δv)) / |d|`.
    pub fn jacobian_dot(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        match self.direction(particles) {
            Some((n, dist, dv)) => {
                let n_dot = (dv - n.scale(n.dot(dv))).scale(F::one() / dist);
                JacobianRow::pair(self.a, n_dot, self.b, -n_dot)
            }
            None => JacobianRow::pair(self.a, Vec2::zero(), self.b, Vec2::zero()),
        }
    }
}

/// Keeps one particle on a circle, `C = ½(|p - c|² - r²)`.
#[derive(Clone, Debug)]
pub struct CircularWireConstraint<F: Float> {
    pub particle: ParticleId,
    pub center: Vec2<F>,
    pub radius: F,
    pub feedback: FeedbackSpring<F>,
}

impl<F: Float> CircularWireConstraint<F> {
    pub fn new(particle: ParticleId, center: Vec2<F>, radius: F) -> Self {
        CircularWireConstraint {
            particle,
            center,
            radius,
            feedback: FeedbackSpring::new(F::from_f32(5000.0), F::half()),
        }
    }

    fn offset(&self, particles: &[Particle<F>]) -> Vec2<F> {
        particles[self.particle.0].pos - self.center
    }

    pub fn value(&self, particles: &[Particle<F>]) -> F {
        F::half() * (self.offset(particles).length_sq() - self.radius * self.radius)
    }

    pub fn velocity(&self, particles: &[Particle<F>]) -> F {
        self.offset(particles).dot(particles[self.particle.0].vel)
    }

    pub fn jacobian(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        JacobianRow::single(self.particle, self.offset(particles))
    }

    pub fn jacobian_dot(&self, particles: &[Particle<F>]) -> JacobianRow<F> {
        JacobianRow::single(self.particle, particles[self.particle.0].vel)
    }

    /// Rescales the offset onto the circle and drops the radial velocity.
    pub fn project(&self, particles: &mut [Particle<F>]) {
        let p = &mut particles[self.particle.0];
        if p.fixed {
            return;
        }
        let offset = p.pos - self.center;
        let dist = offset.length();
        if dist.is_near_zero(F::from_f32(1e-12)) {
            log::trace!("wire particle {:?} sits on the centre, skipping", self.particle);
            return;
        }
        let n = offset.scale(F::one() / dist);
        let shift = n.scale(self.radius - dist);
        p.pos += shift;
        let radial = n.dot(p.vel);
        p.vel -= n.scale(radial);
    }

    /// Spring to the fixed centre with rest length equal to the radius.
    pub fn apply_feedback(&self, particles: &mut [Particle<F>]) {
        if self.feedback.is_disabled() {
            return;
        }
        let p = &mut particles[self.particle.0];
        if let Some(f) = spring_force(
            p.pos,
            p.vel,
            self.center,
            Vec2::zero(),
            self.radius,
            self.feedback.stiffness,
            self.feedback.damping,
        ) {
            p.apply_force(f);
        }
    }
}

/// `(pa - pb, va - vb)`.
fn separation<F: Float>(
    a: ParticleId,
    b: ParticleId,
    particles: &[Particle<F>],
) -> (Vec2<F>, Vec2<F>) {
    let pa = &particles[a.0];
    let pb = &particles[b.0];
    (pa.pos - pb.pos, pa.vel - pb.vel)
}

/// Splits the length error between both ends in proportion to inverse mass.
fn project_distance<F: Float>(
    a: ParticleId,
    b: ParticleId,
    length: F,
    particles: &mut [Particle<F>],
) {
    if a == b {
        return;
    }
    let (pa, pb) = pair_mut(particles, a, b);
    let w_total = pa.inv_mass + pb.inv_mass;
    if w_total.is_near_zero(F::from_f32(1e-10)) {
        return; // both fixed
    }

    let delta = pb.pos - pa.pos;
    let dist = delta.length();
    if dist.is_near_zero(F::from_f32(1e-10)) {
        log::trace!("rod {:?}-{:?} has coincident ends, skipping", a, b);
        return;
    }

    let correction = delta.scale((dist - length) / dist);
    let n = delta.scale(F::one() / dist);
    let rel_normal = (pb.vel - pa.vel).dot(n);

    if !pa.fixed {
        let share = pa.inv_mass / w_total;
        let shift = correction.scale(share);
        pa.pos += shift;
        pa.vel += n.scale(rel_normal * share);
    }
    if !pb.fixed {
        let share = pb.inv_mass / w_total;
        let shift = correction.scale(share);
        pb.pos -= shift;
        pb.vel -= n.scale(rel_normal * share);
    }
}

fn feedback_between<F: Float>(
    a: ParticleId,
    b: ParticleId,
    length: F,
    feedback: &FeedbackSpring<F>,
    particles: &mut [Particle<F>],
) {
    if feedback.is_disabled() || a == b {
        return;
    }
    let (pa, pb) = pair_mut(particles, a, b);
    if let Some(f) = spring_force(
        pa.pos,
        pa.vel,
        pb.pos,
        pb.vel,
        length,
        feedback.stiffness,
        feedback.damping,
    ) {
        pa.apply_force(f);
        pb.apply_force(-f);
    }
}
