//! Unconstrained force generators and impulse correctors.
//!
//! [`Force`] variants accumulate into particle force accumulators during a
//! force evaluation. [`CollisionForce`] and [`BoundsForce`] are instantaneous
//! velocity/position corrections applied once per sub-step, outside force
//! evaluation and outside the Lagrangian solve.

use crate::float::Float;
use crate::particle::{pair_mut, Particle, ParticleId};
use crate::vec::Vec2;
use alloc::vec::Vec as AllocVec;

/// Default per-component velocity ceiling applied by springs.
pub const DEFAULT_MAX_VELOCITY: f32 = 800.0;

/// Arm length below which an angular spring does nothing.
const ARM_EPSILON: f32 = 1e-6;

/// Stable handle to a registered force.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForceId(pub usize);

/// A force generator applied during every force evaluation.
#[derive(Clone, Debug)]
pub enum Force<F: Float> {
    Gravity(GravityForce<F>),
    Drag(DragForce<F>),
    Spring(SpringForce<F>),
    AngularSpring(AngularSpringForce<F>),
}

impl<F: Float> Force<F> {
    pub fn apply(&mut self, particles: &mut [Particle<F>]) {
        match self {
            Force::Gravity(f) => f.apply(particles),
            Force::Drag(f) => f.apply(particles),
            Force::Spring(f) => f.apply(particles),
            Force::AngularSpring(f) => f.apply(particles),
        }
    }

    /// Particles this force reads, empty for global forces.
    pub fn participants(&self) -> AllocVec<ParticleId> {
        match self {
            Force::Gravity(_) | Force::Drag(_) => AllocVec::new(),
            Force::Spring(f) => alloc::vec![f.a, f.b],
            Force::AngularSpring(f) => alloc::vec![f.a, f.pivot, f.c],
        }
    }
}

/// Uniform gravitational acceleration, `F = m·g`.
#[derive(Copy, Clone, Debug)]
pub struct GravityForce<F: Float> {
    pub gravity: Vec2<F>,
}

impl<F: Float> GravityForce<F> {
    pub fn new(gravity: Vec2<F>) -> Self {
        GravityForce { gravity }
    }

    pub fn apply(&self, particles: &mut [Particle<F>]) {
        for p in particles.iter_mut() {
            let weight = self.gravity.scale(p.mass);
            p.apply_force(weight);
        }
    }
}

/// Linear viscous drag, `F = -k·v`.
#[derive(Copy, Clone, Debug)]
pub struct DragForce<F: Float> {
    pub coefficient: F,
}

impl<F: Float> DragForce<F> {
    pub fn new(coefficient: F) -> Self {
        DragForce { coefficient }
    }

    pub fn apply(&self, particles: &mut [Particle<F>]) {
        for p in particles.iter_mut() {
            let drag = p.vel.scale(-self.coefficient);
            p.apply_force(drag);
        }
    }
}

/// Force on the first endpoint of a damped Hookean spring.
///
/// `d = pa - pb`; the result is `-(ks·(|d| - rest) + kd·(Δv·d)/|d|)·d/|d|`.
/// Returns `None` for coincident endpoints or a non-finite result; the
/// second endpoint receives the negation.
pub fn spring_force<F: Float>(
    pa: Vec2<F>,
    va: Vec2<F>,
    pb: Vec2<F>,
    vb: Vec2<F>,
    rest_length: F,
    stiffness: F,
    damping: F,
) -> Option<Vec2<F>> {
    let d = pa - pb;
    let dist = d.length();
    if dist.is_near_zero(F::from_f32(1e-12)) {
        log::trace!("spring endpoints coincide, skipping");
        return None;
    }
    let dv = va - vb;
    let magnitude = stiffness * (dist - rest_length) + damping * dv.dot(d) / dist;
    let force = d.scale(-magnitude / dist);
    if force.is_finite() {
        Some(force)
    } else {
        None
    }
}

/// Damped spring between two particles.
#[derive(Clone, Debug)]
pub struct SpringForce<F: Float> {
    pub a: ParticleId,
    pub b: ParticleId,
    pub rest_length: F,
    pub stiffness: F,
    pub damping: F,
    /// Per-component velocity ceiling enforced on both endpoints after each
    /// application. `None` disables clamping.
    pub max_velocity: Option<F>,
}

impl<F: Float> SpringForce<F> {
    pub fn new(a: ParticleId, b: ParticleId, rest_length: F, stiffness: F, damping: F) -> Self {
        SpringForce {
            a,
            b,
            rest_length,
            stiffness,
            damping,
            max_velocity: Some(F::from_f32(DEFAULT_MAX_VELOCITY)),
        }
    }

    pub fn with_max_velocity(mut self, max_velocity: Option<F>) -> Self {
        self.max_velocity = max_velocity;
        self
    }

    pub fn apply(&self, particles: &mut [Particle<F>]) {
        if self.a == self.b {
            return;
        }
        let (pa, pb) = pair_mut(particles, self.a, self.b);
        if let Some(f) = spring_force(
            pa.pos,
            pa.vel,
            pb.pos,
            pb.vel,
            self.rest_length,
            self.stiffness,
            self.damping,
        ) {
            pa.apply_force(f);
            pb.apply_force(-f);
        }

        if let Some(limit) = self.max_velocity {
            for p in [pa, pb] {
                if !p.fixed {
                    p.vel = p.vel.clamp_components(limit);
                }
            }
        }
    }
}

/// Keeps the opening angle at `pivot` between arms `pivot→a` and `pivot→c`
/// near `rest_angle` by springing the third side `a↔c`.
///
/// The third side's rest length comes from the law of cosines with the
/// current arm lengths, so it is recomputed on every application.
#[derive(Clone, Debug)]
pub struct AngularSpringForce<F: Float> {
    pub a: ParticleId,
    pub pivot: ParticleId,
    pub c: ParticleId,
    /// Radians.
    pub rest_angle: F,
    spring: SpringForce<F>,
}

impl<F: Float> AngularSpringForce<F> {
    pub fn new(
        a: ParticleId,
        pivot: ParticleId,
        c: ParticleId,
        rest_angle: F,
        stiffness: F,
        damping: F,
    ) -> Self {
        AngularSpringForce {
            a,
            pivot,
            c,
            rest_angle,
            spring: SpringForce::new(a, c, F::zero(), stiffness, damping),
        }
    }

    pub fn from_degrees(
        a: ParticleId,
        pivot: ParticleId,
        c: ParticleId,
        rest_angle_deg: F,
        stiffness: F,
        damping: F,
    ) -> Self {
        Self::new(a, pivot, c, rest_angle_deg.to_radians(), stiffness, damping)
    }

    pub fn stiffness(&self) -> F {
        self.spring.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: F) {
        self.spring.stiffness = stiffness;
    }

    pub fn set_damping(&mut self, damping: F) {
        self.spring.damping = damping;
    }

    /// Rest length the nested spring used on its last application.
    pub fn target_distance(&self) -> F {
        self.spring.rest_length
    }

    pub fn apply(&mut self, particles: &mut [Particle<F>]) {
        let pivot = particles[self.pivot.0].pos;
        let b = particles[self.a.0].pos.distance(pivot);
        let c = particles[self.c.0].pos.distance(pivot);
        let eps = F::from_f32(ARM_EPSILON);
        if b < eps || c < eps {
            return;
        }
        let third_sq = b * b + c * c - F::two() * b * c * self.rest_angle.cos();
        self.spring.rest_length = third_sq.max(F::zero()).sqrt();
        self.spring.apply(particles);
    }
}

/// Pairwise collision response between particles of a group.
///
/// Overlapping pairs (closer than the sum of radii plus `margin`) are pushed
/// apart and, when approaching, exchange a normal impulse scaled by
/// `restitution`.
#[derive(Clone, Debug)]
pub struct CollisionForce<F: Float> {
    pub members: AllocVec<ParticleId>,
    pub restitution: F,
    pub margin: F,
}

impl<F: Float> CollisionForce<F> {
    pub fn new(members: AllocVec<ParticleId>, restitution: F) -> Self {
        CollisionForce {
            members,
            restitution,
            margin: F::one(),
        }
    }

    pub fn with_margin(mut self, margin: F) -> Self {
        self.margin = margin;
        self
    }

    /// Resolves every overlapping pair. `dt` rewrites Verlet history so the
    /// corrected velocity is also the implied one.
    pub fn resolve(&self, particles: &mut [Particle<F>], dt: F) {
        for (i, &a) in self.members.iter().enumerate() {
            for &b in &self.members[i + 1..] {
                if a != b {
                    self.resolve_pair(particles, a, b, dt);
                }
            }
        }
    }

    fn resolve_pair(&self, particles: &mut [Particle<F>], a: ParticleId, b: ParticleId, dt: F) {
        let (p1, p2) = pair_mut(particles, a, b);
        if p1.fixed && p2.fixed {
            return;
        }
        let d = p2.pos - p1.pos;
        let dist_sq = d.length_sq();
        let min_dist = p1.radius + p2.radius + self.margin;
        if dist_sq > min_dist * min_dist {
            return;
        }
        let dist = dist_sq.sqrt();
        if dist.is_near_zero(F::from_f32(1e-12)) {
            log::trace!("collision pair {:?}/{:?} coincides, skipping", a, b);
            return;
        }
        let n = d.scale(F::one() / dist);
        let overlap = min_dist - dist;

        if !p1.fixed && !p2.fixed {
            let push = n.scale(overlap * F::half());
            p1.pos -= push;
            p1.prev_pos -= push;
            p2.pos += push;
            p2.prev_pos += push;

            let vel_along_normal = (p2.vel - p1.vel).dot(n);
            if vel_along_normal > F::zero() {
                return;
            }
            let j = -(F::one() + self.restitution) * vel_along_normal;
            let impulse = j / (p1.inv_mass + p2.inv_mass);
            p1.vel -= n.scale(impulse * p1.inv_mass);
            p2.vel += n.scale(impulse * p2.inv_mass);
            p1.sync_history(dt);
            p2.sync_history(dt);
        } else {
            // Only the free particle moves; `n` points away from the fixed one.
            let (free, n) = if p1.fixed { (p2, n) } else { (p1, -n) };
            let push = n.scale(overlap);
            free.pos += push;
            free.prev_pos += push;
            let vn = free.vel.dot(n);
            if vn < F::zero() {
                free.vel -= n.scale((F::one() + self.restitution) * vn);
                free.sync_history(dt);
            }
        }
    }
}

/// Axis-aligned box that keeps particles inside `[min + margin, max - margin]`.
///
/// A particle crossing a wall is clamped back, its normal velocity reflected
/// and scaled by `restitution`, its tangential velocity scaled by `friction`.
#[derive(Copy, Clone, Debug)]
pub struct BoundsForce<F: Float> {
    pub min: Vec2<F>,
    pub max: Vec2<F>,
    pub margin: F,
    pub restitution: F,
    pub friction: F,
}

impl<F: Float> BoundsForce<F> {
    pub fn new(min: Vec2<F>, max: Vec2<F>, restitution: F, friction: F) -> Self {
        BoundsForce {
            min,
            max,
            margin: F::zero(),
            restitution,
            friction,
        }
    }

    pub fn with_margin(mut self, margin: F) -> Self {
        self.margin = margin;
        self
    }

    pub fn resolve(&self, particles: &mut [Particle<F>], dt: F) {
        let lo = self.min + Vec2::new(self.margin, self.margin);
        let hi = self.max - Vec2::new(self.margin, self.margin);
        for p in particles.iter_mut() {
            if p.fixed {
                continue;
            }
            let mut hit = false;
            if p.pos.y > hi.y || p.pos.y < lo.y {
                p.pos.y = p.pos.y.clamp(lo.y, hi.y);
                p.vel.y = -p.vel.y * self.restitution;
                p.vel.x = p.vel.x * self.friction;
                hit = true;
            }
            if p.pos.x < lo.x || p.pos.x > hi.x {
                p.pos.x = p.pos.x.clamp(lo.x, hi.x);
                p.vel.x = -p.vel.x * self.restitution;
                p.vel.y = p.vel.y * self.friction;
                hit = true;
            }
            if hit {
                p.sync_history(dt);
            }
        }
    }
}

/// Solid axis-aligned rectangle with a contact band of width `margin`
/// around its faces.
///
/// A free particle inside the band of a face (and within that face's span)
/// is moved to the band's outer edge. If it is heading into the face, its
/// normal velocity is reflected and scaled by `restitution` and its
/// tangential velocity scaled by `friction`. Particles already inside the
/// rectangle are left alone.
#[derive(Copy, Clone, Debug)]
pub struct ObstacleForce<F: Float> {
    pub min: Vec2<F>,
    pub max: Vec2<F>,
    pub margin: F,
    pub restitution: F,
    pub friction: F,
}

impl<F: Float> ObstacleForce<F> {
    pub fn new(min: Vec2<F>, max: Vec2<F>, restitution: F, friction: F) -> Self {
        ObstacleForce {
            min,
            max,
            margin: F::one(),
            restitution,
            friction,
        }
    }

    pub fn with_margin(mut self, margin: F) -> Self {
        self.margin = margin;
        self
    }

    pub fn resolve(&self, particles: &mut [Particle<F>], dt: F) {
        let (lo, hi, m) = (self.min, self.max, self.margin);
        for p in particles.iter_mut() {
            if p.fixed {
                continue;
            }
            let Vec2 { x, y } = p.pos;
            let within_x = lo.x < x && x < hi.x;
            let within_y = lo.y < y && y < hi.y;

            if within_x && y > lo.y - m && y < lo.y {
                p.pos.y = lo.y - m;
                if p.vel.y > F::zero() {
                    self.bounce_y(p);
                }
            } else if within_x && y > hi.y && y < hi.y + m {
                p.pos.y = hi.y + m;
                if p.vel.y < F::zero() {
                    self.bounce_y(p);
                }
            } else if within_y && x > lo.x - m && x < lo.x {
                p.pos.x = lo.x - m;
                if p.vel.x > F::zero() {
                    self.bounce_x(p);
                }
            } else if within_y && x > hi.x && x < hi.x + m {
                p.pos.x = hi.x + m;
                if p.vel.x < F::zero() {
                    self.bounce_x(p);
                }
            } else {
                continue;
            }
            p.sync_history(dt);
        }
    }

    fn bounce_y(&self, p: &mut Particle<F>) {
        p.vel.y = -p.vel.y * self.restitution;
        p.vel.x = p.vel.x * self.friction;
    }

    fn bounce_x(&self, p: &mut Particle<F>) {
        p.vel.x = -p.vel.x * self.restitution;
        p.vel.y = p.vel.y * self.friction;
    }
}
