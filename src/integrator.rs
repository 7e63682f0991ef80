//! Time integrators driven by a force-evaluation callback.
//!
//! Every integrator performs one synchronous step: it calls the supplied
//! evaluation closure as many times as the scheme needs (Euler, predictor
//! Euler and Verlet once, midpoint twice, RK4 four times), reads
//! `velocity` and `force / mass` after each call, and commits one update per
//! free particle.
//!
//! Trial states used for re-evaluation are scratch. Before committing, the
//! particles are restored to the recorded start state, and the committed
//! update is computed only from that state plus the weighted derivatives.
//! An update that would produce a non-finite position or velocity is
//! rejected and the particle keeps its start state.

use crate::float::Float;
use crate::observer::{StepObserver, StepReport};
use crate::particle::{Particle, ParticleId};
use crate::vec::Vec2;
use alloc::vec::Vec as AllocVec;

/// Time-stepping scheme.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Integrator {
    /// `x ← x + v·dt; v ← v + a·dt`, both derivatives from the start state.
    Euler,
    /// Euler with the acceleration sampled at the predicted position
    /// `x + v·dt`.
    PredictorEuler,
    /// Störmer–Verlet on position history; velocity is the central difference.
    /// `x' = x + (x - x_prev)·damping + a·dt²`.
    #[default]
    Verlet,
    /// Second-order Runge–Kutta using the derivative at the half step.
    Midpoint,
    /// Classical fourth-order Runge–Kutta.
    Rk4,
}

/// `(ẋ, v̇)` sampled for one particle after a force evaluation.
#[derive(Copy, Clone, Debug)]
struct Derivative<F: Float> {
    vel: Vec2<F>,
    acc: Vec2<F>,
}

/// Recorded start state of one particle.
#[derive(Copy, Clone, Debug)]
struct Snapshot<F: Float> {
    pos: Vec2<F>,
    vel: Vec2<F>,
    force: Vec2<F>,
}

impl Integrator {
    pub fn name(&self) -> &'static str {
        match self {
            Integrator::Euler => "Euler",
            Integrator::PredictorEuler => "Predictor Euler",
            Integrator::Verlet => "Verlet",
            Integrator::Midpoint => "Midpoint",
            Integrator::Rk4 => "RK4",
        }
    }

    /// Force evaluations per step.
    pub fn evaluations(&self) -> usize {
        match self {
            Integrator::Euler | Integrator::PredictorEuler | Integrator::Verlet => 1,
            Integrator::Midpoint => 2,
            Integrator::Rk4 => 4,
        }
    }

    /// Advances all free particles by `dt`.
    ///
    /// `eval` must clear the accumulators and apply every force (constraint
    /// corrections included) at the particles' current state. Committed
    /// velocities are multiplied by `damping`; under Verlet it scales the
    /// displacement carried over from the previous step.
    pub fn step<F, E, O>(
        &self,
        particles: &mut [Particle<F>],
        dt: F,
        damping: F,
        eval: &mut E,
        observer: &mut O,
    ) -> StepReport
    where
        F: Float,
        E: FnMut(&mut [Particle<F>], &mut O),
        O: StepObserver,
    {
        let mut report = StepReport::default();
        let mut stage = 0;
        let mut evaluate = |particles: &mut [Particle<F>], observer: &mut O| {
            eval(particles, observer);
            observer.on_force_evaluation(stage);
            stage += 1;
            sample(particles)
        };

        match self {
            Integrator::Euler => {
                let k = evaluate(particles, observer);
                let origin = snapshot(particles);
                commit(particles, &origin, dt, damping, observer, &mut report, |i| {
                    (k[i].vel, k[i].acc)
                });
            }
            Integrator::PredictorEuler => {
                let origin = snapshot(particles);
                for p in particles.iter_mut().filter(|p| !p.fixed) {
                    p.pos = p.pos + p.vel.scale(dt);
                }
                let k = evaluate(particles, observer);
                restore_motion(particles, &origin);
                commit(particles, &origin, dt, damping, observer, &mut report, |i| {
                    (k[i].vel, k[i].acc)
                });
            }
            Integrator::Verlet => {
                let origin = snapshot(particles);
                let k = evaluate(particles, observer);
                let dt_sq = dt * dt;
                let inv_two_dt = F::one() / (F::two() * dt);
                for (i, (p, s)) in particles.iter_mut().zip(&origin).enumerate() {
                    if p.fixed {
                        continue;
                    }
                    // A velocity rewritten during evaluation (the spring
                    // ceiling) replaces the one implied by the history.
                    let prev = if p.vel == s.vel {
                        p.prev_pos
                    } else {
                        p.pos - p.vel.scale(dt)
                    };
                    let next = p.pos + (p.pos - prev).scale(damping) + k[i].acc.scale(dt_sq);
                    let vel = (next - prev).scale(inv_two_dt);
                    if !next.is_finite() || !vel.is_finite() {
                        p.vel = s.vel;
                        reject(ParticleId(i), observer, &mut report);
                        continue;
                    }
                    p.prev_pos = p.pos;
                    p.pos = next;
                    p.vel = vel;
                }
            }
            Integrator::Midpoint => {
                let k1 = evaluate(particles, observer);
                let origin = snapshot(particles);
                advance_trial(particles, &origin, &k1, dt * F::half());
                let k2 = evaluate(particles, observer);
                restore(particles, &origin);
                commit(particles, &origin, dt, damping, observer, &mut report, |i| {
                    (k2[i].vel, k2[i].acc)
                });
            }
            Integrator::Rk4 => {
                let half_dt = dt * F::half();
                let k1 = evaluate(particles, observer);
                let origin = snapshot(particles);
                advance_trial(particles, &origin, &k1, half_dt);
                let k2 = evaluate(particles, observer);
                advance_trial(particles, &origin, &k2, half_dt);
                let k3 = evaluate(particles, observer);
                advance_trial(particles, &origin, &k3, dt);
                let k4 = evaluate(particles, observer);
                restore(particles, &origin);

                let sixth = F::one() / F::from_f32(6.0);
                commit(particles, &origin, dt, damping, observer, &mut report, |i| {
                    let vel = (k1[i].vel + (k2[i].vel + k3[i].vel).scale(F::two()) + k4[i].vel)
                        .scale(sixth);
                    let acc = (k1[i].acc + (k2[i].acc + k3[i].acc).scale(F::two()) + k4[i].acc)
                        .scale(sixth);
                    (vel, acc)
                });
            }
        }

        report.evaluations = stage;
        report
    }
}

fn sample<F: Float>(particles: &[Particle<F>]) -> AllocVec<Derivative<F>> {
    particles
        .iter()
        .map(|p| Derivative {
            vel: p.vel,
            acc: if p.fixed { Vec2::zero() } else { p.acceleration() },
        })
        .collect()
}

fn snapshot<F: Float>(particles: &[Particle<F>]) -> AllocVec<Snapshot<F>> {
    particles
        .iter()
        .map(|p| Snapshot { pos: p.pos, vel: p.vel, force: p.force })
        .collect()
}

/// Puts every free particle back at its recorded position and velocity.
fn restore_motion<F: Float>(particles: &mut [Particle<F>], origin: &[Snapshot<F>]) {
    for (p, s) in particles.iter_mut().zip(origin) {
        if p.fixed {
            continue;
        }
        p.pos = s.pos;
        p.vel = s.vel;
    }
}

/// Like [`restore_motion`], and also resets the accumulators so queries see
/// the forces of the start state.
fn restore<F: Float>(particles: &mut [Particle<F>], origin: &[Snapshot<F>]) {
    restore_motion(particles, origin);
    for (p, s) in particles.iter_mut().zip(origin) {
        p.force = s.force;
    }
}

/// Moves free particles to `origin + h·k`, always measured from the origin.
fn advance_trial<F: Float>(
    particles: &mut [Particle<F>],
    origin: &[Snapshot<F>],
    k: &[Derivative<F>],
    h: F,
) {
    for ((p, s), d) in particles.iter_mut().zip(origin).zip(k) {
        if p.fixed {
            continue;
        }
        p.pos = s.pos + d.vel.scale(h);
        p.vel = s.vel + d.acc.scale(h);
    }
}

/// Writes `origin + dt·(ẋ, v̇)` for every free particle, rejecting
/// non-finite results.
fn commit<F, O, D>(
    particles: &mut [Particle<F>],
    origin: &[Snapshot<F>],
    dt: F,
    damping: F,
    observer: &mut O,
    report: &mut StepReport,
    derivative: D,
) where
    F: Float,
    O: StepObserver,
    D: Fn(usize) -> (Vec2<F>, Vec2<F>),
{
    for (i, (p, s)) in particles.iter_mut().zip(origin).enumerate() {
        if p.fixed {
            continue;
        }
        let (vel, acc) = derivative(i);
        let pos = s.pos + vel.scale(dt);
        let vel = (s.vel + acc.scale(dt)).scale(damping);
        if !pos.is_finite() || !vel.is_finite() {
            reject(ParticleId(i), observer, report);
            continue;
        }
        p.prev_pos = s.pos;
        p.pos = pos;
        p.vel = vel;
    }
}

fn reject<O: StepObserver>(id: ParticleId, observer: &mut O, report: &mut StepReport) {
    log::warn!("non-finite update for particle {}, keeping previous state", id.0);
    observer.on_rejected_update(id);
    report.rejected += 1;
}
