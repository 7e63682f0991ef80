//! The particle system: registration, stepping and state queries.

use crate::config::{SolverConfig, SolverMode};
use crate::constraint::{
    CircularWireConstraint, Constraint, ConstraintId, RodConstraint, UnitRodConstraint,
};
use crate::error::PhysicsError;
use crate::float::Float;
use crate::force::{
    AngularSpringForce, BoundsForce, CollisionForce, DragForce, Force, ForceId, GravityForce,
    ObstacleForce, SpringForce,
};
use crate::observer::{StepObserver, StepReport};
use crate::particle::{Particle, ParticleId};
use crate::solver::GlobalSolver;
use crate::vec::Vec2;
use alloc::vec::Vec as AllocVec;

/// Owns every particle, force and constraint and advances them together.
///
/// Particles live in an arena indexed by [`ParticleId`]. Forces and
/// constraints live in slot lists: removing one empties its slot, so no other
/// handle is invalidated and ids are never reused.
pub struct ParticleSystem<F: Float> {
    particles: AllocVec<Particle<F>>,
    forces: AllocVec<Option<Force<F>>>,
    constraints: AllocVec<Option<Constraint<F>>>,
    active_constraints: usize,
    colliders: AllocVec<CollisionForce<F>>,
    bounds: Option<BoundsForce<F>>,
    obstacles: AllocVec<ObstacleForce<F>>,
    solver: GlobalSolver<F>,
    config: SolverConfig<F>,
    accumulator: F,
    time: F,
    report: StepReport,
}

impl<F: Float> ParticleSystem<F> {
    pub fn new(config: SolverConfig<F>) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(ParticleSystem {
            particles: AllocVec::new(),
            forces: AllocVec::new(),
            constraints: AllocVec::new(),
            active_constraints: 0,
            colliders: AllocVec::new(),
            bounds: None,
            obstacles: AllocVec::new(),
            solver: GlobalSolver::from_config(&config),
            config,
            accumulator: F::zero(),
            time: F::zero(),
            report: StepReport::default(),
        })
    }

    pub fn config(&self) -> &SolverConfig<F> {
        &self.config
    }

    /// Replaces the configuration. Registered elements are kept.
    pub fn set_config(&mut self, config: SolverConfig<F>) -> Result<(), PhysicsError> {
        config.validate()?;
        self.solver = GlobalSolver::from_config(&config);
        self.config = config;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Particles
    // ---------------------------------------------------------------------

    pub fn add_particle(&mut self, pos: Vec2<F>, mass: F) -> Result<ParticleId, PhysicsError> {
        if !mass.is_finite() || mass <= F::zero() {
            return Err(PhysicsError::InvalidMass);
        }
        let id = ParticleId(self.particles.len());
        self.particles.push(Particle::new(pos, mass));
        Ok(id)
    }

    pub fn add_fixed_particle(&mut self, pos: Vec2<F>) -> ParticleId {
        let id = ParticleId(self.particles.len());
        self.particles.push(Particle::fixed(pos));
        id
    }

    pub fn set_fixed(&mut self, id: ParticleId, fixed: bool) -> Result<(), PhysicsError> {
        self.check_particle(id)?;
        let p = &mut self.particles[id.0];
        if fixed {
            p.fix();
        } else {
            p.release();
        }
        Ok(())
    }

    pub fn set_radius(&mut self, id: ParticleId, radius: F) -> Result<(), PhysicsError> {
        self.check_particle(id)?;
        if !radius.is_finite() || radius < F::zero() {
            return Err(PhysicsError::InvalidRadius);
        }
        self.particles[id.0].radius = radius;
        Ok(())
    }

    /// Ignored for fixed particles. The Verlet history is rewritten over one
    /// `config.timestep` so every integrator starts from `vel`.
    pub fn set_velocity(&mut self, id: ParticleId, vel: Vec2<F>) -> Result<(), PhysicsError> {
        self.check_particle(id)?;
        let dt = self.config.timestep;
        let p = &mut self.particles[id.0];
        if !p.fixed {
            p.set_velocity(vel, dt);
        }
        Ok(())
    }

    /// Moves a particle, fixed or not, and resets its Verlet history.
    pub fn set_position(&mut self, id: ParticleId, pos: Vec2<F>) -> Result<(), PhysicsError> {
        self.check_particle(id)?;
        self.particles[id.0].teleport(pos);
        Ok(())
    }

    fn check_particle(&self, id: ParticleId) -> Result<(), PhysicsError> {
        if id.0 < self.particles.len() {
            Ok(())
        } else {
            Err(PhysicsError::ParticleOutOfBounds {
                index: id.0,
                count: self.particles.len(),
            })
        }
    }

    fn check_pair(&self, a: ParticleId, b: ParticleId) -> Result<(), PhysicsError> {
        self.check_particle(a)?;
        self.check_particle(b)?;
        if a == b {
            return Err(PhysicsError::DegenerateConstraint(a.0));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Constraints
    // ---------------------------------------------------------------------

    pub fn add_constraint(&mut self, constraint: Constraint<F>) -> Result<ConstraintId, PhysicsError> {
        match constraint.particles() {
            [a, b] => self.check_pair(*a, *b)?,
            [p] => self.check_particle(*p)?,
            _ => {}
        }
        let id = ConstraintId(self.constraints.len());
        self.constraints.push(Some(constraint));
        self.active_constraints += 1;
        if self.active_constraints == 1 {
            log::debug!("constraint solver activated");
        }
        Ok(id)
    }

    /// Quadratic-form rod, `C = |pa - pb|² - L²`.
    pub fn add_rod(&mut self, a: ParticleId, b: ParticleId, length: F) -> Result<ConstraintId, PhysicsError> {
        check_length(length)?;
        self.add_constraint(Constraint::Rod(RodConstraint::new(a, b, length)))
    }

    /// Square-root-form rod, `C = |pa - pb| - L`.
    pub fn add_unit_rod(&mut self, a: ParticleId, b: ParticleId, length: F) -> Result<ConstraintId, PhysicsError> {
        check_length(length)?;
        self.add_constraint(Constraint::UnitRod(UnitRodConstraint::new(a, b, length)))
    }

    pub fn add_circular_wire(
        &mut self,
        particle: ParticleId,
        center: Vec2<F>,
        radius: F,
    ) -> Result<ConstraintId, PhysicsError> {
        if !radius.is_finite() || radius <= F::zero() {
            return Err(PhysicsError::InvalidRadius);
        }
        self.add_constraint(Constraint::CircularWire(CircularWireConstraint::new(
            particle, center, radius,
        )))
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint<F>, PhysicsError> {
        let removed = self
            .constraints
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(PhysicsError::UnknownConstraint(id.0))?;
        self.active_constraints -= 1;
        if self.active_constraints == 0 {
            log::debug!("constraint solver deactivated");
        }
        Ok(removed)
    }

    pub fn clear_constraints(&mut self) {
        for slot in self.constraints.iter_mut() {
            *slot = None;
        }
        self.active_constraints = 0;
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint<F>> {
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint<F>> {
        self.constraints.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint<F>> + Clone + '_ {
        self.constraints.iter().flatten()
    }

    pub fn constraint_count(&self) -> usize {
        self.active_constraints
    }

    /// True when at least one constraint is registered.
    pub fn is_solver_active(&self) -> bool {
        self.active_constraints > 0
    }

    pub fn solver(&self) -> &GlobalSolver<F> {
        &self.solver
    }

    // ---------------------------------------------------------------------
    // Forces
    // ---------------------------------------------------------------------

    pub fn add_force(&mut self, force: Force<F>) -> Result<ForceId, PhysicsError> {
        for id in force.participants() {
            self.check_particle(id)?;
        }
        let id = ForceId(self.forces.len());
        self.forces.push(Some(force));
        Ok(id)
    }

    pub fn add_spring(
        &mut self,
        a: ParticleId,
        b: ParticleId,
        rest_length: F,
        stiffness: F,
        damping: F,
    ) -> Result<ForceId, PhysicsError> {
        self.check_pair(a, b)?;
        check_length(rest_length)?;
        self.add_force(Force::Spring(SpringForce::new(a, b, rest_length, stiffness, damping)))
    }

    /// `rest_angle` is in radians.
    pub fn add_angular_spring(
        &mut self,
        a: ParticleId,
        pivot: ParticleId,
        c: ParticleId,
        rest_angle: F,
        stiffness: F,
        damping: F,
    ) -> Result<ForceId, PhysicsError> {
        self.check_pair(a, pivot)?;
        self.check_pair(pivot, c)?;
        self.check_pair(a, c)?;
        self.add_force(Force::AngularSpring(AngularSpringForce::new(
            a, pivot, c, rest_angle, stiffness, damping,
        )))
    }

    pub fn remove_force(&mut self, id: ForceId) -> Result<Force<F>, PhysicsError> {
        self.forces
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(PhysicsError::UnknownForce(id.0))
    }

    pub fn force_handle(&self, id: ForceId) -> Option<&Force<F>> {
        self.forces.get(id.0).and_then(Option::as_ref)
    }

    pub fn force_count(&self) -> usize {
        self.forces.iter().flatten().count()
    }

    /// Registers a group whose members collide pairwise each sub-step.
    pub fn add_collision_group<I>(&mut self, members: I, restitution: F) -> Result<(), PhysicsError>
    where
        I: IntoIterator<Item = ParticleId>,
    {
        let members: AllocVec<ParticleId> = members.into_iter().collect();
        for &id in &members {
            self.check_particle(id)?;
        }
        self.colliders.push(CollisionForce::new(members, restitution));
        Ok(())
    }

    pub fn set_bounds(&mut self, bounds: Option<BoundsForce<F>>) {
        self.bounds = bounds;
    }

    /// Adds a solid rectangle every free particle bounces off.
    pub fn add_obstacle(&mut self, obstacle: ObstacleForce<F>) -> Result<(), PhysicsError> {
        let corners_ok = obstacle.min.is_finite()
            && obstacle.max.is_finite()
            && obstacle.min.x < obstacle.max.x
            && obstacle.min.y < obstacle.max.y;
        if !corners_ok || !obstacle.margin.is_finite() || obstacle.margin <= F::zero() {
            return Err(PhysicsError::InvalidObstacle);
        }
        self.obstacles.push(obstacle);
        Ok(())
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    // ---------------------------------------------------------------------
    // Stepping
    // ---------------------------------------------------------------------

    /// Advances by `elapsed` seconds of wall-clock time in fixed sub-steps.
    ///
    /// Time accumulates across calls; each call runs every whole
    /// `config.timestep` available, up to `config.sub_steps`. When the cap is
    /// hit the whole remaining backlog is dropped. Returns the number of
    /// sub-steps run.
    pub fn advance<O: StepObserver>(&mut self, elapsed: F, observer: &mut O) -> usize {
        if !elapsed.is_finite() || elapsed <= F::zero() {
            return 0;
        }
        let dt = self.config.timestep;
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= dt && steps < self.config.sub_steps {
            self.step_once(observer);
            self.accumulator -= dt;
            steps += 1;
        }

        if self.accumulator >= dt {
            log::debug!("sub-step cap reached, dropping {}s of backlog", self.accumulator);
            self.accumulator = F::zero();
        }
        steps
    }

    /// Runs exactly one fixed sub-step.
    pub fn step_once<O: StepObserver>(&mut self, observer: &mut O) -> StepReport {
        let ParticleSystem {
            particles,
            forces,
            constraints,
            colliders,
            bounds,
            obstacles,
            solver,
            config,
            ..
        } = self;
        let dt = config.timestep;

        for collider in colliders.iter() {
            collider.resolve(particles, dt);
        }
        if let Some(bounds) = bounds {
            bounds.resolve(particles, dt);
        }
        for obstacle in obstacles.iter() {
            obstacle.resolve(particles, dt);
        }

        let gravity = GravityForce::new(config.gravity);
        let drag = DragForce::new(config.drag);
        let mode = config.mode;
        let mut eval = |particles: &mut [Particle<F>], observer: &mut O| {
            for p in particles.iter_mut() {
                p.clear_force();
            }
            gravity.apply(particles);
            drag.apply(particles);
            for force in forces.iter_mut().flatten() {
                force.apply(particles);
            }
            if mode == SolverMode::Lagrangian {
                let rows = solver.step(particles, constraints.iter().flatten());
                if rows > 0 {
                    observer.on_constraint_solve(rows);
                }
            }
        };

        let report = config
            .integrator
            .step(particles, dt, config.damping, &mut eval, observer);

        if config.mode == SolverMode::Projection {
            for i in 0..config.iterations {
                for c in constraints.iter().flatten() {
                    c.project(particles);
                }
                observer.on_constraint_iteration(i);
            }
        }

        self.time += dt;
        self.report.merge(report);
        observer.on_step_complete();
        report
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Simulated time in seconds.
    pub fn time(&self) -> F {
        self.time
    }

    /// Totals over every sub-step run so far.
    pub fn report(&self) -> StepReport {
        self.report
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle<F>> {
        self.particles.get(id.0)
    }

    pub fn particles(&self) -> &[Particle<F>] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn position(&self, id: ParticleId) -> Option<Vec2<F>> {
        self.particle(id).map(|p| p.pos)
    }

    pub fn velocity(&self, id: ParticleId) -> Option<Vec2<F>> {
        self.particle(id).map(|p| p.vel)
    }

    /// Accumulated force from the last force evaluation at the committed
    /// start state.
    pub fn force(&self, id: ParticleId) -> Option<Vec2<F>> {
        self.particle(id).map(|p| p.force)
    }

    pub fn positions(&self) -> AllocVec<Vec2<F>> {
        self.particles.iter().map(|p| p.pos).collect()
    }

    pub fn kinetic_energy(&self) -> F {
        self.particles
            .iter()
            .fold(F::zero(), |acc, p| acc + p.kinetic_energy())
    }
}

impl<F: Float> Default for ParticleSystem<F> {
    fn default() -> Self {
        ParticleSystem {
            particles: AllocVec::new(),
            forces: AllocVec::new(),
            constraints: AllocVec::new(),
            active_constraints: 0,
            colliders: AllocVec::new(),
            bounds: None,
            obstacles: AllocVec::new(),
            solver: GlobalSolver::from_config(&SolverConfig::default()),
            config: SolverConfig::default(),
            accumulator: F::zero(),
            time: F::zero(),
            report: StepReport::default(),
        }
    }
}

fn check_length<F: Float>(length: F) -> Result<(), PhysicsError> {
    if !length.is_finite() || length < F::zero() {
        return Err(PhysicsError::InvalidLength);
    }
    Ok(())
}
