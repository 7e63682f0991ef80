use tether::{
    ConstraintId, ForceId, Integrator, NoOpStepObserver, ParticleId, ParticleSystem,
    PhysicsError, SolverConfig, SolverMode, StepObserver, Vec2,
};

#[derive(Default)]
struct Counter {
    solves: usize,
    iterations: usize,
    steps: usize,
}

impl StepObserver for Counter {
    fn on_constraint_solve(&mut self, _constraints: usize) {
        self.solves += 1;
    }

    fn on_constraint_iteration(&mut self, _iteration: usize) {
        self.iterations += 1;
    }

    fn on_step_complete(&mut self) {
        self.steps += 1;
    }
}

/// A fixed anchor with four particles hanging below it at unit spacing.
fn chain() -> (ParticleSystem<f64>, Vec<ParticleId>) {
    let config = SolverConfig::new().with_gravity(Vec2::new(0.0, 9.81));
    let mut system = ParticleSystem::new(config).unwrap();
    let mut ids = vec![system.add_fixed_particle(Vec2::new(0.0, 0.0))];
    for i in 1..5 {
        ids.push(system.add_particle(Vec2::new(0.0, i as f64), 1.0).unwrap());
    }
    (system, ids)
}

#[test]
fn removing_all_constraints_deactivates_solver() {
    let (mut system, ids) = chain();
    let handles: Vec<ConstraintId> = ids
        .windows(2)
        .map(|w| system.add_rod(w[0], w[1], 1.0).unwrap())
        .collect();
    assert!(system.is_solver_active());
    assert_eq!(system.constraint_count(), 4);

    let mut counter = Counter::default();
    system.step_once(&mut counter);
    assert_eq!(counter.solves, 1);
    assert!(system.solver().corrective_forces().iter().any(|q| q.length() > 0.0));

    for handle in handles {
        system.remove_constraint(handle).unwrap();
    }
    assert!(!system.is_solver_active());
    assert_eq!(system.constraint_count(), 0);

    let mut counter = Counter::default();
    system.step_once(&mut counter);
    assert_eq!(counter.solves, 0);
    for q in system.solver().corrective_forces() {
        assert_eq!(*q, Vec2::zero());
    }
    // Only gravity acts now.
    assert_eq!(system.force(ids[2]).unwrap(), Vec2::new(0.0, 9.81));
}

#[test]
fn removal_keeps_other_handles_valid() {
    let (mut system, ids) = chain();
    let first = system.add_rod(ids[0], ids[1], 1.0).unwrap();
    let second = system.add_unit_rod(ids[1], ids[2], 1.0).unwrap();
    let third = system.add_circular_wire(ids[3], Vec2::new(0.0, 2.0), 1.0).unwrap();

    system.remove_constraint(second).unwrap();
    assert!(system.constraint(first).is_some());
    assert!(system.constraint(second).is_none());
    assert_eq!(system.constraint(third).unwrap().particles(), &[ids[3]]);

    // Handles are never reused.
    let fourth = system.add_rod(ids[2], ids[3], 1.0).unwrap();
    assert_ne!(fourth, second);
    assert_eq!(system.constraint_count(), 3);

    assert_eq!(
        system.remove_constraint(second).unwrap_err(),
        PhysicsError::UnknownConstraint(second.0)
    );
}

#[test]
fn force_handles_are_stable() {
    let (mut system, ids) = chain();
    let a = system.add_spring(ids[1], ids[2], 1.0, 10.0, 0.1).unwrap();
    let b = system.add_spring(ids[2], ids[3], 1.0, 10.0, 0.1).unwrap();
    system.remove_force(a).unwrap();

    assert!(system.force_handle(a).is_none());
    assert!(system.force_handle(b).is_some());
    assert_eq!(system.force_count(), 1);
    assert_eq!(system.remove_force(ForceId(42)).unwrap_err(), PhysicsError::UnknownForce(42));
}

#[test]
fn registration_rejects_bad_input() {
    let (mut system, ids) = chain();

    assert_eq!(
        system.add_particle(Vec2::zero(), 0.0).unwrap_err(),
        PhysicsError::InvalidMass
    );
    assert_eq!(
        system.add_particle(Vec2::zero(), f64::NAN).unwrap_err(),
        PhysicsError::InvalidMass
    );
    assert_eq!(
        system.add_rod(ids[0], ParticleId(99), 1.0).unwrap_err(),
        PhysicsError::ParticleOutOfBounds { index: 99, count: 5 }
    );
    assert_eq!(
        system.add_rod(ids[1], ids[1], 1.0).unwrap_err(),
        PhysicsError::DegenerateConstraint(1)
    );
    assert_eq!(
        system.add_unit_rod(ids[1], ids[2], -1.0).unwrap_err(),
        PhysicsError::InvalidLength
    );
    assert_eq!(
        system.add_circular_wire(ids[1], Vec2::zero(), 0.0).unwrap_err(),
        PhysicsError::InvalidRadius
    );
    assert_eq!(
        system.set_radius(ids[1], -2.0).unwrap_err(),
        PhysicsError::InvalidRadius
    );
    assert_eq!(
        system.add_spring(ids[1], ParticleId(7), 1.0, 1.0, 0.0).unwrap_err(),
        PhysicsError::ParticleOutOfBounds { index: 7, count: 5 }
    );
    assert!(system.add_collision_group([ids[1], ParticleId(12)], 1.0).is_err());

    // Nothing was registered by the failed calls.
    assert_eq!(system.particle_count(), 5);
    assert_eq!(system.constraint_count(), 0);
    assert_eq!(system.force_count(), 0);

    let bad = SolverConfig::new().with_timestep(0.0);
    assert_eq!(
        ParticleSystem::<f64>::new(bad).err(),
        Some(PhysicsError::InvalidTimestep)
    );
}

#[test]
fn advance_accumulates_partial_frames() {
    let config = SolverConfig::new().with_timestep(0.01).with_sub_steps(10);
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    system.add_particle(Vec2::zero(), 1.0).unwrap();
    let mut observer = NoOpStepObserver;

    assert_eq!(system.advance(0.025, &mut observer), 2);
    assert_eq!(system.advance(0.0075, &mut observer), 1);
    assert_eq!(system.advance(0.0, &mut observer), 0);
    assert_eq!(system.advance(f64::NAN, &mut observer), 0);
    assert!((system.time() - 0.03).abs() < 1e-12);
}

#[test]
fn advance_caps_sub_steps_and_drops_backlog() {
    let config = SolverConfig::new().with_timestep(0.01).with_sub_steps(4);
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    system.add_particle(Vec2::zero(), 1.0).unwrap();
    let mut counter = Counter::default();

    assert_eq!(system.advance(1.0, &mut counter), 4);
    assert_eq!(counter.steps, 4);
    // The dropped backlog does not come back on the next frame.
    assert_eq!(system.advance(0.0105, &mut counter), 1);
}

#[test]
fn projection_mode_runs_configured_passes() {
    let config = SolverConfig::new()
        .with_mode(SolverMode::Projection)
        .with_iterations(3)
        .with_gravity(Vec2::new(0.0, 9.81));
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    let anchor = system.add_fixed_particle(Vec2::zero());
    let bob = system.add_particle(Vec2::new(2.0, 0.0), 1.0).unwrap();
    system.add_rod(anchor, bob, 2.0).unwrap();

    let mut counter = Counter::default();
    for _ in 0..100 {
        system.step_once(&mut counter);
    }

    assert_eq!(counter.iterations, 300);
    assert_eq!(counter.solves, 0);
    let dist = system.position(bob).unwrap().length();
    assert!((dist - 2.0).abs() < 1e-9, "distance = {}", dist);
    assert!(system.position(bob).unwrap().y > 0.0);
}

#[test]
fn fixing_and_releasing_a_particle() {
    let config = SolverConfig::new()
        .with_gravity(Vec2::new(0.0, 10.0))
        .with_integrator(Integrator::Euler);
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    let id = system.add_particle(Vec2::zero(), 1.0).unwrap();
    system.set_fixed(id, true).unwrap();

    let mut observer = NoOpStepObserver;
    for _ in 0..10 {
        system.step_once(&mut observer);
    }
    assert_eq!(system.position(id).unwrap(), Vec2::zero());

    system.set_fixed(id, false).unwrap();
    for _ in 0..10 {
        system.step_once(&mut observer);
    }
    assert!(system.position(id).unwrap().y > 0.0);
    assert!(system.velocity(id).unwrap().y > 0.0);
}

#[test]
fn pendulum_state_queries_line_up() {
    let config = SolverConfig::new()
        .with_gravity(Vec2::new(0.0, 9.81))
        .with_integrator(Integrator::Midpoint);
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    let anchor = system.add_fixed_particle(Vec2::new(0.0, 0.0));
    let bob = system.add_particle(Vec2::new(1.0, 0.0), 1.0).unwrap();
    system.add_rod(anchor, bob, 1.0).unwrap();

    let mut observer = NoOpStepObserver;
    for _ in 0..60 {
        system.advance(1.0 / 60.0, &mut observer);
    }

    let positions = system.positions();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[1], system.position(bob).unwrap());
    assert!((positions[1].length() - 1.0).abs() < 1e-2);
    assert!(system.kinetic_energy() > 0.0);
    assert_eq!(system.report().rejected, 0);
    assert!(system.report().evaluations > 0);
}
