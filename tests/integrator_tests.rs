use approx::assert_relative_eq;
use tether::{
    Integrator, NoOpStepObserver, Particle, ParticleId, ParticleSystem, SolverConfig,
    StepObserver, Vec2,
};

const G: f64 = 9.81;

#[derive(Default)]
struct Recorder {
    evaluations: Vec<usize>,
    rejected: Vec<ParticleId>,
    steps: usize,
}

impl StepObserver for Recorder {
    fn on_force_evaluation(&mut self, stage: usize) {
        self.evaluations.push(stage);
    }

    fn on_rejected_update(&mut self, particle: ParticleId) {
        self.rejected.push(particle);
    }

    fn on_step_complete(&mut self) {
        self.steps += 1;
    }
}

fn gravity(particles: &mut [Particle<f64>], _: &mut impl StepObserver) {
    for p in particles.iter_mut() {
        p.clear_force();
        let weight = Vec2::new(0.0, G * p.mass);
        p.apply_force(weight);
    }
}

/// Free-fall drop error at `t = 1` for a given integrator and step size.
fn free_fall_error(integrator: Integrator, dt: f64) -> f64 {
    let config = SolverConfig::new()
        .with_integrator(integrator)
        .with_gravity(Vec2::new(0.0, G))
        .with_timestep(dt);
    let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
    let id = system.add_particle(Vec2::new(0.0, 10.0), 2.0).unwrap();

    let steps = (1.0 / dt).round() as usize;
    for _ in 0..steps {
        system.step_once(&mut NoOpStepObserver);
    }
    let t = steps as f64 * dt;
    let expected = 10.0 + 0.5 * G * t * t;
    (system.position(id).unwrap().y - expected).abs()
}

#[test]
fn euler_free_fall_error_is_first_order() {
    let coarse = free_fall_error(Integrator::Euler, 0.01);
    let fine = free_fall_error(Integrator::Euler, 0.005);

    assert!(coarse > 1e-3, "coarse error = {}", coarse);
    let ratio = coarse / fine;
    assert!((ratio - 2.0).abs() < 0.1, "ratio = {}", ratio);
}

#[test]
fn rk4_free_fall_is_exact() {
    for dt in [0.01, 0.005] {
        let error = free_fall_error(Integrator::Rk4, dt);
        assert!(error < 1e-9, "dt = {}, error = {}", dt, error);
    }
}

#[test]
fn midpoint_free_fall_is_exact() {
    let error = free_fall_error(Integrator::Midpoint, 0.01);
    assert!(error < 1e-9, "error = {}", error);
}

#[test]
fn verlet_free_fall_is_close() {
    let error = free_fall_error(Integrator::Verlet, 0.01);
    assert!(error < 0.1, "error = {}", error);
}

#[test]
fn evaluation_counts_per_scheme() {
    let cases = [
        (Integrator::Euler, 1),
        (Integrator::PredictorEuler, 1),
        (Integrator::Verlet, 1),
        (Integrator::Midpoint, 2),
        (Integrator::Rk4, 4),
    ];
    for (integrator, expected) in cases {
        let mut particles = vec![Particle::new(Vec2::new(0.0, 0.0), 1.0)];
        let mut recorder = Recorder::default();
        let report = integrator.step(&mut particles, 0.01, 1.0, &mut gravity, &mut recorder);

        assert_eq!(integrator.evaluations(), expected, "{}", integrator.name());
        assert_eq!(report.evaluations, expected);
        assert_eq!(recorder.evaluations, (0..expected).collect::<Vec<_>>());
    }
}

#[test]
fn midpoint_commits_from_start_state() {
    let mut particles = vec![Particle::new(Vec2::new(1.0, 2.0), 1.0)];
    particles[0].vel = Vec2::new(3.0, 0.0);
    let dt = 0.1;
    let mut seen = Vec::new();
    let mut eval = |ps: &mut [Particle<f64>], o: &mut NoOpStepObserver| {
        seen.push(ps[0].pos);
        gravity(ps, o);
    };
    Integrator::Midpoint.step(&mut particles, dt, 1.0, &mut eval, &mut NoOpStepObserver);

    // The second evaluation saw the half-step trial state.
    assert_relative_eq!(seen[1].x, 1.15, epsilon = 1e-12);
    assert_relative_eq!(seen[1].y, 2.0, epsilon = 1e-12);

    let p = &particles[0];
    assert_relative_eq!(p.pos.x, 1.3, epsilon = 1e-12);
    assert_relative_eq!(p.pos.y, 2.0 + 0.5 * G * dt * dt, epsilon = 1e-12);
    assert_relative_eq!(p.vel.y, G * dt, epsilon = 1e-12);
    assert_eq!(p.prev_pos, Vec2::new(1.0, 2.0));
}

#[test]
fn predictor_euler_samples_predicted_position() {
    let mut particles = vec![Particle::new(Vec2::new(1.0, 0.0), 1.0)];
    particles[0].vel = Vec2::new(1.0, 0.0);
    let mut spring_to_origin = |ps: &mut [Particle<f64>], _: &mut NoOpStepObserver| {
        for p in ps.iter_mut() {
            p.clear_force();
            let pull = p.pos.scale(-1.0);
            p.apply_force(pull);
        }
    };
    Integrator::PredictorEuler.step(
        &mut particles,
        0.1,
        1.0,
        &mut spring_to_origin,
        &mut NoOpStepObserver,
    );

    let p = &particles[0];
    assert_relative_eq!(p.pos.x, 1.1, epsilon = 1e-12);
    assert_relative_eq!(p.vel.x, 0.89, epsilon = 1e-12);
}

#[test]
fn verlet_uses_position_history() {
    let mut particles = vec![Particle::new(Vec2::new(0.0, 0.0), 1.0)];
    particles[0].prev_pos = Vec2::new(-0.5, 0.0);
    // Velocity is ignored by the position update.
    particles[0].vel = Vec2::new(100.0, 0.0);
    let mut no_forces = |ps: &mut [Particle<f64>], _: &mut NoOpStepObserver| {
        for p in ps.iter_mut() {
            p.clear_force();
        }
    };
    Integrator::Verlet.step(&mut particles, 0.5, 1.0, &mut no_forces, &mut NoOpStepObserver);

    let p = &particles[0];
    assert_eq!(p.pos, Vec2::new(0.5, 0.0));
    assert_eq!(p.prev_pos, Vec2::new(0.0, 0.0));
    assert_relative_eq!(p.vel.x, 1.0, epsilon = 1e-12);
}

#[test]
fn non_finite_update_is_rejected() {
    for integrator in [
        Integrator::Euler,
        Integrator::PredictorEuler,
        Integrator::Verlet,
        Integrator::Midpoint,
        Integrator::Rk4,
    ] {
        let mut particles = vec![
            Particle::new(Vec2::new(0.0, 0.0), 1.0),
            Particle::new(Vec2::new(5.0, 5.0), 1.0),
        ];
        let mut poisoned = |ps: &mut [Particle<f64>], o: &mut Recorder| {
            gravity(ps, o);
            ps[1].force = Vec2::new(f64::NAN, 0.0);
        };
        let mut recorder = Recorder::default();
        let report = integrator.step(&mut particles, 0.01, 1.0, &mut poisoned, &mut recorder);

        assert_eq!(report.rejected, 1, "{}", integrator.name());
        assert_eq!(recorder.rejected, vec![ParticleId(1)]);
        assert_eq!(particles[1].pos, Vec2::new(5.0, 5.0));
        assert_eq!(particles[1].vel, Vec2::zero());
        assert!(particles[0].vel.y > 0.0, "{}", integrator.name());
        assert!(particles[0].pos.is_finite());
    }
}

#[test]
fn fixed_particle_is_bit_identical() {
    for integrator in [
        Integrator::Euler,
        Integrator::PredictorEuler,
        Integrator::Verlet,
        Integrator::Midpoint,
        Integrator::Rk4,
    ] {
        let config = SolverConfig::new()
            .with_integrator(integrator)
            .with_gravity(Vec2::new(0.0, G))
            .with_drag(0.1);
        let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
        let anchor = system.add_fixed_particle(Vec2::new(0.125, -3.75));
        let a = system.add_particle(Vec2::new(1.0, -3.0), 1.0).unwrap();
        let b = system.add_particle(Vec2::new(2.0, -2.0), 2.0).unwrap();
        system.add_rod(anchor, a, 1.0).unwrap();
        system.add_spring(anchor, b, 2.0, 30.0, 0.5).unwrap();
        system.add_angular_spring(a, anchor, b, 1.0, 10.0, 0.1).unwrap();

        let before = *system.particle(anchor).unwrap();
        let mut recorder = Recorder::default();
        for _ in 0..500 {
            system.step_once(&mut recorder);
        }
        let after = system.particle(anchor).unwrap();

        assert_eq!(before.pos.x.to_bits(), after.pos.x.to_bits());
        assert_eq!(before.pos.y.to_bits(), after.pos.y.to_bits());
        assert_eq!(before.vel.x.to_bits(), after.vel.x.to_bits());
        assert_eq!(before.vel.y.to_bits(), after.vel.y.to_bits());
        assert_eq!(after.force, Vec2::zero());
        assert_eq!(recorder.steps, 500);
        assert_ne!(system.position(a).unwrap(), Vec2::new(1.0, -3.0));
    }
}

#[test]
fn damping_scales_committed_velocity() {
    let mut particles = vec![Particle::new(Vec2::new(0.0, 0.0), 1.0)];
    Integrator::Euler.step(&mut particles, 0.1, 0.5, &mut gravity, &mut NoOpStepObserver);

    assert_relative_eq!(particles[0].vel.y, 0.5 * G * 0.1, epsilon = 1e-12);
}

#[test]
fn damping_slows_verlet() {
    let drop = |damping: f64| {
        let mut particles = vec![Particle::new(Vec2::new(0.0, 0.0), 1.0)];
        for _ in 0..2 {
            let mut observer = NoOpStepObserver;
            Integrator::Verlet.step(&mut particles, 0.1, damping, &mut gravity, &mut observer);
        }
        particles[0].pos.y
    };

    // Two steps from rest: g·dt² then g·dt²·(1 + damping) + g·dt².
    assert_relative_eq!(drop(1.0), 0.04 * G, epsilon = 1e-12);
    assert_relative_eq!(drop(0.5), 0.025 * G, epsilon = 1e-12);
}

#[test]
fn damped_fall_is_slower_for_every_integrator() {
    for integrator in [
        Integrator::Euler,
        Integrator::PredictorEuler,
        Integrator::Verlet,
        Integrator::Midpoint,
        Integrator::Rk4,
    ] {
        let config = SolverConfig::new()
            .with_integrator(integrator)
            .with_gravity(Vec2::new(0.0, 10.0))
            .with_timestep(0.01)
            .with_damping(0.9);
        let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
        let id = system.add_particle(Vec2::zero(), 1.0).unwrap();
        for _ in 0..100 {
            system.step_once(&mut NoOpStepObserver);
        }

        // Undamped free fall covers 5.0 in one second.
        let y = system.position(id).unwrap().y;
        assert!(y > 0.0 && y < 1.0, "{}: y = {}", integrator.name(), y);
    }
}

#[test]
fn set_velocity_moves_particle_under_every_integrator() {
    for integrator in [
        Integrator::Euler,
        Integrator::PredictorEuler,
        Integrator::Verlet,
        Integrator::Midpoint,
        Integrator::Rk4,
    ] {
        let config = SolverConfig::new()
            .with_integrator(integrator)
            .with_gravity(Vec2::zero())
            .with_timestep(1.0 / 480.0);
        let mut system: ParticleSystem<f64> = ParticleSystem::new(config).unwrap();
        let id = system.add_particle(Vec2::zero(), 1.0).unwrap();
        system.set_velocity(id, Vec2::new(10.0, 0.0)).unwrap();

        for _ in 0..48 {
            system.step_once(&mut NoOpStepObserver);
        }

        let p = system.particle(id).unwrap();
        assert_relative_eq!(p.pos.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.vel.x, 10.0, epsilon = 1e-9);
    }
}
