//! Parallel CPU solver.
//!
//! One call to [`CpuSimulation::step`] runs the phases below in order. Each
//! phase is a rayon parallel loop in which iteration `i` writes only particle
//! `i`; a phase returns only after every iteration has finished, which is the
//! barrier between phases.
//!
//! 1. [`begin_step`](CpuSimulation::begin_step): apply a pending parameter
//!    snapshot, rebuild the hash grid, sum densities.
//! 2. [`accumulate_forces`](CpuSimulation::accumulate_forces): EOS pressure,
//!    then external, viscous and pressure forces.
//! 3. [`time_integration`](CpuSimulation::time_integration): semi-implicit Euler
//!    into the tentative state.
//! 4. [`resolve_collisions`](CpuSimulation::resolve_collisions): correct the
//!    tentative state against the BVH.
//! 5. [`end_step`](CpuSimulation::end_step): record statistics, commit, reset
//!    per-step accumulators.
//! 6. [`emit`](CpuSimulation::emit): publish positions.

use glam::Vec3;
use rayon::prelude::*;

use crate::bvh::Bvh;
use crate::collision::CollisionResponse;
use crate::eos::pressure_from_eos;
use crate::error::{ParameterError, SphError};
use crate::forces::{external_force, pressure_force, viscosity_force, DENSITY_EPSILON};
use crate::hash_grid::HashGrid;
use crate::kernel::SmoothingKernel;
use crate::output::PositionBuffer;
use crate::params::SimulationParameters;
use crate::particle::ParticleSet;
use crate::wind::{StillAir, WindField};
use crate::{ErrorMetrics, SimulationBackend};

/// Courant number for the sound-speed time-step bound.
const CFL_NUMBER: f32 = 0.4;

/// Safety factor for the force time-step bound.
const FORCE_STEP_FACTOR: f32 = 0.25;

/// Aggregate statistics of the last completed step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    /// Smallest particle density.
    pub min_density: f32,
    /// Largest particle density.
    pub max_density: f32,
    /// Mean particle density.
    pub mean_density: f32,
    /// Largest `|rho - rho0| / rho0`.
    pub max_density_variation: f32,
    /// Largest accumulated force magnitude.
    pub max_force: f32,
    /// Largest committed speed.
    pub max_speed: f32,
    /// Particles whose motion was corrected by a collision.
    pub collisions: usize,
}

/// Saved solver state for rollback.
#[derive(Debug, Clone)]
struct Checkpoint {
    particles: ParticleSet,
    time: f64,
    step_count: u64,
    collisions: usize,
    last_stats: StepStats,
}

/// Reference CPU implementation of the solver.
pub struct CpuSimulation {
    params: SimulationParameters,
    /// Snapshot submitted by `apply_parameters`, installed at the next `begin_step`.
    pending: Option<SimulationParameters>,
    kernel: SmoothingKernel,
    eos_scale: f32,
    particles: ParticleSet,
    grid: HashGrid,
    bvh: Bvh,
    wind: Box<dyn WindField>,
    output: PositionBuffer,
    time: f64,
    step_count: u64,
    collisions: usize,
    last_stats: StepStats,
    initial_energy: f64,
    checkpoint: Option<Checkpoint>,
}

impl std::fmt::Debug for CpuSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSimulation")
            .field("particles", &self.particles.len())
            .field("triangles", &self.bvh.triangles().len())
            .field("time", &self.time)
            .field("step_count", &self.step_count)
            .finish_non_exhaustive()
    }
}

impl CpuSimulation {
    /// Create a solver over `particles` colliding with `bvh`, in still air.
    pub fn new(
        params: SimulationParameters,
        particles: ParticleSet,
        bvh: Bvh,
    ) -> Result<Self, SphError> {
        params.validate()?;
        let kernel = SmoothingKernel::new(params.kernel_radius());
        let grid = HashGrid::new(kernel.radius(), params.grid_resolution);
        let initial_energy = total_energy(&particles, params.mass, params.gravity);

        tracing::info!(
            "CPU simulation created: {} particles, {} collision triangles, h = {:.4}, dt = {}",
            particles.len(),
            bvh.triangles().len(),
            kernel.radius(),
            params.time_step
        );

        let sim = Self {
            eos_scale: params.eos_scale(),
            params,
            pending: None,
            kernel,
            particles,
            grid,
            bvh,
            wind: Box::new(StillAir),
            output: PositionBuffer::new(),
            time: 0.0,
            step_count: 0,
            collisions: 0,
            last_stats: StepStats::default(),
            initial_energy,
            checkpoint: None,
        };
        sim.check_time_step();
        Ok(sim)
    }

    /// Replace the wind field used by the drag term.
    pub fn with_wind(mut self, wind: impl WindField + 'static) -> Self {
        self.wind = Box::new(wind);
        self
    }

    /// Publish positions into `output` instead of a private buffer.
    pub fn with_output(mut self, output: PositionBuffer) -> Self {
        self.output = output;
        self
    }

    /// Parameters in effect for the current step.
    pub fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    /// Snapshot waiting for the next step boundary, if any.
    pub fn pending_parameters(&self) -> Option<&SimulationParameters> {
        self.pending.as_ref()
    }

    /// Particle state.
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Collision geometry.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Handle to the published position frames.
    pub fn output(&self) -> &PositionBuffer {
        &self.output
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Completed steps.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Statistics of the last completed step.
    pub fn last_stats(&self) -> StepStats {
        self.last_stats
    }

    /// Validate `params` now and install it at the start of the next step.
    ///
    /// A later call before that step replaces the earlier snapshot.
    pub fn apply_parameters(&mut self, params: SimulationParameters) -> Result<(), ParameterError> {
        params.validate()?;
        tracing::debug!("parameter snapshot queued for step {}", self.step_count + 1);
        self.pending = Some(params);
        Ok(())
    }

    fn install_pending(&mut self) {
        let Some(next) = self.pending.take() else {
            return;
        };
        let radius_changed = next.kernel_radius() != self.params.kernel_radius();
        let resolution_changed = next.grid_resolution != self.params.grid_resolution;

        self.kernel = SmoothingKernel::new(next.kernel_radius());
        self.eos_scale = next.eos_scale();
        if radius_changed || resolution_changed {
            self.grid.resize(self.kernel.radius(), next.grid_resolution);
        }
        self.params = next;

        tracing::debug!(
            "parameters applied at step {} (h = {:.4}, dt = {})",
            self.step_count,
            self.kernel.radius(),
            self.params.time_step
        );
        self.check_time_step();
    }

    fn check_time_step(&self) {
        let suggested = self.suggested_time_step();
        if self.params.time_step > suggested {
            tracing::warn!(
                "time step {} exceeds the suggested stable step {:.6}",
                self.params.time_step,
                suggested
            );
        }
    }

    /// Largest stable time step for the current state.
    ///
    /// Minimum of a sound-speed CFL bound `0.4 h / (c + v_max)` and, once a
    /// step has run, a force bound `0.25 sqrt(h m / F_max)`.
    pub fn suggested_time_step(&self) -> f32 {
        let h = self.kernel.radius();
        let v_max = self
            .particles
            .velocity
            .par_iter()
            .map(|v| v.length())
            .reduce(|| 0.0, f32::max);
        let cfl = CFL_NUMBER * h / (self.params.sound_speed + v_max);

        let f_max = self.last_stats.max_force;
        if f_max > 0.0 {
            cfl.min(FORCE_STEP_FACTOR * (h * self.params.mass / f_max).sqrt())
        } else {
            cfl
        }
    }

    /// Phase 1: install pending parameters, rebuild the grid, sum densities.
    pub fn begin_step(&mut self) {
        self.install_pending();
        self.grid.rebuild(&self.particles.position);

        let grid = &self.grid;
        let kernel = self.kernel;
        let mass = self.params.mass;
        let self_weight = kernel.value(0.0);
        let ParticleSet { position, density, .. } = &mut self.particles;
        let position: &[Vec3] = position;

        density.par_iter_mut().enumerate().for_each(|(i, rho)| {
            let xi = position[i];
            let mut weight = self_weight;
            grid.for_each_neighbor(position, i, |j| {
                weight += kernel.value(xi.distance(position[j]));
            });
            *rho = (mass * weight).max(DENSITY_EPSILON);
        });
    }

    /// Phase 2: pressure from the EOS, then all forces.
    pub fn accumulate_forces(&mut self) {
        let params = &self.params;
        let eos_scale = self.eos_scale;
        let ParticleSet {
            position,
            velocity,
            force,
            density,
            pressure,
            ..
        } = &mut self.particles;

        pressure
            .par_iter_mut()
            .zip(density.par_iter())
            .for_each(|(p, &rho)| {
                *p = pressure_from_eos(
                    rho,
                    params.target_density,
                    eos_scale,
                    params.eos_exponent,
                    params.negative_pressure_scale,
                );
            });

        let grid = &self.grid;
        let kernel = &self.kernel;
        let wind = self.wind.as_ref();
        let position: &[Vec3] = position;
        let velocity: &[Vec3] = velocity;
        let density: &[f32] = density;
        let pressure: &[f32] = pressure;
        let mass = params.mass;

        force.par_iter_mut().enumerate().for_each(|(i, f)| {
            let xi = position[i];
            let vi = velocity[i];
            let mut total = external_force(
                mass,
                params.gravity,
                params.drag_coefficient,
                vi,
                wind.velocity_at(xi),
            );

            grid.for_each_neighbor(position, i, |j| {
                let offset = position[j] - xi;
                let r = offset.length();
                total += viscosity_force(
                    kernel,
                    params.viscosity_coefficient,
                    mass,
                    r,
                    vi,
                    velocity[j],
                    density[j],
                );
                total += pressure_force(
                    kernel,
                    mass,
                    r,
                    offset.normalize_or_zero(),
                    pressure[i],
                    density[i],
                    pressure[j],
                    density[j],
                );
            });

            *f += total;
        });
    }

    /// Phase 3: `v' = v + dt f / m`, `x' = x + dt v'`.
    pub fn time_integration(&mut self) {
        let dt = self.params.time_step;
        let inv_mass = 1.0 / self.params.mass;
        let ParticleSet {
            position,
            velocity,
            force,
            next_position,
            next_velocity,
            ..
        } = &mut self.particles;

        (
            next_position.par_iter_mut(),
            next_velocity.par_iter_mut(),
            position.par_iter(),
            velocity.par_iter(),
            force.par_iter(),
        )
            .into_par_iter()
            .for_each(|(nx, nv, &x, &v, &f)| {
                *nv = v + dt * f * inv_mass;
                *nx = x + dt * *nv;
            });
    }

    /// Phase 4: push tentative states that cross geometry back outside it.
    pub fn resolve_collisions(&mut self) {
        if self.bvh.is_empty() {
            self.collisions = 0;
            return;
        }
        let bvh = &self.bvh;
        let response = CollisionResponse {
            restitution: self.params.restitution,
            friction: self.params.friction,
            clearance: self.params.collision_clearance * self.params.particle_radius,
        };
        let ParticleSet {
            position,
            next_position,
            next_velocity,
            ..
        } = &mut self.particles;

        self.collisions = (position.par_iter(), next_position.par_iter_mut(), next_velocity.par_iter_mut())
            .into_par_iter()
            .map(|(&x, nx, nv)| match response.resolve(bvh, x, *nx, *nv) {
                Some((corrected_x, corrected_v)) => {
                    *nx = corrected_x;
                    *nv = corrected_v;
                    1
                }
                None => 0,
            })
            .sum();
    }

    /// Phase 5: commit the tentative state and zero the accumulators.
    pub fn end_step(&mut self) {
        self.last_stats = self.collect_stats();

        let p = &mut self.particles;
        p.position.copy_from_slice(&p.next_position);
        p.velocity.copy_from_slice(&p.next_velocity);
        p.force.fill(Vec3::ZERO);
        p.density.fill(0.0);
        p.pressure.fill(0.0);

        self.time += self.params.time_step as f64;
        self.step_count += 1;

        let s = &self.last_stats;
        tracing::debug!(
            "step {}: rho [{:.2}, {:.2}] mean {:.2}, max |F| {:.4}, max |v| {:.4}, {} collisions",
            self.step_count,
            s.min_density,
            s.max_density,
            s.mean_density,
            s.max_force,
            s.max_speed,
            s.collisions
        );
    }

    /// Phase 6: publish committed positions.
    pub fn emit(&self) {
        self.output.publish(&self.particles.position);
    }

    /// Phases 1 to 5 without publishing.
    pub fn advance(&mut self) {
        self.begin_step();
        self.accumulate_forces();
        self.time_integration();
        self.resolve_collisions();
        self.end_step();
    }

    /// One full step, including [`emit`](Self::emit).
    pub fn step(&mut self) {
        self.advance();
        self.emit();
    }

    fn collect_stats(&self) -> StepStats {
        let p = &self.particles;
        if p.is_empty() {
            return StepStats {
                collisions: self.collisions,
                ..StepStats::default()
            };
        }
        let rho0 = self.params.target_density;
        let (min_density, max_density, sum, max_variation) = p
            .density
            .par_iter()
            .map(|&rho| (rho, rho, rho as f64, (rho - rho0).abs() / rho0))
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY, 0.0, 0.0),
                |a, b| (a.0.min(b.0), a.1.max(b.1), a.2 + b.2, a.3.max(b.3)),
            );
        let max_force = p.force.par_iter().map(|f| f.length()).reduce(|| 0.0, f32::max);
        let max_speed = p
            .next_velocity
            .par_iter()
            .map(|v| v.length())
            .reduce(|| 0.0, f32::max);

        StepStats {
            min_density,
            max_density,
            mean_density: (sum / p.len() as f64) as f32,
            max_density_variation: max_variation,
            max_force,
            max_speed,
            collisions: self.collisions,
        }
    }
}

/// Kinetic plus gravitational potential energy.
fn total_energy(particles: &ParticleSet, mass: f32, gravity: Vec3) -> f64 {
    let m = mass as f64;
    particles
        .position
        .par_iter()
        .zip(particles.velocity.par_iter())
        .map(|(x, v)| 0.5 * m * v.length_squared() as f64 - m * gravity.dot(*x) as f64)
        .sum()
}

impl SimulationBackend for CpuSimulation {
    fn step(&mut self) {
        CpuSimulation::step(self);
    }

    fn advance(&mut self) {
        CpuSimulation::advance(self);
    }

    fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    fn apply_parameters(&mut self, params: SimulationParameters) -> Result<(), ParameterError> {
        CpuSimulation::apply_parameters(self, params)
    }

    fn output(&self) -> PositionBuffer {
        self.output.clone()
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn error_metrics(&self) -> ErrorMetrics {
        let current = total_energy(&self.particles, self.params.mass, self.params.gravity);
        let drift = if self.initial_energy.abs() > 1.0e-12 {
            ((current - self.initial_energy) / self.initial_energy).abs()
        } else {
            (current - self.initial_energy).abs()
        };
        ErrorMetrics {
            max_density_variation: self.last_stats.max_density_variation,
            energy_drift: drift as f32,
        }
    }

    fn save_checkpoint(&mut self) -> bool {
        self.checkpoint = Some(Checkpoint {
            particles: self.particles.clone(),
            time: self.time,
            step_count: self.step_count,
            collisions: self.collisions,
            last_stats: self.last_stats,
        });
        true
    }

    fn restore_checkpoint(&mut self) -> bool {
        match self.checkpoint.take() {
            Some(cp) => {
                self.particles = cp.particles;
                self.time = cp.time;
                self.step_count = cp.step_count;
                self.collisions = cp.collisions;
                self.last_stats = cp.last_stats;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(separation: f32) -> CpuSimulation {
        let params = SimulationParameters {
            gravity: Vec3::ZERO,
            drag_coefficient: 0.0,
            ..Default::default()
        };
        let particles = ParticleSet::from_positions(vec![
            Vec3::splat(1.0),
            Vec3::splat(1.0) + Vec3::new(separation, 0.0, 0.0),
        ]);
        CpuSimulation::new(params, particles, Bvh::default()).unwrap()
    }

    #[test]
    fn invalid_parameters_rejected_at_construction() {
        let params = SimulationParameters { mass: -1.0, ..Default::default() };
        let err = CpuSimulation::new(params, ParticleSet::default(), Bvh::default()).unwrap_err();
        assert!(matches!(err, SphError::Parameter(ParameterError::NonPositive { name: "mass", .. })));
    }

    #[test]
    fn isolated_particle_density_is_self_weight() {
        let mut sim = pair(10.0);
        sim.begin_step();
        let expected = sim.params.mass * sim.kernel.value(0.0);
        for &rho in sim.particles().densities() {
            assert!((rho - expected).abs() / expected < 1.0e-6);
        }
    }

    #[test]
    fn close_pair_forces_are_opposite() {
        let mut sim = pair(0.05);
        // Low rest density so the pair is compressed.
        sim.params.target_density = 100.0;
        sim.eos_scale = sim.params.eos_scale();
        sim.begin_step();
        sim.accumulate_forces();
        let f = sim.particles().forces();
        assert!(f[0].x < 0.0 && f[1].x > 0.0, "forces: {f:?}");
        assert!((f[0] + f[1]).length() < 1.0e-4 * f[0].length());
    }

    #[test]
    fn end_step_resets_accumulators() {
        let mut sim = pair(0.05);
        sim.advance();
        let p = sim.particles();
        assert!(p.forces().iter().all(|f| *f == Vec3::ZERO));
        assert!(p.densities().iter().all(|d| *d == 0.0));
        assert!(p.pressures().iter().all(|d| *d == 0.0));
        assert_eq!(p.next_positions(), p.positions());
        assert_eq!(sim.step_count(), 1);
        assert!(sim.last_stats().max_density > 0.0);
    }

    #[test]
    fn parameters_apply_at_next_step_boundary() {
        let mut sim = pair(10.0);
        let heavier = SimulationParameters { mass: 3.0, ..sim.parameters().clone() };
        sim.apply_parameters(heavier).unwrap();
        assert_eq!(sim.parameters().mass, 1.0);
        assert!(sim.pending_parameters().is_some());

        sim.begin_step();
        assert_eq!(sim.parameters().mass, 3.0);
        assert!(sim.pending_parameters().is_none());
    }

    #[test]
    fn invalid_snapshot_rejected_and_not_queued() {
        let mut sim = pair(10.0);
        let bad = SimulationParameters { particle_radius: 0.0, ..Default::default() };
        assert!(sim.apply_parameters(bad).is_err());
        assert!(sim.pending_parameters().is_none());
    }

    #[test]
    fn changed_radius_resizes_grid() {
        let mut sim = pair(0.3);
        let wider = SimulationParameters {
            particle_radius: 0.1,
            ..sim.parameters().clone()
        };
        sim.apply_parameters(wider).unwrap();
        sim.begin_step();
        assert!((sim.grid.search_radius() - 0.4).abs() < 1.0e-6);
        // 0.3 apart is now inside the support radius.
        let self_only = sim.params.mass * sim.kernel.value(0.0);
        assert!(sim.particles().densities()[0] > self_only);
    }

    #[test]
    fn emit_publishes_committed_positions() {
        let mut sim = pair(10.0);
        let output = sim.output().clone();
        sim.step();
        assert_eq!(output.generation(), 1);
        assert_eq!(output.positions(), sim.particles().positions());
    }

    #[test]
    fn checkpoint_round_trip() {
        let mut sim = pair(0.05);
        assert!(!sim.restore_checkpoint());
        assert!(sim.save_checkpoint());
        let before = sim.particles().positions().to_vec();
        sim.advance();
        sim.advance();
        assert!(sim.restore_checkpoint());
        assert_eq!(sim.particles().positions(), &before[..]);
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn restore_rolls_back_step_statistics() {
        let particles = ParticleSet::from_positions(vec![Vec3::splat(1.0), Vec3::splat(1.05)]);
        let mut sim =
            CpuSimulation::new(SimulationParameters::default(), particles, Bvh::default()).unwrap();
        sim.advance();
        let stats = sim.last_stats();
        let suggested = sim.suggested_time_step();
        let metrics = sim.error_metrics();
        assert!(sim.save_checkpoint());

        for _ in 0..5 {
            sim.advance();
        }
        assert_ne!(sim.last_stats(), stats);

        assert!(sim.restore_checkpoint());
        assert_eq!(sim.last_stats(), stats);
        assert_eq!(sim.suggested_time_step(), suggested);
        assert_eq!(sim.error_metrics(), metrics);
        assert_eq!(sim.step_count(), 1);
    }

    #[test]
    fn suggested_step_obeys_cfl() {
        let sim = pair(10.0);
        let expected = CFL_NUMBER * sim.kernel.radius() / sim.params.sound_speed;
        assert!((sim.suggested_time_step() - expected).abs() < 1.0e-7);
    }

    #[test]
    fn wind_drags_particles_along() {
        let params = SimulationParameters {
            gravity: Vec3::ZERO,
            drag_coefficient: 1.0,
            ..Default::default()
        };
        let particles = ParticleSet::from_positions(vec![Vec3::ZERO]);
        let mut sim = CpuSimulation::new(params, particles, Bvh::default())
            .unwrap()
            .with_wind(crate::wind::UniformWind(Vec3::new(2.0, 0.0, 0.0)));
        sim.advance();
        assert!(sim.particles().velocities()[0].x > 0.0);
    }
}
