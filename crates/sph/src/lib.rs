//! SPH fluid core
//!
//! Smoothed Particle Hydrodynamics on a fixed time step, with neighbor search
//! through a wrapping spatial hash and collision against static triangles
//! through a bounding-volume hierarchy.
//!
//! # Modules
//! - [`kernel`] -- poly6 / spiky smoothing kernels.
//! - [`eos`] -- Tait-like equation of state.
//! - [`scan`] -- Blelloch exclusive prefix sum used by the grid build.
//! - [`hash_grid`] -- 8-bucket spatial hash for neighbor queries.
//! - [`geometry`] -- boxes, triangles, segment intersection.
//! - [`bvh`] -- SAH-built triangle BVH with closest-hit segment queries.
//! - [`particle`] -- struct-of-arrays particle storage and lattice seeding.
//! - [`params`] -- validated simulation parameters.
//! - [`forces`] -- external, viscous and pressure force terms.
//! - [`collision`] -- restitution / friction response.
//! - [`wind`] -- ambient air velocity for the drag term.
//! - [`simulation`] -- the parallel CPU solver.
//! - [`output`] -- position frames for a renderer.

#![warn(missing_docs)]

pub mod bvh;
pub mod collision;
pub mod eos;
pub mod error;
pub mod forces;
pub mod geometry;
pub mod hash_grid;
pub mod kernel;
pub mod output;
pub mod params;
pub mod particle;
pub mod scan;
pub mod simulation;
pub mod wind;

pub use bvh::{Bvh, BvhNode, Intersection};
pub use collision::CollisionResponse;
pub use error::{GeometryError, ParameterError, SphError};
pub use geometry::{Aabb, Triangle};
pub use hash_grid::HashGrid;
pub use kernel::SmoothingKernel;
pub use output::{PositionBuffer, PositionFrame, RenderPosition};
pub use params::SimulationParameters;
pub use particle::{LatticeBlock, ParticleSet};
pub use simulation::{CpuSimulation, StepStats};
pub use wind::{StillAir, UniformWind, WindField};

// ---------------------------------------------------------------------------
// SimulationBackend trait
// ---------------------------------------------------------------------------

/// Aggregate error metrics for a simulation snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorMetrics {
    /// Maximum relative density deviation from rest density in the last step.
    pub max_density_variation: f32,
    /// Relative drift of kinetic plus potential energy since construction
    /// (`|E - E0| / |E0|`, absolute when `E0` is zero).
    pub energy_drift: f32,
}

/// Interface every execution backend implements.
///
/// A backend owns the particle state and advances it through the phases
/// documented in [`simulation`]:
///
/// 1. Parameter snapshot, grid rebuild, density
/// 2. Pressure, external, viscous and pressure forces
/// 3. Semi-implicit Euler integration
/// 4. Collision resolution
/// 5. Commit
/// 6. Emit positions
pub trait SimulationBackend: Send {
    /// Run one full step, including publishing positions.
    fn step(&mut self);

    /// Run one step without publishing positions.
    fn advance(&mut self);

    /// Current particle state.
    fn particles(&self) -> &ParticleSet;

    /// Parameters in effect.
    fn parameters(&self) -> &SimulationParameters;

    /// Validate a parameter snapshot and queue it for the next step.
    fn apply_parameters(&mut self, params: SimulationParameters) -> Result<(), ParameterError>;

    /// Handle to the published position frames.
    fn output(&self) -> PositionBuffer;

    /// Simulated time (s).
    fn time(&self) -> f64;

    /// Current error metrics.
    fn error_metrics(&self) -> ErrorMetrics;

    /// Number of particles.
    fn particle_count(&self) -> usize {
        self.particles().len()
    }

    /// Save the particle state for a later rollback.
    /// Returns true if checkpointing is supported.
    fn save_checkpoint(&mut self) -> bool {
        false
    }

    /// Restore the last saved checkpoint, undoing any steps since.
    /// Returns true if a checkpoint was restored.
    fn restore_checkpoint(&mut self) -> bool {
        false
    }
}
