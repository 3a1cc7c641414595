//! Orchestration Layer
//!
//! This crate owns everything around the SPH core:
//! - JSON scene configuration
//! - STL and container collision geometry
//! - Fluid particle seeding
//! - A background simulation runner with play/pause, render-mode and
//!   parameter-snapshot controls

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod geometry;
pub mod runner;

pub use config::{ColliderConfig, SceneConfig};
pub use runner::{RenderMode, RunnerState, SimulationRunner};

use std::path::Path;

use anyhow::{Context, Result};
use sph::{Bvh, CpuSimulation, UniformWind};

/// Build a ready-to-step simulation from a validated scene.
///
/// Relative STL paths are resolved against `base_dir`.
pub fn build_simulation(config: &SceneConfig, base_dir: &Path) -> Result<CpuSimulation> {
    let params = config.resolved_parameters()?;

    let triangles = geometry::collect_triangles(&config.colliders, base_dir)?;
    tracing::info!("Building BVH over {} triangles", triangles.len());
    let bvh = Bvh::build(triangles).context("invalid collision geometry")?;

    let particles = domain::seed_particles(config)?;

    let mut sim = CpuSimulation::new(params, particles, bvh)
        .context("failed to create simulation")?;
    if let Some(wind) = config.wind {
        sim = sim.with_wind(UniformWind(wind));
    }
    Ok(sim)
}

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the scene
/// 2. Load collision geometry and build the BVH
/// 3. Seed the fluid particles
/// 4. Create the CPU simulation
/// 5. Wrap it in a `SimulationRunner` for lifecycle management
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/tank.json")?;
/// runner.start();
/// // ... read runner.positions(), pause, resume, submit parameters, etc.
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<SimulationRunner> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    let config = SceneConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let sim = build_simulation(&config, config_dir)?;

    let render_mode = if config.render_particles {
        RenderMode::Particles
    } else {
        RenderMode::Hidden
    };
    let runner = SimulationRunner::new(Box::new(sim), render_mode, config.max_steps, config.max_time);

    tracing::info!("Simulation ready to start");
    Ok(runner)
}
