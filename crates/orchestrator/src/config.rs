//! Scene configuration parsing and validation

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use sph::{LatticeBlock, SimulationParameters};

/// Complete description of a scene: fluid, colliders and solver parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Human-readable scene name
    pub name: String,
    /// Solver parameters (fields missing from the file take their defaults)
    #[serde(default)]
    pub parameters: SimulationParameters,
    /// When set, particle radius and mass are derived from this lattice
    /// spacing so that the seeded fluid starts at rest density
    #[serde(default)]
    pub particle_spacing: Option<f32>,
    /// Blocks of fluid seeded on regular lattices
    pub fluid: Vec<LatticeBlock>,
    /// Initial velocity of every seeded particle (m/s)
    #[serde(default)]
    pub initial_velocity: Vec3,
    /// Static collision geometry
    #[serde(default)]
    pub colliders: Vec<ColliderConfig>,
    /// Uniform wind velocity for the drag term (still air when absent)
    #[serde(default)]
    pub wind: Option<Vec3>,
    /// Whether particle positions are published each step
    #[serde(default = "default_render_particles")]
    pub render_particles: bool,
    /// Stop after this many steps
    #[serde(default)]
    pub max_steps: Option<u64>,
    /// Stop after this much simulated time (seconds)
    #[serde(default)]
    pub max_time: Option<f64>,
}

/// One source of collision triangles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ColliderConfig {
    /// Triangles from an STL file, resolved relative to the scene file
    Stl {
        /// Path to the STL file
        path: String,
        /// Offset added to every vertex
        #[serde(default)]
        translation: Vec3,
        /// Uniform scale applied before the offset
        #[serde(default = "default_scale")]
        scale: f32,
    },
    /// Closed box whose faces point inward, keeping particles inside
    Container {
        /// Minimum corner
        min: Vec3,
        /// Maximum corner
        max: Vec3,
    },
}

fn default_render_particles() -> bool {
    true
}

fn default_scale() -> f32 {
    1.0
}

impl SceneConfig {
    /// Load a scene from a JSON file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scene file {}", path.display()))?;
        let config: SceneConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse scene JSON {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parameters the solver starts with, after spacing calibration
    pub fn resolved_parameters(&self) -> Result<SimulationParameters> {
        let params = match self.particle_spacing {
            Some(spacing) => SimulationParameters::for_spacing(spacing, self.parameters.clone())
                .context("invalid parameters for particle spacing")?,
            None => self.parameters.clone(),
        };
        params.validate().context("invalid simulation parameters")?;
        Ok(params)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.fluid.is_empty(), "scene must contain at least one fluid block");
        for (i, block) in self.fluid.iter().enumerate() {
            let count = block
                .particle_count()
                .with_context(|| format!("fluid block {i}"))?;
            ensure!(count > 0, "fluid block {i} contains no particles");
        }

        ensure!(
            self.initial_velocity.is_finite(),
            "initial velocity must be finite"
        );
        if let Some(wind) = self.wind {
            ensure!(wind.is_finite(), "wind velocity must be finite");
        }

        for (i, collider) in self.colliders.iter().enumerate() {
            match collider {
                ColliderConfig::Stl { path, translation, scale } => {
                    ensure!(!path.is_empty(), "collider {i}: STL path is empty");
                    ensure!(translation.is_finite(), "collider {i}: translation must be finite");
                    ensure!(
                        scale.is_finite() && *scale > 0.0,
                        "collider {i}: scale must be positive"
                    );
                }
                ColliderConfig::Container { min, max } => {
                    ensure!(
                        min.is_finite() && max.is_finite(),
                        "collider {i}: container bounds must be finite"
                    );
                    ensure!(
                        min.cmplt(*max).all(),
                        "collider {i}: container min must be below max on every axis"
                    );
                }
            }
        }

        if let Some(max_steps) = self.max_steps {
            ensure!(max_steps > 0, "max_steps must be at least 1");
        }
        if let Some(max_time) = self.max_time {
            ensure!(max_time > 0.0, "max_time must be positive");
        }

        self.resolved_parameters()?;
        Ok(())
    }
}
