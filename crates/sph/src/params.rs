//! Simulation parameters.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::eos;
use crate::error::ParameterError;
use crate::hash_grid::MAX_GRID_BUCKETS;
use crate::kernel::SmoothingKernel;

/// Physical and numerical parameters of a run.
///
/// A value of this type is a snapshot: the solver never mutates it during a
/// step. New snapshots are submitted through
/// [`CpuSimulation::apply_parameters`](crate::CpuSimulation::apply_parameters)
/// and take effect at the start of the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Mass of every particle (kg).
    #[serde(default = "default_mass")]
    pub mass: f32,
    /// Particle radius (m); also the collision clearance unit.
    #[serde(default = "default_particle_radius")]
    pub particle_radius: f32,
    /// Kernel support radius as a multiple of `particle_radius`.
    #[serde(default = "default_kernel_radius_factor")]
    pub kernel_radius_factor: f32,
    /// Rest density rho0 (kg/m^3).
    #[serde(default = "default_target_density")]
    pub target_density: f32,
    /// Numerical speed of sound (m/s).
    #[serde(default = "default_sound_speed")]
    pub sound_speed: f32,
    /// Tait exponent gamma.
    #[serde(default = "default_eos_exponent")]
    pub eos_exponent: f32,
    /// Linear drag against the surrounding air (kg/s).
    #[serde(default = "default_drag_coefficient")]
    pub drag_coefficient: f32,
    /// Viscosity strength.
    #[serde(default = "default_viscosity_coefficient")]
    pub viscosity_coefficient: f32,
    /// Fraction of normal velocity kept (and reversed) on collision, in [0, 1].
    #[serde(default = "default_restitution")]
    pub restitution: f32,
    /// Coulomb friction coefficient for collisions.
    #[serde(default = "default_friction")]
    pub friction: f32,
    /// Fixed time step (s).
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    /// Gravitational acceleration (m/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    /// Multiplier for negative EOS pressure; 0 clamps pressure to `>= 0`.
    #[serde(default)]
    pub negative_pressure_scale: f32,
    /// Distance a collided particle is placed off the surface, in particle radii.
    #[serde(default = "default_collision_clearance")]
    pub collision_clearance: f32,
    /// Hash-grid bucket resolution per axis.
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: [u32; 3],
}

// Default values
fn default_mass() -> f32 {
    1.0
}

fn default_particle_radius() -> f32 {
    0.05
}

fn default_kernel_radius_factor() -> f32 {
    4.0
}

fn default_target_density() -> f32 {
    eos::WATER_REST_DENSITY
}

fn default_sound_speed() -> f32 {
    10.0
}

fn default_eos_exponent() -> f32 {
    eos::WATER_GAMMA
}

fn default_drag_coefficient() -> f32 {
    0.01
}

fn default_viscosity_coefficient() -> f32 {
    0.1
}

fn default_restitution() -> f32 {
    0.3
}

fn default_friction() -> f32 {
    0.2
}

fn default_time_step() -> f32 {
    0.005
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.8, 0.0)
}

fn default_collision_clearance() -> f32 {
    0.5
}

fn default_grid_resolution() -> [u32; 3] {
    [64; 3]
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            mass: default_mass(),
            particle_radius: default_particle_radius(),
            kernel_radius_factor: default_kernel_radius_factor(),
            target_density: default_target_density(),
            sound_speed: default_sound_speed(),
            eos_exponent: default_eos_exponent(),
            drag_coefficient: default_drag_coefficient(),
            viscosity_coefficient: default_viscosity_coefficient(),
            restitution: default_restitution(),
            friction: default_friction(),
            time_step: default_time_step(),
            gravity: default_gravity(),
            negative_pressure_scale: 0.0,
            collision_clearance: default_collision_clearance(),
            grid_resolution: default_grid_resolution(),
        }
    }
}

impl SimulationParameters {
    /// Parameters for a lattice of the given spacing.
    ///
    /// The particle radius becomes half the spacing, and the mass is chosen so
    /// that a particle inside an infinite lattice at `spacing` sums to exactly
    /// `target_density`. Other fields are taken from `base`.
    pub fn for_spacing(spacing: f32, base: SimulationParameters) -> Result<Self, ParameterError> {
        check_positive("spacing", spacing)?;
        let mut params = SimulationParameters {
            particle_radius: 0.5 * spacing,
            ..base
        };
        check_positive("kernel_radius_factor", params.kernel_radius_factor)?;
        check_positive("target_density", params.target_density)?;

        let kernel = SmoothingKernel::new(params.kernel_radius());
        let reach = (kernel.radius() / spacing).ceil() as i32;
        let mut weight = 0.0_f64;
        for k in -reach..=reach {
            for j in -reach..=reach {
                for i in -reach..=reach {
                    let r = Vec3::new(i as f32, j as f32, k as f32).length() * spacing;
                    weight += kernel.value(r) as f64;
                }
            }
        }
        params.mass = (params.target_density as f64 / weight) as f32;
        params.validate()?;
        Ok(params)
    }

    /// Kernel support radius `particle_radius * kernel_radius_factor`.
    pub fn kernel_radius(&self) -> f32 {
        self.particle_radius * self.kernel_radius_factor
    }

    /// EOS stiffness `rho0 * c^2 / gamma`.
    pub fn eos_scale(&self) -> f32 {
        eos::eos_scale(self.target_density, self.sound_speed, self.eos_exponent)
    }

    /// Check every field. Called whenever a snapshot is handed to the solver.
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_positive("mass", self.mass)?;
        check_positive("particle_radius", self.particle_radius)?;
        check_positive("kernel_radius_factor", self.kernel_radius_factor)?;
        check_positive("target_density", self.target_density)?;
        check_positive("sound_speed", self.sound_speed)?;
        check_positive("eos_exponent", self.eos_exponent)?;
        check_positive("time_step", self.time_step)?;

        check_non_negative("drag_coefficient", self.drag_coefficient)?;
        check_non_negative("viscosity_coefficient", self.viscosity_coefficient)?;
        check_non_negative("friction", self.friction)?;
        check_non_negative("negative_pressure_scale", self.negative_pressure_scale)?;
        check_non_negative("collision_clearance", self.collision_clearance)?;

        if !self.restitution.is_finite() {
            return Err(ParameterError::NotFinite { name: "restitution" });
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(ParameterError::OutOfRange {
                name: "restitution",
                value: self.restitution,
                min: 0.0,
                max: 1.0,
            });
        }

        if !self.gravity.is_finite() {
            return Err(ParameterError::NotFinite { name: "gravity" });
        }

        if self.grid_resolution.contains(&0) {
            return Err(ParameterError::ZeroGridResolution {
                resolution: self.grid_resolution,
            });
        }
        let buckets: u64 = self.grid_resolution.iter().map(|&r| r as u64).product();
        if buckets > MAX_GRID_BUCKETS {
            return Err(ParameterError::GridTooLarge {
                resolution: self.grid_resolution,
                max_buckets: MAX_GRID_BUCKETS,
            });
        }

        Ok(())
    }
}

fn check_positive(name: &'static str, value: f32) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite { name });
    }
    if value <= 0.0 {
        return Err(ParameterError::NonPositive { name, value });
    }
    Ok(())
}

fn check_non_negative(name: &'static str, value: f32) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite { name });
    }
    if value < 0.0 {
        return Err(ParameterError::Negative { name, value });
    }
    Ok(())
}
