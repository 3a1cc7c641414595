//! Per-particle and pairwise force terms.
//!
//! Pure functions of their inputs; the solver sums them over neighbor sets.

use glam::Vec3;

use crate::kernel::SmoothingKernel;

/// Smallest density used as a divisor.
pub const DENSITY_EPSILON: f32 = 1.0e-6;

/// Gravity plus linear drag relative to the wind.
///
/// ```text
/// F = m g - k_d (v - v_wind)
/// ```
#[inline]
pub fn external_force(mass: f32, gravity: Vec3, drag: f32, velocity: Vec3, wind: Vec3) -> Vec3 {
    mass * gravity - drag * (velocity - wind)
}

/// Viscous force on particle `i` from neighbor `j`.
///
/// ```text
/// F = mu m^2 (v_j - v_i) W''(r) / rho_j
/// ```
#[inline]
pub fn viscosity_force(
    kernel: &SmoothingKernel,
    coefficient: f32,
    mass: f32,
    r: f32,
    velocity_i: Vec3,
    velocity_j: Vec3,
    density_j: f32,
) -> Vec3 {
    coefficient * mass * mass * (velocity_j - velocity_i) * kernel.second_derivative(r)
        / density_j.max(DENSITY_EPSILON)
}

/// Symmetric pressure force on particle `i` from neighbor `j`.
///
/// ```text
/// F = -m^2 (p_i / rho_i^2 + p_j / rho_j^2) grad W(r)
/// ```
///
/// `direction` is the unit vector from `i` towards `j`. Swapping `i` and `j`
/// negates the result exactly.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn pressure_force(
    kernel: &SmoothingKernel,
    mass: f32,
    r: f32,
    direction: Vec3,
    pressure_i: f32,
    density_i: f32,
    pressure_j: f32,
    density_j: f32,
) -> Vec3 {
    let rho_i = density_i.max(DENSITY_EPSILON);
    let rho_j = density_j.max(DENSITY_EPSILON);
    let term = pressure_i / (rho_i * rho_i) + pressure_j / (rho_j * rho_j);
    -mass * mass * term * kernel.gradient(r, direction)
}
