//! Equation of state for weakly-compressible SPH.
//!
//! A Tait-like stiff EOS turns the density deviation from rest into pressure.

/// Rest density of liquid water (kg/m^3).
pub const WATER_REST_DENSITY: f32 = 1000.0;

/// Tait exponent (gamma) for water, the standard WCSPH value.
pub const WATER_GAMMA: f32 = 7.0;

/// EOS stiffness `B = rho0 * c_s^2 / gamma`.
pub fn eos_scale(target_density: f32, sound_speed: f32, eos_exponent: f32) -> f32 {
    target_density * sound_speed * sound_speed / eos_exponent
}

/// Pressure from density.
///
/// ```text
/// P = B * ((rho / rho0)^gamma - 1) / gamma
/// ```
///
/// Negative pressure (tension) is multiplied by `negative_pressure_scale`;
/// a scale of zero clamps the result to `>= 0`.
pub fn pressure_from_eos(
    density: f32,
    target_density: f32,
    eos_scale: f32,
    eos_exponent: f32,
    negative_pressure_scale: f32,
) -> f32 {
    let p = eos_scale * ((density / target_density).powf(eos_exponent) - 1.0) / eos_exponent;
    if p < 0.0 {
        p * negative_pressure_scale
    } else {
        p
    }
}
