//! Closed-form references for single-particle motion.
//!
//! A lone particle has no neighbors, so the solver reduces to gravity, linear
//! drag and collisions. These solutions let the scenarios check the
//! integrator and collision response quantitatively.
//!
//! Two flavors are provided where they differ: the continuous solution of the
//! ODE, and the exact sequence produced by semi-implicit Euler
//!
//! ```text
//! v[n+1] = v[n] + dt * a(v[n])
//! x[n+1] = x[n] + dt * v[n+1]
//! ```

use glam::DVec3;

/// Uniform gravitational acceleration without drag.
pub struct FreeFall {
    /// Initial position (m)
    pub position: DVec3,
    /// Initial velocity (m/s)
    pub velocity: DVec3,
    /// Gravitational acceleration (m/s^2)
    pub gravity: DVec3,
}

impl FreeFall {
    /// Continuous solution `x0 + v0 t + g t^2 / 2`.
    pub fn position_at(&self, t: f64) -> DVec3 {
        self.position + self.velocity * t + 0.5 * self.gravity * t * t
    }

    /// Continuous velocity `v0 + g t`.
    pub fn velocity_at(&self, t: f64) -> DVec3 {
        self.velocity + self.gravity * t
    }

    /// Position after `n` semi-implicit Euler steps of size `dt`.
    ///
    /// ```text
    /// x[n] = x0 + n dt v0 + dt^2 g n (n + 1) / 2
    /// ```
    pub fn position_after_steps(&self, n: u64, dt: f64) -> DVec3 {
        let n = n as f64;
        self.position + self.velocity * (n * dt) + self.gravity * (dt * dt * n * (n + 1.0) * 0.5)
    }

    /// Velocity after `n` steps; identical to the continuous solution.
    pub fn velocity_after_steps(&self, n: u64, dt: f64) -> DVec3 {
        self.velocity_at(n as f64 * dt)
    }
}

/// Gravity with linear drag towards a uniform wind.
///
/// ```text
/// m dv/dt = m g - k (v - w)
/// ```
///
/// The velocity relaxes towards the terminal velocity `w + m g / k` with
/// time constant `m / k`.
pub struct LinearDrag {
    /// Particle mass (kg)
    pub mass: f64,
    /// Drag coefficient k (kg/s)
    pub drag: f64,
    /// Gravitational acceleration (m/s^2)
    pub gravity: DVec3,
    /// Wind velocity (m/s)
    pub wind: DVec3,
    /// Initial velocity (m/s)
    pub velocity: DVec3,
}

impl LinearDrag {
    /// Velocity approached as `t -> inf`.
    pub fn terminal_velocity(&self) -> DVec3 {
        self.wind + self.gravity * (self.mass / self.drag)
    }

    /// Relaxation time `m / k` (s).
    pub fn time_constant(&self) -> f64 {
        self.mass / self.drag
    }

    /// Continuous velocity `v_inf + (v0 - v_inf) exp(-t k / m)`.
    pub fn velocity_at(&self, t: f64) -> DVec3 {
        let v_inf = self.terminal_velocity();
        v_inf + (self.velocity - v_inf) * (-t / self.time_constant()).exp()
    }

    /// Velocity after `n` semi-implicit Euler steps of size `dt`.
    ///
    /// Each step multiplies the deviation from terminal velocity by
    /// `1 - k dt / m`.
    pub fn velocity_after_steps(&self, n: u64, dt: f64) -> DVec3 {
        let v_inf = self.terminal_velocity();
        let factor = 1.0 - dt / self.time_constant();
        v_inf + (self.velocity - v_inf) * factor.powi(n as i32)
    }
}

/// Apex height above the floor after one bounce off a flat floor.
///
/// A particle released at rest from `drop_height` hits the floor with speed
/// `sqrt(2 g h)`, leaves with `e` times that, and climbs `e^2 h` above the
/// point it leaves from. `offset` is the height at which the particle is
/// placed after contact.
pub fn rebound_height(drop_height: f64, restitution: f64, offset: f64) -> f64 {
    offset + restitution * restitution * drop_height
}

/// Time of flight from release to floor contact from rest.
pub fn fall_time(height: f64, gravity: f64) -> f64 {
    (2.0 * height / gravity.abs()).sqrt()
}
