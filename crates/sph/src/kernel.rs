//! SPH smoothing kernels.
//!
//! Density uses the poly6 kernel (Müller et al. 2003); pressure and viscosity
//! use the derivatives of the spiky kernel, whose gradient does not vanish as
//! two particles approach each other.

use std::f32::consts::PI;

use glam::Vec3;

/// Smoothing kernel with a fixed support radius `h`.
///
/// Powers of `h` are precomputed once; every evaluation is a pure function of
/// the (non-negative) distance `r` and returns zero for `r >= h`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingKernel {
    h: f32,
    h2: f32,
    h3: f32,
    h4: f32,
    h5: f32,
}

impl SmoothingKernel {
    /// Create a kernel with support radius `h` (must be positive).
    pub fn new(h: f32) -> Self {
        debug_assert!(h > 0.0, "kernel support radius must be positive");
        let h2 = h * h;
        let h3 = h2 * h;
        let h4 = h2 * h2;
        let h5 = h3 * h2;
        Self { h, h2, h3, h4, h5 }
    }

    /// Support radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.h
    }

    /// Poly6 kernel value.
    ///
    /// ```text
    /// W(r) = 315 / (64 pi h^3) * (1 - r^2/h^2)^3    for r < h
    /// ```
    #[inline]
    pub fn value(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let x = 1.0 - r * r / self.h2;
        315.0 / (64.0 * PI * self.h3) * x * x * x
    }

    /// Spiky kernel value, `15 / (pi h^3) * (1 - r/h)^3`.
    #[inline]
    pub fn spiky_value(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let x = 1.0 - r / self.h;
        15.0 / (PI * self.h3) * x * x * x
    }

    /// First derivative of the spiky kernel, `-45 / (pi h^4) * (1 - r/h)^2`.
    #[inline]
    pub fn first_derivative(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let x = 1.0 - r / self.h;
        -45.0 / (PI * self.h4) * x * x
    }

    /// Second derivative of the spiky kernel, `90 / (pi h^5) * (1 - r/h)`.
    #[inline]
    pub fn second_derivative(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let x = 1.0 - r / self.h;
        90.0 / (PI * self.h5) * x
    }

    /// Spiky gradient at distance `r`, given the unit direction from the
    /// evaluation point towards the kernel center.
    #[inline]
    pub fn gradient(&self, r: f32, direction_to_center: Vec3) -> Vec3 {
        -self.first_derivative(r) * direction_to_center
    }
}
