//! Ambient air velocity used by the drag term.

use glam::Vec3;

/// Velocity of the surrounding air at a point.
///
/// Drag pulls particle velocity towards this field. Implementations are
/// queried from many threads at once.
pub trait WindField: Send + Sync {
    /// Air velocity at `position`.
    fn velocity_at(&self, position: Vec3) -> Vec3;
}

/// No wind anywhere. The default field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StillAir;

impl WindField for StillAir {
    #[inline]
    fn velocity_at(&self, _position: Vec3) -> Vec3 {
        Vec3::ZERO
    }
}

/// Spatially constant wind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformWind(pub Vec3);

impl WindField for UniformWind {
    #[inline]
    fn velocity_at(&self, _position: Vec3) -> Vec3 {
        self.0
    }
}

impl<F> WindField for F
where
    F: Fn(Vec3) -> Vec3 + Send + Sync,
{
    fn velocity_at(&self, position: Vec3) -> Vec3 {
        self(position)
    }
}
