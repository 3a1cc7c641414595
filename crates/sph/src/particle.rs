//! Particle ensemble using struct-of-arrays layout.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SphError;

/// Tolerance subtracted before rounding lattice counts up, so that an extent
/// that is an exact multiple of the spacing does not gain an extra layer from
/// floating-point noise.
const LATTICE_TOLERANCE: f32 = 1.0e-5;

/// Axis-aligned block of particles on a regular lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeBlock {
    /// Lower corner; the first particle sits here.
    pub min: Vec3,
    /// Upper corner (exclusive).
    pub max: Vec3,
    /// Distance between neighbouring particles.
    pub spacing: f32,
}

impl LatticeBlock {
    /// Block spanning `min..max` at `spacing`.
    pub fn new(min: Vec3, max: Vec3, spacing: f32) -> Self {
        Self { min, max, spacing }
    }

    /// Particles per axis: `ceil((max - min) / spacing)`.
    pub fn counts(&self) -> Result<[usize; 3], SphError> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(SphError::InvalidLattice(format!(
                "spacing must be positive, got {}",
                self.spacing
            )));
        }
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err(SphError::InvalidLattice("non-finite bounds".to_string()));
        }
        let extent = self.max - self.min;
        if extent.cmplt(Vec3::ZERO).any() {
            return Err(SphError::InvalidLattice(format!(
                "max {} is below min {}",
                self.max, self.min
            )));
        }
        let per_axis = |e: f32| ((e / self.spacing - LATTICE_TOLERANCE).ceil().max(0.0)) as usize;
        Ok([per_axis(extent.x), per_axis(extent.y), per_axis(extent.z)])
    }

    /// Total particle count of the block.
    pub fn particle_count(&self) -> Result<usize, SphError> {
        Ok(self.counts()?.iter().product())
    }

    /// Lattice positions, x fastest, then y, then z.
    pub fn positions(&self) -> Result<Vec<Vec3>, SphError> {
        let [nx, ny, nz] = self.counts()?;
        let mut out = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    out.push(self.min + Vec3::new(i as f32, j as f32, k as f32) * self.spacing);
                }
            }
        }
        Ok(out)
    }
}

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel and have the same length for the lifetime of the
/// set. `force`, `density` and `pressure` are zero between steps; the `next_*`
/// arrays hold the tentative state while a step is in flight.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    pub(crate) position: Vec<Vec3>,
    pub(crate) velocity: Vec<Vec3>,
    pub(crate) force: Vec<Vec3>,
    pub(crate) next_position: Vec<Vec3>,
    pub(crate) next_velocity: Vec<Vec3>,
    pub(crate) density: Vec<f32>,
    pub(crate) pressure: Vec<f32>,
}

impl ParticleSet {
    /// Particles at rest at the given positions.
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let velocities = vec![Vec3::ZERO; positions.len()];
        Self::build(positions, velocities)
    }

    /// Particles with explicit initial velocities.
    pub fn from_state(positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Result<Self, SphError> {
        if positions.len() != velocities.len() {
            return Err(SphError::ParticleCountMismatch {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        Ok(Self::build(positions, velocities))
    }

    /// Particles at rest on one lattice block.
    pub fn lattice(block: &LatticeBlock) -> Result<Self, SphError> {
        Ok(Self::from_positions(block.positions()?))
    }

    fn build(position: Vec<Vec3>, velocity: Vec<Vec3>) -> Self {
        let n = position.len();
        Self {
            next_position: position.clone(),
            next_velocity: velocity.clone(),
            position,
            velocity,
            force: vec![Vec3::ZERO; n],
            density: vec![0.0; n],
            pressure: vec![0.0; n],
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Committed positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.position
    }

    /// Committed velocities.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocity
    }

    /// Accumulated forces (zero between steps).
    pub fn forces(&self) -> &[Vec3] {
        &self.force
    }

    /// Tentative positions of the step in flight.
    pub fn next_positions(&self) -> &[Vec3] {
        &self.next_position
    }

    /// Tentative velocities of the step in flight.
    pub fn next_velocities(&self) -> &[Vec3] {
        &self.next_velocity
    }

    /// Densities (zero between steps).
    pub fn densities(&self) -> &[f32] {
        &self.density
    }

    /// Pressures (zero between steps).
    pub fn pressures(&self) -> &[f32] {
        &self.pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set() {
        let set = ParticleSet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn from_positions_starts_at_rest() {
        let set = ParticleSet::from_positions(vec![Vec3::ONE, Vec3::X]);
        assert_eq!(set.len(), 2);
        assert!(set.velocities().iter().all(|v| *v == Vec3::ZERO));
        assert!(set.densities().iter().all(|d| *d == 0.0));
        assert_eq!(set.next_positions(), set.positions());
    }

    #[test]
    fn mismatched_state_rejected() {
        let err = ParticleSet::from_state(vec![Vec3::ZERO; 3], vec![Vec3::ZERO; 2]).unwrap_err();
        assert!(matches!(
            err,
            SphError::ParticleCountMismatch { positions: 3, velocities: 2 }
        ));
    }

    #[test]
    fn lattice_count_uses_ceiling() {
        let block = LatticeBlock::new(Vec3::ZERO, Vec3::new(0.25, 0.2, 0.1), 0.1);
        assert_eq!(block.counts().unwrap(), [3, 2, 1]);
        assert_eq!(block.particle_count().unwrap(), 6);
    }

    #[test]
    fn exact_multiple_does_not_gain_a_layer() {
        let block = LatticeBlock::new(Vec3::splat(-0.3), Vec3::splat(0.3), 0.1);
        assert_eq!(block.counts().unwrap(), [6, 6, 6]);
    }

    #[test]
    fn lattice_positions_are_x_major() {
        let block = LatticeBlock::new(Vec3::ZERO, Vec3::splat(0.2), 0.1);
        let set = ParticleSet::lattice(&block).unwrap();
        assert_eq!(set.len(), 8);
        assert!((set.positions()[1] - Vec3::new(0.1, 0.0, 0.0)).length() < 1.0e-6);
        assert!((set.positions()[2] - Vec3::new(0.0, 0.1, 0.0)).length() < 1.0e-6);
        assert!((set.positions()[4] - Vec3::new(0.0, 0.0, 0.1)).length() < 1.0e-6);
    }

    #[test]
    fn invalid_lattices_rejected() {
        let zero = LatticeBlock::new(Vec3::ZERO, Vec3::ONE, 0.0);
        assert!(matches!(zero.counts(), Err(SphError::InvalidLattice(_))));
        let inverted = LatticeBlock::new(Vec3::ONE, Vec3::ZERO, 0.1);
        assert!(matches!(inverted.counts(), Err(SphError::InvalidLattice(_))));
    }

    #[test]
    fn empty_extent_gives_no_particles() {
        let flat = LatticeBlock::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), 0.1);
        assert_eq!(flat.particle_count().unwrap(), 0);
    }
}
