//! Collision response against static triangle geometry.

use glam::Vec3;

use crate::bvh::{Bvh, Intersection};

/// Tangential speeds below this are treated as zero.
const MIN_TANGENTIAL_SPEED: f32 = 1.0e-9;

/// Material and placement constants of a collision response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResponse {
    /// Fraction of the approaching normal velocity that is reflected.
    pub restitution: f32,
    /// Coulomb friction coefficient.
    pub friction: f32,
    /// Distance a particle is placed off the surface after a hit.
    pub clearance: f32,
}

impl CollisionResponse {
    /// Corrected velocity for a hit with unit surface `normal`.
    ///
    /// Static colliders only: the relative velocity is the particle velocity.
    /// Velocities moving away from the surface are returned unchanged.
    pub fn bounce(&self, velocity: Vec3, normal: Vec3) -> Vec3 {
        let approach = normal.dot(velocity);
        if approach >= 0.0 {
            return velocity;
        }

        let normal_velocity = approach * normal;
        let tangential_velocity = velocity - normal_velocity;
        let reflected = -self.restitution * normal_velocity;

        // Friction removes tangential speed in proportion to the normal impulse.
        let delta_normal = (reflected - normal_velocity).length();
        let tangential_speed = tangential_velocity.length();
        let damping = if tangential_speed > MIN_TANGENTIAL_SPEED {
            (1.0 - self.friction * delta_normal / tangential_speed).max(0.0)
        } else {
            0.0
        };

        reflected + damping * tangential_velocity
    }

    /// Position just outside the surface at `hit`.
    #[inline]
    pub fn place(&self, hit: &Intersection) -> Vec3 {
        hit.point + hit.normal * self.clearance
    }

    /// Resolve one particle moving from `position` to `next_position`.
    ///
    /// Returns the corrected `(next_position, next_velocity)` if the segment
    /// crosses the geometry, `None` otherwise.
    pub fn resolve(
        &self,
        bvh: &Bvh,
        position: Vec3,
        next_position: Vec3,
        next_velocity: Vec3,
    ) -> Option<(Vec3, Vec3)> {
        let hit = bvh.get_intersection(position, next_position)?;
        Some((self.place(&hit), self.bounce(next_velocity, hit.normal)))
    }
}
