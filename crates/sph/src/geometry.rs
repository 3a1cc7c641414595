//! Collision geometry primitives: axis-aligned boxes and triangles.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Determinant magnitude below which a segment counts as parallel to a triangle.
pub const PARALLEL_EPSILON: f32 = 1.0e-10;

/// Smallest accepted segment parameter. Hits at `t <= SEGMENT_EPSILON` are
/// rejected so a particle resting on a surface does not re-hit it at its start.
pub const SEGMENT_EPSILON: f32 = 1.0e-6;

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    /// Lower corner.
    pub lower: Vec3,
    /// Upper corner.
    pub upper: Vec3,
}

impl Aabb {
    /// The empty box: growing it by any point yields that point.
    pub const EMPTY: Self = Self {
        lower: Vec3::splat(f32::INFINITY),
        upper: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Box spanning two corners.
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// `true` when no point has been added.
    pub fn is_empty(&self) -> bool {
        self.lower.cmpgt(self.upper).any()
    }

    /// Smallest box containing `self` and `point`.
    pub fn grow(&self, point: Vec3) -> Self {
        Self::new(self.lower.min(point), self.upper.max(point))
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    /// Edge lengths (zero for the empty box).
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.upper - self.lower
        }
    }

    /// Total surface area (zero for the empty box).
    pub fn surface_area(&self) -> f32 {
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Index of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }

    /// Slab test for the segment `origin + t * delta`, `t` in `[0, t_max]`.
    ///
    /// Returns the entry parameter if the segment touches the box.
    pub fn segment_entry(&self, origin: Vec3, delta: Vec3, t_max: f32) -> Option<f32> {
        let mut t0 = 0.0_f32;
        let mut t1 = t_max;
        for axis in 0..3 {
            let o = origin[axis];
            let d = delta[axis];
            let lo = self.lower[axis];
            let hi = self.upper[axis];
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut near = (lo - o) * inv;
            let mut far = (hi - o) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Barycentric hit of a segment against a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Segment parameter in `(SEGMENT_EPSILON, 1)`.
    pub t: f32,
    /// Barycentric weight of vertex 1.
    pub u: f32,
    /// Barycentric weight of vertex 2.
    pub v: f32,
}

/// World-space triangle with per-vertex normals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// Corner positions.
    pub vertices: [Vec3; 3],
    /// Per-vertex normals.
    pub normals: [Vec3; 3],
}

impl Triangle {
    /// Triangle with explicit per-vertex normals.
    pub fn new(vertices: [Vec3; 3], normals: [Vec3; 3]) -> Self {
        Self { vertices, normals }
    }

    /// Triangle whose vertex normals all equal the face normal
    /// (counter-clockwise winding faces the normal).
    pub fn flat(vertices: [Vec3; 3]) -> Self {
        let n = face_normal(vertices);
        Self { vertices, normals: [n; 3] }
    }

    /// Unit face normal from the winding order, or zero if degenerate.
    pub fn face_normal(&self) -> Vec3 {
        face_normal(self.vertices)
    }

    /// Bounding box of the three corners.
    pub fn bounds(&self) -> Aabb {
        self.vertices.iter().fold(Aabb::EMPTY, |b, &v| b.grow(v))
    }

    /// Mean of the three corners.
    pub fn centroid(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    /// `true` when every vertex and normal component is finite.
    pub fn is_finite(&self) -> bool {
        self.vertices.iter().chain(&self.normals).all(|v| v.is_finite())
    }

    /// Möller–Trumbore intersection of `origin + t * delta` with `t` in
    /// `(SEGMENT_EPSILON, 1)`.
    ///
    /// Near-parallel segments and zero-length segments never hit.
    pub fn intersect_segment(&self, origin: Vec3, delta: Vec3) -> Option<TriangleHit> {
        let [v0, v1, v2] = self.vertices;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = delta.cross(e2);
        let det = e1.dot(p);
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = origin - v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(e1);
        let v = delta.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = e2.dot(q) * inv_det;
        if t <= SEGMENT_EPSILON || t >= 1.0 {
            return None;
        }
        Some(TriangleHit { t, u, v })
    }

    /// Barycentric blend of the vertex normals, normalized.
    ///
    /// Falls back to the face normal when the blend cancels out.
    pub fn interpolated_normal(&self, u: f32, v: f32) -> Vec3 {
        let w = 1.0 - u - v;
        let blended = w * self.normals[0] + u * self.normals[1] + v * self.normals[2];
        let n = blended.normalize_or_zero();
        if n == Vec3::ZERO {
            self.face_normal()
        } else {
            n
        }
    }
}

fn face_normal(vertices: [Vec3; 3]) -> Vec3 {
    (vertices[1] - vertices[0])
        .cross(vertices[2] - vertices[0])
        .normalize_or_zero()
}
