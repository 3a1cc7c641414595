//! Uniform spatial hash for neighbor search.
//!
//! Cells are twice as wide as the search radius. Per axis, a search sphere
//! then overlaps at most the particle's own cell and the neighbor cell on the
//! side of the half the particle sits in, so 8 buckets cover every query
//! instead of 27.
//!
//! Buckets are laid out as a counting sort (per-bucket counts, scanned
//! offsets, particle indices sorted by bucket) instead of one `Vec` per
//! bucket, so the same arrays can be mirrored into GPU buffers.
//!
//! The grid has a fixed resolution and **wraps** at its boundary: a cell
//! coordinate outside `[0, resolution)` is reduced modulo the resolution.
//! Particles on opposite edges of a domain larger than the grid can therefore
//! share buckets; the exact distance test in [`HashGrid::for_each_neighbor`]
//! filters such aliases out.

use glam::{I64Vec3, Vec3};
use rayon::prelude::*;

use crate::scan::exclusive_scan_in_place;

/// Largest bucket count a grid may have.
pub const MAX_GRID_BUCKETS: u64 = 1 << 24;

/// Spatial hash over particle positions.
#[derive(Debug, Clone)]
pub struct HashGrid {
    radius: f32,
    cell_size: f32,
    resolution: [u32; 3],
    /// Bucket of each particle (parallel to the particle arrays).
    particle_buckets: Vec<u32>,
    /// Particle indices sorted by bucket.
    sorted_indices: Vec<u32>,
    /// Start offset in `sorted_indices` for each bucket.
    bucket_offsets: Vec<u32>,
    /// Number of particles in each bucket.
    bucket_counts: Vec<u32>,
}

impl HashGrid {
    /// Create an empty grid answering queries within `radius` (the kernel
    /// support radius).
    pub fn new(radius: f32, resolution: [u32; 3]) -> Self {
        assert!(radius > 0.0, "search radius must be positive");
        assert!(
            resolution.iter().all(|&r| r > 0),
            "grid resolution must be non-zero"
        );
        let total = resolution.iter().map(|&r| r as usize).product();
        Self {
            radius,
            cell_size: 2.0 * radius,
            resolution,
            particle_buckets: Vec::new(),
            sorted_indices: Vec::new(),
            bucket_offsets: vec![0; total],
            bucket_counts: vec![0; total],
        }
    }

    /// Change search radius and resolution. Buckets are emptied; call
    /// [`rebuild`](Self::rebuild) before the next query.
    pub fn resize(&mut self, radius: f32, resolution: [u32; 3]) {
        *self = Self::new(radius, resolution);
    }

    /// Neighbor search radius.
    pub fn search_radius(&self) -> f32 {
        self.radius
    }

    /// Cell edge length (twice the search radius).
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Bucket resolution per axis.
    pub fn resolution(&self) -> [u32; 3] {
        self.resolution
    }

    /// Total number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.bucket_counts.len()
    }

    /// Unwrapped integer cell containing `position`.
    ///
    /// Coordinates beyond the `i64` range saturate.
    #[inline]
    fn cell_of(&self, position: Vec3) -> I64Vec3 {
        (position / self.cell_size).floor().as_i64vec3()
    }

    /// Flat bucket index of a cell, wrapped into the grid resolution.
    #[inline]
    fn wrapped_bucket(&self, cell: I64Vec3) -> u32 {
        let [rx, ry, rz] = self.resolution;
        let x = cell.x.rem_euclid(rx as i64) as u32;
        let y = cell.y.rem_euclid(ry as i64) as u32;
        let z = cell.z.rem_euclid(rz as i64) as u32;
        x + y * rx + z * rx * ry
    }

    /// Bucket that a particle at `position` is inserted into.
    pub fn bucket_index(&self, position: Vec3) -> usize {
        self.wrapped_bucket(self.cell_of(position)) as usize
    }

    /// Particle indices currently stored in bucket `bucket`.
    pub fn bucket(&self, bucket: usize) -> &[u32] {
        let start = self.bucket_offsets[bucket] as usize;
        let count = self.bucket_counts[bucket] as usize;
        &self.sorted_indices[start..start + count]
    }

    /// Clear every bucket and insert all particles at their current positions.
    pub fn rebuild(&mut self, positions: &[Vec3]) {
        let n = positions.len();

        // --- 1. Bucket of each particle ---
        let buckets: Vec<u32> = positions
            .par_iter()
            .map(|&p| self.wrapped_bucket(self.cell_of(p)))
            .collect();
        self.particle_buckets = buckets;

        // --- 2. Count particles per bucket ---
        self.bucket_counts.fill(0);
        for &b in &self.particle_buckets {
            self.bucket_counts[b as usize] += 1;
        }

        // --- 3. Scan counts into offsets ---
        self.bucket_offsets.clear();
        self.bucket_offsets.extend_from_slice(&self.bucket_counts);
        let total = exclusive_scan_in_place(&mut self.bucket_offsets);
        debug_assert_eq!(total as usize, n);

        // --- 4. Scatter particle indices ---
        self.sorted_indices.resize(n, 0);
        let mut write_heads = self.bucket_offsets.clone();
        for (i, &b) in self.particle_buckets.iter().enumerate() {
            let slot = &mut write_heads[b as usize];
            self.sorted_indices[*slot as usize] = i as u32;
            *slot += 1;
        }
    }

    /// The (up to) eight distinct buckets that can hold neighbors of a
    /// particle at `origin`.
    ///
    /// Per axis, the candidate cells are the particle's own cell and the
    /// adjacent cell on the side of the half it sits in.
    fn nearby_buckets(&self, origin: Vec3) -> ([u32; 8], usize) {
        let scaled = origin / self.cell_size;
        let base = scaled.floor();
        let cell = base.as_i64vec3();
        let frac = scaled - base;
        let step = I64Vec3::new(
            if frac.x > 0.5 { 1 } else { -1 },
            if frac.y > 0.5 { 1 } else { -1 },
            if frac.z > 0.5 { 1 } else { -1 },
        );

        let mut keys = [0u32; 8];
        for (k, key) in keys.iter_mut().enumerate() {
            let offset = I64Vec3::new(
                (k & 1) as i64 * step.x,
                ((k >> 1) & 1) as i64 * step.y,
                ((k >> 2) & 1) as i64 * step.z,
            );
            *key = self.wrapped_bucket(I64Vec3::new(
                cell.x.saturating_add(offset.x),
                cell.y.saturating_add(offset.y),
                cell.z.saturating_add(offset.z),
            ));
        }

        // With a resolution below 3 on some axis, both candidates can wrap to
        // the same bucket; visit each bucket once.
        keys.sort_unstable();
        let mut unique = 0;
        for k in 0..keys.len() {
            if k == 0 || keys[k] != keys[unique - 1] {
                keys[unique] = keys[k];
                unique += 1;
            }
        }
        (keys, unique)
    }

    /// Invoke `f(j)` for every particle `j != particle_idx` whose distance to
    /// `particle_idx` is strictly less than the search radius.
    ///
    /// `positions` must be the slice the grid was last rebuilt from. Visiting
    /// order is unspecified.
    pub fn for_each_neighbor<F>(&self, positions: &[Vec3], particle_idx: usize, mut f: F)
    where
        F: FnMut(usize),
    {
        let origin = positions[particle_idx];
        let radius_sq = self.radius * self.radius;
        let (keys, unique) = self.nearby_buckets(origin);

        for &key in &keys[..unique] {
            for &j in self.bucket(key as usize) {
                let j = j as usize;
                if j == particle_idx {
                    continue;
                }
                if origin.distance_squared(positions[j]) < radius_sq {
                    f(j);
                }
            }
        }
    }
}
