//! Bounding-volume hierarchy over static collision triangles.
//!
//! The tree is a flat array of [`BvhNode`]s (root at index 0) with one
//! triangle per leaf, so `T` triangles always produce `2T - 1` nodes.
//! Construction is top-down with a binned surface-area heuristic; queries
//! walk the tree with an explicit stack so the same loop can be ported to a
//! compute shader.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::GeometryError;
use crate::geometry::{Aabb, Triangle};

/// Sentinel for "no node" / "no triangle".
pub const NONE: u32 = u32::MAX;

/// Number of SAH buckets along the split axis.
const SAH_BUCKETS: usize = 12;

/// Relative cost of one traversal step versus one triangle test.
const TRAVERSAL_COST: f32 = 0.125;

/// Initial capacity of the traversal stack.
const STACK_CAPACITY: usize = 64;

/// One node of the hierarchy.
///
/// Interior nodes have `left`/`right` set and `triangle == NONE`; leaves
/// have `left == right == NONE` and reference one triangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    /// Bounds of everything below this node.
    pub bounds: Aabb,
    /// Depth in the tree (root = 0).
    pub level: u32,
    /// Parent node, `NONE` for the root.
    pub parent: u32,
    /// Left child, `NONE` for leaves.
    pub left: u32,
    /// Right child, `NONE` for leaves.
    pub right: u32,
    /// Triangle index for leaves, `NONE` for interior nodes.
    pub triangle: u32,
}

impl BvhNode {
    /// `true` for leaf nodes.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.triangle != NONE
    }
}

/// Closest segment/geometry intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// World-space hit point.
    pub point: Vec3,
    /// Unit surface normal, interpolated from the vertex normals.
    pub normal: Vec3,
    /// Segment parameter of the hit (0 = start, 1 = end).
    pub t: f32,
    /// Index of the triangle that was hit.
    pub triangle: u32,
}

/// Build-time record for one triangle.
#[derive(Debug, Clone, Copy)]
struct Primitive {
    index: u32,
    bounds: Aabb,
    centroid: Vec3,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: u32,
    bounds: Aabb,
}

/// Static triangle BVH. Owns its nodes and triangles.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
}

impl Bvh {
    /// Build the hierarchy over `triangles`.
    ///
    /// Fails on non-finite vertex or normal data. An empty input produces an
    /// empty tree that never reports an intersection.
    pub fn build(triangles: Vec<Triangle>) -> Result<Self, GeometryError> {
        if triangles.len() >= NONE as usize / 2 {
            return Err(GeometryError::TooManyTriangles { count: triangles.len() });
        }
        if let Some(bad) = triangles.iter().position(|t| !t.is_finite()) {
            return Err(GeometryError::NonFiniteTriangle { triangle: bad });
        }

        let mut primitives: Vec<Primitive> = triangles
            .iter()
            .enumerate()
            .map(|(i, t)| Primitive {
                index: i as u32,
                bounds: t.bounds(),
                centroid: t.centroid(),
            })
            .collect();

        let mut bvh = Self {
            nodes: Vec::with_capacity((2 * triangles.len()).saturating_sub(1)),
            triangles,
        };
        if !primitives.is_empty() {
            bvh.build_range(&mut primitives, NONE, 0);
        }

        tracing::debug!(
            "BVH built: {} triangles, {} nodes, depth {}",
            bvh.triangles.len(),
            bvh.nodes.len(),
            bvh.depth()
        );
        Ok(bvh)
    }

    /// Recursively build the subtree over `prims`; returns its node index.
    fn build_range(&mut self, prims: &mut [Primitive], parent: u32, level: u32) -> u32 {
        let index = self.nodes.len() as u32;
        let bounds = prims.iter().fold(Aabb::EMPTY, |b, p| b.union(&p.bounds));
        self.nodes.push(BvhNode {
            bounds,
            level,
            parent,
            left: NONE,
            right: NONE,
            triangle: NONE,
        });

        if let [only] = prims {
            self.nodes[index as usize].triangle = only.index;
            return index;
        }

        let mid = split_primitives(prims, &bounds);
        let (lo, hi) = prims.split_at_mut(mid);
        let left = self.build_range(lo, index, level + 1);
        let right = self.build_range(hi, index, level + 1);

        let node = &mut self.nodes[index as usize];
        node.left = left;
        node.right = right;
        index
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// The triangles, in their original input order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// `true` when built from no triangles.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maximum leaf depth (0 for a single leaf or an empty tree).
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    /// Raw node array for upload to a GPU consumer.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Closest intersection of the segment `current -> next` with the
    /// geometry, if any lies strictly inside the segment.
    pub fn get_intersection(&self, current: Vec3, next: Vec3) -> Option<Intersection> {
        if self.nodes.is_empty() {
            return None;
        }
        let delta = next - current;
        let mut best: Option<Intersection> = None;
        let mut best_t = 1.0_f32;

        let mut stack: Vec<u32> = Vec::with_capacity(STACK_CAPACITY);
        if self.nodes[0].bounds.segment_entry(current, delta, 1.0).is_some() {
            stack.push(0);
        }

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];

            if node.is_leaf() {
                let tri = &self.triangles[node.triangle as usize];
                if let Some(hit) = tri.intersect_segment(current, delta) {
                    if hit.t < best_t {
                        best_t = hit.t;
                        best = Some(Intersection {
                            point: current + hit.t * delta,
                            normal: tri.interpolated_normal(hit.u, hit.v),
                            t: hit.t,
                            triangle: node.triangle,
                        });
                    }
                }
                continue;
            }

            // Only descend into children the segment can reach before the
            // closest hit found so far.
            for child in [node.left, node.right] {
                let child_bounds = &self.nodes[child as usize].bounds;
                if child_bounds.segment_entry(current, delta, best_t).is_some() {
                    stack.push(child);
                }
            }
        }

        best
    }
}

/// Partition `prims` in place and return the split index (`0 < mid < len`).
fn split_primitives(prims: &mut [Primitive], bounds: &Aabb) -> usize {
    let centroid_bounds = prims
        .iter()
        .fold(Aabb::EMPTY, |b, p| b.grow(p.centroid));
    let axis = centroid_bounds.longest_axis();
    let extent = centroid_bounds.extent()[axis];

    if prims.len() <= 2 || extent <= f32::EPSILON * centroid_bounds.lower[axis].abs().max(1.0) {
        return median_split(prims, axis);
    }

    // --- Bin centroids along the axis ---
    let lower = centroid_bounds.lower[axis];
    let bucket_of = |p: &Primitive| -> usize {
        let rel = (p.centroid[axis] - lower) / extent;
        ((rel * SAH_BUCKETS as f32) as usize).min(SAH_BUCKETS - 1)
    };
    let mut buckets = [Bucket::default(); SAH_BUCKETS];
    for p in prims.iter() {
        let b = &mut buckets[bucket_of(p)];
        b.count += 1;
        b.bounds = b.bounds.union(&p.bounds);
    }

    // --- Evaluate each bucket boundary ---
    let parent_area = bounds.surface_area().max(f32::MIN_POSITIVE);
    let mut best_cost = f32::INFINITY;
    let mut best_split = 0;
    for split in 0..SAH_BUCKETS - 1 {
        let (left, right) = buckets.split_at(split + 1);
        let (lb, lc) = left
            .iter()
            .fold((Aabb::EMPTY, 0u32), |(b, c), k| (b.union(&k.bounds), c + k.count));
        let (rb, rc) = right
            .iter()
            .fold((Aabb::EMPTY, 0u32), |(b, c), k| (b.union(&k.bounds), c + k.count));
        if lc == 0 || rc == 0 {
            continue;
        }
        let cost = TRAVERSAL_COST
            + (lc as f32 * lb.surface_area() + rc as f32 * rb.surface_area()) / parent_area;
        if cost < best_cost {
            best_cost = cost;
            best_split = split;
        }
    }

    if !best_cost.is_finite() {
        return median_split(prims, axis);
    }

    // --- Partition around the chosen boundary ---
    let mut mid = 0;
    for i in 0..prims.len() {
        if bucket_of(&prims[i]) <= best_split {
            prims.swap(i, mid);
            mid += 1;
        }
    }
    if mid == 0 || mid == prims.len() {
        return median_split(prims, axis);
    }
    mid
}

/// Split at the median centroid along `axis`.
fn median_split(prims: &mut [Primitive], axis: usize) -> usize {
    let mid = prims.len() / 2;
    prims.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
    mid
}
