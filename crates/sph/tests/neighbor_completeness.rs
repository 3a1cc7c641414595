//! Hash-grid neighbor queries against an O(N^2) brute-force scan.
//!
//! The grid must report exactly the particles strictly within the search
//! radius, once each, including when the domain is larger than the wrapped
//! grid so that far-away particles alias into the candidate buckets.

use glam::Vec3;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sph::HashGrid;

fn brute_force(positions: &[Vec3], i: usize, radius: f32) -> Vec<usize> {
    let r2 = radius * radius;
    (0..positions.len())
        .filter(|&j| j != i && positions[i].distance_squared(positions[j]) < r2)
        .collect()
}

fn grid_neighbors(grid: &HashGrid, positions: &[Vec3], i: usize) -> Vec<usize> {
    let mut out = Vec::new();
    grid.for_each_neighbor(positions, i, |j| out.push(j));
    out.sort_unstable();
    out
}

fn random_cloud(rng: &mut StdRng, n: usize, lo: f32, hi: f32) -> Vec<Vec3> {
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.random_range(lo..hi),
                rng.random_range(lo..hi),
                rng.random_range(lo..hi),
            )
        })
        .collect()
}

fn assert_complete(grid: &mut HashGrid, positions: &[Vec3]) {
    grid.rebuild(positions);
    for i in 0..positions.len() {
        let expected = brute_force(positions, i, grid.search_radius());
        let got = grid_neighbors(grid, positions, i);
        assert_eq!(got, expected, "particle {i} at {}", positions[i]);
    }
}

#[test]
fn dense_cloud_inside_grid() {
    let mut rng = StdRng::seed_from_u64(7);
    let positions = random_cloud(&mut rng, 600, 0.0, 1.0);
    let mut grid = HashGrid::new(0.1, [8; 3]);
    assert_complete(&mut grid, &positions);
}

#[test]
fn cloud_spanning_negative_coordinates() {
    let mut rng = StdRng::seed_from_u64(11);
    let positions = random_cloud(&mut rng, 500, -1.0, 1.0);
    let mut grid = HashGrid::new(0.15, [16; 3]);
    assert_complete(&mut grid, &positions);
}

#[test]
fn domain_larger_than_wrapped_grid() {
    // 4 buckets of 0.2 per axis cover 0.8; the cloud spans 3.0.
    let mut rng = StdRng::seed_from_u64(23);
    let positions = random_cloud(&mut rng, 800, -1.5, 1.5);
    let mut grid = HashGrid::new(0.1, [4; 3]);
    assert_complete(&mut grid, &positions);
}

#[test]
fn degenerate_resolutions() {
    let mut rng = StdRng::seed_from_u64(5);
    let positions = random_cloud(&mut rng, 200, 0.0, 0.6);
    for resolution in [[1, 1, 1], [2, 2, 2], [1, 3, 2]] {
        let mut grid = HashGrid::new(0.12, resolution);
        assert_complete(&mut grid, &positions);
    }
}

#[test]
fn lattice_neighbors_at_exact_spacing() {
    // Face neighbors sit at exactly 0.1; only those strictly inside 0.1 count.
    let mut positions = Vec::new();
    for k in 0..5 {
        for j in 0..5 {
            for i in 0..5 {
                positions.push(Vec3::new(i as f32, j as f32, k as f32) * 0.1);
            }
        }
    }
    let mut grid = HashGrid::new(0.15, [32; 3]);
    assert_complete(&mut grid, &positions);
    // Interior particle: 6 face + 12 edge neighbors within 0.15.
    let center = 2 + 2 * 5 + 2 * 25;
    assert_eq!(grid_neighbors(&grid, &positions, center).len(), 18);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn matches_brute_force(
        points in prop::collection::vec((-2.0f32..2.0, -2.0f32..2.0, -2.0f32..2.0), 1..120),
        radius in 0.05f32..0.6,
        res in 1u32..12,
    ) {
        let positions: Vec<Vec3> = points.iter().map(|&(x, y, z)| Vec3::new(x, y, z)).collect();
        let mut grid = HashGrid::new(radius, [res, res + 1, res.max(2) - 1]);
        grid.rebuild(&positions);
        for i in 0..positions.len() {
            let expected = brute_force(&positions, i, radius);
            let got = grid_neighbors(&grid, &positions, i);
            prop_assert_eq!(got, expected);
        }
    }
}
