//! BVH segment queries against closed-form answers.

use glam::Vec3;
use sph::{Bvh, Triangle};

/// Axis-aligned unit-square quad in the plane `y = height`, normal +y.
fn horizontal_quad(height: f32, center: Vec3, half: f32) -> [Triangle; 2] {
    let c = Vec3::new(center.x, height, center.z);
    let a = c + Vec3::new(-half, 0.0, -half);
    let b = c + Vec3::new(-half, 0.0, half);
    let d = c + Vec3::new(half, 0.0, half);
    let e = c + Vec3::new(half, 0.0, -half);
    [Triangle::flat([a, b, d]), Triangle::flat([a, d, e])]
}

/// Sphere-ish mesh: an icosahedron scaled by `radius`.
fn icosahedron(radius: f32) -> Vec<Triangle> {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let v: Vec<Vec3> = [
        (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
        (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
        (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vec3::new(x, y, z).normalize() * radius)
    .collect();
    let faces = [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];
    faces
        .iter()
        .map(|f| {
            let verts = [v[f[0]], v[f[1]], v[f[2]]];
            // Vertex normals of a sphere point radially outward.
            Triangle::new(verts, verts.map(|p| p.normalize()))
        })
        .collect()
}

#[test]
fn node_count_for_mesh() {
    let bvh = Bvh::build(icosahedron(1.0)).unwrap();
    assert_eq!(bvh.triangles().len(), 20);
    assert_eq!(bvh.nodes().len(), 39);
    assert!(bvh.depth() >= 4);
}

#[test]
fn analytic_hit_on_plane() {
    let bvh = Bvh::build(horizontal_quad(0.25, Vec3::ZERO, 1.0).to_vec()).unwrap();
    let from = Vec3::new(0.1, 1.0, 0.4);
    let to = Vec3::new(0.4, -0.5, 0.1);
    let hit = bvh.get_intersection(from, to).expect("segment crosses the plane");

    // y(t) = 1 - 1.5 t = 0.25  =>  t = 0.5
    assert!((hit.t - 0.5).abs() < 1.0e-5, "t = {}", hit.t);
    assert!((hit.point - Vec3::new(0.25, 0.25, 0.25)).length() < 1.0e-5);
    assert!((hit.normal - Vec3::Y).length() < 1.0e-5);
}

#[test]
fn interpolated_normal_on_sphere_mesh() {
    let bvh = Bvh::build(icosahedron(1.0)).unwrap();
    // Straight down the +y axis onto the top of the mesh.
    let hit = bvh
        .get_intersection(Vec3::new(0.05, 3.0, 0.02), Vec3::new(0.05, 0.0, 0.02))
        .expect("hits top of mesh");
    assert!((hit.normal.length() - 1.0).abs() < 1.0e-5);
    // Smoothed normal stays close to the radial direction of the hit point.
    assert!(hit.normal.dot(hit.point.normalize()) > 0.9, "normal {}", hit.normal);
    assert!(hit.normal.y > 0.8);
}

#[test]
fn closest_of_two_layers_wins() {
    let mut tris = horizontal_quad(0.0, Vec3::ZERO, 1.0).to_vec();
    tris.extend(horizontal_quad(0.5, Vec3::ZERO, 1.0));
    let bvh = Bvh::build(tris).unwrap();

    let down = bvh
        .get_intersection(Vec3::new(0.2, 1.0, 0.2), Vec3::new(0.2, -1.0, 0.2))
        .unwrap();
    assert!((down.point.y - 0.5).abs() < 1.0e-5);

    let up = bvh
        .get_intersection(Vec3::new(0.2, -1.0, 0.2), Vec3::new(0.2, 1.0, 0.2))
        .unwrap();
    assert!(up.point.y.abs() < 1.0e-5);
}

#[test]
fn short_and_parallel_segments_miss() {
    let bvh = Bvh::build(horizontal_quad(0.0, Vec3::ZERO, 1.0).to_vec()).unwrap();
    // Ends before the plane.
    assert!(bvh
        .get_intersection(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.1, 0.0))
        .is_none());
    // Lies in the plane.
    assert!(bvh
        .get_intersection(Vec3::new(-0.5, 0.0, 0.1), Vec3::new(0.5, 0.0, 0.1))
        .is_none());
    // Zero length on the surface.
    assert!(bvh
        .get_intersection(Vec3::new(0.3, 0.0, 0.3), Vec3::new(0.3, 0.0, 0.3))
        .is_none());
    // Starts exactly on the surface and leaves it.
    assert!(bvh
        .get_intersection(Vec3::new(0.3, 0.0, 0.3), Vec3::new(0.3, 1.0, 0.3))
        .is_none());
}

#[test]
fn many_scattered_quads_find_the_right_one() {
    let mut tris = Vec::new();
    for i in 0..10 {
        for k in 0..10 {
            let c = Vec3::new(i as f32, 0.0, k as f32);
            tris.extend(horizontal_quad(i as f32 * 0.1, c, 0.4));
        }
    }
    let bvh = Bvh::build(tris).unwrap();
    assert_eq!(bvh.nodes().len(), 399);

    for i in 0..10 {
        for k in 0..10 {
            let x = i as f32 + 0.1;
            let z = k as f32 - 0.2;
            let hit = bvh
                .get_intersection(Vec3::new(x, 5.0, z), Vec3::new(x, -5.0, z))
                .unwrap();
            assert!((hit.point.y - i as f32 * 0.1).abs() < 1.0e-4, "quad ({i}, {k})");
            let tri = &bvh.triangles()[hit.triangle as usize];
            assert!((tri.centroid().x - i as f32).abs() < 0.5);
            assert!((tri.centroid().z - k as f32).abs() < 0.5);
        }
    }
}
