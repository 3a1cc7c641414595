//! Collision geometry: STL loading and analytic containers

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec3;
use sph::Triangle;

use crate::config::ColliderConfig;

/// Load an STL file (ASCII or binary) as collision triangles.
///
/// The stored facet normal is used for all three vertices; facets with a
/// missing (zero) normal get the normal implied by their winding.
pub fn load_stl(path: impl AsRef<Path>, scale: f32, translation: Vec3) -> Result<Vec<Triangle>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open STL file {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mesh = nom_stl::parse_stl(&mut reader)
        .map_err(|e| anyhow::anyhow!("failed to parse STL file {}: {:?}", path.display(), e))?;

    Ok(mesh
        .triangles()
        .iter()
        .map(|t| {
            let [a, b, c] = t.vertices();
            let vertices = [a, b, c].map(|v| Vec3::from_array(v) * scale + translation);
            stl_triangle(vertices, Vec3::from_array(t.normal()))
        })
        .collect())
}

fn stl_triangle(vertices: [Vec3; 3], facet_normal: Vec3) -> Triangle {
    let n = facet_normal.normalize_or_zero();
    if n == Vec3::ZERO {
        Triangle::flat(vertices)
    } else {
        Triangle::new(vertices, [n; 3])
    }
}

/// Twelve triangles forming the inside of an axis-aligned box.
///
/// Every face is wound so its normal points into the box, so particles
/// moving outward are reflected back in.
pub fn container_triangles(min: Vec3, max: Vec3) -> Vec<Triangle> {
    let corner = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };

    // Each face as (a, b, c, d) counter-clockwise seen from inside the box.
    let faces = [
        // floor (y = min), normal +y
        [corner(false, false, false), corner(false, false, true), corner(true, false, true), corner(true, false, false)],
        // ceiling (y = max), normal -y
        [corner(false, true, false), corner(true, true, false), corner(true, true, true), corner(false, true, true)],
        // x = min, normal +x
        [corner(false, false, false), corner(false, true, false), corner(false, true, true), corner(false, false, true)],
        // x = max, normal -x
        [corner(true, false, false), corner(true, false, true), corner(true, true, true), corner(true, true, false)],
        // z = min, normal +z
        [corner(false, false, false), corner(true, false, false), corner(true, true, false), corner(false, true, false)],
        // z = max, normal -z
        [corner(false, false, true), corner(false, true, true), corner(true, true, true), corner(true, false, true)],
    ];

    faces
        .iter()
        .flat_map(|&[a, b, c, d]| [Triangle::flat([a, b, c]), Triangle::flat([a, c, d])])
        .collect()
}

/// Gather the triangles of every collider in the scene.
///
/// Relative STL paths are resolved against `base_dir`.
pub fn collect_triangles(colliders: &[ColliderConfig], base_dir: &Path) -> Result<Vec<Triangle>> {
    let mut triangles = Vec::new();
    for collider in colliders {
        match collider {
            ColliderConfig::Stl { path, scale, translation } => {
                let full = base_dir.join(path);
                let loaded = load_stl(&full, *scale, *translation)?;
                tracing::info!("Loaded {} triangles from {}", loaded.len(), full.display());
                triangles.extend(loaded);
            }
            ColliderConfig::Container { min, max } => {
                triangles.extend(container_triangles(*min, *max));
            }
        }
    }
    Ok(triangles)
}
