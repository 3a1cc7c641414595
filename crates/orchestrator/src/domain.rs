//! Domain setup: fluid particle placement

use anyhow::{Context, Result};
use glam::Vec3;
use sph::ParticleSet;

use crate::config::{ColliderConfig, SceneConfig};

/// Seed the fluid particles of a scene.
///
/// Every fluid block is expanded into its lattice, in block order. When the
/// scene has containers, lattice points outside all of them are skipped, since
/// they could never be brought inside.
pub fn seed_particles(config: &SceneConfig) -> Result<ParticleSet> {
    let containers: Vec<(Vec3, Vec3)> = config
        .colliders
        .iter()
        .filter_map(|c| match c {
            ColliderConfig::Container { min, max } => Some((*min, *max)),
            ColliderConfig::Stl { .. } => None,
        })
        .collect();

    let mut positions = Vec::new();
    let mut skipped = 0usize;
    for (i, block) in config.fluid.iter().enumerate() {
        let lattice = block
            .positions()
            .with_context(|| format!("fluid block {i}"))?;
        for p in lattice {
            if containers.is_empty() || containers.iter().any(|&(lo, hi)| inside(p, lo, hi)) {
                positions.push(p);
            } else {
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("{} lattice points outside every container were skipped", skipped);
    }

    let velocities = vec![config.initial_velocity; positions.len()];
    let particles = ParticleSet::from_state(positions, velocities)?;
    tracing::info!("Domain setup complete: {} fluid particles", particles.len());
    Ok(particles)
}

fn inside(p: Vec3, lo: Vec3, hi: Vec3) -> bool {
    p.cmpgt(lo).all() && p.cmplt(hi).all()
}
