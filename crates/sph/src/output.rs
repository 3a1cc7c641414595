//! Position frames handed to an external renderer.

use std::sync::{Arc, Mutex, MutexGuard};

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// GPU-friendly particle position (`w` is always 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderPosition(pub Vec4);

impl From<Vec3> for RenderPosition {
    fn from(p: Vec3) -> Self {
        Self(p.extend(1.0))
    }
}

/// One published frame.
#[derive(Debug, Clone, Default)]
pub struct PositionFrame {
    /// Number of frames published up to and including this one (1 for the
    /// first published frame, 0 before any publish).
    pub generation: u64,
    /// Positions in particle index order.
    pub positions: Vec<RenderPosition>,
}

/// Shared, cloneable handle to the latest position frame.
///
/// The writer assembles a whole frame before swapping it in, so readers
/// always see a complete step.
#[derive(Debug, Clone, Default)]
pub struct PositionBuffer {
    frame: Arc<Mutex<PositionFrame>>,
}

impl PositionBuffer {
    /// An empty buffer (generation 0, no positions).
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PositionFrame> {
        // A panicking reader cannot leave a frame half written.
        self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a new frame.
    pub fn publish(&self, positions: &[Vec3]) {
        let next: Vec<RenderPosition> = positions.iter().map(|&p| p.into()).collect();
        let mut frame = self.lock();
        frame.positions = next;
        frame.generation += 1;
    }

    /// Number of frames published so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Copy of the latest frame.
    pub fn snapshot(&self) -> PositionFrame {
        self.lock().clone()
    }

    /// Latest positions as 3-vectors.
    pub fn positions(&self) -> Vec<Vec3> {
        self.lock().positions.iter().map(|p| p.0.truncate()).collect()
    }

    /// Run `f` on the raw bytes of the latest frame (for buffer upload).
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let frame = self.lock();
        f(bytemuck::cast_slice(&frame.positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let buf = PositionBuffer::new();
        assert_eq!(buf.generation(), 0);
        assert!(buf.positions().is_empty());
    }

    #[test]
    fn first_published_frame_is_generation_one() {
        let buf = PositionBuffer::new();
        assert_eq!(buf.snapshot().generation, 0);
        buf.publish(&[Vec3::X]);
        let frame = buf.snapshot();
        assert_eq!(frame.generation, 1);
        assert_eq!(frame.generation, buf.generation());
    }

    #[test]
    fn publish_replaces_whole_frame() {
        let buf = PositionBuffer::new();
        buf.publish(&[Vec3::ONE, Vec3::X, Vec3::Y]);
        buf.publish(&[Vec3::Z]);
        let frame = buf.snapshot();
        assert_eq!(frame.generation, 2);
        assert_eq!(frame.positions, vec![RenderPosition(Vec4::new(0.0, 0.0, 1.0, 1.0))]);
    }

    #[test]
    fn clones_share_the_frame() {
        let writer = PositionBuffer::new();
        let reader = writer.clone();
        writer.publish(&[Vec3::new(1.0, 2.0, 3.0)]);
        assert_eq!(reader.positions(), vec![Vec3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn bytes_are_vec4_per_particle() {
        let buf = PositionBuffer::new();
        buf.publish(&[Vec3::ZERO, Vec3::ONE]);
        assert_eq!(buf.with_bytes(|b| b.len()), 2 * 16);
    }
}
