//! Error types for configuration and geometry validation.
//!
//! Everything here is raised before the first step (when parameters or
//! geometry are handed to the solver). Per-particle numerical edge cases are
//! absorbed inside the step and never surface as errors.

use std::fmt;

/// A rejected `SimulationParameters` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// A quantity that must be strictly positive was zero or negative.
    NonPositive {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// A coefficient that must be non-negative was negative.
    Negative {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// A value fell outside its closed admissible range.
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f32,
        /// Inclusive lower bound.
        min: f32,
        /// Inclusive upper bound.
        max: f32,
    },
    /// A value (or a component of a vector value) was NaN or infinite.
    NotFinite {
        /// Parameter name.
        name: &'static str,
    },
    /// One axis of the hash-grid resolution was zero.
    ZeroGridResolution {
        /// The full resolution that was requested.
        resolution: [u32; 3],
    },
    /// The hash-grid resolution has more buckets than a grid may hold.
    GridTooLarge {
        /// The full resolution that was requested.
        resolution: [u32; 3],
        /// Largest accepted bucket count.
        max_buckets: u64,
    },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { name, value } => {
                write!(f, "{name} must be positive, got {value}")
            }
            Self::Negative { name, value } => {
                write!(f, "{name} must be non-negative, got {value}")
            }
            Self::OutOfRange { name, value, min, max } => {
                write!(f, "{name} must lie in [{min}, {max}], got {value}")
            }
            Self::NotFinite { name } => write!(f, "{name} must be finite"),
            Self::ZeroGridResolution { resolution } => write!(
                f,
                "grid resolution must be at least 1 on every axis, got {}x{}x{}",
                resolution[0], resolution[1], resolution[2]
            ),
            Self::GridTooLarge { resolution, max_buckets } => write!(
                f,
                "grid resolution {}x{}x{} exceeds {max_buckets} buckets",
                resolution[0], resolution[1], resolution[2]
            ),
        }
    }
}

impl std::error::Error for ParameterError {}

/// Invalid collision geometry handed to the BVH builder.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A vertex or normal of the given triangle contains NaN or infinity.
    NonFiniteTriangle {
        /// Index of the triangle in the input sequence.
        triangle: usize,
    },
    /// More triangles than a `u32` node index can address.
    TooManyTriangles {
        /// Number of triangles supplied.
        count: usize,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteTriangle { triangle } => {
                write!(f, "triangle {triangle} has a non-finite vertex or normal")
            }
            Self::TooManyTriangles { count } => {
                write!(f, "{count} triangles exceed the BVH index range")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Umbrella error for building a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SphError {
    /// Rejected simulation parameters.
    Parameter(ParameterError),
    /// Rejected collision geometry.
    Geometry(GeometryError),
    /// Per-particle arrays supplied with different lengths.
    ParticleCountMismatch {
        /// Number of positions.
        positions: usize,
        /// Number of velocities.
        velocities: usize,
    },
    /// A lattice request with an empty range or non-positive spacing.
    InvalidLattice(String),
}

impl fmt::Display for SphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter(e) => write!(f, "invalid simulation parameters: {e}"),
            Self::Geometry(e) => write!(f, "invalid collision geometry: {e}"),
            Self::ParticleCountMismatch { positions, velocities } => write!(
                f,
                "particle arrays differ in length: {positions} positions, {velocities} velocities"
            ),
            Self::InvalidLattice(msg) => write!(f, "invalid lattice: {msg}"),
        }
    }
}

impl std::error::Error for SphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parameter(e) => Some(e),
            Self::Geometry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParameterError> for SphError {
    fn from(e: ParameterError) -> Self {
        Self::Parameter(e)
    }
}

impl From<GeometryError> for SphError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}
