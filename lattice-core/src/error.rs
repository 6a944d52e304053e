//! Error types shared across the crate.

use thiserror::Error;

/// Precondition violations raised while building a lattice mesh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("grid of {rows}x{cols} samples has no complete cell (need at least 2x2)")]
    DegenerateGrid { rows: usize, cols: usize },
    #[error("grid of {rows}x{cols} samples exceeds the u32 index range")]
    IndexOverflow { rows: usize, cols: usize },
    #[error("sphere radius must be positive and fit in an f32, got {0}")]
    InvalidRadius(f64),
    #[error("helicoid radial step must be positive and finite, got {0}")]
    InvalidStep(f64),
    #[error("index {index} references a mesh with only {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
    #[error("{stream} stream has {len} entries but there are {vertices} positions")]
    StreamLength { stream: &'static str, len: usize, vertices: usize },
}

/// Failures reported by a [`crate::render::GpuDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("cannot upload an empty {0} stream")]
    EmptyStream(&'static str),
    #[error("{len} floats do not divide into {components}-component vertices")]
    RaggedStream { len: usize, components: u32 },
    #[error("unknown buffer handle {0}")]
    UnknownBuffer(u32),
    #[error("buffer {0} was already released")]
    Released(u32),
    #[error("device allocation failed: {0}")]
    Allocation(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid must have at least one column and one row, got {width}x{depth}")]
    EmptyGrid { width: u32, depth: u32 },
    #[error("range `{field}` is empty or reversed: {min}..{max}")]
    BadRange { field: &'static str, min: f32, max: f32 },
    #[error("{count} lights requested but the shading stage holds at most {max}")]
    TooManyLights { count: usize, max: usize },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Umbrella error for callers that touch more than one layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to parse scene config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
