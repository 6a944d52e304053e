//! Shared lattice mesher: turns a `rows x cols` grid of samples into an
//! indexed triangle list.
//!
//! Cell `(r, c)` becomes two triangles, `(r,c) (r,c+1) (r+1,c+1)` and
//! `(r,c) (r+1,c+1) (r+1,c)`. Wrapped directions are closed by the caller
//! sampling the first and last column (or row) at the same parameter value,
//! which leaves a duplicate-vertex seam.

use log::debug;

use super::{Bounds, GridMesh, MeshData, Sample, Seams};
use crate::error::MeshError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub seams: Seams,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, seams: Seams::default() }
    }

    pub fn wrap_u(mut self, wrap: bool) -> Self { self.seams.wrap_u = wrap; self }
    pub fn wrap_v(mut self, wrap: bool) -> Self { self.seams.wrap_v = wrap; self }

    pub fn validate(&self) -> Result<(), MeshError> {
        let (rows, cols) = (self.rows, self.cols);
        if rows < 2 || cols < 2 {
            return Err(MeshError::DegenerateGrid { rows, cols });
        }
        match rows.checked_mul(cols) {
            // the highest index is n - 1
            Some(n) if n - 1 <= u32::MAX as usize => Ok(()),
            _ => Err(MeshError::IndexOverflow { rows, cols }),
        }
    }

    pub fn vertex_count(&self) -> usize { self.rows * self.cols }

    pub fn index_count(&self) -> usize {
        6 * self.rows.saturating_sub(1) * self.cols.saturating_sub(1)
    }
}

/// Index stream for a `rows x cols` lattice, six entries per cell.
pub fn lattice_indices(rows: usize, cols: usize) -> Result<Vec<u32>, MeshError> {
    let spec = GridSpec::new(rows, cols);
    spec.validate()?;
    let mut indices = Vec::with_capacity(spec.index_count());
    let at = |r: usize, c: usize| (r * cols + c) as u32;
    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            indices.extend_from_slice(&[at(r, c), at(r, c + 1), at(r + 1, c + 1)]);
            indices.extend_from_slice(&[at(r, c), at(r + 1, c + 1), at(r + 1, c)]);
        }
    }
    Ok(indices)
}

/// Sample the grid in row-major order, once per coordinate, and index it.
///
/// The resulting `lowest_y` is the lowest sampled Y; generators that know the
/// exact value from their parameters replace it.
pub fn generate<F>(spec: GridSpec, mut sample: F) -> Result<GridMesh, MeshError>
where
    F: FnMut(usize, usize) -> Sample,
{
    spec.validate()?;
    let n = spec.vertex_count();
    let mut positions = Vec::with_capacity(n);
    let mut normals = Vec::with_capacity(n);
    let mut texcoords = Vec::with_capacity(n);
    for i in 0..spec.rows {
        for j in 0..spec.cols {
            let s = sample(i, j);
            positions.push(s.position);
            normals.push(s.normal);
            texcoords.push(s.texcoord);
        }
    }
    let indices = lattice_indices(spec.rows, spec.cols)?;
    let bounds = Bounds::from_positions(&positions)
        .ok_or(MeshError::DegenerateGrid { rows: spec.rows, cols: spec.cols })?;
    debug!(
        "lattice {}x{}: {} vertices, {} indices, y in [{}, {}]",
        spec.rows, spec.cols, n, indices.len(), bounds.min.y, bounds.max.y
    );
    let data = MeshData::new(positions, normals, texcoords, indices)?;
    Ok(GridMesh::from_parts(data, spec.rows, spec.cols, spec.seams, bounds))
}
