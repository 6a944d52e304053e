//! CPU-side mesh data and the procedural lattice generators.
//!
//! Every generator here produces its full vertex and index streams up front;
//! the result is immutable and is uploaded to the GPU exactly once by
//! [`crate::render::GpuMesh`].

pub mod grid;
pub mod helicoid;
pub mod sphere;

pub use grid::{generate, lattice_indices, GridSpec};
pub use helicoid::{HelicoidParams, HelicoidSurface};
pub use sphere::{SphereParams, SphereSurface};

use glam::Vec3;

use crate::error::MeshError;

/// One record returned by a sampling function.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
}

/// Named vertex attribute streams and the shader names they bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    Texcoord,
}

impl Attribute {
    pub const fn shader_name(self) -> &'static str {
        match self {
            Attribute::Position => "aPos",
            Attribute::Normal => "aNor",
            Attribute::Texcoord => "aTex",
        }
    }

    pub const fn components(self) -> u32 {
        match self {
            Attribute::Position | Attribute::Normal => 3,
            Attribute::Texcoord => 2,
        }
    }
}

/// Which parameter directions close on themselves. Recorded for consumers;
/// the index stream never shares vertices across a seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seams {
    pub wrap_u: bool,
    pub wrap_v: bool,
}

/// Axis-aligned box around the sampled positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_positions(positions: &[[f32; 3]]) -> Option<Self> {
        let first = Vec3::from_array(*positions.first()?);
        let (min, max) = positions.iter().skip(1).fold((first, first), |(lo, hi), p| {
            let p = Vec3::from_array(*p);
            (lo.min(p), hi.max(p))
        });
        Some(Self { min, max })
    }
}

/// Indexed triangle-list mesh stored as parallel attribute streams.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    indices: Vec<u32>,
    lowest_y: f32,
}

impl MeshData {
    /// Assemble a mesh from externally produced streams (e.g. a loaded model).
    /// `lowest_y` is taken from the lowest position.
    ///
    /// Normal and texcoord streams are either empty or one entry per position,
    /// and every index must name an existing position.
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        texcoords: Vec<[f32; 2]>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let vertices = positions.len();
        for (stream, len) in [("normal", normals.len()), ("texcoord", texcoords.len())] {
            if len != 0 && len != vertices {
                return Err(MeshError::StreamLength { stream, len, vertices });
            }
        }
        if let Some(&index) = indices.iter().find(|&&k| k as usize >= vertices) {
            return Err(MeshError::IndexOutOfRange { index, vertices });
        }
        let lowest_y = Bounds::from_positions(&positions).map_or(0.0, |b| b.min.y);
        Ok(Self { positions, normals, texcoords, indices, lowest_y })
    }

    pub(crate) fn with_lowest_y(mut self, lowest_y: f32) -> Self {
        self.lowest_y = lowest_y;
        self
    }

    pub fn positions(&self) -> &[[f32; 3]] { &self.positions }
    pub fn normals(&self) -> &[[f32; 3]] { &self.normals }
    pub fn texcoords(&self) -> &[[f32; 2]] { &self.texcoords }
    pub fn indices(&self) -> &[u32] { &self.indices }

    /// Minimum Y the mesh occupies in model space, used to rest objects on the ground.
    pub fn lowest_y(&self) -> f32 { self.lowest_y }

    pub fn vertex_count(&self) -> usize { self.positions.len() }
    pub fn index_count(&self) -> usize { self.indices.len() }

    /// Flat float view of one attribute stream, as handed to the upload primitive.
    pub fn stream(&self, attribute: Attribute) -> &[f32] {
        match attribute {
            Attribute::Position => bytemuck::cast_slice(&self.positions),
            Attribute::Normal => bytemuck::cast_slice(&self.normals),
            Attribute::Texcoord => bytemuck::cast_slice(&self.texcoords),
        }
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// A [`MeshData`] that came out of the lattice mesher, with its grid shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMesh {
    data: MeshData,
    rows: usize,
    cols: usize,
    seams: Seams,
    bounds: Bounds,
}

impl GridMesh {
    pub(crate) fn from_parts(
        data: MeshData,
        rows: usize,
        cols: usize,
        seams: Seams,
        bounds: Bounds,
    ) -> Self {
        Self { data, rows, cols, seams, bounds }
    }

    pub(crate) fn with_lowest_y(mut self, lowest_y: f32) -> Self {
        self.data = self.data.with_lowest_y(lowest_y);
        self
    }

    pub fn data(&self) -> &MeshData { &self.data }
    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }
    pub fn seams(&self) -> Seams { self.seams }
    pub fn bounds(&self) -> Bounds { self.bounds }
    pub fn lowest_y(&self) -> f32 { self.data.lowest_y }

    /// Row-major vertex index of sample `(row, col)`.
    pub fn vertex_index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    pub fn sample(&self, row: usize, col: usize) -> Option<Sample> {
        let k = self.vertex_index(row, col)?;
        Some(Sample {
            position: self.data.positions[k],
            normal: self.data.normals[k],
            texcoord: self.data.texcoords[k],
        })
    }

    pub fn into_data(self) -> MeshData { self.data }
}

impl std::ops::Deref for GridMesh {
    type Target = MeshData;
    fn deref(&self) -> &MeshData { &self.data }
}

/// A generator that owns one finished lattice mesh.
pub trait ProceduralSurface {
    fn mesh(&self) -> &GridMesh;

    /// Streams the draw call binds. Streams not listed are still uploaded.
    fn bound_attributes(&self) -> &'static [Attribute];

    fn lowest_y(&self) -> f32 { self.mesh().lowest_y() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_every_position() {
        let b =
            Bounds::from_positions(&[[1.0, -2.0, 0.5], [-1.0, 3.0, 0.0], [0.0, 0.0, 2.0]]).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 2.0));
        assert!(Bounds::from_positions(&[]).is_none());
    }

    #[test]
    fn external_mesh_rests_on_its_lowest_point() {
        let m = MeshData::new(
            vec![[0.0, -0.25, 0.0], [1.0, 0.5, 0.0], [0.0, 1.0, 0.0]],
            vec![[0.0, 0.0, 1.0]; 3],
            vec![[0.0, 0.0]; 3],
            vec![0, 1, 2],
        )
        .unwrap();
        assert_eq!(m.lowest_y(), -0.25);
        assert_eq!(m.stream(Attribute::Position).len(), 9);
        assert_eq!(m.stream(Attribute::Texcoord).len(), 6);
        assert_eq!(m.triangles().collect::<Vec<_>>(), vec![[0, 1, 2]]);
    }

    #[test]
    fn external_mesh_may_omit_normals_and_texcoords() {
        let m = MeshData::new(vec![[0.0; 3]; 3], vec![], vec![], vec![0, 1, 2]).unwrap();
        assert!(m.stream(Attribute::Normal).is_empty());
        assert!(m.stream(Attribute::Texcoord).is_empty());
    }

    #[test]
    fn indices_past_the_last_vertex_are_rejected() {
        let err = MeshData::new(vec![[0.0; 3]; 3], vec![], vec![], vec![0, 1, 5]).unwrap_err();
        assert_eq!(err, MeshError::IndexOutOfRange { index: 5, vertices: 3 });
    }

    #[test]
    fn stream_lengths_must_match_positions() {
        let err = MeshData::new(vec![[0.0; 3]], vec![[0.0; 3]; 4], vec![], vec![0]).unwrap_err();
        assert_eq!(err, MeshError::StreamLength { stream: "normal", len: 4, vertices: 1 });
        let err = MeshData::new(vec![[0.0; 3]; 2], vec![], vec![[0.0; 2]], vec![0, 1]).unwrap_err();
        assert_eq!(err, MeshError::StreamLength { stream: "texcoord", len: 1, vertices: 2 });
    }

    #[test]
    fn attribute_names_match_shader_contract() {
        assert_eq!(Attribute::Position.shader_name(), "aPos");
        assert_eq!(Attribute::Normal.shader_name(), "aNor");
        assert_eq!(Attribute::Texcoord.shader_name(), "aTex");
        assert_eq!(Attribute::Texcoord.components(), 2);
    }
}
