//! Mesh summaries for the CLI and for tooling that wants JSON.

use serde::Serialize;

use crate::mesh::GridMesh;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshStats {
    pub kind: String,
    pub rows: usize,
    pub cols: usize,
    pub vertices: usize,
    pub indices: usize,
    pub triangles: usize,
    pub lowest_y: f32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub wrap_u: bool,
    pub wrap_v: bool,
}

impl MeshStats {
    pub fn of(kind: &str, mesh: &GridMesh) -> Self {
        let bounds = mesh.bounds();
        Self {
            kind: kind.to_string(),
            rows: mesh.rows(),
            cols: mesh.cols(),
            vertices: mesh.vertex_count(),
            indices: mesh.index_count(),
            triangles: mesh.index_count() / 3,
            lowest_y: mesh.lowest_y(),
            bounds_min: bounds.min.to_array(),
            bounds_max: bounds.max.to_array(),
            wrap_u: mesh.seams().wrap_u,
            wrap_v: mesh.seams().wrap_v,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
