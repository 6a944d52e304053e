//! GPU-facing seams: shader programs resolve attributes and uniforms by name,
//! devices upload streams and issue indexed draws.
//!
//! Backends:
//! - [`headless::RecordingDevice`] records every call; always available.
//! - `vk::VkDevice` uploads into Vulkan buffers (feature `vulkan`).

pub mod context;
pub mod headless;

#[cfg(feature = "vulkan")]
pub mod vk;

use glam::{Mat4, Vec3};
use log::debug;

use crate::error::GpuError;
use crate::mesh::{Attribute, MeshData};

/// Opaque handle to a buffer owned by a [`GpuDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec3(Vec3),
    Vec3Array(Vec<Vec3>),
    Mat4(Mat4),
}

/// A linked shader program.
pub trait ShaderProgram {
    fn name(&self) -> &str;
    fn attribute(&self, name: &str) -> Option<u32>;
    fn uniform(&self, name: &str) -> Option<u32>;
}

/// Buffer upload and draw primitives.
pub trait GpuDevice {
    type Program: ShaderProgram;

    fn upload_vertices(&mut self, data: &[f32], components: u32) -> Result<BufferId, GpuError>;
    fn upload_indices(&mut self, data: &[u32]) -> Result<BufferId, GpuError>;
    fn use_program(&mut self, program: &Self::Program);
    fn bind_attribute(
        &mut self,
        location: u32,
        buffer: BufferId,
        components: u32,
    ) -> Result<(), GpuError>;
    fn set_uniform(&mut self, location: u32, value: UniformValue);
    /// Triangle-list draw of the first `count` indices in `indices`.
    fn draw_indexed(&mut self, indices: BufferId, count: u32) -> Result<(), GpuError>;
    fn unbind_attributes(&mut self);
    fn release(&mut self, buffer: BufferId) -> Result<(), GpuError>;

    /// Set a uniform by name; uniforms the program does not declare are ignored.
    fn set_named_uniform(
        &mut self,
        program: &Self::Program,
        name: &str,
        value: UniformValue,
    ) -> bool {
        match program.uniform(name) {
            Some(loc) => {
                self.set_uniform(loc, value);
                true
            }
            None => false,
        }
    }
}

/// Vertex and index buffers for one mesh, uploaded once.
#[derive(Debug)]
pub struct GpuMesh {
    positions: BufferId,
    normals: Option<BufferId>,
    texcoords: Option<BufferId>,
    indices: BufferId,
    index_count: u32,
    bound: &'static [Attribute],
}

impl GpuMesh {
    /// Upload every stream of `mesh`. `bound` lists the streams [`GpuMesh::draw`] binds.
    ///
    /// Empty normal or texcoord streams are not uploaded. If any upload fails
    /// the streams already uploaded are released before the error is returned.
    pub fn upload<D: GpuDevice>(
        device: &mut D,
        mesh: &MeshData,
        bound: &'static [Attribute],
    ) -> Result<Self, GpuError> {
        let mut done = Vec::with_capacity(4);
        match upload_streams(device, mesh, &mut done) {
            Ok(mesh_buffers) => {
                debug!(
                    "uploaded mesh: {} vertices, {} indices",
                    mesh.vertex_count(),
                    mesh.index_count()
                );
                Ok(Self { index_count: mesh.index_count() as u32, bound, ..mesh_buffers })
            }
            Err(e) => {
                for id in done {
                    // the upload error is the one worth reporting
                    let _ = device.release(id);
                }
                Err(e)
            }
        }
    }

    pub fn buffer(&self, attribute: Attribute) -> Option<BufferId> {
        match attribute {
            Attribute::Position => Some(self.positions),
            Attribute::Normal => self.normals,
            Attribute::Texcoord => self.texcoords,
        }
    }

    pub fn index_buffer(&self) -> BufferId { self.indices }
    pub fn index_count(&self) -> u32 { self.index_count }
    pub fn attributes(&self) -> &'static [Attribute] { self.bound }

    /// Bind the mesh's attributes that `program` declares and draw it.
    /// Returns the attributes actually bound.
    pub fn draw<D: GpuDevice>(
        &self,
        device: &mut D,
        program: &D::Program,
    ) -> Result<Vec<Attribute>, GpuError> {
        let mut bound = Vec::with_capacity(self.bound.len());
        for &attribute in self.bound {
            let Some(buffer) = self.buffer(attribute) else { continue };
            match program.attribute(attribute.shader_name()) {
                Some(loc) => {
                    device.bind_attribute(loc, buffer, attribute.components())?;
                    bound.push(attribute);
                }
                None => {
                    let name = attribute.shader_name();
                    debug!("program '{}' has no {}; skipped", program.name(), name)
                }
            }
        }
        device.draw_indexed(self.indices, self.index_count)?;
        device.unbind_attributes();
        Ok(bound)
    }

    /// Release every buffer of the mesh. A failed release does not stop the
    /// rest; the first error is returned.
    pub fn release<D: GpuDevice>(self, device: &mut D) -> Result<(), GpuError> {
        let ids = [Some(self.positions), self.normals, self.texcoords, Some(self.indices)];
        let mut first = Ok(());
        for id in ids.into_iter().flatten() {
            if let Err(e) = device.release(id) {
                first = first.and(Err(e));
            }
        }
        first
    }
}

fn upload_streams<D: GpuDevice>(
    device: &mut D,
    mesh: &MeshData,
    done: &mut Vec<BufferId>,
) -> Result<GpuMesh, GpuError> {
    let mut upload = |attribute: Attribute| -> Result<Option<BufferId>, GpuError> {
        let data = mesh.stream(attribute);
        if data.is_empty() && attribute != Attribute::Position {
            return Ok(None);
        }
        let id = device.upload_vertices(data, attribute.components())?;
        done.push(id);
        Ok(Some(id))
    };
    let positions = upload(Attribute::Position)?.ok_or(GpuError::EmptyStream("position"))?;
    let normals = upload(Attribute::Normal)?;
    let texcoords = upload(Attribute::Texcoord)?;
    let indices = device.upload_indices(mesh.indices())?;
    done.push(indices);
    Ok(GpuMesh { positions, normals, texcoords, indices, index_count: 0, bound: &[] })
}
