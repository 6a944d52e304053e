//! Device that keeps buffers in memory and records every call it receives.
//! Used for headless runs and as the collaborator in tests.

use std::collections::BTreeMap;

use super::{BufferId, GpuDevice, ShaderProgram, UniformValue};
use crate::error::GpuError;

/// Program whose attribute and uniform locations are assigned in declaration order.
#[derive(Debug, Clone, Default)]
pub struct NamedProgram {
    name: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
}

impl NamedProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_attributes(mut self, names: &[&str]) -> Self {
        self.attributes.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_uniforms(mut self, names: &[&str]) -> Self {
        self.uniforms.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Blinn-Phong G-buffer program used for meshes and spheres.
    pub fn lit() -> Self {
        Self::new("lit").with_attributes(&["aPos", "aNor"]).with_uniforms(&[
            "MV",
            "P",
            "IT",
            "light_positions",
            "light_colors",
            "ka",
            "kd",
            "ks",
            "s",
        ])
    }

    /// Program that winds the helicoid into a spiral and animates it by `time`.
    pub fn spiral() -> Self {
        Self::new("spiral").with_attributes(&["aPos", "aNor", "aTex"]).with_uniforms(&[
            "MV",
            "P",
            "IT",
            "time",
            "light_positions",
            "light_colors",
            "ka",
            "kd",
            "ks",
            "s",
        ])
    }
}

impl ShaderProgram for NamedProgram {
    fn name(&self) -> &str { &self.name }

    fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.iter().position(|a| a == name).map(|i| i as u32)
    }

    fn uniform(&self, name: &str) -> Option<u32> {
        self.uniforms.iter().position(|u| u == name).map(|i| i as u32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    Vertices { data: Vec<f32>, components: u32 },
    Indices(Vec<u32>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Upload { buffer: BufferId, len: usize },
    UseProgram(String),
    BindAttribute { location: u32, buffer: BufferId, components: u32 },
    Uniform { location: u32, value: UniformValue },
    DrawIndexed { buffer: BufferId, count: u32 },
    UnbindAttributes,
    Release(BufferId),
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_id: u32,
    buffers: BTreeMap<BufferId, BufferData>,
    released: Vec<BufferId>,
    commands: Vec<Command>,
    upload_budget: Option<usize>,
}

impl RecordingDevice {
    pub fn new() -> Self { Self::default() }

    /// Fail every upload after the first `uploads` succeed, as an exhausted device would.
    pub fn with_upload_budget(uploads: usize) -> Self {
        Self { upload_budget: Some(uploads), ..Self::default() }
    }

    pub fn commands(&self) -> &[Command] { &self.commands }
    pub fn clear_commands(&mut self) { self.commands.clear(); }
    pub fn live_buffers(&self) -> usize { self.buffers.len() }
    pub fn buffer(&self, id: BufferId) -> Option<&BufferData> { self.buffers.get(&id) }

    pub fn uploads(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::Upload { .. })).count()
    }

    pub fn draws(&self) -> impl Iterator<Item = (BufferId, u32)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::DrawIndexed { buffer, count } => Some((*buffer, *count)),
            _ => None,
        })
    }

    fn store(&mut self, data: BufferData, len: usize) -> Result<BufferId, GpuError> {
        if let Some(budget) = self.upload_budget.as_mut() {
            if *budget == 0 {
                return Err(GpuError::Allocation("upload budget exhausted".into()));
            }
            *budget -= 1;
        }
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, data);
        self.commands.push(Command::Upload { buffer: id, len });
        Ok(id)
    }

    fn lookup(&self, id: BufferId) -> Result<&BufferData, GpuError> {
        match self.buffers.get(&id) {
            Some(b) => Ok(b),
            None if self.released.contains(&id) => Err(GpuError::Released(id.0)),
            None => Err(GpuError::UnknownBuffer(id.0)),
        }
    }
}

impl GpuDevice for RecordingDevice {
    type Program = NamedProgram;

    fn upload_vertices(&mut self, data: &[f32], components: u32) -> Result<BufferId, GpuError> {
        if data.is_empty() {
            return Err(GpuError::EmptyStream("vertex"));
        }
        if components == 0 || data.len() % components as usize != 0 {
            return Err(GpuError::RaggedStream { len: data.len(), components });
        }
        self.store(BufferData::Vertices { data: data.to_vec(), components }, data.len())
    }

    fn upload_indices(&mut self, data: &[u32]) -> Result<BufferId, GpuError> {
        if data.is_empty() {
            return Err(GpuError::EmptyStream("index"));
        }
        self.store(BufferData::Indices(data.to_vec()), data.len())
    }

    fn use_program(&mut self, program: &NamedProgram) {
        self.commands.push(Command::UseProgram(program.name.clone()));
    }

    fn bind_attribute(
        &mut self,
        location: u32,
        buffer: BufferId,
        components: u32,
    ) -> Result<(), GpuError> {
        match self.lookup(buffer)? {
            BufferData::Vertices { .. } => {}
            BufferData::Indices(_) => return Err(GpuError::UnknownBuffer(buffer.0)),
        }
        self.commands.push(Command::BindAttribute { location, buffer, components });
        Ok(())
    }

    fn set_uniform(&mut self, location: u32, value: UniformValue) {
        self.commands.push(Command::Uniform { location, value });
    }

    fn draw_indexed(&mut self, indices: BufferId, count: u32) -> Result<(), GpuError> {
        match self.lookup(indices)? {
            BufferData::Indices(data) if count as usize <= data.len() => {}
            _ => return Err(GpuError::UnknownBuffer(indices.0)),
        }
        self.commands.push(Command::DrawIndexed { buffer: indices, count });
        Ok(())
    }

    fn unbind_attributes(&mut self) {
        self.commands.push(Command::UnbindAttributes);
    }

    fn release(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        self.lookup(buffer)?;
        self.buffers.remove(&buffer);
        self.released.push(buffer);
        self.commands.push(Command::Release(buffer));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Attribute, HelicoidSurface, ProceduralSurface, SphereSurface};
    use crate::render::GpuMesh;

    #[test]
    fn sphere_uploads_four_streams_once() {
        let sphere = SphereSurface::new(1.0).unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, sphere.mesh(), sphere.bound_attributes()).unwrap();
        assert_eq!(dev.uploads(), 4);
        assert_eq!(dev.live_buffers(), 4);
        assert_eq!(gpu.index_count(), 14406);
        match dev.buffer(gpu.buffer(Attribute::Position).unwrap()) {
            Some(BufferData::Vertices { data, components: 3 }) => assert_eq!(data.len(), 7500),
            other => panic!("unexpected position buffer {other:?}"),
        }
    }

    #[test]
    fn missing_attributes_are_skipped_not_fatal() {
        let sphere = SphereSurface::new(1.0).unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, sphere.mesh(), sphere.bound_attributes()).unwrap();
        let positions_only = NamedProgram::new("flat").with_attributes(&["aPos"]);
        dev.clear_commands();
        let bound = gpu.draw(&mut dev, &positions_only).unwrap();
        assert_eq!(bound, vec![Attribute::Position]);
        assert_eq!(dev.draws().collect::<Vec<_>>(), vec![(gpu.index_buffer(), 14406)]);
    }

    #[test]
    fn sphere_never_binds_texcoords() {
        let sphere = SphereSurface::new(1.0).unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, sphere.mesh(), sphere.bound_attributes()).unwrap();
        let bound = gpu.draw(&mut dev, &NamedProgram::spiral()).unwrap();
        assert_eq!(bound, vec![Attribute::Position, Attribute::Normal]);
    }

    #[test]
    fn helicoid_binds_positions_only() {
        let spiral = HelicoidSurface::new().unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, spiral.mesh(), spiral.bound_attributes()).unwrap();
        dev.clear_commands();
        gpu.draw(&mut dev, &NamedProgram::spiral()).unwrap();
        assert_eq!(
            dev.commands(),
            &[
                Command::BindAttribute {
                    location: 0,
                    buffer: gpu.buffer(Attribute::Position).unwrap(),
                    components: 3,
                },
                Command::DrawIndexed { buffer: gpu.index_buffer(), count: 11466 },
                Command::UnbindAttributes,
            ]
        );
    }

    #[test]
    fn failed_upload_leaves_nothing_behind() {
        let sphere = SphereSurface::new(1.0).unwrap();
        let mut dev = RecordingDevice::with_upload_budget(2);
        let err = GpuMesh::upload(&mut dev, sphere.mesh(), sphere.bound_attributes()).unwrap_err();
        assert!(matches!(err, GpuError::Allocation(_)));
        assert_eq!(dev.live_buffers(), 0);
    }

    #[test]
    fn released_buffers_cannot_be_drawn() {
        let spiral = HelicoidSurface::new().unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, spiral.mesh(), spiral.bound_attributes()).unwrap();
        let ib = gpu.index_buffer();
        gpu.release(&mut dev).unwrap();
        assert_eq!(dev.live_buffers(), 0);
        assert_eq!(dev.draw_indexed(ib, 6), Err(GpuError::Released(ib.0)));
    }

    #[test]
    fn failed_release_still_frees_the_other_streams() {
        let sphere = SphereSurface::new(1.0).unwrap();
        let mut dev = RecordingDevice::new();
        let gpu = GpuMesh::upload(&mut dev, sphere.mesh(), sphere.bound_attributes()).unwrap();
        let ib = gpu.index_buffer();
        dev.release(gpu.buffer(Attribute::Normal).unwrap()).unwrap();
        let normals = gpu.buffer(Attribute::Normal).unwrap();
        assert_eq!(gpu.release(&mut dev), Err(GpuError::Released(normals.0)));
        assert_eq!(dev.live_buffers(), 0);
        assert!(dev.commands().contains(&Command::Release(ib)));
    }

    #[test]
    fn ragged_streams_are_rejected() {
        let mut dev = RecordingDevice::new();
        assert_eq!(
            dev.upload_vertices(&[0.0; 7], 3),
            Err(GpuError::RaggedStream { len: 7, components: 3 })
        );
        assert_eq!(dev.upload_indices(&[]), Err(GpuError::EmptyStream("index")));
    }

    #[test]
    fn uniform_locations_follow_declaration_order() {
        let p = NamedProgram::spiral();
        assert_eq!(p.uniform("MV"), Some(0));
        assert_eq!(p.uniform("time"), Some(3));
        assert_eq!(p.uniform("window_size"), None);
        assert_eq!(NamedProgram::lit().attribute("aTex"), None);
    }
}
