//! Scene-wide render state: the device, the two programs, the scene and the
//! uploaded mesh for every scene asset.

use glam::{Mat4, Vec3};
use log::{debug, info};

use super::{GpuDevice, GpuMesh, UniformValue};
use crate::config::MAX_LIGHTS;
use crate::error::GpuError;
use crate::scene::{AssetId, Light, Material, MeshAsset, Scene};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub indices: u64,
    /// Attribute bindings skipped because the program does not declare them.
    pub skipped_bindings: usize,
}

struct DrawUniforms<'a> {
    proj: Mat4,
    model_view: Mat4,
    light_positions: &'a [Vec3],
    light_colors: &'a [Vec3],
    material: Material,
    time: Option<f32>,
}

pub struct RenderContext<D: GpuDevice> {
    device: D,
    lit: D::Program,
    spiral: D::Program,
    scene: Scene,
    meshes: Vec<GpuMesh>,
}

impl<D: GpuDevice> RenderContext<D> {
    /// Upload every scene asset once; see [`upload_assets`].
    pub fn new(
        mut device: D,
        lit: D::Program,
        spiral: D::Program,
        scene: Scene,
    ) -> Result<Self, GpuError> {
        let meshes = upload_assets(&mut device, &scene)?;
        info!("render context ready: {} meshes, {} objects", meshes.len(), scene.objects().len());
        Ok(Self { device, lit, spiral, scene, meshes })
    }

    pub fn device(&self) -> &D { &self.device }
    pub fn device_mut(&mut self) -> &mut D { &mut self.device }
    pub fn scene(&self) -> &Scene { &self.scene }
    pub fn mesh(&self, id: AssetId) -> &GpuMesh { &self.meshes[id.index()] }

    /// Issue every draw of one frame at time `t`.
    pub fn render_frame(&mut self, t: f32, view: Mat4, proj: Mat4) -> Result<FrameStats, GpuError> {
        let mut stats = FrameStats::default();
        let lights = self.scene.lights();
        let light_positions = padded(lights.iter().map(|l| view.transform_point3(l.position)));
        let light_colors = padded(lights.iter().map(|l| l.color));
        let uniforms = |model: Mat4, material: Material, time: Option<f32>| DrawUniforms {
            proj,
            model_view: view * model,
            light_positions: &light_positions,
            light_colors: &light_colors,
            material,
            time,
        };

        let floor = self.scene.floor();
        let u = uniforms(self.scene.floor_matrix(), floor.material, None);
        let floor_mesh = &self.meshes[floor.asset.index()];
        draw_with(&mut self.device, &self.lit, floor_mesh, &u, &mut stats)?;

        let marker = &self.meshes[self.scene.light_marker().index()];
        for light in self.scene.lights() {
            let u = uniforms(self.scene.light_marker_matrix(light), marker_material(light), None);
            draw_with(&mut self.device, &self.lit, marker, &u, &mut stats)?;
        }

        for placement in self.scene.objects() {
            let model = self.scene.model_matrix(placement, t);
            let mesh = &self.meshes[placement.asset.index()];
            match self.scene.asset(placement.asset) {
                MeshAsset::Helicoid(_) => {
                    let u = uniforms(model, placement.material, Some(t));
                    draw_with(&mut self.device, &self.spiral, mesh, &u, &mut stats)?;
                }
                MeshAsset::Static(_) | MeshAsset::Sphere(_) => {
                    let u = uniforms(model, placement.material, None);
                    draw_with(&mut self.device, &self.lit, mesh, &u, &mut stats)?;
                }
            }
        }
        debug!("frame t={t:.3}: {} draws, {} indices", stats.draw_calls, stats.indices);
        Ok(stats)
    }

    /// Release every GPU buffer and hand the device back. Every mesh is
    /// released even if one fails; the first error is returned.
    pub fn teardown(mut self) -> Result<D, GpuError> {
        let mut first = Ok(());
        for mesh in self.meshes.drain(..) {
            if let Err(e) = mesh.release(&mut self.device) {
                first = first.and(Err(e));
            }
        }
        info!("render context released");
        first.map(|()| self.device)
    }
}

/// Upload each scene asset once, in arena order. If any upload fails, every
/// mesh uploaded so far is released before the error is returned.
pub fn upload_assets<D: GpuDevice>(
    device: &mut D,
    scene: &Scene,
) -> Result<Vec<GpuMesh>, GpuError> {
    let mut meshes = Vec::with_capacity(scene.assets().len());
    for asset in scene.assets() {
        match GpuMesh::upload(device, asset.data(), asset.bound_attributes()) {
            Ok(mesh) => meshes.push(mesh),
            Err(e) => {
                for mesh in meshes {
                    // the upload error is the one worth reporting
                    let _ = mesh.release(device);
                }
                return Err(e);
            }
        }
        debug!("uploaded asset '{}'", asset.name());
    }
    Ok(meshes)
}

fn marker_material(light: &Light) -> Material {
    Material { ambient: light.color, diffuse: Vec3::ZERO, specular: Vec3::ZERO, shininess: 1.0 }
}

fn padded(values: impl Iterator<Item = Vec3>) -> Vec<Vec3> {
    let mut out: Vec<Vec3> = values.take(MAX_LIGHTS).collect();
    out.resize(MAX_LIGHTS, Vec3::ZERO);
    out
}

fn draw_with<D: GpuDevice>(
    device: &mut D,
    program: &D::Program,
    mesh: &GpuMesh,
    u: &DrawUniforms<'_>,
    stats: &mut FrameStats,
) -> Result<(), GpuError> {
    device.use_program(program);
    device.set_named_uniform(program, "P", UniformValue::Mat4(u.proj));
    device.set_named_uniform(program, "MV", UniformValue::Mat4(u.model_view));
    let normal_matrix = u.model_view.transpose().inverse();
    device.set_named_uniform(program, "IT", UniformValue::Mat4(normal_matrix));
    let positions = UniformValue::Vec3Array(u.light_positions.to_vec());
    device.set_named_uniform(program, "light_positions", positions);
    let colors = UniformValue::Vec3Array(u.light_colors.to_vec());
    device.set_named_uniform(program, "light_colors", colors);
    device.set_named_uniform(program, "ka", UniformValue::Vec3(u.material.ambient));
    device.set_named_uniform(program, "kd", UniformValue::Vec3(u.material.diffuse));
    device.set_named_uniform(program, "ks", UniformValue::Vec3(u.material.specular));
    device.set_named_uniform(program, "s", UniformValue::F32(u.material.shininess));
    if let Some(t) = u.time {
        device.set_named_uniform(program, "time", UniformValue::F32(t));
    }
    let bound = mesh.draw(device, program)?;
    stats.draw_calls += 1;
    stats.indices += mesh.index_count() as u64;
    stats.skipped_bindings += mesh.attributes().len() - bound.len();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::render::headless::{Command, NamedProgram, RecordingDevice};
    use crate::render::ShaderProgram;
    use crate::scene::StaticMeshes;

    fn scene() -> Scene {
        Scene::from_config(&SceneConfig::default(), StaticMeshes::procedural().unwrap()).unwrap()
    }

    fn context(device: RecordingDevice) -> Result<RenderContext<RecordingDevice>, GpuError> {
        RenderContext::new(device, NamedProgram::lit(), NamedProgram::spiral(), scene())
    }

    fn camera() -> (Mat4, Mat4) {
        let view = Mat4::look_at_rh(Vec3::new(4.5, 8.0, 20.0), Vec3::new(4.5, 0.0, 4.5), Vec3::Y);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 640.0 / 480.0, 0.1, 100.0);
        (view, proj)
    }

    #[test]
    fn each_asset_is_uploaded_once() {
        let mut ctx = context(RecordingDevice::new()).unwrap();
        assert_eq!(ctx.device().uploads(), 6 * 4);
        let (view, proj) = camera();
        ctx.render_frame(0.0, view, proj).unwrap();
        ctx.render_frame(0.5, view, proj).unwrap();
        assert_eq!(ctx.device().uploads(), 6 * 4);
    }

    #[test]
    fn frame_draws_floor_lights_and_objects() {
        let mut ctx = context(RecordingDevice::new()).unwrap();
        let (view, proj) = camera();
        let stats = ctx.render_frame(1.0, view, proj).unwrap();
        assert_eq!(stats.draw_calls, 1 + 10 + 100);
        assert_eq!(stats.skipped_bindings, 0);
        let spiral_draws = ctx
            .device()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::UseProgram(p) if p == "spiral"))
            .count();
        assert_eq!(spiral_draws, 25);
    }

    #[test]
    fn spiral_program_receives_time() {
        let mut ctx = context(RecordingDevice::new()).unwrap();
        let (view, proj) = camera();
        ctx.device_mut().clear_commands();
        ctx.render_frame(2.25, view, proj).unwrap();
        let time_loc = NamedProgram::spiral().uniform("time").unwrap();
        let cmds = ctx.device().commands();
        let start =
            cmds.iter().position(|c| matches!(c, Command::UseProgram(p) if p == "spiral")).unwrap();
        let time = Command::Uniform { location: time_loc, value: UniformValue::F32(2.25) };
        assert!(cmds[start..]
            .iter()
            .take_while(|c| !matches!(c, Command::DrawIndexed { .. }))
            .any(|c| *c == time));
    }

    #[test]
    fn light_arrays_are_padded_to_shader_size() {
        let mut ctx = context(RecordingDevice::new()).unwrap();
        let (view, proj) = camera();
        ctx.device_mut().clear_commands();
        ctx.render_frame(0.0, view, proj).unwrap();
        let loc = NamedProgram::lit().uniform("light_colors").unwrap();
        let colors = ctx.device().commands().iter().find_map(|c| match c {
            Command::Uniform { location, value: UniformValue::Vec3Array(v) }
                if *location == loc =>
            {
                Some(v.clone())
            }
            _ => None,
        });
        assert_eq!(colors.unwrap().len(), MAX_LIGHTS);
    }

    #[test]
    fn teardown_releases_everything() {
        let ctx = context(RecordingDevice::new()).unwrap();
        let device = ctx.teardown().unwrap();
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn exhausted_device_fails_construction() {
        // enough for two assets and part of the third
        let err = context(RecordingDevice::with_upload_budget(10)).err().unwrap();
        assert!(matches!(err, GpuError::Allocation(_)));
    }

    #[test]
    fn failed_asset_upload_releases_earlier_assets() {
        let mut device = RecordingDevice::with_upload_budget(10);
        let err = upload_assets(&mut device, &scene()).unwrap_err();
        assert!(matches!(err, GpuError::Allocation(_)));
        assert_eq!(device.uploads(), 10);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn teardown_keeps_releasing_after_a_failure() {
        let mut ctx = context(RecordingDevice::new()).unwrap();
        let marker = ctx.scene().light_marker();
        let ib = ctx.mesh(marker).index_buffer();
        ctx.device_mut().release(ib).unwrap();
        let err = ctx.teardown().unwrap_err();
        assert_eq!(err, GpuError::Released(ib.0));
    }
}
