//! Vulkan backend using Ash (feature-gated).
//! Creates an instance, picks a physical device with a graphics queue, and
//! uploads mesh streams into host-visible buffers. Binds and draws are
//! collected into a draw list; pipelines, render passes and command
//! recording belong to the caller.

use std::collections::HashMap;
use std::ffi::CString;

use anyhow::{anyhow, Result};
use ash::vk;
use log::{debug, warn};

use super::{BufferId, GpuDevice, ShaderProgram, UniformValue};
use crate::error::GpuError;

pub struct VkContext {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub pdevice: vk::PhysicalDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
}

fn create_instance(entry: &ash::Entry, app_name: &str) -> Result<ash::Instance> {
    let app_name_c = CString::new(app_name)?;
    let engine_name_c = CString::new("lattice-core")?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_c)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&engine_name_c)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);
    let instance_ci = vk::InstanceCreateInfo::builder().application_info(&app_info);
    Ok(unsafe { entry.create_instance(&instance_ci, None)? })
}

impl VkContext {
    pub fn new(app_name: &str) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };
        let instance = create_instance(&entry, app_name)?;

        // Pick a physical device with graphics queue
        let pdevices = unsafe { instance.enumerate_physical_devices()? };
        let (pdevice, graphics_queue_family) = pdevices
            .iter()
            .find_map(|pd| {
                let families = unsafe { instance.get_physical_device_queue_family_properties(*pd) };
                families
                    .iter()
                    .enumerate()
                    .find(|(_, f)| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|(idx, _)| (*pd, idx as u32))
            })
            .ok_or_else(|| anyhow!("No suitable physical device with graphics queue"))?;

        let priorities = [1.0f32];
        let queue_ci = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&priorities)
            .build()];
        let device_ci = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_ci);
        let device = unsafe { instance.create_device(pdevice, &device_ci, None)? };
        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok(Self { entry, instance, pdevice, device, graphics_queue, graphics_queue_family })
    }

    pub fn device_name(&self) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(self.pdevice) };
        let raw = unsafe { std::ffi::CStr::from_ptr(props.device_name.as_ptr()) };
        raw.to_string_lossy().into_owned()
    }

    fn find_memory_type(&self, type_bits: u32, props: vk::MemoryPropertyFlags) -> Result<u32> {
        let mem_props =
            unsafe { self.instance.get_physical_device_memory_properties(self.pdevice) };
        for i in 0..mem_props.memory_type_count {
            let i = i as usize;
            let flags = mem_props.memory_types[i].property_flags;
            if (type_bits & (1 << i)) != 0 && flags.contains(props) {
                return Ok(i as u32);
            }
        }
        Err(anyhow!("No suitable memory type"))
    }

    /// Create a HOST_VISIBLE buffer and copy `bytes` into it.
    fn create_host_buffer(
        &self,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let size = bytes.len() as u64;
        let host_props =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let ci = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&ci, None)? };
        let req = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let memory = self
            .find_memory_type(req.memory_type_bits, host_props)
            .and_then(|ty| {
                let alloc = vk::MemoryAllocateInfo::builder()
                    .allocation_size(req.size)
                    .memory_type_index(ty);
                Ok(unsafe { self.device.allocate_memory(&alloc, None)? })
            });
        let memory = match memory {
            Ok(m) => m,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };
        let copied = unsafe {
            self.device.bind_buffer_memory(buffer, memory, 0).and_then(|_| {
                let flags = vk::MemoryMapFlags::empty();
                let p = self.device.map_memory(memory, 0, size, flags)? as *mut u8;
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), p, bytes.len());
                self.device.unmap_memory(memory);
                Ok(())
            })
        };
        if let Err(e) = copied {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(e.into());
        }
        Ok((buffer, memory))
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

pub fn enumerate_devices() -> Result<Vec<String>> {
    let entry = unsafe { ash::Entry::load()? };
    let instance = create_instance(&entry, "lattice-enum")?;
    let mut out = Vec::new();
    for pd in unsafe { instance.enumerate_physical_devices()? } {
        let props = unsafe { instance.get_physical_device_properties(pd) };
        let name = unsafe { std::ffi::CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let v = props.api_version;
        out.push(format!(
            "{} (API {}.{}.{})",
            name,
            vk::api_version_major(v),
            vk::api_version_minor(v),
            vk::api_version_patch(v)
        ));
    }
    unsafe { instance.destroy_instance(None) };
    Ok(out)
}

/// Attribute and uniform locations declared by a pipeline's shaders.
#[derive(Debug, Clone)]
pub struct VkProgram {
    name: String,
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, u32>,
}

impl VkProgram {
    /// Locations follow the order of `attributes` and `uniforms`.
    pub fn new(name: impl Into<String>, attributes: &[&str], uniforms: &[&str]) -> Self {
        let index = |names: &[&str]| -> HashMap<String, u32> {
            names.iter().enumerate().map(|(i, n)| (n.to_string(), i as u32)).collect()
        };
        Self { name: name.into(), attributes: index(attributes), uniforms: index(uniforms) }
    }
}

impl ShaderProgram for VkProgram {
    fn name(&self) -> &str { &self.name }
    fn attribute(&self, name: &str) -> Option<u32> { self.attributes.get(name).copied() }
    fn uniform(&self, name: &str) -> Option<u32> { self.uniforms.get(name).copied() }
}

/// One indexed draw captured by [`VkDevice`], ready to be recorded inside
/// the caller's render pass.
#[derive(Debug, Clone)]
pub struct VkDraw {
    pub program: String,
    /// `(binding, buffer)`; one stream per binding, so the binding is the attribute location.
    pub vertex_buffers: Vec<(u32, vk::Buffer)>,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub uniforms: Vec<(u32, UniformValue)>,
}

struct Allocation {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    usage: vk::BufferUsageFlags,
}

/// [`GpuDevice`] over a [`VkContext`].
pub struct VkDevice<'a> {
    ctx: &'a VkContext,
    next_id: u32,
    buffers: HashMap<BufferId, Allocation>,
    released: Vec<BufferId>,
    program: String,
    bindings: Vec<(u32, vk::Buffer)>,
    uniforms: Vec<(u32, UniformValue)>,
    draws: Vec<VkDraw>,
}

impl<'a> VkDevice<'a> {
    pub fn new(ctx: &'a VkContext) -> Self {
        Self {
            ctx,
            next_id: 0,
            buffers: HashMap::new(),
            released: Vec::new(),
            program: String::new(),
            bindings: Vec::new(),
            uniforms: Vec::new(),
            draws: Vec::new(),
        }
    }

    pub fn live_buffers(&self) -> usize { self.buffers.len() }

    /// Hand over every draw captured since the last call.
    pub fn take_draws(&mut self) -> Vec<VkDraw> { std::mem::take(&mut self.draws) }

    fn store(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> Result<BufferId, GpuError> {
        let (buffer, memory) = self
            .ctx
            .create_host_buffer(bytes, usage)
            .map_err(|e| GpuError::Allocation(e.to_string()))?;
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, Allocation { buffer, memory, usage });
        debug!("vk buffer {} ({} bytes, {:?})", id.0, bytes.len(), usage);
        Ok(id)
    }

    fn lookup(&self, id: BufferId, usage: vk::BufferUsageFlags) -> Result<vk::Buffer, GpuError> {
        match self.buffers.get(&id) {
            Some(a) if a.usage.contains(usage) => Ok(a.buffer),
            Some(_) => Err(GpuError::UnknownBuffer(id.0)),
            None if self.released.contains(&id) => Err(GpuError::Released(id.0)),
            None => Err(GpuError::UnknownBuffer(id.0)),
        }
    }
}

impl GpuDevice for VkDevice<'_> {
    type Program = VkProgram;

    fn upload_vertices(&mut self, data: &[f32], components: u32) -> Result<BufferId, GpuError> {
        if data.is_empty() {
            return Err(GpuError::EmptyStream("vertex"));
        }
        if components == 0 || data.len() % components as usize != 0 {
            return Err(GpuError::RaggedStream { len: data.len(), components });
        }
        self.store(bytemuck::cast_slice(data), vk::BufferUsageFlags::VERTEX_BUFFER)
    }

    fn upload_indices(&mut self, data: &[u32]) -> Result<BufferId, GpuError> {
        if data.is_empty() {
            return Err(GpuError::EmptyStream("index"));
        }
        self.store(bytemuck::cast_slice(data), vk::BufferUsageFlags::INDEX_BUFFER)
    }

    fn use_program(&mut self, program: &VkProgram) {
        self.program = program.name.clone();
        self.bindings.clear();
        self.uniforms.clear();
    }

    fn bind_attribute(
        &mut self,
        location: u32,
        buffer: BufferId,
        _components: u32,
    ) -> Result<(), GpuError> {
        let vb = self.lookup(buffer, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        self.bindings.retain(|(binding, _)| *binding != location);
        self.bindings.push((location, vb));
        Ok(())
    }

    fn set_uniform(&mut self, location: u32, value: UniformValue) {
        self.uniforms.retain(|(l, _)| *l != location);
        self.uniforms.push((location, value));
    }

    fn draw_indexed(&mut self, indices: BufferId, count: u32) -> Result<(), GpuError> {
        let ib = self.lookup(indices, vk::BufferUsageFlags::INDEX_BUFFER)?;
        self.draws.push(VkDraw {
            program: self.program.clone(),
            vertex_buffers: self.bindings.clone(),
            index_buffer: ib,
            index_count: count,
            uniforms: self.uniforms.clone(),
        });
        Ok(())
    }

    fn unbind_attributes(&mut self) {
        self.bindings.clear();
    }

    fn release(&mut self, buffer: BufferId) -> Result<(), GpuError> {
        let Some(a) = self.buffers.remove(&buffer) else {
            return Err(if self.released.contains(&buffer) {
                GpuError::Released(buffer.0)
            } else {
                GpuError::UnknownBuffer(buffer.0)
            });
        };
        // captured draws may name the buffer; it is gone once released
        self.draws.retain(|d| {
            d.index_buffer != a.buffer && d.vertex_buffers.iter().all(|(_, b)| *b != a.buffer)
        });
        unsafe {
            self.ctx.device.destroy_buffer(a.buffer, None);
            self.ctx.device.free_memory(a.memory, None);
        }
        self.released.push(buffer);
        Ok(())
    }
}

impl Drop for VkDevice<'_> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            warn!("{} vk buffers still live at drop; freeing", self.buffers.len());
        }
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            for (_, a) in self.buffers.drain() {
                self.ctx.device.destroy_buffer(a.buffer, None);
                self.ctx.device.free_memory(a.memory, None);
            }
        }
    }
}
