use anyhow::Result;
use clap::{Parser, Subcommand};
use glam::{Mat4, Vec3};
use lattice_core::config::{self, SceneConfig};
use lattice_core::export::MeshStats;
use lattice_core::mesh::{
    HelicoidParams, HelicoidSurface, ProceduralSurface, SphereParams, SphereSurface,
};
use lattice_core::render::context::RenderContext;
use lattice_core::render::headless::{NamedProgram, RecordingDevice};
use lattice_core::scene::{Scene, StaticMeshes};
use lattice_core::VERSION;
use log::info;

#[derive(Parser, Debug)]
#[command(
    name = "lattice",
    version = VERSION,
    about = "Procedural grid meshes and a headless scene driver"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a UV sphere and print its statistics
    Sphere {
        #[arg(long, default_value_t = 1.0)]
        radius: f64,
        #[arg(long, default_value_t = 50)]
        intervals: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate the helicoid lattice and print its statistics
    Helicoid {
        #[arg(long, default_value_t = 10.0)]
        radial_extent: f64,
        #[arg(long, default_value_t = 0.2)]
        radial_step: f64,
        #[arg(long, default_value_t = 40)]
        intervals: usize,
        #[arg(long)]
        json: bool,
    },
    /// Build the scene and render frames on the recording device
    Scene {
        /// Scene YAML; built-in defaults when omitted
        #[arg(long)]
        config: Option<String>,
        #[arg(long, default_value_t = 3)]
        frames: u32,
        #[arg(long, default_value_t = 1.0 / 60.0)]
        time_step: f32,
    },
    /// List Vulkan devices (requires --features vulkan)
    #[cfg(feature = "vulkan")]
    VkInfo,
    /// Upload the sphere and helicoid into Vulkan buffers, capture a draw of each, release them
    #[cfg(feature = "vulkan")]
    VkUpload,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();
}

fn print_stats(stats: &MeshStats, json: bool) -> Result<()> {
    if json {
        println!("{}", stats.to_json()?);
        return Ok(());
    }
    println!("{}: {}x{} lattice", stats.kind, stats.rows, stats.cols);
    println!("  vertices: {}", stats.vertices);
    println!("  indices: {} ({} triangles)", stats.indices, stats.triangles);
    println!("  lowest y: {:.4}", stats.lowest_y);
    println!("  bounds: {:?} .. {:?}", stats.bounds_min, stats.bounds_max);
    println!("  wrap: u={} v={}", stats.wrap_u, stats.wrap_v);
    Ok(())
}

fn run_scene(config: Option<String>, frames: u32, time_step: f32) -> Result<()> {
    let cfg = match config {
        Some(path) => config::load_from_path(&path)?,
        None => SceneConfig::default(),
    };
    let scene = Scene::from_config(&cfg, StaticMeshes::procedural()?)?;
    let device = RecordingDevice::new();
    let mut ctx = RenderContext::new(device, NamedProgram::lit(), NamedProgram::spiral(), scene)?;
    let assets = ctx.scene().assets().len();
    println!("uploaded {} buffers for {} assets", ctx.device().uploads(), assets);

    let far_corner = Vec3::new(cfg.grid.width as f32 - 1.0, 0.0, cfg.grid.depth as f32 - 1.0);
    let center = far_corner * cfg.grid.spacing * 0.5;
    let view = Mat4::look_at_rh(center + Vec3::new(0.0, 8.0, 15.0), center, Vec3::Y);
    let proj = Mat4::perspective_rh(45f32.to_radians(), 640.0 / 480.0, 0.001, 100.0);
    for frame in 0..frames {
        let t = frame as f32 * time_step;
        ctx.device_mut().clear_commands();
        let stats = ctx.render_frame(t, view, proj)?;
        println!(
            "frame {frame} t={t:.3}: {} draws, {} indices, {} skipped bindings",
            stats.draw_calls, stats.indices, stats.skipped_bindings
        );
    }
    let device = ctx.teardown()?;
    info!("teardown left {} live buffers", device.live_buffers());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Sphere { radius, intervals, json } => {
            let sphere = SphereSurface::with_params(SphereParams { radius, intervals })?;
            print_stats(&MeshStats::of("sphere", sphere.mesh()), json)?;
        }
        Command::Helicoid { radial_extent, radial_step, intervals, json } => {
            let params = HelicoidParams { radial_extent, radial_step, intervals };
            let helicoid = HelicoidSurface::with_params(params)?;
            print_stats(&MeshStats::of("helicoid", helicoid.mesh()), json)?;
        }
        Command::Scene { config, frames, time_step } => run_scene(config, frames, time_step)?,
        #[cfg(feature = "vulkan")]
        Command::VkInfo => {
            let list = lattice_core::render::vk::enumerate_devices()?;
            if list.is_empty() { println!("No Vulkan devices found"); }
            for (i, d) in list.iter().enumerate() { println!("[{}] {}", i, d); }
        }
        #[cfg(feature = "vulkan")]
        Command::VkUpload => {
            use lattice_core::render::{vk, GpuDevice, GpuMesh, UniformValue};
            let ctx = vk::VkContext::new("lattice-upload")?;
            println!("Using {}", ctx.device_name());
            let mut device = vk::VkDevice::new(&ctx);
            let program = vk::VkProgram::new("lit", &["aPos", "aNor"], &["MV", "P"]);
            let sphere = SphereSurface::new(1.0)?;
            let helicoid = HelicoidSurface::new()?;
            let surfaces: [(&str, &dyn ProceduralSurface); 2] =
                [("sphere", &sphere), ("helicoid", &helicoid)];
            let mut meshes = Vec::with_capacity(surfaces.len());
            for (name, surface) in surfaces {
                let attrs = surface.bound_attributes();
                let mesh = GpuMesh::upload(&mut device, surface.mesh(), attrs)?;
                device.use_program(&program);
                device.set_named_uniform(&program, "MV", UniformValue::Mat4(Mat4::IDENTITY));
                device.set_named_uniform(&program, "P", UniformValue::Mat4(Mat4::IDENTITY));
                let bound = mesh.draw(&mut device, &program)?;
                println!("{name}: bound {:?}", bound);
                meshes.push(mesh);
            }
            for draw in device.take_draws() {
                println!(
                    "draw '{}': {} vertex bindings, {} uniforms, {} indices",
                    draw.program,
                    draw.vertex_buffers.len(),
                    draw.uniforms.len(),
                    draw.index_count
                );
            }
            for mesh in meshes {
                mesh.release(&mut device)?;
            }
            println!("Released; {} buffers live", device.live_buffers());
        }
    }
    Ok(())
}
