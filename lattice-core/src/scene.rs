//! Scene description: shared mesh assets, per-object placements and lights.
//!
//! Assets live in one arena and are referenced by [`AssetId`]; a placement
//! owns only its transform, material and motion, never vertex data.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SceneConfig;
use crate::error::{ConfigError, MeshError};
use crate::mesh::{
    generate, Attribute, GridSpec, HelicoidSurface, MeshData, ProceduralSurface, Sample,
    SphereParams, SphereSurface,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(usize);

impl AssetId {
    pub fn index(self) -> usize { self.0 }
}

/// Externally supplied mesh, e.g. a model loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMesh {
    pub name: String,
    pub data: MeshData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshAsset {
    Static(StaticMesh),
    Sphere(SphereSurface),
    Helicoid(HelicoidSurface),
}

impl MeshAsset {
    pub fn name(&self) -> &str {
        match self {
            MeshAsset::Static(m) => &m.name,
            MeshAsset::Sphere(_) => "sphere",
            MeshAsset::Helicoid(_) => "helicoid",
        }
    }

    pub fn data(&self) -> &MeshData {
        match self {
            MeshAsset::Static(m) => &m.data,
            MeshAsset::Sphere(s) => s.mesh(),
            MeshAsset::Helicoid(h) => h.mesh(),
        }
    }

    pub fn lowest_y(&self) -> f32 { self.data().lowest_y() }

    pub fn bound_attributes(&self) -> &'static [Attribute] {
        match self {
            MeshAsset::Static(_) => &[Attribute::Position, Attribute::Normal],
            MeshAsset::Sphere(s) => s.bound_attributes(),
            MeshAsset::Helicoid(h) => h.bound_attributes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

/// Animation applied to static meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Still,
    /// Rotates about Y by `t` radians.
    Spin,
    /// Shears Z by `0.5 cos t` per unit of Y.
    Shear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub asset: AssetId,
    pub translation: Vec3,
    pub scale: Vec3,
    pub material: Material,
    pub motion: Motion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
}

/// Meshes the scene needs but does not generate itself.
#[derive(Debug, Clone)]
pub struct StaticMeshes {
    pub spinning: StaticMesh,
    pub sheared: StaticMesh,
    /// Unit square in the XY plane; laid flat by the floor transform.
    pub floor: StaticMesh,
    pub light_marker: StaticMesh,
}

impl StaticMeshes {
    /// Procedural stand-ins for runs without model files.
    pub fn procedural() -> Result<Self, MeshError> {
        let ball = |name: &str, intervals: usize| -> Result<StaticMesh, MeshError> {
            let s = SphereSurface::with_params(SphereParams { radius: 1.0, intervals })?;
            Ok(StaticMesh { name: name.to_string(), data: s.mesh().data().clone() })
        };
        let square = generate(GridSpec::new(2, 2), |i, j| Sample {
            position: [j as f32 * 2.0 - 1.0, i as f32 * 2.0 - 1.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            texcoord: [j as f32, i as f32],
        })?;
        Ok(Self {
            spinning: ball("spinning", 12)?,
            sheared: ball("sheared", 8)?,
            floor: StaticMesh { name: "floor".into(), data: square.into_data() },
            light_marker: ball("light-marker", 10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    assets: Vec<MeshAsset>,
    objects: Vec<Placement>,
    floor: Placement,
    lights: Vec<Light>,
    light_marker: AssetId,
}

fn jitter<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if min < max { rng.gen_range(min..max) } else { min }
}

impl Scene {
    /// Lay out `grid.width x grid.depth` objects cycling through the spinning
    /// mesh, the sheared mesh, the sphere and the helicoid. One sphere and one
    /// helicoid are generated and shared by every placement that uses them.
    pub fn from_config(cfg: &SceneConfig, statics: StaticMeshes) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let radius = if cfg.sphere.radius_min < cfg.sphere.radius_max {
            rng.gen_range(cfg.sphere.radius_min..cfg.sphere.radius_max)
        } else {
            cfg.sphere.radius_min
        };
        let sphere =
            SphereSurface::with_params(SphereParams { radius, intervals: cfg.sphere.intervals })?;
        let helicoid = HelicoidSurface::with_params(cfg.helicoid.params)?;

        let mut assets = Vec::new();
        let mut add = |asset: MeshAsset| {
            assets.push(asset);
            AssetId(assets.len() - 1)
        };
        let spinning = add(MeshAsset::Static(statics.spinning));
        let sheared = add(MeshAsset::Static(statics.sheared));
        let floor_mesh = add(MeshAsset::Static(statics.floor));
        let light_marker = add(MeshAsset::Static(statics.light_marker));
        let sphere = add(MeshAsset::Sphere(sphere));
        let helicoid = add(MeshAsset::Helicoid(helicoid));

        let mut objects = Vec::with_capacity(cfg.object_count());
        let mut counter = 0usize;
        for i in 0..cfg.grid.width {
            for j in 0..cfg.grid.depth {
                let translation = Vec3::new(i as f32, 0.0, j as f32) * cfg.grid.spacing;
                let s = jitter(&mut rng, cfg.objects.scale_min, cfg.objects.scale_max);
                let material = Material {
                    ambient: Vec3::ZERO,
                    diffuse: Vec3::new(rng.gen(), rng.gen(), rng.gen()),
                    specular: Vec3::ONE,
                    shininess: cfg.objects.shininess,
                };
                let (asset, scale, motion) = match counter % 4 {
                    0 => (spinning, Vec3::splat(s), Motion::Spin),
                    1 => (sheared, Vec3::splat(s), Motion::Shear),
                    2 => (sphere, Vec3::splat(s * cfg.sphere.placement_scale), Motion::Still),
                    _ => (helicoid, Vec3::splat(s * cfg.helicoid.placement_scale), Motion::Still),
                };
                objects.push(Placement { asset, translation, scale, material, motion });
                counter += 1;
            }
        }

        let floor = Placement {
            asset: floor_mesh,
            translation: Vec3::from_array(cfg.floor.translation),
            scale: Vec3::from_array(cfg.floor.scale),
            material: Material {
                ambient: Vec3::ZERO,
                diffuse: Vec3::ONE,
                specular: Vec3::ONE,
                shininess: cfg.floor.shininess,
            },
            motion: Motion::Still,
        };
        let lights = cfg
            .lights
            .iter()
            .map(|l| Light {
                position: Vec3::from_array(l.position),
                color: Vec3::from_array(l.color),
            })
            .collect();

        info!(
            "scene: {} objects over {} assets, sphere radius {:.3}",
            objects.len(),
            assets.len(),
            radius
        );
        Ok(Self { assets, objects, floor, lights, light_marker })
    }

    pub fn assets(&self) -> &[MeshAsset] { &self.assets }
    pub fn asset(&self, id: AssetId) -> &MeshAsset { &self.assets[id.0] }
    pub fn objects(&self) -> &[Placement] { &self.objects }
    pub fn floor(&self) -> &Placement { &self.floor }
    pub fn lights(&self) -> &[Light] { &self.lights }
    pub fn light_marker(&self) -> AssetId { self.light_marker }

    pub fn sphere(&self) -> Option<&SphereSurface> {
        self.assets.iter().find_map(|a| match a {
            MeshAsset::Sphere(s) => Some(s),
            _ => None,
        })
    }

    /// Model transform of an object at time `t` seconds.
    pub fn model_matrix(&self, placement: &Placement, t: f32) -> Mat4 {
        let base = Mat4::from_translation(placement.translation);
        let scale = Mat4::from_scale(placement.scale);
        // rest the lowest point of the scaled mesh on y = 0
        let rest = |lowest_y: f32| {
            Mat4::from_translation(Vec3::new(0.0, -lowest_y * placement.scale.y, 0.0))
        };
        match self.asset(placement.asset) {
            MeshAsset::Static(m) => {
                let motion = match placement.motion {
                    Motion::Still => Mat4::IDENTITY,
                    Motion::Spin => Mat4::from_rotation_y(t),
                    Motion::Shear => {
                        let mut shear = Mat4::IDENTITY;
                        shear.y_axis.z = 0.5 * t.cos();
                        shear
                    }
                };
                base * rest(m.data.lowest_y()) * motion * scale
            }
            MeshAsset::Sphere(s) => {
                let phase = t + 0.9;
                let hop = 0.4 * (0.5 * (2.0 * PI / 1.7 * phase).sin() + 0.5);
                let squash = -0.5 * (0.5 * (4.0 * PI / 1.7 * phase).cos() + 0.5) + 1.0;
                base * rest(s.lowest_y())
                    * Mat4::from_translation(Vec3::new(0.0, hop, 0.0))
                    * Mat4::from_scale(Vec3::new(squash, 1.0, squash))
                    * scale
            }
            MeshAsset::Helicoid(_) => base * Mat4::from_rotation_z(0.5 * PI) * scale,
        }
    }

    pub fn floor_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.floor.translation)
            * Mat4::from_scale(self.floor.scale)
            * Mat4::from_rotation_x(3.0 * (PI / 2.0))
    }

    pub fn light_marker_matrix(&self, light: &Light) -> Mat4 {
        Mat4::from_translation(light.position) * Mat4::from_scale(Vec3::splat(0.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_scene(seed: u64) -> Scene {
        let cfg = SceneConfig { seed, ..SceneConfig::default() };
        Scene::from_config(&cfg, StaticMeshes::procedural().unwrap()).unwrap()
    }

    fn first_of(scene: &Scene, pred: fn(&MeshAsset) -> bool) -> &Placement {
        scene.objects().iter().find(|p| pred(scene.asset(p.asset))).unwrap()
    }

    #[test]
    fn grid_cycles_through_four_shapes() {
        let scene = default_scene(3);
        assert_eq!(scene.objects().len(), 100);
        let count = |pred: fn(&MeshAsset) -> bool| {
            scene.objects().iter().filter(|p| pred(scene.asset(p.asset))).count()
        };
        assert_eq!(count(|a| matches!(a, MeshAsset::Sphere(_))), 25);
        assert_eq!(count(|a| matches!(a, MeshAsset::Helicoid(_))), 25);
        assert_eq!(count(|a| matches!(a, MeshAsset::Static(_))), 50);
        assert_eq!(scene.objects()[5].motion, Motion::Shear);
        assert_eq!(scene.objects()[4].motion, Motion::Spin);
    }

    #[test]
    fn procedural_meshes_are_shared_not_copied() {
        let scene = default_scene(3);
        let spheres = scene.assets().iter().filter(|a| matches!(a, MeshAsset::Sphere(_))).count();
        let spirals = scene.assets().iter().filter(|a| matches!(a, MeshAsset::Helicoid(_))).count();
        assert_eq!((spheres, spirals), (1, 1));
        assert_eq!(scene.assets().len(), 6);
        let r = scene.sphere().unwrap().radius();
        assert!((0.5..1.0).contains(&r));
    }

    #[test]
    fn same_seed_same_scene() {
        let a = default_scene(11);
        let b = default_scene(11);
        assert_eq!(a.objects(), b.objects());
        assert_eq!(a.sphere().unwrap().radius(), b.sphere().unwrap().radius());
        let c = default_scene(12);
        assert_ne!(a.objects(), c.objects());
    }

    #[test]
    fn static_meshes_rest_on_the_ground() {
        let scene = default_scene(5);
        for p in scene.objects().iter().filter(|p| p.motion != Motion::Still) {
            let lowest = scene.asset(p.asset).lowest_y();
            let m = scene.model_matrix(p, 1.3);
            let bottom = m.transform_point3(Vec3::new(0.0, lowest, 0.0));
            assert!(bottom.y.abs() < 1e-5, "bottom at {bottom}");
        }
    }

    #[test]
    fn spheres_hop_but_never_sink() {
        let scene = default_scene(5);
        let p = first_of(&scene, |a| matches!(a, MeshAsset::Sphere(_)));
        let r = scene.sphere().unwrap().radius() as f32;
        for step in 0..40 {
            let t = step as f32 * 0.1;
            let bottom = scene.model_matrix(p, t).transform_point3(Vec3::new(0.0, -r, 0.0));
            assert!(bottom.y >= -1e-5 && bottom.y <= 0.4 + 1e-5, "t={t} bottom={bottom}");
        }
    }

    #[test]
    fn helicoid_stands_upright() {
        let scene = default_scene(5);
        let p = first_of(&scene, |a| matches!(a, MeshAsset::Helicoid(_)));
        let m = scene.model_matrix(p, 0.0);
        let tip = m.transform_point3(Vec3::X) - p.translation;
        assert!(tip.x.abs() < 1e-5);
        assert!((tip.y - p.scale.x).abs() < 1e-5);
    }

    #[test]
    fn floor_lies_flat() {
        let scene = default_scene(5);
        let m = scene.floor_matrix();
        let corner = m.transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(corner.y.abs() < 1e-5);
        assert!((corner.x - 16.5).abs() < 1e-4);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SceneConfig::default();
        cfg.grid.depth = 0;
        let err = Scene::from_config(&cfg, StaticMeshes::procedural().unwrap()).unwrap_err();
        assert_eq!(err, ConfigError::EmptyGrid { width: 10, depth: 0 });
    }
}
