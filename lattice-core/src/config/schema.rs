use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mesh::{HelicoidParams, SphereParams};

/// Size of the light arrays in the shading stage.
pub const MAX_LIGHTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Seeds radius, scale and colour jitter.
    pub seed: u64,
    pub grid: GridConfig,
    pub sphere: SphereConfig,
    pub helicoid: HelicoidConfig,
    pub objects: ObjectConfig,
    pub lights: Vec<LightConfig>,
    pub floor: FloorConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            grid: GridConfig::default(),
            sphere: SphereConfig::default(),
            helicoid: HelicoidConfig::default(),
            objects: ObjectConfig::default(),
            lights: default_lights(),
            floor: FloorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub depth: u32,
    pub spacing: f32,
}

impl Default for GridConfig {
    fn default() -> Self { Self { width: 10, depth: 10, spacing: 1.0 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub intervals: usize,
    pub radius_min: f64,
    pub radius_max: f64,
    /// Extra scale applied to sphere placements on top of the object scale.
    pub placement_scale: f32,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self { intervals: 50, radius_min: 0.5, radius_max: 1.0, placement_scale: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelicoidConfig {
    #[serde(flatten)]
    pub params: HelicoidParams,
    pub placement_scale: f32,
}

impl Default for HelicoidConfig {
    fn default() -> Self { Self { params: HelicoidParams::default(), placement_scale: 0.15 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub scale_min: f32,
    pub scale_max: f32,
    pub shininess: f32,
}

impl Default for ObjectConfig {
    fn default() -> Self { Self { scale_min: 0.2, scale_max: 0.6, shininess: 10.0 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    pub translation: [f32; 3],
    pub scale: [f32; 3],
    pub shininess: f32,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self { translation: [4.5, 0.0, 4.5], scale: [12.0, 1.0, 12.0], shininess: 10.0 }
    }
}

fn default_lights() -> Vec<LightConfig> {
    let l = |position: [f32; 3], color: [f32; 3]| LightConfig { position, color };
    vec![
        l([1.5, 0.3, 1.5], [1.0, 1.0, 1.0]),
        l([3.5, 0.3, 3.5], [0.2, 1.0, 0.2]),
        l([5.5, 0.3, 5.5], [0.2, 0.2, 1.0]),
        l([7.5, 0.3, 7.5], [0.8, 0.2, 1.0]),
        l([2.5, 0.3, 1.5], [0.8, 0.3, 0.3]),
        l([8.5, 0.3, 4.5], [0.5, 0.2, 0.6]),
        l([3.5, 0.3, 9.5], [0.5, 0.3, 0.8]),
        l([6.5, 0.3, 5.5], [0.1, 0.1, 0.5]),
        l([3.5, 0.3, 8.5], [0.9, 0.2, 0.8]),
        l([2.5, 0.3, 6.5], [0.2, 0.8, 0.8]),
    ]
}

fn check_range(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ConfigError::BadRange { field, min, max })
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.width == 0 || self.grid.depth == 0 {
            return Err(ConfigError::EmptyGrid { width: self.grid.width, depth: self.grid.depth });
        }
        check_range("sphere.radius", self.sphere.radius_min as f32, self.sphere.radius_max as f32)?;
        let smallest =
            SphereParams { radius: self.sphere.radius_min, intervals: self.sphere.intervals };
        smallest.validate()?;
        self.helicoid.params.validate()?;
        check_range("objects.scale", self.objects.scale_min, self.objects.scale_max)?;
        if self.lights.len() > MAX_LIGHTS {
            return Err(ConfigError::TooManyLights { count: self.lights.len(), max: MAX_LIGHTS });
        }
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.grid.width as usize * self.grid.depth as usize
    }
}
