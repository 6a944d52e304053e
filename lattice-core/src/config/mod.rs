pub mod schema;

pub use schema::{
    FloorConfig, GridConfig, HelicoidConfig, LightConfig, ObjectConfig, SceneConfig, SphereConfig,
    MAX_LIGHTS,
};

use crate::error::Result;

pub fn load_from_yaml_str(s: &str) -> Result<SceneConfig> {
    let cfg: SceneConfig = serde_yaml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<SceneConfig> {
    let data = std::fs::read_to_string(path)?;
    load_from_yaml_str(&data)
}
