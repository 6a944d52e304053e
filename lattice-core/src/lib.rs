pub mod config;
pub mod error;
pub mod export;
pub mod mesh;
pub mod render;
pub mod scene;

pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
