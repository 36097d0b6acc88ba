pub mod assets;
pub mod config;
pub mod error;
pub mod math;
pub mod mesh;
pub mod shader;

pub use error::{AssetError, Result};
