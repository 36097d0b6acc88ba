//! Tool configuration and the asset manifest.
//!
//! Both are plain JSON files. Every `ForgeConfig` field has a default so an
//! empty object is a valid config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// First texture unit handed to material textures unless configured.
pub const DEFAULT_TEXTURE_UNIT: u32 = 8;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Base directory for manifest-relative paths.
    pub asset_root: PathBuf,
    /// Manifest path, relative to `asset_root` unless absolute.
    pub manifest: PathBuf,
    pub texture_unit: u32,
    /// Write a portable mesh next to each imported glTF source.
    pub cache_meshes: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            manifest: PathBuf::from("assets.json"),
            texture_unit: DEFAULT_TEXTURE_UNIT,
            cache_meshes: true,
        }
    }
}

impl ForgeConfig {
    /// Load a config file. Relative `asset_root` values resolve against the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: ForgeConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        if config.asset_root.is_relative() {
            let base = path.parent().unwrap_or(Path::new("."));
            config.asset_root = base.join(&config.asset_root);
        }
        Ok(config)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.asset_root.join(&self.manifest)
    }

    pub fn load_manifest(&self) -> Result<AssetManifest> {
        AssetManifest::load(&self.manifest_path())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Material,
    PixelShader,
    Mesh,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ManifestEntry {
    pub kind: AssetKind,
    /// JSON description (material, shader property schema, mesh metadata).
    pub metadata: PathBuf,
    /// GLSL fragment for shaders; `.gltf` or portable mesh for meshes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AssetManifest {
    #[serde(default)]
    pub assets: BTreeMap<String, ManifestEntry>,
}

impl AssetManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read asset manifest {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse asset manifest {}", path.display()))
    }

    pub fn get(&self, asset_id: &str) -> Option<&ManifestEntry> {
        self.assets.get(asset_id)
    }
}
