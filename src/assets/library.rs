//! Asset sources and the loader that hands out shared asset handles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde_json::Value;

use crate::assets::custom_asset::CustomAsset;
use crate::assets::material::MaterialData;
use crate::assets::shader::PixelShaderData;
use crate::config::{AssetKind, AssetManifest, ForgeConfig, ManifestEntry};
use crate::error::{AssetError, Result};
use crate::mesh::{self, GLB_MAGIC, MeshData};

/// Outcome of reading an asset from its library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadInfo {
    /// Zero means nothing was read.
    pub bytes_loaded: usize,
    /// Newest modification time among the files the asset was built from.
    pub last_modified: SystemTime,
}

#[derive(Clone, Debug)]
pub struct Loaded<T> {
    pub info: LoadInfo,
    pub data: T,
}

/// Where asset data comes from. Implementations build fresh values on every
/// call and keep no references to them.
pub trait AssetLibrary: Send + Sync {
    fn load_material(&self, asset_id: &str) -> Result<Loaded<MaterialData>>;
    fn load_pixel_shader(&self, asset_id: &str) -> Result<Loaded<PixelShaderData>>;
    fn load_mesh(&self, asset_id: &str) -> Result<Loaded<MeshData>>;
}

/// Asset types a [`CustomAsset`] slot can load.
pub trait LoadableAsset: Send + Sync + Sized + 'static {
    const KIND: &'static str;
    fn load(library: &dyn AssetLibrary, asset_id: &str) -> Result<Loaded<Self>>;
}

impl LoadableAsset for MaterialData {
    const KIND: &'static str = "material";
    fn load(library: &dyn AssetLibrary, asset_id: &str) -> Result<Loaded<Self>> {
        library.load_material(asset_id)
    }
}

impl LoadableAsset for PixelShaderData {
    const KIND: &'static str = "pixel shader";
    fn load(library: &dyn AssetLibrary, asset_id: &str) -> Result<Loaded<Self>> {
        library.load_pixel_shader(asset_id)
    }
}

impl LoadableAsset for MeshData {
    const KIND: &'static str = "mesh";
    fn load(library: &dyn AssetLibrary, asset_id: &str) -> Result<Loaded<Self>> {
        library.load_mesh(asset_id)
    }
}

/// Library backed by a manifest and files under one root directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssetLibrary {
    root: PathBuf,
    manifest: AssetManifest,
    cache_meshes: bool,
}

impl DirectoryAssetLibrary {
    pub fn new(root: impl Into<PathBuf>, manifest: AssetManifest) -> Self {
        Self {
            root: root.into(),
            manifest,
            cache_meshes: true,
        }
    }

    pub fn open(config: &ForgeConfig) -> anyhow::Result<Self> {
        let manifest = config.load_manifest()?;
        log::info!(
            "asset library at {} with {} asset(s)",
            config.asset_root.display(),
            manifest.assets.len()
        );
        Ok(Self {
            root: config.asset_root.clone(),
            manifest,
            cache_meshes: config.cache_meshes,
        })
    }

    pub fn with_mesh_cache(mut self, enabled: bool) -> Self {
        self.cache_meshes = enabled;
        self
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn entry(&self, asset_id: &str, kind: AssetKind) -> Result<&ManifestEntry> {
        let entry = self
            .manifest
            .get(asset_id)
            .ok_or_else(|| AssetError::NotFound(asset_id.to_string()))?;
        if entry.kind != kind {
            return Err(AssetError::schema(
                asset_id,
                "kind",
                format!("{kind:?}, found {:?}", entry.kind),
            ));
        }
        Ok(entry)
    }

    fn source_path(&self, asset_id: &str, entry: &ManifestEntry) -> Result<PathBuf> {
        entry
            .source
            .as_deref()
            .map(|p| self.resolve(p))
            .ok_or_else(|| AssetError::schema(asset_id, "source", "a file path"))
    }

    fn load_mesh_source(&self, source: &Path) -> Result<(MeshData, usize)> {
        let glb = || {
            AssetError::unsupported(
                source.display().to_string(),
                "binary glTF (.glb) is not supported",
            )
        };
        match source.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") => {}
            Some(ext) if ext.eq_ignore_ascii_case("glb") => return Err(glb()),
            _ => {
                let bytes = std::fs::read(source)?;
                if bytes.starts_with(GLB_MAGIC) {
                    return Err(glb());
                }
                return Ok((mesh::from_portable_bytes(&bytes)?, bytes.len()));
            }
        }

        let cache_path = source.with_extension("pmesh");
        if self.cache_meshes && is_fresh(&cache_path, source) {
            let bytes = std::fs::read(&cache_path)?;
            match mesh::from_portable_bytes(&bytes) {
                Ok(data) => return Ok((data, bytes.len())),
                Err(e) => log::warn!("ignoring stale mesh cache {}: {e}", cache_path.display()),
            }
        }

        let bytes_loaded = std::fs::metadata(source)?.len() as usize;
        let data = mesh::import_gltf_file(source)?;
        if self.cache_meshes {
            match std::fs::write(&cache_path, mesh::to_portable_bytes(&data)) {
                Ok(()) => log::debug!("wrote mesh cache {}", cache_path.display()),
                Err(e) => log::warn!("failed to write mesh cache {}: {e}", cache_path.display()),
            }
        }
        Ok((data, bytes_loaded))
    }
}

/// `cache` exists and is at least as new as `source`.
fn is_fresh(cache: &Path, source: &Path) -> bool {
    let (Ok(cache_time), Ok(source_time)) = (modified(cache), modified(source)) else {
        return false;
    };
    cache_time >= source_time
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

fn read_json(path: &Path) -> Result<(Value, usize)> {
    let bytes = std::fs::read(path)?;
    let value = serde_json::from_slice(&bytes)?;
    Ok((value, bytes.len()))
}

impl AssetLibrary for DirectoryAssetLibrary {
    fn load_material(&self, asset_id: &str) -> Result<Loaded<MaterialData>> {
        let entry = self.entry(asset_id, AssetKind::Material)?;
        let path = self.resolve(&entry.metadata);
        let (json, bytes_loaded) = read_json(&path)?;
        let data = MaterialData::from_json(asset_id, &json)?;
        Ok(Loaded {
            info: LoadInfo {
                bytes_loaded,
                last_modified: modified(&path)?,
            },
            data,
        })
    }

    fn load_pixel_shader(&self, asset_id: &str) -> Result<Loaded<PixelShaderData>> {
        let entry = self.entry(asset_id, AssetKind::PixelShader)?;
        let metadata_path = self.resolve(&entry.metadata);
        let source_path = self.source_path(asset_id, entry)?;
        let (json, metadata_len) = read_json(&metadata_path)?;
        let source = std::fs::read_to_string(&source_path)?;
        let bytes_loaded = metadata_len + source.len();
        let last_modified = modified(&metadata_path)?.max(modified(&source_path)?);
        let data = PixelShaderData::from_json(asset_id, &json, source)?;
        Ok(Loaded {
            info: LoadInfo {
                bytes_loaded,
                last_modified,
            },
            data,
        })
    }

    fn load_mesh(&self, asset_id: &str) -> Result<Loaded<MeshData>> {
        let entry = self.entry(asset_id, AssetKind::Mesh)?;
        let metadata_path = self.resolve(&entry.metadata);
        let source_path = self.source_path(asset_id, entry)?;
        let (json, metadata_len) = read_json(&metadata_path)?;
        let mapping = MeshData::metadata_from_json(asset_id, &json)?;
        let (mut data, source_len) = self.load_mesh_source(&source_path)?;
        data.apply_material_mapping(mapping);
        Ok(Loaded {
            info: LoadInfo {
                bytes_loaded: metadata_len + source_len,
                last_modified: modified(&metadata_path)?.max(modified(&source_path)?),
            },
            data,
        })
    }
}

type HandleCache<T> = Mutex<HashMap<String, Arc<CustomAsset<T>>>>;

/// Hands out one shared handle per asset id and kind, loading it on first
/// request.
pub struct AssetLoader {
    library: Arc<dyn AssetLibrary>,
    materials: HandleCache<MaterialData>,
    shaders: HandleCache<PixelShaderData>,
    meshes: HandleCache<MeshData>,
}

impl AssetLoader {
    pub fn new(library: Arc<dyn AssetLibrary>) -> Self {
        Self {
            library,
            materials: Mutex::default(),
            shaders: Mutex::default(),
            meshes: Mutex::default(),
        }
    }

    pub fn library(&self) -> &Arc<dyn AssetLibrary> {
        &self.library
    }

    pub fn load_material(&self, asset_id: &str) -> Arc<CustomAsset<MaterialData>> {
        self.get_or_load(&self.materials, asset_id)
    }

    pub fn load_pixel_shader(&self, asset_id: &str) -> Arc<CustomAsset<PixelShaderData>> {
        self.get_or_load(&self.shaders, asset_id)
    }

    pub fn load_mesh(&self, asset_id: &str) -> Arc<CustomAsset<MeshData>> {
        self.get_or_load(&self.meshes, asset_id)
    }

    /// Reload every handle issued for `asset_id`. Returns false when none exist.
    pub fn reload(&self, asset_id: &str) -> bool {
        let mut found = false;
        if let Some(handle) = cached(&self.materials, asset_id) {
            self.load_into(&handle);
            found = true;
        }
        if let Some(handle) = cached(&self.shaders, asset_id) {
            self.load_into(&handle);
            found = true;
        }
        if let Some(handle) = cached(&self.meshes, asset_id) {
            self.load_into(&handle);
            found = true;
        }
        found
    }

    fn get_or_load<T: LoadableAsset>(
        &self,
        cache: &HandleCache<T>,
        asset_id: &str,
    ) -> Arc<CustomAsset<T>> {
        let handle = {
            let Ok(mut map) = cache.lock() else {
                return Arc::new(CustomAsset::new(asset_id));
            };
            if let Some(existing) = map.get(asset_id) {
                return Arc::clone(existing);
            }
            let handle = Arc::new(CustomAsset::new(asset_id));
            map.insert(asset_id.to_string(), Arc::clone(&handle));
            handle
        };
        self.load_into(&handle);
        handle
    }

    fn load_into<T: LoadableAsset>(&self, handle: &CustomAsset<T>) {
        if let Err(e) = handle.load(self.library.as_ref()) {
            log::error!("failed to load {} '{}': {e}", T::KIND, handle.asset_id());
        }
    }
}

fn cached<T>(cache: &HandleCache<T>, asset_id: &str) -> Option<Arc<CustomAsset<T>>> {
    cache.lock().ok()?.get(asset_id).cloned()
}
