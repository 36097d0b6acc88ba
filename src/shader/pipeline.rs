//! A custom pixel shader pass kept in sync with its material and shader assets.

use std::sync::Arc;
use std::time::SystemTime;

use crate::assets::custom_asset::CustomAsset;
use crate::assets::library::AssetLoader;
use crate::assets::material::MaterialData;
use crate::assets::shader::PixelShaderData;
use crate::shader::composer::{ComposedPass, compose_pass};

/// Recomposes only when the material or shader snapshot is newer than the one
/// the cached pass was built from, or when the material switches shaders.
pub struct CustomPipeline {
    material_id: String,
    instance_index: u32,
    texture_unit: u32,
    material: Option<Arc<CustomAsset<MaterialData>>>,
    shader: Option<Arc<CustomAsset<PixelShaderData>>>,
    material_time: Option<SystemTime>,
    shader_time: Option<SystemTime>,
    composed: Option<Arc<ComposedPass>>,
}

impl CustomPipeline {
    pub fn new(material_id: impl Into<String>, instance_index: u32, texture_unit: u32) -> Self {
        Self {
            material_id: material_id.into(),
            instance_index,
            texture_unit,
            material: None,
            shader: None,
            material_time: None,
            shader_time: None,
            composed: None,
        }
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    /// Current pass, or `None` when the custom effect should be skipped.
    pub fn update(&mut self, loader: &AssetLoader) -> Option<Arc<ComposedPass>> {
        let material_asset = Arc::clone(
            self.material
                .get_or_insert_with(|| loader.load_material(&self.material_id)),
        );
        let Some(material) = material_asset.data() else {
            self.composed = None;
            return None;
        };

        let shader_changed = self
            .shader
            .as_ref()
            .is_none_or(|s| s.asset_id() != material.shader_asset);
        if shader_changed {
            self.shader = Some(loader.load_pixel_shader(&material.shader_asset));
            self.shader_time = None;
        }
        let shader_asset = Arc::clone(self.shader.as_ref()?);
        let Some(shader) = shader_asset.data() else {
            self.composed = None;
            return None;
        };

        let material_time = material_asset.last_loaded_time();
        let shader_time = shader_asset.last_loaded_time();
        let stale = shader_changed
            || material_time > self.material_time
            || shader_time > self.shader_time;
        if !stale {
            return self.composed.clone();
        }

        log::debug!(
            "recomposing pass {} for material '{}'",
            self.instance_index,
            self.material_id
        );
        self.material_time = material_time;
        self.shader_time = shader_time;
        self.composed = compose_pass(
            &self.material_id,
            &material,
            &shader,
            self.instance_index,
            self.texture_unit,
        )
        .ok()
        .map(Arc::new);
        self.composed.clone()
    }
}
