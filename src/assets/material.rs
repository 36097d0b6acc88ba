//! Material descriptions: ordered property values plus the shader they feed.
//!
//! ```json
//! {
//!   "values": [
//!     { "type": "float4", "code_name": "tint", "value": [1, 0.5, 0.5, 1] },
//!     { "type": "texture_asset", "code_name": "albedo", "value": "bricks" }
//!   ],
//!   "shader_asset": "glow"
//! }
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use crate::assets::property::{MaterialProperty, PropertyType, PropertyValue};
use crate::assets::shader::{PixelShaderData, ShaderPropertyType};
use crate::error::{AssetError, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialData {
    /// Order defines uniform-buffer field order.
    pub properties: Vec<MaterialProperty>,
    pub shader_asset: String,
}

impl MaterialData {
    /// Parse a material description. Fails as a whole on the first bad field;
    /// the failure is logged here.
    pub fn from_json(asset_id: &str, json: &Value) -> Result<Self> {
        parse_material(asset_id, json).inspect_err(|e| log::error!("{e}"))
    }

    pub fn to_json(&self) -> Value {
        let values: Vec<Value> = self
            .properties
            .iter()
            .map(|prop| {
                let mut obj = Map::new();
                obj.insert("code_name".into(), json!(prop.code_name));
                obj.insert("type".into(), json!(prop.ty.name()));
                if let Some(value) = &prop.value {
                    obj.insert("value".into(), value.to_json());
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "values": values, "shader_asset": self.shader_asset })
    }

    /// Build a material with one property per shader input, carrying the
    /// shader's defaults as values.
    pub fn from_shader(shader_asset_id: &str, shader: &PixelShaderData) -> Self {
        let properties = shader
            .properties
            .iter()
            .map(|sp| MaterialProperty {
                code_name: sp.code_name.clone(),
                ty: sp.ty.material_type(),
                value: sp.default.clone(),
            })
            .collect();
        Self {
            properties,
            shader_asset: shader_asset_id.to_string(),
        }
    }

    /// Sum of the uniform-buffer bytes of all properties with values.
    pub fn memory_size(&self) -> usize {
        self.properties.iter().map(MaterialProperty::memory_size).sum()
    }
}

fn parse_material(asset_id: &str, json: &Value) -> Result<MaterialData> {
    let Some(obj) = json.as_object() else {
        return Err(AssetError::schema(asset_id, "<root>", "an object"));
    };
    let Some(values) = obj.get("values").and_then(Value::as_array) else {
        return Err(AssetError::schema(asset_id, "values", "an array"));
    };

    let mut seen = HashSet::new();
    let mut properties = Vec::with_capacity(values.len());
    for (i, entry) in values.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            return Err(AssetError::schema(asset_id, format!("values[{i}]"), "an object"));
        };

        let Some(type_name) = entry.get("type").and_then(Value::as_str) else {
            return Err(AssetError::schema(asset_id, format!("values[{i}].type"), "a string"));
        };
        let Some(ty) = PropertyType::from_name(type_name) else {
            return Err(AssetError::UnknownType {
                asset_id: asset_id.to_string(),
                type_name: type_name.to_string(),
            });
        };

        let Some(code_name) = entry.get("code_name").and_then(Value::as_str) else {
            return Err(AssetError::schema(
                asset_id,
                format!("values[{i}].code_name"),
                "a string",
            ));
        };
        if !seen.insert(code_name) {
            return Err(AssetError::schema(
                asset_id,
                code_name,
                "a code name unique within the material",
            ));
        }

        let value = entry
            .get("value")
            .map(|v| PropertyValue::from_json(asset_id, code_name, ty, v))
            .transpose()?;

        properties.push(MaterialProperty {
            code_name: code_name.to_string(),
            ty,
            value,
        });
    }

    let Some(shader_asset) = obj.get("shader_asset").and_then(Value::as_str) else {
        return Err(AssetError::schema(asset_id, "shader_asset", "a string"));
    };

    Ok(MaterialData {
        properties,
        shader_asset: shader_asset.to_string(),
    })
}

/// Require a 1:1, same-order pairing between material and shader properties.
pub fn check_material_matches_shader(
    material_id: &str,
    material: &MaterialData,
    shader: &PixelShaderData,
) -> Result<()> {
    check_pairing(material_id, material, shader).inspect_err(|e| log::error!("{e}"))
}

fn check_pairing(material_id: &str, material: &MaterialData, shader: &PixelShaderData) -> Result<()> {
    if material.properties.len() != shader.properties.len() {
        return Err(AssetError::referential(
            material_id,
            format!(
                "has {} properties but shader '{}' declares {}",
                material.properties.len(),
                material.shader_asset,
                shader.properties.len()
            ),
        ));
    }

    let mut has_shared_main = false;
    let mut has_shared_additional = false;
    for (index, (prop, sp)) in material.properties.iter().zip(&shader.properties).enumerate() {
        if prop.code_name != sp.code_name {
            return Err(AssetError::referential(
                material_id,
                format!(
                    "property {index} is '{}' but shader '{}' expects '{}'",
                    prop.code_name, material.shader_asset, sp.code_name
                ),
            ));
        }
        if prop.ty.is_texture() != sp.ty.is_texture() {
            return Err(AssetError::referential(
                material_id,
                format!(
                    "property '{}' is a {} but shader input is a {}",
                    prop.code_name, prop.ty, sp.ty
                ),
            ));
        }
        if prop.ty != sp.ty.material_type() {
            return Err(AssetError::referential(
                material_id,
                format!(
                    "property '{}' has type {} but shader expects {}",
                    prop.code_name, prop.ty, sp.ty
                ),
            ));
        }
        match sp.ty {
            ShaderPropertyType::Sampler2DArraySharedMain => has_shared_main = true,
            ShaderPropertyType::Sampler2DArraySharedAdditional => has_shared_additional = true,
            _ => {}
        }
    }

    if has_shared_additional && !has_shared_main {
        return Err(AssetError::referential(
            material_id,
            "uses a shared texture array layer without a main texture",
        ));
    }
    Ok(())
}
