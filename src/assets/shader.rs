//! Shader-side property schema for custom pixel shaders.

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use crate::assets::property::{PropertyType, PropertyValue};
use crate::error::{AssetError, Result};

/// Type of a shader-declared input. Textures come in three kinds; every other
/// kind mirrors a numeric/bool [`PropertyType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderPropertyType {
    Sampler2D,
    /// First layer of a shared texture array; its texture defines the array size.
    Sampler2DArraySharedMain,
    /// Additional layer of a shared texture array.
    Sampler2DArraySharedAdditional,
    Int,
    Int2,
    Int3,
    Int4,
    Float,
    Float2,
    Float3,
    Float4,
    Bool,
}

impl ShaderPropertyType {
    pub const ALL: [ShaderPropertyType; 12] = [
        ShaderPropertyType::Sampler2D,
        ShaderPropertyType::Sampler2DArraySharedMain,
        ShaderPropertyType::Sampler2DArraySharedAdditional,
        ShaderPropertyType::Int,
        ShaderPropertyType::Int2,
        ShaderPropertyType::Int3,
        ShaderPropertyType::Int4,
        ShaderPropertyType::Float,
        ShaderPropertyType::Float2,
        ShaderPropertyType::Float3,
        ShaderPropertyType::Float4,
        ShaderPropertyType::Bool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderPropertyType::Sampler2D => "sampler2d",
            ShaderPropertyType::Sampler2DArraySharedMain => "sampler2d_array_shared_main",
            ShaderPropertyType::Sampler2DArraySharedAdditional => {
                "sampler2d_array_shared_additional"
            }
            other => other.material_type().name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|ty| ty.name() == lowered)
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            ShaderPropertyType::Sampler2D
                | ShaderPropertyType::Sampler2DArraySharedMain
                | ShaderPropertyType::Sampler2DArraySharedAdditional
        )
    }

    /// GLSL sampler type for texture kinds, `None` for numeric inputs.
    pub fn sampler_type(self) -> Option<&'static str> {
        match self {
            ShaderPropertyType::Sampler2D => Some("sampler2D"),
            ShaderPropertyType::Sampler2DArraySharedMain
            | ShaderPropertyType::Sampler2DArraySharedAdditional => Some("sampler2DArray"),
            _ => None,
        }
    }

    /// Material property type that binds to this shader input.
    pub fn material_type(self) -> PropertyType {
        match self {
            ShaderPropertyType::Sampler2D
            | ShaderPropertyType::Sampler2DArraySharedMain
            | ShaderPropertyType::Sampler2DArraySharedAdditional => PropertyType::TextureAsset,
            ShaderPropertyType::Int => PropertyType::Int,
            ShaderPropertyType::Int2 => PropertyType::Int2,
            ShaderPropertyType::Int3 => PropertyType::Int3,
            ShaderPropertyType::Int4 => PropertyType::Int4,
            ShaderPropertyType::Float => PropertyType::Float,
            ShaderPropertyType::Float2 => PropertyType::Float2,
            ShaderPropertyType::Float3 => PropertyType::Float3,
            ShaderPropertyType::Float4 => PropertyType::Float4,
            ShaderPropertyType::Bool => PropertyType::Bool,
        }
    }
}

impl std::fmt::Display for ShaderPropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderProperty {
    pub code_name: String,
    pub ty: ShaderPropertyType,
    pub description: String,
    /// Value copied into materials generated from this shader.
    pub default: Option<PropertyValue>,
}

/// A custom pixel shader: its GLSL fragment plus the ordered property schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelShaderData {
    pub properties: Vec<ShaderProperty>,
    pub source: String,
}

impl PixelShaderData {
    pub fn from_json(asset_id: &str, json: &Value, source: impl Into<String>) -> Result<Self> {
        parse_shader(asset_id, json, source.into()).inspect_err(|e| log::error!("{e}"))
    }

    pub fn to_json(&self) -> Value {
        let properties: Vec<Value> = self
            .properties
            .iter()
            .map(|prop| {
                let mut obj = Map::new();
                obj.insert("code_name".into(), json!(prop.code_name));
                obj.insert("type".into(), json!(prop.ty.name()));
                if !prop.description.is_empty() {
                    obj.insert("description".into(), json!(prop.description));
                }
                if let Some(default) = &prop.default {
                    obj.insert("default".into(), default.to_json());
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "properties": properties })
    }

    pub fn property(&self, code_name: &str) -> Option<&ShaderProperty> {
        self.properties.iter().find(|p| p.code_name == code_name)
    }
}

fn parse_shader(asset_id: &str, json: &Value, source: String) -> Result<PixelShaderData> {
    let Some(obj) = json.as_object() else {
        return Err(AssetError::schema(asset_id, "<root>", "an object"));
    };
    let Some(entries) = obj.get("properties").and_then(Value::as_array) else {
        return Err(AssetError::schema(asset_id, "properties", "an array"));
    };

    let mut seen = HashSet::new();
    let mut properties = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let field = |name: &str| format!("properties[{i}].{name}");
        let Some(entry) = entry.as_object() else {
            return Err(AssetError::schema(asset_id, format!("properties[{i}]"), "an object"));
        };

        let Some(code_name) = entry.get("code_name").and_then(Value::as_str) else {
            return Err(AssetError::schema(asset_id, field("code_name"), "a string"));
        };
        if !seen.insert(code_name.to_string()) {
            return Err(AssetError::schema(
                asset_id,
                field("code_name"),
                format!("unique, '{code_name}' is declared twice"),
            ));
        }

        let Some(type_name) = entry.get("type").and_then(Value::as_str) else {
            return Err(AssetError::schema(asset_id, field("type"), "a string"));
        };
        let Some(ty) = ShaderPropertyType::from_name(type_name) else {
            return Err(AssetError::UnknownType {
                asset_id: asset_id.to_string(),
                type_name: type_name.to_string(),
            });
        };

        let description = match entry.get("description") {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(AssetError::schema(asset_id, field("description"), "a string")),
        };

        let default = entry
            .get("default")
            .map(|v| PropertyValue::from_json(asset_id, code_name, ty.material_type(), v))
            .transpose()?;

        properties.push(ShaderProperty {
            code_name: code_name.to_string(),
            ty,
            description,
            default,
        });
    }

    Ok(PixelShaderData { properties, source })
}
