//! Typed material properties and their GPU-side encodings.
//!
//! Every property with a value occupies one 16-byte slot of the material
//! uniform buffer (four 32-bit lanes), whatever its element count, so the
//! packed buffer can be bound as-is against a std140-style block. The shader
//! declaration emitted for a property mirrors that slot exactly by declaring
//! explicit padding members.

use std::fmt::Write as _;

use serde_json::{Value, json};

use crate::error::{AssetError, Result};

/// Bytes occupied by one property in the material uniform buffer.
pub const PROPERTY_MEMORY_STRIDE: usize = 16;

/// Scalar lanes declared per property in the generated uniform block.
const LANES_PER_PROPERTY: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    TextureAsset,
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

impl PropertyType {
    pub const ALL: [PropertyType; 10] = [
        PropertyType::TextureAsset,
        PropertyType::Int,
        PropertyType::Int2,
        PropertyType::Int3,
        PropertyType::Int4,
        PropertyType::Float,
        PropertyType::Float2,
        PropertyType::Float3,
        PropertyType::Float4,
        PropertyType::Bool,
    ];

    /// Canonical lowercase name used in material descriptions.
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::TextureAsset => "texture_asset",
            PropertyType::Int => "int",
            PropertyType::Int2 => "int2",
            PropertyType::Int3 => "int3",
            PropertyType::Int4 => "int4",
            PropertyType::Float => "float",
            PropertyType::Float2 => "float2",
            PropertyType::Float3 => "float3",
            PropertyType::Float4 => "float4",
            PropertyType::Bool => "bool",
        }
    }

    /// Case-insensitive lookup in the type-name table.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|ty| ty.name() == lowered)
    }

    /// Shading-language scalar type and element count, `None` for textures.
    pub fn shader_layout(self) -> Option<(&'static str, usize)> {
        match self {
            PropertyType::TextureAsset => None,
            PropertyType::Int => Some(("int", 1)),
            PropertyType::Int2 => Some(("int", 2)),
            PropertyType::Int3 => Some(("int", 3)),
            PropertyType::Int4 => Some(("int", 4)),
            PropertyType::Float => Some(("float", 1)),
            PropertyType::Float2 => Some(("float", 2)),
            PropertyType::Float3 => Some(("float", 3)),
            PropertyType::Float4 => Some(("float", 4)),
            PropertyType::Bool => Some(("bool", 1)),
        }
    }

    pub fn is_texture(self) -> bool {
        self == PropertyType::TextureAsset
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A property value; the variant always corresponds to one [`PropertyType`].
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Asset id of the referenced texture.
    TextureAsset(String),
    Int(i32),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Bool(bool),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::TextureAsset(_) => PropertyType::TextureAsset,
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Int2(_) => PropertyType::Int2,
            PropertyValue::Int3(_) => PropertyType::Int3,
            PropertyValue::Int4(_) => PropertyType::Int4,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Float2(_) => PropertyType::Float2,
            PropertyValue::Float3(_) => PropertyType::Float3,
            PropertyValue::Float4(_) => PropertyType::Float4,
            PropertyValue::Bool(_) => PropertyType::Bool,
        }
    }

    /// Parse a JSON value into the variant required by `ty`.
    ///
    /// `code_name` and `asset_id` only feed the error message.
    pub fn from_json(
        asset_id: &str,
        code_name: &str,
        ty: PropertyType,
        value: &Value,
    ) -> Result<Self> {
        let ints = |n: usize| -> Result<Vec<i32>> {
            Ok(parse_numbers(asset_id, code_name, value, n)?
                .into_iter()
                .map(|x| x as i32)
                .collect())
        };
        let floats = |n: usize| -> Result<Vec<f32>> {
            Ok(parse_numbers(asset_id, code_name, value, n)?
                .into_iter()
                .map(|x| x as f32)
                .collect())
        };

        Ok(match ty {
            PropertyType::TextureAsset => {
                let Some(id) = value.as_str() else {
                    return Err(AssetError::schema(
                        asset_id,
                        code_name,
                        "a texture asset id string",
                    ));
                };
                PropertyValue::TextureAsset(id.to_string())
            }
            PropertyType::Int => PropertyValue::Int(ints(1)?[0]),
            PropertyType::Int2 => PropertyValue::Int2(to_array(ints(2)?)),
            PropertyType::Int3 => PropertyValue::Int3(to_array(ints(3)?)),
            PropertyType::Int4 => PropertyValue::Int4(to_array(ints(4)?)),
            PropertyType::Float => PropertyValue::Float(floats(1)?[0]),
            PropertyType::Float2 => PropertyValue::Float2(to_array(floats(2)?)),
            PropertyType::Float3 => PropertyValue::Float3(to_array(floats(3)?)),
            PropertyType::Float4 => PropertyValue::Float4(to_array(floats(4)?)),
            PropertyType::Bool => {
                let Some(b) = value.as_bool() else {
                    return Err(AssetError::schema(asset_id, code_name, "a boolean"));
                };
                PropertyValue::Bool(b)
            }
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::TextureAsset(id) => json!(id),
            PropertyValue::Int(v) => json!(v),
            PropertyValue::Int2(v) => json!(v),
            PropertyValue::Int3(v) => json!(v),
            PropertyValue::Int4(v) => json!(v),
            PropertyValue::Float(v) => json!(v),
            PropertyValue::Float2(v) => json!(v),
            PropertyValue::Float3(v) => json!(v),
            PropertyValue::Float4(v) => json!(v),
            PropertyValue::Bool(v) => json!(v),
        }
    }

    /// Raw lane bytes, `None` for texture references.
    fn raw_bytes(&self) -> Option<&[u8]> {
        Some(match self {
            PropertyValue::TextureAsset(_) => return None,
            PropertyValue::Int(v) => bytemuck::bytes_of(v),
            PropertyValue::Int2(v) => bytemuck::bytes_of(v),
            PropertyValue::Int3(v) => bytemuck::bytes_of(v),
            PropertyValue::Int4(v) => bytemuck::bytes_of(v),
            PropertyValue::Float(v) => bytemuck::bytes_of(v),
            PropertyValue::Float2(v) => bytemuck::bytes_of(v),
            PropertyValue::Float3(v) => bytemuck::bytes_of(v),
            PropertyValue::Float4(v) => bytemuck::bytes_of(v),
            PropertyValue::Bool(true) => &[1u8],
            PropertyValue::Bool(false) => &[0u8],
        })
    }
}

fn to_array<T: Copy + Default, const N: usize>(values: Vec<T>) -> [T; N] {
    let mut out = [T::default(); N];
    for (dst, src) in out.iter_mut().zip(values) {
        *dst = src;
    }
    out
}

/// A single number for `count == 1`, otherwise an array of exactly `count` numbers.
fn parse_numbers(asset_id: &str, code_name: &str, value: &Value, count: usize) -> Result<Vec<f64>> {
    if count == 1 {
        return value
            .as_f64()
            .map(|x| vec![x])
            .ok_or_else(|| AssetError::schema(asset_id, code_name, "a number"));
    }

    let expected = || format!("an array of {count} numbers");
    let Some(items) = value.as_array() else {
        return Err(AssetError::schema(asset_id, code_name, expected()));
    };
    if items.len() != count {
        return Err(AssetError::schema(asset_id, code_name, expected()));
    }
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| AssetError::schema(asset_id, code_name, expected()))
        })
        .collect()
}

/// One named input of a material.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialProperty {
    /// Shader-side identifier, unique within a material.
    pub code_name: String,
    pub ty: PropertyType,
    /// `None` until authored.
    pub value: Option<PropertyValue>,
}

impl MaterialProperty {
    pub fn new(code_name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            code_name: code_name.into(),
            ty: value.property_type(),
            value: Some(value),
        }
    }

    pub fn unset(code_name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            code_name: code_name.into(),
            ty,
            value: None,
        }
    }

    /// Bytes this property occupies in the uniform buffer: 0 or 16.
    pub fn memory_size(&self) -> usize {
        match &self.value {
            Some(value) if value.property_type() == self.ty && !self.ty.is_texture() => {
                PROPERTY_MEMORY_STRIDE
            }
            _ => 0,
        }
    }

    /// Append this property's 16-byte slot to `out`, returning the number of
    /// bytes written.
    ///
    /// Writes nothing for textures and unset values. A value whose variant
    /// disagrees with `ty` is a logic error: nothing is written and 0 is
    /// returned.
    pub fn write_to_memory(&self, out: &mut Vec<u8>) -> usize {
        let Some(value) = &self.value else {
            return 0;
        };
        if value.property_type() != self.ty {
            log::error!(
                "material property '{}' declared as {} holds a {} value",
                self.code_name,
                self.ty,
                value.property_type()
            );
            return 0;
        }
        let Some(raw) = value.raw_bytes() else {
            return 0;
        };

        let mut slot = [0u8; PROPERTY_MEMORY_STRIDE];
        slot[..raw.len()].copy_from_slice(raw);
        out.extend_from_slice(&slot);
        PROPERTY_MEMORY_STRIDE
    }

    /// Append the uniform-block member declarations for this property.
    ///
    /// `int3 offset;` is followed by `int offset_padding_4;` so the declared
    /// lanes always add up to four.
    pub fn write_as_shader_code(&self, out: &mut String) {
        let Some((scalar, count)) = self.ty.shader_layout() else {
            return;
        };
        if count == 1 {
            let _ = writeln!(out, "{scalar} {};", self.code_name);
        } else {
            let _ = writeln!(out, "{scalar}{count} {};", self.code_name);
        }
        for lane in count..LANES_PER_PROPERTY {
            let _ = writeln!(out, "{scalar} {}_padding_{};", self.code_name, lane + 1);
        }
    }
}
