//! Build a custom pixel shader pass from a material and its shader.
//!
//! Composition is a pure function of its inputs: the same material, shader
//! and instance index always produce the same [`ComposedPass`], and distinct
//! instance indices produce fragments that can share one translation unit.

use std::fmt::Write as _;

use crate::assets::material::{MaterialData, check_material_matches_shader};
use crate::assets::property::PROPERTY_MEMORY_STRIDE;
use crate::assets::shader::{PixelShaderData, ShaderPropertyType};
use crate::error::{AssetError, Result};
use crate::shader::conflicts::{find_global_conflicts, replace_identifier, rewrite};

/// Function name a shader fragment must define as its entry point.
pub const ENTRY_POINT_MARKER: &str = "custom_main";

/// Name the entry point is renamed to before instance suffixing.
pub const COLOR_FUNCTION: &str = "custom_color";

#[derive(Clone, Debug, PartialEq)]
pub struct ComposedPass {
    pub instance_index: u32,
    /// Uniform block members, one padded four-lane slot per numeric property.
    pub material_block: String,
    /// Uniform buffer matching `material_block` byte for byte.
    pub uniform_data: Vec<u8>,
    /// Sampler declarations and texture `#define`s followed by the renamed fragment.
    pub shader_code: String,
    /// Renamed entry point, e.g. `custom_color_0`.
    pub entry_point: String,
    /// Texture properties in binding order.
    pub texture_code_names: Vec<String>,
    /// Sampler unit of each entry in `texture_code_names`.
    pub texture_units: Vec<u32>,
}

impl ComposedPass {
    /// First unit after this pass's samplers, for the next instance.
    pub fn next_texture_unit(&self, first_unit: u32) -> u32 {
        self.texture_units.last().map_or(first_unit, |unit| unit + 1)
    }
}

/// Uniform block declarations for every property of `material`.
pub fn material_block(material: &MaterialData) -> String {
    let mut out = String::new();
    for property in &material.properties {
        property.write_as_shader_code(&mut out);
    }
    out
}

/// Pack the uniform buffer for `material`.
///
/// Numeric properties still lacking a value get a zeroed slot so the buffer
/// lines up with [`material_block`], which declares every numeric property.
pub fn pack_uniforms(material: &MaterialData) -> Vec<u8> {
    let mut out = Vec::with_capacity(material.properties.len() * PROPERTY_MEMORY_STRIDE);
    for property in &material.properties {
        if property.ty.is_texture() {
            continue;
        }
        if property.write_to_memory(&mut out) == 0 {
            out.extend_from_slice(&[0u8; PROPERTY_MEMORY_STRIDE]);
        }
    }
    out
}

struct TextureBinding<'a> {
    code_name: &'a str,
    kind: ShaderPropertyType,
    unit: u32,
    /// Draw texmap whose texcoord channel the texture samples with.
    texmap: usize,
    /// Layer within a shared array, `None` for plain samplers.
    layer: Option<usize>,
}

/// Textures in property order. The k-th texture is bound at `first_unit + k`.
fn texture_bindings(shader: &PixelShaderData, first_unit: u32) -> Vec<TextureBinding<'_>> {
    let mut layers = 0;
    let mut unit = first_unit;
    let mut bindings = Vec::new();
    for property in shader.properties.iter().filter(|p| p.ty.is_texture()) {
        let layer = match property.ty {
            ShaderPropertyType::Sampler2D => None,
            _ => {
                layers += 1;
                Some(layers - 1)
            }
        };
        bindings.push(TextureBinding {
            code_name: &property.code_name,
            kind: property.ty,
            unit,
            texmap: bindings.len(),
            layer,
        });
        unit += 1;
    }
    bindings
}

fn write_texture_defines(out: &mut String, bindings: &[TextureBinding<'_>], instance_index: u32) {
    for binding in bindings {
        let name = binding.code_name;
        let unit = binding.unit;
        let uv = format!(
            "data.texcoord[data.texmap_to_texcoord_index[{}]].xy",
            binding.texmap
        );
        if let Some(sampler) = binding.kind.sampler_type() {
            let _ = writeln!(
                out,
                "layout(binding = {unit}) uniform {sampler} samp_{name}_{instance_index};"
            );
        }
        let _ = writeln!(out, "#define HAS_{name}_{instance_index} 1");
        let _ = writeln!(out, "#define {name}_UNIT_{instance_index} {unit}");
        match binding.layer {
            Some(layer) => {
                let _ = writeln!(out, "#define {name}_COORD_{instance_index} vec3({uv}, {layer})");
            }
            None => {
                let _ = writeln!(out, "#define {name}_COORD_{instance_index} {uv}");
            }
        }
    }
}

/// Compose one pass. Fails when material and shader properties do not pair
/// up 1:1 in order, or when the fragment lacks `custom_main`.
///
/// Textures take consecutive sampler units starting at `texture_unit`.
pub fn compose_pass(
    material_id: &str,
    material: &MaterialData,
    shader: &PixelShaderData,
    instance_index: u32,
    texture_unit: u32,
) -> Result<ComposedPass> {
    check_material_matches_shader(material_id, material, shader)?;

    let source = shader.source.replace("\r\n", "\n");
    let body = replace_identifier(&source, ENTRY_POINT_MARKER, COLOR_FUNCTION);
    let conflicts = find_global_conflicts(&body);
    if !conflicts.iter().any(|c| c == COLOR_FUNCTION) {
        let err = AssetError::referential(
            material.shader_asset.as_str(),
            format!("shader source does not define `{ENTRY_POINT_MARKER}` at global scope"),
        );
        log::error!("{err}");
        return Err(err);
    }
    let mut body = rewrite(&body, &conflicts, instance_index);

    let textures = texture_bindings(shader, texture_unit);
    for binding in &textures {
        let name = binding.code_name;
        for symbol in [
            format!("{name}_COORD"),
            format!("{name}_UNIT"),
            format!("HAS_{name}"),
            format!("samp_{name}"),
        ] {
            body = replace_identifier(&body, &symbol, &format!("{symbol}_{instance_index}"));
        }
    }

    let mut shader_code = String::new();
    write_texture_defines(&mut shader_code, &textures, instance_index);
    shader_code.push_str(&body);

    log::debug!(
        "composed pass {instance_index} for material '{material_id}' ({} renamed symbols, {} textures)",
        conflicts.len(),
        textures.len()
    );

    Ok(ComposedPass {
        instance_index,
        material_block: material_block(material),
        uniform_data: pack_uniforms(material),
        shader_code,
        entry_point: format!("{COLOR_FUNCTION}_{instance_index}"),
        texture_code_names: textures.iter().map(|t| t.code_name.to_string()).collect(),
        texture_units: textures.iter().map(|t| t.unit).collect(),
    })
}

/// Concatenate composed passes into one translation unit body.
pub fn combined_source(passes: &[ComposedPass]) -> String {
    passes
        .iter()
        .map(|p| p.shader_code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
