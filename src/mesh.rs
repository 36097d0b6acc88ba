//! Replacement meshes: importer-agnostic chunks plus material bindings.

pub mod gltf_import;
pub mod portable;
pub mod vertex;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{AssetError, Result};
use crate::math::{MAT4_IDENTITY, Mat4};

pub use gltf_import::{GLB_MAGIC, import_gltf_file, import_gltf_slice};
pub use portable::{PORTABLE_MESH_MAGIC, PORTABLE_MESH_VERSION, from_portable_bytes, to_portable_bytes};
pub use vertex::{AttributeFormat, ComponentFormat, PortableVertexDeclaration, VertexComponents};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveType {
    #[default]
    Triangles = 0,
    TriangleStrip = 1,
    Lines = 2,
    Points = 3,
}

impl PrimitiveType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => PrimitiveType::Triangles,
            1 => PrimitiveType::TriangleStrip,
            2 => PrimitiveType::Lines,
            3 => PrimitiveType::Points,
            _ => return None,
        })
    }
}

/// One drawable primitive: interleaved vertices, 16-bit indices and layout.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshDataChunk {
    /// `num_vertices * vertex_stride` bytes.
    pub vertex_data: Vec<u8>,
    pub vertex_stride: u32,
    pub num_vertices: u32,
    pub indices: Vec<u16>,
    pub num_indices: u32,
    pub vertex_declaration: PortableVertexDeclaration,
    pub primitive_type: PrimitiveType,
    pub components_available: VertexComponents,
    /// Node-to-scene transform, column-major.
    pub transform: Mat4,
    pub material_name: String,
}

impl Default for MeshDataChunk {
    fn default() -> Self {
        Self {
            vertex_data: Vec::new(),
            vertex_stride: 0,
            num_vertices: 0,
            indices: Vec::new(),
            num_indices: 0,
            vertex_declaration: PortableVertexDeclaration::default(),
            primitive_type: PrimitiveType::Triangles,
            components_available: VertexComponents::empty(),
            transform: MAT4_IDENTITY,
            material_name: String::new(),
        }
    }
}

impl MeshDataChunk {
    /// Buffer lengths agree with the counts and the declaration fits the stride.
    pub fn is_well_formed(&self) -> bool {
        self.vertex_data.len() == self.num_vertices as usize * self.vertex_stride as usize
            && self.indices.len() == self.num_indices as usize
            && self.vertex_declaration.is_consistent()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub chunks: Vec<MeshDataChunk>,
    /// glTF material name to material asset id; empty ids are unbound.
    pub material_mapping: BTreeMap<String, String>,
}

impl MeshData {
    /// Read the optional `material_mapping` object of a mesh description.
    pub fn metadata_from_json(asset_id: &str, json: &Value) -> Result<BTreeMap<String, String>> {
        parse_metadata(asset_id, json).inspect_err(|e| log::error!("{e}"))
    }

    pub fn metadata_to_json(&self) -> Value {
        let mapping: Map<String, Value> = self
            .material_mapping
            .iter()
            .map(|(name, id)| (name.clone(), Value::String(id.clone())))
            .collect();
        let mut obj = Map::new();
        obj.insert("material_mapping".into(), Value::Object(mapping));
        Value::Object(obj)
    }

    /// Overlay authored bindings onto the imported material names.
    pub fn apply_material_mapping(&mut self, mapping: BTreeMap<String, String>) {
        self.material_mapping.extend(mapping);
    }

    /// Material asset bound to a chunk, if any.
    pub fn material_asset_for(&self, chunk: &MeshDataChunk) -> Option<&str> {
        self.material_mapping
            .get(&chunk.material_name)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

fn parse_metadata(asset_id: &str, json: &Value) -> Result<BTreeMap<String, String>> {
    let Some(obj) = json.as_object() else {
        return Err(AssetError::schema(asset_id, "<root>", "an object"));
    };
    let Some(mapping) = obj.get("material_mapping") else {
        return Ok(BTreeMap::new());
    };
    let Some(mapping) = mapping.as_object() else {
        return Err(AssetError::schema(asset_id, "material_mapping", "an object"));
    };

    mapping
        .iter()
        .map(|(name, id)| match id.as_str() {
            Some(id) => Ok((name.clone(), id.to_string())),
            None => Err(AssetError::schema(
                asset_id,
                format!("material_mapping.{name}"),
                "a material asset id string",
            )),
        })
        .collect()
}
