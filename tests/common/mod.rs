//! Builders for small glTF documents with inline base64 buffers.
#![allow(dead_code)]

use base64::Engine as _;
use serde_json::{Value, json};

pub const FLOAT: u32 = 5126;
pub const UNSIGNED_BYTE: u32 = 5121;
pub const UNSIGNED_SHORT: u32 = 5123;
pub const UNSIGNED_INT: u32 = 5125;

pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[derive(Default)]
pub struct GltfFixture {
    buffer: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl GltfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` as a new buffer view, keeping 4-byte alignment.
    pub fn view(&mut self, bytes: &[u8], stride: Option<usize>) -> usize {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        let mut view = json!({ "buffer": 0, "byteOffset": offset, "byteLength": bytes.len() });
        if let Some(stride) = stride {
            view["byteStride"] = json!(stride);
        }
        self.views.push(view);
        self.views.len() - 1
    }

    pub fn accessor(
        &mut self,
        view: usize,
        offset: usize,
        component_type: u32,
        count: usize,
        ty: &str,
    ) -> usize {
        self.accessors.push(json!({
            "bufferView": view,
            "byteOffset": offset,
            "componentType": component_type,
            "count": count,
            "type": ty,
        }));
        self.accessors.len() - 1
    }

    /// POSITION accessors carry the min/max bounds glTF requires.
    pub fn bound(&mut self, accessor: usize, points: &[[f32; 3]]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        self.accessors[accessor]["min"] = json!(min);
        self.accessors[accessor]["max"] = json!(max);
    }

    pub fn positions(&mut self, points: &[[f32; 3]]) -> usize {
        let flat: Vec<f32> = points.iter().flatten().copied().collect();
        let view = self.view(&f32_bytes(&flat), None);
        let accessor = self.accessor(view, 0, FLOAT, points.len(), "VEC3");
        self.bound(accessor, points);
        accessor
    }

    pub fn indices_u16(&mut self, indices: &[u16]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.view(&bytes, None);
        self.accessor(view, 0, UNSIGNED_SHORT, indices.len(), "SCALAR")
    }

    pub fn indices_u32(&mut self, indices: &[u32]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.view(&bytes, None);
        self.accessor(view, 0, UNSIGNED_INT, indices.len(), "SCALAR")
    }

    pub fn buffer_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Document whose single buffer is embedded as a data URI.
    pub fn document(&self, roots: Value, nodes: Value, meshes: Value) -> Value {
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.buffer)
        );
        self.document_with_uri(&uri, roots, nodes, meshes)
    }

    pub fn document_with_uri(&self, uri: &str, roots: Value, nodes: Value, meshes: Value) -> Value {
        json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": roots }],
            "nodes": nodes,
            "meshes": meshes,
            "accessors": self.accessors,
            "bufferViews": self.views,
            "buffers": [{ "byteLength": self.buffer.len(), "uri": uri }],
        })
    }
}

pub fn to_bytes(document: &Value) -> Vec<u8> {
    serde_json::to_vec(document).expect("serialize glTF document")
}

/// One root node holding a triangle primitive. Fields of `primitive` override
/// the defaults; `null` removes one.
pub fn single_triangle(primitive: Value) -> Vec<u8> {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let mut primitive_json = json!({ "attributes": { "POSITION": position }, "indices": indices });
    if let (Some(dst), Some(src)) = (primitive_json.as_object_mut(), primitive.as_object()) {
        for (k, v) in src {
            if v.is_null() {
                dst.remove(k);
            } else {
                dst.insert(k.clone(), v.clone());
            }
        }
    }
    to_bytes(&fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [primitive_json] }]),
    ))
}
