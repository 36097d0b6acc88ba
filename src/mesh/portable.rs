//! Portable mesh binary (`.pmesh`): a flat cache of imported mesh data.
//!
//! Layout, all integers and floats little-endian:
//!
//! ```text
//! "PMSH" u32:version u32:chunk_count
//! per chunk:
//!   u32:num_vertices u32:vertex_stride [num_vertices * vertex_stride]u8
//!   u32:num_indices [num_indices]u16
//!   declaration: u32:stride then 13 attribute records
//!     (u8:enable u8:components u8:format u8:integer u32:offset)
//!   u32:primitive_type u32:components_available [16]f32:transform
//!   u32:name_len [name_len]u8
//! u32:mapping_count, per entry: u32:len [len]u8 name, u32:len [len]u8 asset id
//! ```

use crate::error::{AssetError, Result};
use crate::mesh::vertex::{AttributeFormat, ComponentFormat, PortableVertexDeclaration, VertexComponents};
use crate::mesh::{MeshData, MeshDataChunk, PrimitiveType};

pub const PORTABLE_MESH_MAGIC: &[u8; 4] = b"PMSH";
pub const PORTABLE_MESH_VERSION: u32 = 1;

pub fn to_portable_bytes(data: &MeshData) -> Vec<u8> {
    let mut w = ByteWriter::default();
    w.bytes(PORTABLE_MESH_MAGIC);
    w.u32(PORTABLE_MESH_VERSION);
    w.len(data.chunks.len());
    for chunk in &data.chunks {
        write_chunk(&mut w, chunk);
    }
    w.len(data.material_mapping.len());
    for (name, asset_id) in &data.material_mapping {
        w.string(name);
        w.string(asset_id);
    }
    w.out
}

pub fn from_portable_bytes(bytes: &[u8]) -> Result<MeshData> {
    let mut r = ByteReader::new(bytes);
    if r.take(4)? != PORTABLE_MESH_MAGIC {
        return Err(AssetError::InvalidFormat("bad magic".to_string()));
    }
    let version = r.u32()?;
    if version != PORTABLE_MESH_VERSION {
        return Err(AssetError::InvalidFormat(format!("unsupported version {version}")));
    }

    let chunk_count = r.u32()?;
    let mut data = MeshData::default();
    for _ in 0..chunk_count {
        data.chunks.push(read_chunk(&mut r)?);
    }
    let mapping_count = r.u32()?;
    for _ in 0..mapping_count {
        let name = r.string()?;
        let asset_id = r.string()?;
        data.material_mapping.insert(name, asset_id);
    }

    if r.remaining() != 0 {
        return Err(AssetError::InvalidFormat(format!(
            "{} trailing bytes",
            r.remaining()
        )));
    }
    Ok(data)
}

fn write_chunk(w: &mut ByteWriter, chunk: &MeshDataChunk) {
    w.u32(chunk.num_vertices);
    w.u32(chunk.vertex_stride);
    w.bytes(&chunk.vertex_data);
    w.u32(chunk.num_indices);
    for index in &chunk.indices {
        w.bytes(&index.to_le_bytes());
    }
    write_declaration(w, &chunk.vertex_declaration);
    w.u32(chunk.primitive_type as u32);
    w.u32(chunk.components_available.bits());
    for v in chunk.transform {
        w.bytes(&v.to_le_bytes());
    }
    w.string(&chunk.material_name);
}

fn read_chunk(r: &mut ByteReader) -> Result<MeshDataChunk> {
    let num_vertices = r.u32()?;
    let vertex_stride = r.u32()?;
    let vertex_len = (num_vertices as usize)
        .checked_mul(vertex_stride as usize)
        .ok_or_else(|| AssetError::InvalidFormat("vertex buffer size overflows".to_string()))?;
    let vertex_data = r.take(vertex_len)?.to_vec();

    let num_indices = r.u32()?;
    let index_bytes = r.take((num_indices as usize).saturating_mul(2))?;
    let indices = index_bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();

    let vertex_declaration = read_declaration(r)?;

    let tag = r.u32()?;
    let primitive_type = PrimitiveType::from_tag(tag)
        .ok_or_else(|| AssetError::InvalidFormat(format!("unknown primitive type {tag}")))?;
    let components_available = VertexComponents::from_bits_retain(r.u32()?);

    let mut transform = [0.0f32; 16];
    for v in &mut transform {
        *v = r.f32()?;
    }
    let material_name = r.string()?;

    let chunk = MeshDataChunk {
        vertex_data,
        vertex_stride,
        num_vertices,
        indices,
        num_indices,
        vertex_declaration,
        primitive_type,
        components_available,
        transform,
        material_name,
    };
    if !chunk.is_well_formed() {
        return Err(AssetError::InvalidFormat(format!(
            "chunk '{}' has attributes outside its {}-byte vertex or overlapping",
            chunk.material_name, chunk.vertex_declaration.stride
        )));
    }
    Ok(chunk)
}

fn write_declaration(w: &mut ByteWriter, decl: &PortableVertexDeclaration) {
    w.u32(decl.stride);
    for attr in decl.attributes() {
        w.bytes(&[
            u8::from(attr.enable),
            attr.components,
            attr.format as u8,
            u8::from(attr.integer),
        ]);
        w.u32(attr.offset);
    }
}

fn read_declaration(r: &mut ByteReader) -> Result<PortableVertexDeclaration> {
    let mut decl = PortableVertexDeclaration {
        stride: r.u32()?,
        ..Default::default()
    };
    for attr in decl.attributes_mut() {
        let head = r.take(4)?;
        let format = ComponentFormat::from_tag(head[2]).ok_or_else(|| {
            AssetError::InvalidFormat(format!("unknown component format {}", head[2]))
        })?;
        if head[1] > 4 {
            return Err(AssetError::InvalidFormat(format!(
                "attribute with {} components",
                head[1]
            )));
        }
        *attr = AttributeFormat {
            enable: read_bool(head[0])?,
            components: head[1],
            format,
            integer: read_bool(head[3])?,
            offset: r.u32()?,
        };
    }
    Ok(decl)
}

fn read_bool(byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(AssetError::InvalidFormat(format!("invalid bool byte {other}"))),
    }
}

#[derive(Default)]
struct ByteWriter {
    out: Vec<u8>,
}

impl ByteWriter {
    fn bytes(&mut self, b: &[u8]) {
        self.out.extend_from_slice(b);
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn string(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(AssetError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| AssetError::InvalidFormat(format!("string is not UTF-8: {e}")))
    }
}
