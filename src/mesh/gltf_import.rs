//! Flatten a glTF (JSON) scene into mesh chunks.
//!
//! Each visited primitive becomes one chunk whose vertices are interleaved in
//! a fixed attribute order and whose transform is the node's world matrix.
//! Binary `.glb` containers are rejected.

use std::path::Path;

use base64::Engine as _;
use gltf::Semantic;
use gltf::accessor::{DataType, Dimensions};
use gltf::json::validation::Checked;
use gltf::mesh::Mode;

use crate::error::{AssetError, Result};
use crate::math::{MAT4_IDENTITY, Mat4, mat4_from_trs, mat4_mul};
use crate::mesh::vertex::{AttributeFormat, ComponentFormat, VertexComponents};
use crate::mesh::{MeshData, MeshDataChunk, PrimitiveType};

/// Leading bytes of a binary glTF container.
pub const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Vertex attributes in interleaving order.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Position,
    Normal,
    Color(usize),
    TexCoord(usize),
}

const ATTRIBUTE_ORDER: [Slot; 12] = [
    Slot::Position,
    Slot::Normal,
    Slot::Color(0),
    Slot::Color(1),
    Slot::TexCoord(0),
    Slot::TexCoord(1),
    Slot::TexCoord(2),
    Slot::TexCoord(3),
    Slot::TexCoord(4),
    Slot::TexCoord(5),
    Slot::TexCoord(6),
    Slot::TexCoord(7),
];

impl Slot {
    fn semantic(self) -> Semantic {
        match self {
            Slot::Position => Semantic::Positions,
            Slot::Normal => Semantic::Normals,
            Slot::Color(i) => Semantic::Colors(i as u32),
            Slot::TexCoord(i) => Semantic::TexCoords(i as u32),
        }
    }

    fn name(self) -> String {
        match self {
            Slot::Position => "POSITION".to_string(),
            Slot::Normal => "NORMAL".to_string(),
            Slot::Color(i) => format!("COLOR_{i}"),
            Slot::TexCoord(i) => format!("TEXCOORD_{i}"),
        }
    }

    fn component_bit(self) -> VertexComponents {
        match self {
            Slot::Position => VertexComponents::empty(),
            Slot::Normal => VertexComponents::NORMAL,
            Slot::Color(i) => VertexComponents::color(i),
            Slot::TexCoord(i) => VertexComponents::texcoord(i),
        }
    }
}

/// Import a `.gltf` file; external buffers resolve relative to its directory.
pub fn import_gltf_file(path: &Path) -> Result<MeshData> {
    let label = path.display().to_string();
    import_file(&label, path).inspect_err(|e| log::error!("{e}"))
}

/// Import an in-memory glTF JSON document.
pub fn import_gltf_slice(bytes: &[u8], base_dir: &Path) -> Result<MeshData> {
    import_document("<inline glTF>", bytes, base_dir).inspect_err(|e| log::error!("{e}"))
}

fn import_file(label: &str, path: &Path) -> Result<MeshData> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gltf") => {}
        Some(ext) if ext.eq_ignore_ascii_case("glb") => {
            return Err(AssetError::unsupported(
                label,
                "binary glTF (.glb) is not supported",
            ));
        }
        _ => return Err(AssetError::unsupported(label, "expected a .gltf file")),
    }
    let bytes = std::fs::read(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    import_document(label, &bytes, base_dir)
}

struct ImportContext<'a> {
    label: &'a str,
    buffers: Vec<Vec<u8>>,
}

fn import_document(label: &str, bytes: &[u8], base_dir: &Path) -> Result<MeshData> {
    if bytes.starts_with(GLB_MAGIC) {
        return Err(AssetError::unsupported(
            label,
            "binary glTF (.glb) is not supported",
        ));
    }
    let root = gltf::json::Root::from_slice(bytes).map_err(gltf::Error::Deserialize)?;
    reject_positionless_primitives(label, &root)?;
    let gltf = gltf::Document::from_json(root)?;
    let ctx = ImportContext {
        label,
        buffers: load_buffers(label, &gltf, base_dir)?,
    };

    let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        return Err(AssetError::unsupported(label, "document has no scene"));
    };

    let mut data = MeshData::default();
    for node in scene.nodes() {
        visit_node(&ctx, &node, MAT4_IDENTITY, &mut data.chunks)?;
    }

    for material in gltf.materials() {
        data.material_mapping
            .insert(material.name().unwrap_or_default().to_string(), String::new());
    }

    log::info!("imported {} mesh chunk(s) from {label}", data.chunks.len());
    Ok(data)
}

/// Runs before document validation, which would report a missing POSITION
/// as a generic glTF error.
fn reject_positionless_primitives(label: &str, root: &gltf::json::Root) -> Result<()> {
    let position = Checked::Valid(gltf::json::mesh::Semantic::Positions);
    for (index, mesh) in root.meshes.iter().enumerate() {
        if mesh.primitives.iter().any(|p| !p.attributes.contains_key(&position)) {
            return Err(AssetError::unsupported(
                label,
                format!("mesh {index}: primitive has no POSITION attribute"),
            ));
        }
    }
    Ok(())
}

fn load_buffers(label: &str, gltf: &gltf::Document, base_dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => {
                return Err(AssetError::unsupported(
                    label,
                    "embedded binary chunk buffers are not supported",
                ));
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(label, uri)?,
            gltf::buffer::Source::Uri(uri) => std::fs::read(base_dir.join(uri))?,
        };
        if data.len() < buffer.length() {
            return Err(AssetError::InvalidFormat(format!(
                "{label}: buffer {} holds {} bytes, {} declared",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

fn decode_data_uri(label: &str, uri: &str) -> Result<Vec<u8>> {
    let Some((header, payload)) = uri.split_once(',') else {
        return Err(AssetError::InvalidFormat(format!("{label}: malformed data URI")));
    };
    if !header.ends_with(";base64") {
        return Err(AssetError::unsupported(label, "data URIs must be base64 encoded"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AssetError::InvalidFormat(format!("{label}: bad base64 buffer: {e}")))
}

fn local_transform(node: &gltf::Node) -> Mat4 {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            let mut out = [0.0f32; 16];
            for (c, column) in matrix.iter().enumerate() {
                out[c * 4..c * 4 + 4].copy_from_slice(column);
            }
            out
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => mat4_from_trs(translation, rotation, scale),
    }
}

/// `parent` is this node's parent world matrix, passed by value so sibling
/// subtrees never observe each other's transforms.
fn visit_node(
    ctx: &ImportContext,
    node: &gltf::Node,
    parent: Mat4,
    chunks: &mut Vec<MeshDataChunk>,
) -> Result<()> {
    let world = mat4_mul(parent, local_transform(node));

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or("<unnamed>");
        for primitive in mesh.primitives() {
            chunks.push(read_primitive(ctx, mesh_name, &primitive, world)?);
        }
    }

    for child in node.children() {
        visit_node(ctx, &child, world, chunks)?;
    }
    Ok(())
}

fn read_primitive(
    ctx: &ImportContext,
    mesh_name: &str,
    primitive: &gltf::Primitive,
    transform: Mat4,
) -> Result<MeshDataChunk> {
    let unsupported =
        |reason: String| AssetError::unsupported(ctx.label, format!("mesh '{mesh_name}': {reason}"));

    let primitive_type = match primitive.mode() {
        Mode::Triangles => PrimitiveType::Triangles,
        Mode::TriangleStrip => PrimitiveType::TriangleStrip,
        Mode::Lines => PrimitiveType::Lines,
        Mode::Points => PrimitiveType::Points,
        other => return Err(unsupported(format!("primitive mode {other:?} is not supported"))),
    };

    let Some(index_accessor) = primitive.indices() else {
        return Err(unsupported("primitive has no indices".to_string()));
    };
    let Some(position) = primitive.get(&Semantic::Positions) else {
        return Err(unsupported("primitive has no POSITION attribute".to_string()));
    };
    let num_vertices = position.count();

    let mut chunk = MeshDataChunk {
        primitive_type,
        transform,
        material_name: primitive.material().name().unwrap_or_default().to_string(),
        ..Default::default()
    };

    // First pass: layout.
    let mut present = Vec::new();
    let mut stride = 0u32;
    for slot in ATTRIBUTE_ORDER {
        let Some(accessor) = primitive.get(&slot.semantic()) else {
            continue;
        };
        if accessor.count() != num_vertices {
            return Err(unsupported(format!(
                "{} has {} elements, POSITION has {num_vertices}",
                slot.name(),
                accessor.count()
            )));
        }
        let (format, integer) = match accessor.data_type() {
            DataType::I8 => (ComponentFormat::Byte, false),
            DataType::U8 => (ComponentFormat::UByte, false),
            DataType::I16 => (ComponentFormat::Short, false),
            DataType::U16 => (ComponentFormat::UShort, false),
            DataType::F32 => (ComponentFormat::Float, false),
            DataType::U32 => {
                return Err(unsupported(format!(
                    "{} uses unsigned int components",
                    slot.name()
                )));
            }
        };
        let components = match accessor.dimensions() {
            Dimensions::Scalar => 1,
            Dimensions::Vec2 => 2,
            Dimensions::Vec3 => 3,
            Dimensions::Vec4 => 4,
            other => {
                return Err(unsupported(format!(
                    "{} has unsupported dimensions {other:?}",
                    slot.name()
                )));
            }
        };
        let attribute = AttributeFormat {
            enable: true,
            components,
            offset: stride,
            format,
            integer,
        };
        check_accessor_extent(ctx, &accessor, attribute.byte_size() as usize)?;
        stride += attribute.byte_size();
        present.push((slot, accessor, attribute));
    }

    // Second pass: copy, advancing offsets in the same order.
    let Ok(vertex_count) = u32::try_from(num_vertices) else {
        return Err(unsupported(format!("{num_vertices} vertices exceed the 32-bit limit")));
    };
    let Some(vertex_bytes) = num_vertices.checked_mul(stride as usize) else {
        return Err(unsupported(format!("{num_vertices} vertices of {stride} bytes overflow")));
    };
    chunk.vertex_stride = stride;
    chunk.num_vertices = vertex_count;
    chunk.vertex_data = vec![0u8; vertex_bytes];
    chunk.vertex_declaration.stride = stride;
    for (slot, accessor, attribute) in present {
        copy_attribute(ctx, &accessor, &attribute, stride as usize, &mut chunk.vertex_data)?;
        match slot {
            Slot::Position => chunk.vertex_declaration.position = attribute,
            Slot::Normal => chunk.vertex_declaration.normal = attribute,
            Slot::Color(i) => chunk.vertex_declaration.colors[i] = attribute,
            Slot::TexCoord(i) => chunk.vertex_declaration.texcoords[i] = attribute,
        }
        chunk.components_available |= slot.component_bit();
    }

    chunk.indices = read_indices(ctx, mesh_name, &index_accessor)?;
    chunk.num_indices = chunk.indices.len() as u32;
    Ok(chunk)
}

/// Buffer bytes, first element offset and element stride of an accessor.
fn accessor_source<'a>(
    ctx: &'a ImportContext,
    accessor: &gltf::Accessor,
) -> Result<(&'a [u8], usize, usize)> {
    let Some(view) = accessor.view() else {
        return Err(AssetError::unsupported(
            ctx.label,
            format!("accessor {} has no buffer view", accessor.index()),
        ));
    };
    let Some(buffer) = ctx.buffers.get(view.buffer().index()) else {
        return Err(AssetError::InvalidFormat(format!(
            "{}: buffer {} is missing",
            ctx.label,
            view.buffer().index()
        )));
    };
    let start = view.offset() + accessor.offset();
    let stride = view.stride().unwrap_or(accessor.size());
    Ok((buffer, start, stride))
}

/// Every element of `accessor` must lie inside its buffer view and buffer.
fn check_accessor_extent(ctx: &ImportContext, accessor: &gltf::Accessor, element_size: usize) -> Result<()> {
    let count = accessor.count();
    if count == 0 {
        return Ok(());
    }
    let (buffer, start, stride) = accessor_source(ctx, accessor)?;
    let view_end = accessor
        .view()
        .map_or(buffer.len(), |view| view.offset().saturating_add(view.length()));
    let end = (count - 1)
        .checked_mul(stride)
        .and_then(|last| last.checked_add(start))
        .and_then(|last| last.checked_add(element_size));
    match end {
        Some(end) if end <= view_end && end <= buffer.len() => Ok(()),
        _ => Err(AssetError::InvalidFormat(format!(
            "{}: accessor {} declares {count} elements, more than its buffer view holds",
            ctx.label,
            accessor.index()
        ))),
    }
}

fn element<'a>(
    ctx: &ImportContext,
    accessor: &gltf::Accessor,
    buffer: &'a [u8],
    at: usize,
    len: usize,
) -> Result<&'a [u8]> {
    buffer.get(at..at + len).ok_or_else(|| {
        AssetError::InvalidFormat(format!(
            "{}: accessor {} reads past the end of its buffer",
            ctx.label,
            accessor.index()
        ))
    })
}

fn copy_attribute(
    ctx: &ImportContext,
    accessor: &gltf::Accessor,
    attribute: &AttributeFormat,
    vertex_stride: usize,
    vertex_data: &mut [u8],
) -> Result<()> {
    let (buffer, start, src_stride) = accessor_source(ctx, accessor)?;
    let size = attribute.byte_size() as usize;
    let offset = attribute.offset as usize;
    for i in 0..accessor.count() {
        let src = element(ctx, accessor, buffer, start + i * src_stride, size)?;
        let dst = i * vertex_stride + offset;
        vertex_data[dst..dst + size].copy_from_slice(src);
    }
    Ok(())
}

/// Indices are narrowed to 16 bits; wider values wrap and are reported.
fn read_indices(ctx: &ImportContext, mesh_name: &str, accessor: &gltf::Accessor) -> Result<Vec<u16>> {
    let (buffer, start, stride) = accessor_source(ctx, accessor)?;
    let width = match accessor.data_type() {
        DataType::U8 => 1,
        DataType::U16 => 2,
        DataType::U32 => 4,
        other => {
            return Err(AssetError::unsupported(
                ctx.label,
                format!("mesh '{mesh_name}': index component type {other:?}"),
            ));
        }
    };

    check_accessor_extent(ctx, accessor, width)?;

    let mut indices = Vec::with_capacity(accessor.count());
    let mut truncated = 0usize;
    let mut largest = 0u32;
    for i in 0..accessor.count() {
        let raw = element(ctx, accessor, buffer, start + i * stride, width)?;
        let value = match width {
            1 => u32::from(raw[0]),
            2 => u32::from(u16::from_le_bytes([raw[0], raw[1]])),
            _ => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        };
        if value > u32::from(u16::MAX) {
            truncated += 1;
            largest = largest.max(value);
        }
        indices.push(value as u16);
    }

    if truncated > 0 {
        log::warn!(
            "{}: mesh '{mesh_name}' has {truncated} index value(s) above 65535 (largest {largest}); truncated to 16 bits",
            ctx.label
        );
    }
    Ok(indices)
}
