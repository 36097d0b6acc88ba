mod common;

use std::path::Path;

use common::{FLOAT, GltfFixture, TRIANGLE, UNSIGNED_SHORT, f32_bytes, single_triangle, to_bytes};
use mod_asset_forge::AssetError;
use mod_asset_forge::math::{MAT4_IDENTITY, mat4_transform_point};
use mod_asset_forge::mesh::{ComponentFormat, PrimitiveType, VertexComponents, import_gltf_file, import_gltf_slice};
use serde_json::json;

#[test]
fn parent_translation_applies_to_child_mesh() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document(
        json!([0, 2]),
        json!([
            { "translation": [1.0, 0.0, 0.0], "children": [1] },
            { "mesh": 0 },
            { "mesh": 0 }
        ]),
        json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
    );

    let data = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect("import");
    assert_eq!(data.chunks.len(), 2);

    let child = &data.chunks[0];
    assert_eq!(&child.transform[12..15], &[1.0, 0.0, 0.0]);
    assert_eq!(mat4_transform_point(&child.transform, [0.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
    assert_eq!(mat4_transform_point(&child.transform, [0.0, 1.0, 0.0]), [1.0, 1.0, 0.0]);

    // The sibling root must not inherit the first subtree's translation.
    assert_eq!(data.chunks[1].transform, MAT4_IDENTITY);
}

#[test]
fn triangle_chunk_layout() {
    let data = import_gltf_slice(&single_triangle(json!({})), Path::new(".")).expect("import");
    assert_eq!(data.chunks.len(), 1);
    let chunk = &data.chunks[0];
    assert_eq!(chunk.primitive_type, PrimitiveType::Triangles);
    assert_eq!(chunk.num_vertices, 3);
    assert_eq!(chunk.vertex_stride, 12);
    assert_eq!(chunk.indices, vec![0, 1, 2]);
    assert_eq!(chunk.num_indices, 3);
    assert_eq!(chunk.components_available, VertexComponents::empty());
    assert!(chunk.vertex_declaration.position.enable);
    assert_eq!(chunk.vertex_declaration.position.components, 3);
    assert_eq!(chunk.vertex_declaration.position.format, ComponentFormat::Float);
    assert!(chunk.is_well_formed());

    let flat: Vec<f32> = TRIANGLE.iter().flatten().copied().collect();
    assert_eq!(chunk.vertex_data, f32_bytes(&flat));
}

#[test]
fn u32_indices_wrap_to_16_bits() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u32(&[0, 1, 70000]);
    let doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
    );

    let data = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect("import");
    assert_eq!(data.chunks[0].indices, vec![0, 1, 4464]);
}

#[test]
fn interleaved_source_is_repacked_in_attribute_order() {
    let normals = [[0.0f32, 0.0, 1.0]; 3];
    let uvs = [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]];

    let mut fixture = GltfFixture::new();
    let interleaved: Vec<f32> = TRIANGLE
        .iter()
        .zip(&normals)
        .flat_map(|(p, n)| p.iter().chain(n).copied().collect::<Vec<_>>())
        .collect();
    let shared = fixture.view(&f32_bytes(&interleaved), Some(24));
    let position = fixture.accessor(shared, 0, FLOAT, 3, "VEC3");
    fixture.bound(position, &TRIANGLE);
    let normal = fixture.accessor(shared, 12, FLOAT, 3, "VEC3");
    let flat_uvs: Vec<f32> = uvs.iter().flatten().copied().collect();
    let uv_view = fixture.view(&f32_bytes(&flat_uvs), None);
    let uv = fixture.accessor(uv_view, 0, FLOAT, 3, "VEC2");
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{
            "attributes": { "TEXCOORD_0": uv, "NORMAL": normal, "POSITION": position },
            "indices": indices
        }] }]),
    );

    let data = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect("import");
    let chunk = &data.chunks[0];
    assert_eq!(chunk.vertex_stride, 32);
    assert_eq!(chunk.vertex_declaration.stride, 32);
    assert_eq!(chunk.vertex_declaration.position.offset, 0);
    assert_eq!(chunk.vertex_declaration.normal.offset, 12);
    assert_eq!(chunk.vertex_declaration.texcoords[0].offset, 24);
    assert_eq!(chunk.vertex_declaration.texcoords[0].components, 2);
    assert!(!chunk.vertex_declaration.colors[0].enable);
    assert_eq!(
        chunk.components_available,
        VertexComponents::NORMAL | VertexComponents::TEXCOORD0
    );

    let expected: Vec<f32> = (0..3)
        .flat_map(|i| {
            TRIANGLE[i]
                .iter()
                .chain(&normals[i])
                .chain(&uvs[i])
                .copied()
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(chunk.vertex_data, f32_bytes(&expected));
    assert!(chunk.is_well_formed());
}

#[test]
fn unsupported_primitives_abort_the_import() {
    for primitive in [
        json!({ "indices": null }),
        json!({ "mode": 6 }),
        json!({ "mode": 3 }),
        json!({ "mode": 2 }),
    ] {
        let err = import_gltf_slice(&single_triangle(primitive.clone()), Path::new("."))
            .expect_err("must be rejected");
        assert!(err.is_unsupported(), "{primitive}: {err}");
    }
}

#[test]
fn supported_modes_map_to_primitive_types() {
    for (mode, expected) in [
        (0, PrimitiveType::Points),
        (1, PrimitiveType::Lines),
        (5, PrimitiveType::TriangleStrip),
    ] {
        let data = import_gltf_slice(&single_triangle(json!({ "mode": mode })), Path::new("."))
            .expect("import");
        assert_eq!(data.chunks[0].primitive_type, expected);
    }
}

#[test]
fn missing_position_is_unsupported() {
    let mut fixture = GltfFixture::new();
    let flat: Vec<f32> = TRIANGLE.iter().flatten().copied().collect();
    let view = fixture.view(&f32_bytes(&flat), None);
    let normal = fixture.accessor(view, 0, FLOAT, 3, "VEC3");
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{ "attributes": { "NORMAL": normal }, "indices": indices }] }]),
    );
    let err = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect_err("no POSITION");
    assert!(err.is_unsupported(), "{err}");
}

#[test]
fn missing_position_beside_a_valid_mesh_is_unsupported() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document(
        json!([0, 1]),
        json!([{ "mesh": 0 }, { "mesh": 1 }]),
        json!([
            { "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] },
            { "primitives": [{ "attributes": {}, "indices": indices }] }
        ]),
    );
    let err = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect_err("no POSITION");
    assert!(err.is_unsupported(), "{err}");
    assert!(err.to_string().contains("POSITION"), "{err}");
}

#[test]
fn accessor_counts_past_their_view_are_rejected() {
    // Positions and indices share one buffer, so a count of 4 would read
    // index bytes unless the view bound is enforced.
    for count in [4usize, 1 << 40] {
        let mut fixture = GltfFixture::new();
        let flat: Vec<f32> = TRIANGLE.iter().flatten().copied().collect();
        let view = fixture.view(&f32_bytes(&flat), None);
        let position = fixture.accessor(view, 0, FLOAT, count, "VEC3");
        fixture.bound(position, &TRIANGLE);
        let indices = fixture.indices_u16(&[0, 1, 2]);
        let doc = fixture.document(
            json!([0]),
            json!([{ "mesh": 0 }]),
            json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
        );
        let err = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect_err("oversized count");
        assert!(matches!(err, AssetError::InvalidFormat(_)), "count {count}: {err}");
    }
}

#[test]
fn index_counts_past_their_view_are_rejected() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let bytes: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect();
    let view = fixture.view(&bytes, None);
    let indices = fixture.accessor(view, 0, UNSIGNED_SHORT, 1 << 36, "SCALAR");
    let doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
    );
    let err = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect_err("oversized count");
    assert!(matches!(err, AssetError::InvalidFormat(_)), "{err}");
}

#[test]
fn attribute_count_mismatch_is_unsupported() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let view = fixture.view(&f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]), None);
    let normal = fixture.accessor(view, 0, FLOAT, 2, "VEC3");
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{
            "attributes": { "POSITION": position, "NORMAL": normal },
            "indices": indices
        }] }]),
    );
    let err = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect_err("count mismatch");
    assert!(err.is_unsupported(), "{err}");
}

#[test]
fn materials_are_listed_unbound() {
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let mut doc = fixture.document(
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{
            "attributes": { "POSITION": position },
            "indices": indices,
            "material": 0
        }] }]),
    );
    doc["materials"] = json!([{ "name": "Body" }, {}]);

    let data = import_gltf_slice(&to_bytes(&doc), Path::new(".")).expect("import");
    assert_eq!(data.chunks[0].material_name, "Body");
    assert_eq!(data.material_mapping.len(), 2);
    assert_eq!(data.material_mapping.get("Body").map(String::as_str), Some(""));
    assert_eq!(data.material_mapping.get("").map(String::as_str), Some(""));
    assert_eq!(data.material_asset_for(&data.chunks[0]), None);
}

#[test]
fn external_buffers_resolve_next_to_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[2, 1, 0]);
    let doc = fixture.document_with_uri(
        "triangle.bin",
        json!([0]),
        json!([{ "mesh": 0, "scale": [2.0, 2.0, 2.0] }]),
        json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
    );
    std::fs::write(dir.path().join("triangle.bin"), fixture.buffer_bytes()).expect("write bin");
    let path = dir.path().join("triangle.gltf");
    std::fs::write(&path, to_bytes(&doc)).expect("write gltf");

    let data = import_gltf_file(&path).expect("import");
    let chunk = &data.chunks[0];
    assert_eq!(chunk.indices, vec![2, 1, 0]);
    assert_eq!(mat4_transform_point(&chunk.transform, [1.0, 0.0, 0.0]), [2.0, 0.0, 0.0]);
}

#[test]
fn missing_external_buffer_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut fixture = GltfFixture::new();
    let position = fixture.positions(&TRIANGLE);
    let indices = fixture.indices_u16(&[0, 1, 2]);
    let doc = fixture.document_with_uri(
        "absent.bin",
        json!([0]),
        json!([{ "mesh": 0 }]),
        json!([{ "primitives": [{ "attributes": { "POSITION": position }, "indices": indices }] }]),
    );
    let path = dir.path().join("broken.gltf");
    std::fs::write(&path, to_bytes(&doc)).expect("write gltf");
    assert!(import_gltf_file(&path).is_err());
}
