mod common;

use std::path::Path;
use std::sync::Arc;

use mod_asset_forge::AssetError;
use mod_asset_forge::assets::{AssetLibrary, AssetLoader, DirectoryAssetLibrary, PropertyValue};
use mod_asset_forge::config::ForgeConfig;
use mod_asset_forge::mesh::{MeshData, from_portable_bytes, to_portable_bytes};
use serde_json::json;

const GLOW_SOURCE: &str = "vec4 custom_main(vec4 c) { return c * strength; }\n";

fn write(dir: &Path, name: &str, contents: impl AsRef<[u8]>) {
    std::fs::write(dir.join(name), contents).expect("write fixture");
}

/// Asset tree with a shader, a material using it and a glTF mesh.
fn asset_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write(
        root,
        "forge.json",
        json!({ "asset_root": "assets", "texture_unit": 5 }).to_string(),
    );
    std::fs::create_dir(root.join("assets")).expect("mkdir");
    let assets = root.join("assets");
    write(
        &assets,
        "assets.json",
        json!({ "assets": {
            "glow": { "kind": "pixel_shader", "metadata": "glow.json", "source": "glow.glsl" },
            "glow_mat": { "kind": "material", "metadata": "glow_mat.json" },
            "tri": { "kind": "mesh", "metadata": "tri.json", "source": "tri.gltf" }
        }})
        .to_string(),
    );
    write(
        &assets,
        "glow.json",
        json!({ "properties": [{ "code_name": "strength", "type": "float" }] }).to_string(),
    );
    write(&assets, "glow.glsl", GLOW_SOURCE);
    write(&assets, "glow_mat.json", material_json(0.5));
    write(
        &assets,
        "tri.json",
        json!({ "material_mapping": { "": "glow_mat" } }).to_string(),
    );
    write(&assets, "tri.gltf", common::single_triangle(json!({})));
    dir
}

fn material_json(strength: f32) -> String {
    json!({
        "values": [{ "type": "float", "code_name": "strength", "value": strength }],
        "shader_asset": "glow"
    })
    .to_string()
}

fn open(dir: &tempfile::TempDir) -> DirectoryAssetLibrary {
    let config = ForgeConfig::load(&dir.path().join("forge.json")).expect("load config");
    assert_eq!(config.texture_unit, 5);
    DirectoryAssetLibrary::open(&config).expect("open library")
}

#[test]
fn loads_shader_and_material() {
    let dir = asset_tree();
    let library = open(&dir);

    let shader = library.load_pixel_shader("glow").expect("shader");
    assert_eq!(shader.data.source, GLOW_SOURCE);
    assert_eq!(shader.data.properties.len(), 1);
    let metadata_len = std::fs::metadata(dir.path().join("assets/glow.json"))
        .expect("stat")
        .len() as usize;
    assert_eq!(shader.info.bytes_loaded, metadata_len + GLOW_SOURCE.len());

    let material = library.load_material("glow_mat").expect("material");
    assert_eq!(material.data.shader_asset, "glow");
    assert_eq!(
        material.data.properties[0].value,
        Some(PropertyValue::Float(0.5))
    );
    assert!(material.info.bytes_loaded > 0);
}

#[test]
fn lookup_failures_are_typed() {
    let dir = asset_tree();
    let library = open(&dir);

    let err = library.load_material("nope").expect_err("unknown id");
    assert!(matches!(err, AssetError::NotFound(ref id) if id == "nope"), "{err}");

    let err = library.load_material("glow").expect_err("wrong kind");
    assert!(err.is_schema(), "{err}");
}

#[test]
fn gltf_mesh_is_imported_and_cached() {
    let dir = asset_tree();
    let library = open(&dir);
    let cache = dir.path().join("assets/tri.pmesh");

    let mesh = library.load_mesh("tri").expect("mesh");
    assert_eq!(mesh.data.chunks.len(), 1);
    assert_eq!(mesh.data.material_asset_for(&mesh.data.chunks[0]), Some("glow_mat"));
    assert!(cache.exists());

    let cached = from_portable_bytes(&std::fs::read(&cache).expect("read cache")).expect("decode");
    assert_eq!(cached.chunks, mesh.data.chunks);
}

#[test]
fn fresh_cache_is_preferred_over_the_gltf() {
    let dir = asset_tree();
    let library = open(&dir);
    let cache = dir.path().join("assets/tri.pmesh");
    library.load_mesh("tri").expect("first load");

    // Newer than the source, so it wins.
    std::fs::write(&cache, to_portable_bytes(&MeshData::default())).expect("overwrite cache");
    let mesh = library.load_mesh("tri").expect("cached load");
    assert!(mesh.data.chunks.is_empty());
    assert_eq!(mesh.data.material_mapping.get("").map(String::as_str), Some("glow_mat"));

    let uncached = library.clone().with_mesh_cache(false);
    assert_eq!(uncached.load_mesh("tri").expect("direct load").data.chunks.len(), 1);
}

#[test]
fn binary_gltf_sources_are_unsupported() {
    let dir = asset_tree();
    let assets = dir.path().join("assets");
    write(
        &assets,
        "assets.json",
        json!({ "assets": {
            "packed": { "kind": "mesh", "metadata": "tri.json", "source": "m.glb" },
            "renamed": { "kind": "mesh", "metadata": "tri.json", "source": "m.mesh" }
        }})
        .to_string(),
    );
    let container = b"glTF\x02\x00\x00\x00\x0c\x00\x00\x00";
    write(&assets, "m.glb", container);
    write(&assets, "m.mesh", container);
    let library = open(&dir);

    for id in ["packed", "renamed"] {
        let err = library.load_mesh(id).expect_err("binary glTF");
        assert!(err.is_unsupported(), "{id}: {err}");
        assert!(err.to_string().contains(".glb"), "{id}: {err}");
    }
}

#[test]
fn loader_hands_out_shared_handles() {
    let dir = asset_tree();
    let loader = AssetLoader::new(Arc::new(open(&dir)));

    let a = loader.load_material("glow_mat");
    let b = loader.load_material("glow_mat");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.data().is_some());
    assert!(a.last_loaded_time().is_some());

    let missing = loader.load_pixel_shader("absent");
    assert!(missing.data().is_none());
}

#[test]
fn reload_swaps_in_new_data_and_keeps_it_on_failure() {
    let dir = asset_tree();
    let assets = dir.path().join("assets");
    let loader = AssetLoader::new(Arc::new(open(&dir)));

    let handle = loader.load_material("glow_mat");
    let first = handle.data().expect("loaded");

    write(&assets, "glow_mat.json", material_json(2.0));
    assert!(loader.reload("glow_mat"));
    let second = handle.data().expect("reloaded");
    assert_eq!(second.properties[0].value, Some(PropertyValue::Float(2.0)));
    // Earlier readers keep their snapshot.
    assert_eq!(first.properties[0].value, Some(PropertyValue::Float(0.5)));

    write(&assets, "glow_mat.json", "{ not json");
    assert!(loader.reload("glow_mat"));
    let third = handle.data().expect("still loaded");
    assert!(Arc::ptr_eq(&second, &third));

    assert!(!loader.reload("never_requested"));
}

#[test]
fn library_trait_object_is_shareable() {
    let dir = asset_tree();
    let library: Arc<dyn AssetLibrary> = Arc::new(open(&dir));
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let library = Arc::clone(&library);
            std::thread::spawn(move || {
                library
                    .load_pixel_shader("glow")
                    .ok()
                    .map(|s| s.info.bytes_loaded)
            })
        })
        .collect();
    for t in threads {
        assert!(t.join().expect("join").expect("load") > 0);
    }
}
