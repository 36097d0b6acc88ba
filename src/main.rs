use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use mod_asset_forge::assets::{
    AssetLibrary, AssetLoader, DirectoryAssetLibrary, MaterialData, check_material_matches_shader,
};
use mod_asset_forge::config::ForgeConfig;
use mod_asset_forge::mesh::{self, MeshData};
use mod_asset_forge::shader::CustomPipeline;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    ImportGltf { input: PathBuf, output: Option<PathBuf> },
    InspectMesh(PathBuf),
    Compose { material_id: String, instance: u32 },
    CheckMaterial(PathBuf),
}

#[derive(Debug, Default, Clone)]
struct Cli {
    config: Option<PathBuf>,
    command: Option<Command>,
    output: Option<PathBuf>,
    instance: Option<u32>,
}

const USAGE: &str = "supported: --config <forge.json>, --import-gltf <in.gltf> [--output <out.pmesh>], \
--inspect-mesh <file.pmesh>, --compose <material_asset_id> [--instance <n>], --check-material <file.json>";

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let Some(v) = args.get(i + 1) else {
            return Err(anyhow!("missing value for {flag} ({USAGE})"));
        };
        let command = match flag {
            "--config" => {
                cli.config = Some(PathBuf::from(v));
                None
            }
            "--output" => {
                cli.output = Some(PathBuf::from(v));
                None
            }
            "--instance" => {
                let n = v
                    .parse()
                    .map_err(|e| anyhow!("invalid --instance value '{v}': {e}"))?;
                cli.instance = Some(n);
                None
            }
            "--import-gltf" => Some(Command::ImportGltf {
                input: PathBuf::from(v),
                output: None,
            }),
            "--inspect-mesh" => Some(Command::InspectMesh(PathBuf::from(v))),
            "--compose" => Some(Command::Compose {
                material_id: v.clone(),
                instance: 0,
            }),
            "--check-material" => Some(Command::CheckMaterial(PathBuf::from(v))),
            other => return Err(anyhow!("unknown argument: {other} ({USAGE})")),
        };
        if let Some(command) = command {
            if cli.command.is_some() {
                bail!("only one of --import-gltf, --inspect-mesh, --compose, --check-material may be given");
            }
            cli.command = Some(command);
        }
        i += 2;
    }

    match &mut cli.command {
        Some(Command::ImportGltf { output, .. }) => *output = cli.output.take(),
        Some(Command::Compose { instance, .. }) => *instance = cli.instance.take().unwrap_or(0),
        _ => {}
    }
    if cli.output.is_some() {
        bail!("--output only applies to --import-gltf");
    }
    if cli.instance.is_some() {
        bail!("--instance only applies to --compose");
    }
    Ok(cli)
}

fn load_config(path: Option<&Path>) -> Result<ForgeConfig> {
    match path {
        Some(path) => ForgeConfig::load(path),
        None => Ok(ForgeConfig::default()),
    }
}

fn print_mesh_summary(data: &MeshData) {
    for (i, chunk) in data.chunks.iter().enumerate() {
        println!(
            "chunk {i}: {} vertices x {} bytes, {} indices, {:?}, material '{}'",
            chunk.num_vertices,
            chunk.vertex_stride,
            chunk.num_indices,
            chunk.primitive_type,
            chunk.material_name
        );
    }
    for (name, asset_id) in &data.material_mapping {
        let bound = if asset_id.is_empty() { "<unbound>" } else { asset_id.as_str() };
        println!("material '{name}' -> {bound}");
    }
}

fn run_import(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = mesh::import_gltf_file(input)
        .with_context(|| format!("failed to import {}", input.display()))?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("pmesh"));
    std::fs::write(&output, mesh::to_portable_bytes(&data))
        .with_context(|| format!("failed to write {}", output.display()))?;
    print_mesh_summary(&data);
    println!("[import] saved: {}", output.display());
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let data = mesh::from_portable_bytes(&bytes)
        .with_context(|| format!("invalid portable mesh {}", path.display()))?;
    print_mesh_summary(&data);
    Ok(())
}

fn run_compose(config: &ForgeConfig, material_id: &str, instance: u32) -> Result<()> {
    let library: Arc<dyn AssetLibrary> = Arc::new(DirectoryAssetLibrary::open(config)?);
    let loader = AssetLoader::new(library);
    let mut pipeline = CustomPipeline::new(material_id, instance, config.texture_unit);
    let pass = pipeline
        .update(&loader)
        .ok_or_else(|| anyhow!("material '{material_id}' could not be composed (see log)"))?;

    println!("// entry point: {}", pass.entry_point);
    println!("// uniform buffer: {} bytes", pass.uniform_data.len());
    println!("// material block");
    print!("{}", pass.material_block);
    println!("// shader");
    print!("{}", pass.shader_code);
    Ok(())
}

fn run_check_material(config: Option<&ForgeConfig>, path: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let asset_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("material");
    let material = MaterialData::from_json(asset_id, &json)?;
    println!(
        "material '{asset_id}': {} properties, {} uniform bytes, shader '{}'",
        material.properties.len(),
        material.memory_size(),
        material.shader_asset
    );

    let Some(config) = config else {
        return Ok(());
    };
    let library = DirectoryAssetLibrary::open(config)?;
    let shader = library.load_pixel_shader(&material.shader_asset)?;
    check_material_matches_shader(asset_id, &material, &shader.data)?;
    println!("matches shader '{}'", material.shader_asset);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;

    let Some(command) = cli.command else {
        bail!("no command given ({USAGE})");
    };
    match command {
        Command::ImportGltf { input, output } => run_import(&input, output.as_deref()),
        Command::InspectMesh(path) => run_inspect(&path),
        Command::Compose {
            material_id,
            instance,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_compose(&config, &material_id, instance)
        }
        Command::CheckMaterial(path) => {
            let config = cli
                .config
                .as_deref()
                .map(ForgeConfig::load)
                .transpose()?;
            run_check_material(config.as_ref(), &path)
        }
    }
}
