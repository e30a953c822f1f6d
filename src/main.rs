use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use log::info;

mod export;
mod extract;
mod flatten;
mod import;
mod manifest;
mod mesh;
mod scene_graph;

use export::{PlyExporter, PlyFormat};
use extract::extract_components;
use flatten::flatten_graph;
use import::postprocess::{ComponentMask, PostProcess};
use import::{ImportOptions, Importer};
use manifest::Manifest;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        let program = args.first().map(String::as_str).unwrap_or("scenesplit");
        eprintln!("usage: {program} <input-model> <output-manifest.json>");
        process::exit(1);
    }

    run(Path::new(&args[1]), Path::new(&args[2]))
}

fn run(input: &Path, output: &Path) -> Result<()> {
    let options = ImportOptions {
        postprocess: PostProcess {
            triangulate: true,
            keep_only_triangles: true,
            find_degenerates: true,
            fix_infacing_normals: true,
            find_instances: true,
            improve_cache_locality: true,
            remove_components: ComponentMask::ALL,
        },
    };
    let importer = Importer::new(options);
    let scene = importer
        .import(input)
        .with_context(|| format!("failed to import {}", input.display()))?;
    info!("total components: {}", scene.meshes.len());

    let exporter = PlyExporter::new(PlyFormat::Ascii);
    let prefix = input.with_extension("");
    let components = extract_components(&scene, &exporter, &prefix)?;

    let (_flattened, assembly) = flatten_graph(scene.graph, &components)?;
    let manifest = Manifest {
        components: components.into_records(),
        assembly,
    };

    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    manifest
        .to_writer(BufWriter::new(file))
        .context("failed to write manifest")?;
    info!("wrote manifest to {}", output.display());

    Ok(())
}
