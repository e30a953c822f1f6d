use std::ffi::OsStr;
use std::path::Path;

use glam::{Vec2, Vec3};
use log::{debug, warn};

use crate::mesh::{Material, Mesh};
use crate::scene_graph::{Node, Scene, SceneGraph};

use super::ImportError;

pub fn load(path: &Path) -> Result<Scene, ImportError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )?;

    let materials = materials.unwrap_or_else(|err| {
        warn!("no usable MTL for {}: {}", path.display(), err);
        Vec::new()
    });

    let root_name = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("scene");

    let scene = scene_from_models(models, &materials, root_name);
    debug!(
        "imported {}: {} meshes, {} materials",
        path.display(),
        scene.meshes.len(),
        scene.materials.len()
    );
    Ok(scene)
}

/// OBJ files carry no transform hierarchy; each model becomes a child of a
/// synthetic root, with an identity transform.
fn scene_from_models(
    models: Vec<tobj::Model>,
    materials: &[tobj::Material],
    root_name: &str,
) -> Scene {
    let materials = materials
        .iter()
        .enumerate()
        .map(|(i, material)| convert_material(i, material))
        .collect();

    let mut graph = SceneGraph::with_root(root_name);
    let mut meshes = Vec::with_capacity(models.len());
    for (i, model) in models.into_iter().enumerate() {
        let mesh = convert_mesh(model, i);
        let mut node = Node::new(mesh.name.clone());
        node.mesh_indices = vec![meshes.len()];
        meshes.push(mesh);
        graph.add_child(graph.root, node);
    }

    Scene {
        meshes,
        materials,
        graph,
    }
}

fn convert_mesh(model: tobj::Model, index: usize) -> Mesh {
    let tobj::Model { mesh, name } = model;
    let name = if name.is_empty() {
        format!("model_{index}")
    } else {
        name
    };

    Mesh {
        name,
        positions: to_vec3s(&mesh.positions),
        normals: to_vec3s(&mesh.normals),
        tangents: Vec::new(),
        colors: mesh
            .vertex_color
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2], 1.0])
            .collect(),
        uvs: mesh
            .texcoords
            .chunks_exact(2)
            .map(|c| Vec2::new(c[0], c[1]))
            .collect(),
        indices: mesh.indices,
        material: mesh.material_id,
    }
}

fn convert_material(index: usize, material: &tobj::Material) -> Material {
    let diffuse = material.diffuse.unwrap_or([0.8, 0.8, 0.8]);
    Material {
        name: if material.name.is_empty() {
            format!("material_{index}")
        } else {
            material.name.clone()
        },
        base_color: [
            diffuse[0],
            diffuse[1],
            diffuse[2],
            material.dissolve.unwrap_or(1.0),
        ],
        metallic: 0.0,
        // MTL has no metallic/roughness pair; derive roughness from the
        // specular exponent.
        roughness: 1.0 - (material.shininess.unwrap_or(32.0) / 128.0).clamp(0.0, 1.0),
    }
}

fn to_vec3s(flat: &[f32]) -> Vec<Vec3> {
    flat.chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect()
}
