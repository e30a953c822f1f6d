use std::ffi::OsStr;
use std::path::Path;

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::{debug, warn};

use crate::mesh::{Material, Mesh};
use crate::scene_graph::{Node, NodeId, Scene, SceneGraph};

use super::postprocess::PostProcess;
use super::ImportError;

pub fn load(path: &Path, postprocess: &PostProcess) -> Result<Scene, ImportError> {
    let (document, buffers, _images) = gltf::import(path)?;

    let materials = document
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            Material {
                name: material
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| "default".to_string()),
                base_color: pbr.base_color_factor(),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
            }
        })
        .collect::<Vec<_>>();

    // Every glTF primitive becomes one mesh entry. `mesh_slots[i]` lists the
    // entries produced from glTF mesh i, so nodes can reference all of them.
    let mut meshes = Vec::new();
    let mut mesh_slots: Vec<Vec<usize>> = Vec::new();
    for mesh in document.meshes() {
        let mesh_name = mesh
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        let primitive_count = mesh.primitives().count();

        let mut slots = Vec::new();
        for primitive in mesh.primitives() {
            let name = if primitive_count > 1 {
                format!("{}_{}", mesh_name, primitive.index())
            } else {
                mesh_name.clone()
            };
            if let Some(entry) = read_primitive(name, &primitive, &buffers, postprocess)? {
                slots.push(meshes.len());
                meshes.push(entry);
            }
        }
        mesh_slots.push(slots);
    }

    let source_scene = document.default_scene().or_else(|| document.scenes().next());
    let root_name = source_scene
        .as_ref()
        .and_then(|scene| scene.name())
        .or_else(|| path.file_stem().and_then(OsStr::to_str))
        .unwrap_or("scene");

    let mut graph = SceneGraph::with_root(root_name);
    let root = graph.root;
    if let Some(scene) = source_scene {
        for node in scene.nodes() {
            spawn_node(&mut graph, root, &node, &mesh_slots);
        }
    }

    debug!(
        "imported {}: {} meshes, {} materials, {} nodes",
        path.display(),
        meshes.len(),
        materials.len(),
        graph.nodes.len()
    );

    Ok(Scene {
        meshes,
        materials,
        graph,
    })
}

fn spawn_node(
    graph: &mut SceneGraph,
    parent: NodeId,
    node: &gltf::Node<'_>,
    mesh_slots: &[Vec<usize>],
) {
    let mut entry = Node::new(node.name().unwrap_or("Unnamed"));
    entry.transform = Mat4::from_cols_array_2d(&node.transform().matrix()).as_dmat4();
    if let Some(mesh) = node.mesh() {
        entry.mesh_indices = mesh_slots.get(mesh.index()).cloned().unwrap_or_default();
    }

    let id = graph.add_child(parent, entry);
    for child in node.children() {
        spawn_node(graph, id, &child, mesh_slots);
    }
}

fn read_primitive(
    name: String,
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    postprocess: &PostProcess,
) -> Result<Option<Mesh>, ImportError> {
    use gltf::mesh::Mode;

    let mode = primitive.mode();
    if !matches!(mode, Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan) {
        if postprocess.keep_only_triangles {
            debug!("dropping {:?} primitive of \"{name}\"", mode);
        } else {
            warn!("skipping {:?} primitive of \"{name}\": not a triangle mesh", mode);
        }
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions = reader
        .read_positions()
        .ok_or_else(|| ImportError::MissingPositions(name.clone()))?
        .map(Vec3::from)
        .collect::<Vec<_>>();
    let normals = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect())
        .unwrap_or_default();
    let tangents = reader
        .read_tangents()
        .map(|iter| iter.map(Vec4::from).collect())
        .unwrap_or_default();
    let colors = reader
        .read_colors(0)
        .map(|colors| colors.into_rgba_f32().collect())
        .unwrap_or_default();
    let uvs = reader
        .read_tex_coords(0)
        .map(|coords| coords.into_f32().map(Vec2::from).collect())
        .unwrap_or_default();
    let raw_indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect::<Vec<_>>())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let indices = match mode {
        Mode::Triangles => raw_indices,
        Mode::TriangleStrip if postprocess.triangulate => strip_to_list(&raw_indices),
        Mode::TriangleFan if postprocess.triangulate => fan_to_list(&raw_indices),
        _ => {
            warn!("skipping {:?} primitive of \"{name}\": triangulation disabled", mode);
            return Ok(None);
        }
    };

    Ok(Some(Mesh {
        name,
        positions,
        normals,
        tangents,
        colors,
        uvs,
        indices,
        material: primitive.material().index(),
    }))
}

fn strip_to_list(indices: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 2..indices.len() {
        // Every other strip triangle flips winding.
        if i % 2 == 0 {
            out.extend_from_slice(&[indices[i - 2], indices[i - 1], indices[i]]);
        } else {
            out.extend_from_slice(&[indices[i - 1], indices[i - 2], indices[i]]);
        }
    }
    out
}

fn fan_to_list(indices: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 2..indices.len() {
        out.extend_from_slice(&[indices[0], indices[i - 1], indices[i]]);
    }
    out
}
