//! Post-processing steps applied to a freshly imported scene.
//!
//! Each step is independent and opt-in. The order inside [`apply`] matters:
//! attribute removal runs before instance detection so stripped attributes
//! cannot keep otherwise identical meshes apart.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use glam::Vec3;
use log::debug;

use crate::mesh::Mesh;
use crate::scene_graph::Scene;

/// Per-vertex attributes stripped by the remove-components step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentMask {
    pub normals: bool,
    pub tangents: bool,
    pub colors: bool,
}

impl ComponentMask {
    pub const ALL: Self = Self {
        normals: true,
        tangents: true,
        colors: true,
    };

    pub fn any(self) -> bool {
        self.normals || self.tangents || self.colors
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostProcess {
    /// Convert triangle strips and fans to triangle lists at parse time.
    pub triangulate: bool,
    /// Drop point and line primitives at parse time.
    pub keep_only_triangles: bool,
    pub find_degenerates: bool,
    pub fix_infacing_normals: bool,
    pub find_instances: bool,
    pub improve_cache_locality: bool,
    pub remove_components: ComponentMask,
}

pub fn apply(scene: &mut Scene, steps: &PostProcess) {
    if steps.fix_infacing_normals {
        for mesh in &mut scene.meshes {
            fix_infacing_normals(mesh);
        }
    }
    if steps.find_degenerates {
        for mesh in &mut scene.meshes {
            let removed = remove_degenerates(mesh);
            if removed > 0 {
                debug!("removed {} degenerate triangles from \"{}\"", removed, mesh.name);
            }
        }
    }
    if steps.remove_components.any() {
        for mesh in &mut scene.meshes {
            remove_components(mesh, steps.remove_components);
        }
    }
    if steps.find_instances {
        let collapsed = collapse_instances(scene);
        if collapsed > 0 {
            debug!("collapsed {collapsed} duplicate meshes");
        }
    }
    if steps.improve_cache_locality {
        for mesh in &mut scene.meshes {
            reorder_for_locality(mesh);
        }
    }
}

/// Drops triangles that repeat an index or repeat a vertex position.
fn remove_degenerates(mesh: &mut Mesh) -> usize {
    let before = mesh.triangle_count();
    let positions = &mesh.positions;
    let mut kept = Vec::with_capacity(mesh.indices.len());
    for triangle in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
        if a == b || b == c || a == c {
            continue;
        }
        let (pa, pb, pc) = (
            positions[a as usize],
            positions[b as usize],
            positions[c as usize],
        );
        if pa == pb || pb == pc || pa == pc {
            continue;
        }
        kept.extend_from_slice(triangle);
    }
    mesh.indices = kept;
    before - mesh.triangle_count()
}

/// Flips normals that point into the mesh. Displacing every vertex along
/// its normal shrinks the bounding box exactly when the normals face
/// inward.
fn fix_infacing_normals(mesh: &mut Mesh) {
    if mesh.normals.len() != mesh.positions.len() || mesh.positions.is_empty() {
        return;
    }

    let mut min0 = Vec3::splat(f32::MAX);
    let mut max0 = Vec3::splat(f32::MIN);
    let mut min1 = min0;
    let mut max1 = max0;
    for (position, normal) in mesh.positions.iter().zip(&mesh.normals) {
        min0 = min0.min(*position);
        max0 = max0.max(*position);
        let displaced = *position + *normal;
        min1 = min1.min(displaced);
        max1 = max1.max(displaced);
    }

    if (max1 - min1).length_squared() < (max0 - min0).length_squared() {
        debug!("flipping infacing normals of \"{}\"", mesh.name);
        for normal in &mut mesh.normals {
            *normal = -*normal;
        }
    }
}

fn remove_components(mesh: &mut Mesh, mask: ComponentMask) {
    if mask.normals {
        mesh.normals.clear();
    }
    if mask.tangents {
        mesh.tangents.clear();
    }
    if mask.colors {
        mesh.colors.clear();
    }
}

/// Collapses content-identical meshes to a single entry and remaps node
/// mesh indices. Comparison is bit-exact on the attribute data.
fn collapse_instances(scene: &mut Scene) -> usize {
    let mesh_count = scene.meshes.len();
    let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut remap: Vec<usize> = (0..mesh_count).collect();
    let mut keep = vec![true; mesh_count];

    for i in 0..mesh_count {
        let hash = content_hash(&scene.meshes[i]);
        let candidates = by_hash.entry(hash).or_default();
        if let Some(&canonical) = candidates
            .iter()
            .find(|&&j| same_content(&scene.meshes[j], &scene.meshes[i]))
        {
            remap[i] = canonical;
            keep[i] = false;
        } else {
            candidates.push(i);
        }
    }

    let mut new_index = vec![usize::MAX; mesh_count];
    let mut next = 0;
    for i in 0..mesh_count {
        if keep[i] {
            new_index[i] = next;
            next += 1;
        }
    }
    let removed = mesh_count - next;
    if removed == 0 {
        return 0;
    }

    let old = std::mem::take(&mut scene.meshes);
    scene.meshes = old
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, mesh)| mesh)
        .collect();

    for (_, node) in scene.graph.nodes.iter_mut() {
        for index in &mut node.mesh_indices {
            *index = new_index[remap[*index]];
        }
    }

    removed
}

fn content_hash(mesh: &Mesh) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytemuck::cast_slice::<_, u8>(&mesh.positions).hash(&mut hasher);
    bytemuck::cast_slice::<_, u8>(&mesh.indices).hash(&mut hasher);
    mesh.material.hash(&mut hasher);
    hasher.finish()
}

fn same_content(a: &Mesh, b: &Mesh) -> bool {
    a.material == b.material
        && a.indices == b.indices
        && bytemuck::cast_slice::<_, u8>(&a.positions)
            == bytemuck::cast_slice::<_, u8>(&b.positions)
        && bytemuck::cast_slice::<_, u8>(&a.normals) == bytemuck::cast_slice::<_, u8>(&b.normals)
        && bytemuck::cast_slice::<_, u8>(&a.tangents)
            == bytemuck::cast_slice::<_, u8>(&b.tangents)
        && bytemuck::cast_slice::<_, u8>(&a.colors) == bytemuck::cast_slice::<_, u8>(&b.colors)
        && bytemuck::cast_slice::<_, u8>(&a.uvs) == bytemuck::cast_slice::<_, u8>(&b.uvs)
}

/// Reorders the vertex buffer by first use in the index stream so a forward
/// pass over the faces touches vertex memory roughly sequentially.
fn reorder_for_locality(mesh: &mut Mesh) {
    let vertex_count = mesh.positions.len();
    let mut new_of_old = vec![usize::MAX; vertex_count];
    let mut order = Vec::with_capacity(vertex_count);

    for &index in &mesh.indices {
        let slot = &mut new_of_old[index as usize];
        if *slot == usize::MAX {
            *slot = order.len();
            order.push(index as usize);
        }
    }
    // Unreferenced vertices keep their relative order at the tail.
    for i in 0..vertex_count {
        if new_of_old[i] == usize::MAX {
            new_of_old[i] = order.len();
            order.push(i);
        }
    }

    for index in &mut mesh.indices {
        *index = new_of_old[*index as usize] as u32;
    }
    permute(&mut mesh.positions, &order);
    if mesh.normals.len() == vertex_count {
        permute(&mut mesh.normals, &order);
    }
    if mesh.tangents.len() == vertex_count {
        permute(&mut mesh.tangents, &order);
    }
    if mesh.colors.len() == vertex_count {
        permute(&mut mesh.colors, &order);
    }
    if mesh.uvs.len() == vertex_count {
        permute(&mut mesh.uvs, &order);
    }
}

fn permute<T: Copy>(values: &mut Vec<T>, order: &[usize]) {
    *values = order.iter().map(|&old| values[old]).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::scene_graph::{Node, SceneGraph};

    fn mesh_with(positions: Vec<Vec3>, indices: Vec<u32>) -> Mesh {
        Mesh {
            name: "mesh".to_string(),
            positions,
            indices,
            ..Mesh::default()
        }
    }

    fn quad_positions() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn degenerate_triangles_are_removed() {
        let mut mesh = mesh_with(quad_positions(), vec![0, 1, 2, 0, 0, 1, 0, 2, 3]);
        let removed = remove_degenerates(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn coincident_vertices_count_as_degenerate() {
        let mut positions = quad_positions();
        positions.push(positions[0]);
        let mut mesh = mesh_with(positions, vec![0, 1, 4]);
        remove_degenerates(&mut mesh);
        assert!(mesh.indices.is_empty());
    }

    #[test]
    fn infacing_normals_are_flipped() {
        let positions = quad_positions()
            .into_iter()
            .map(|p| p * 2.0 - Vec3::new(1.0, 1.0, 0.0))
            .collect::<Vec<_>>();
        let inward = positions
            .iter()
            .map(|p| (-*p).normalize())
            .collect::<Vec<_>>();

        let mut mesh = mesh_with(positions.clone(), vec![0, 1, 2, 0, 2, 3]);
        mesh.normals = inward.clone();
        fix_infacing_normals(&mut mesh);
        for (flipped, original) in mesh.normals.iter().zip(&inward) {
            assert_eq!(*flipped, -*original);
        }

        // Outward normals stay put.
        let outward = mesh.normals.clone();
        fix_infacing_normals(&mut mesh);
        assert_eq!(mesh.normals, outward);
    }

    #[test]
    fn component_mask_strips_exactly_what_it_names() {
        let mut mesh = mesh_with(quad_positions(), vec![0, 1, 2]);
        mesh.normals = vec![Vec3::Z; 4];
        mesh.colors = vec![[1.0, 1.0, 1.0, 1.0]; 4];
        mesh.uvs = vec![glam::Vec2::ZERO; 4];

        remove_components(
            &mut mesh,
            ComponentMask {
                normals: true,
                tangents: true,
                colors: false,
            },
        );

        assert!(!mesh.has_normals());
        assert!(!mesh.has_tangents());
        assert!(mesh.has_colors());
        assert!(mesh.has_uvs());
    }

    #[test]
    fn duplicate_meshes_collapse_and_nodes_remap() {
        let duplicate = mesh_with(quad_positions(), vec![0, 1, 2]);
        let other = mesh_with(quad_positions(), vec![0, 2, 3]);

        let mut graph = SceneGraph::with_root("root");
        for i in 0..3 {
            let mut node = Node::new(format!("node_{i}"));
            node.mesh_indices = vec![i];
            graph.add_child(graph.root, node);
        }
        let mut scene = Scene {
            meshes: vec![duplicate.clone(), duplicate, other],
            materials: Vec::new(),
            graph,
        };

        let collapsed = collapse_instances(&mut scene);
        assert_eq!(collapsed, 1);
        assert_eq!(scene.meshes.len(), 2);

        let root_children = scene.graph.node(scene.graph.root).unwrap().child_ids.clone();
        let indices: Vec<_> = root_children
            .iter()
            .map(|&id| scene.graph.node(id).unwrap().mesh_indices[0])
            .collect();
        assert_eq!(indices, vec![0, 0, 1]);
    }

    #[test]
    fn distinct_materials_do_not_collapse() {
        let mut a = mesh_with(quad_positions(), vec![0, 1, 2]);
        let mut b = a.clone();
        a.material = Some(0);
        b.material = Some(1);

        let mut scene = Scene {
            meshes: vec![a, b],
            materials: Vec::new(),
            graph: SceneGraph::with_root("root"),
        };
        assert_eq!(collapse_instances(&mut scene), 0);
        assert_eq!(scene.meshes.len(), 2);
    }

    #[test]
    fn cache_reorder_preserves_geometry() {
        let mut mesh = mesh_with(quad_positions(), vec![2, 3, 0, 2, 0, 1]);
        mesh.uvs = vec![
            glam::Vec2::new(0.0, 0.0),
            glam::Vec2::new(1.0, 0.0),
            glam::Vec2::new(1.0, 1.0),
            glam::Vec2::new(0.0, 1.0),
        ];
        let original = mesh.clone();

        reorder_for_locality(&mut mesh);

        // First-use order puts the first referenced vertex at slot 0.
        assert_eq!(mesh.indices[0], 0);
        assert_eq!(mesh.positions.len(), 4);

        for (before, after) in original.indices.iter().zip(&mesh.indices) {
            assert_eq!(
                original.positions[*before as usize],
                mesh.positions[*after as usize]
            );
            assert_eq!(original.uvs[*before as usize], mesh.uvs[*after as usize]);
        }
    }

    #[test]
    fn apply_runs_removal_before_instance_detection() {
        let mut with_normals = mesh_with(quad_positions(), vec![0, 1, 2]);
        with_normals.normals = vec![Vec3::Z; 4];
        let without_normals = mesh_with(quad_positions(), vec![0, 1, 2]);

        let mut graph = SceneGraph::with_root("root");
        for i in 0..2 {
            let mut node = Node::new(format!("node_{i}"));
            node.mesh_indices = vec![i];
            graph.add_child(graph.root, node);
        }
        let mut scene = Scene {
            meshes: vec![with_normals, without_normals],
            materials: Vec::new(),
            graph,
        };

        apply(
            &mut scene,
            &PostProcess {
                find_instances: true,
                remove_components: ComponentMask::ALL,
                ..PostProcess::default()
            },
        );

        // Once normals are stripped the two meshes are identical.
        assert_eq!(scene.meshes.len(), 1);
    }
}
