use glam::DMat4;
use id_arena::Arena;
use thiserror::Error;

use crate::manifest::{AssemblyRecord, ComponentTable};
use crate::scene_graph::{Node, NodeId, SceneGraph};

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("node \"{node}\" references mesh {mesh_index} with no exported component")]
    UnknownComponent { node: String, mesh_index: usize },
}

/// Scene graph whose node transforms are absolute, relative to the root.
///
/// Produced by [`flatten_graph`], which consumes the local-space graph, so
/// a graph cannot be flattened twice.
pub struct FlatGraph {
    nodes: Arena<Node>,
    root: NodeId,
}

impl FlatGraph {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
}

/// Rewrites every node transform from parent-relative to scene-absolute and
/// emits one assembly record per (node, mesh-slot) pair, in depth-first
/// traversal order with children visited in stored order.
///
/// Parents are rewritten before their children are visited; a child reads
/// its parent's already absolute transform.
pub fn flatten_graph(
    graph: SceneGraph,
    components: &ComponentTable,
) -> Result<(FlatGraph, Vec<AssemblyRecord>), FlattenError> {
    let SceneGraph { mut nodes, root } = graph;
    let mut assembly = Vec::new();
    visit(&mut nodes, root, components, &mut assembly)?;
    Ok((FlatGraph { nodes, root }, assembly))
}

fn visit(
    nodes: &mut Arena<Node>,
    id: NodeId,
    components: &ComponentTable,
    assembly: &mut Vec<AssemblyRecord>,
) -> Result<(), FlattenError> {
    let parent_transform = nodes[id].parent_id.map(|parent| nodes[parent].transform);

    let (absolute, name, mesh_indices, child_ids) = {
        let node = &mut nodes[id];
        if let Some(parent) = parent_transform {
            node.transform = parent * node.transform;
        }
        (
            node.transform,
            node.name.clone(),
            node.mesh_indices.clone(),
            node.child_ids.clone(),
        )
    };

    for mesh_index in mesh_indices {
        let component =
            components
                .id_for(mesh_index)
                .ok_or_else(|| FlattenError::UnknownComponent {
                    node: name.clone(),
                    mesh_index,
                })?;
        assembly.push(AssemblyRecord {
            component,
            transform: row_major(absolute),
        });
    }

    for child in child_ids {
        visit(nodes, child, components, assembly)?;
    }
    Ok(())
}

/// The 16 matrix entries in row-major order.
fn row_major(m: DMat4) -> [f64; 16] {
    m.transpose().to_cols_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    use crate::manifest::ComponentRecord;

    fn table(ids: &[u32]) -> ComponentTable {
        ComponentTable::new(
            ids.iter()
                .map(|&id| ComponentRecord {
                    file: format!("part_{id}.ply"),
                    id,
                })
                .collect(),
        )
    }

    fn translation_of(record: &AssemblyRecord) -> DVec3 {
        DVec3::new(
            record.transform[3],
            record.transform[7],
            record.transform[11],
        )
    }

    #[test]
    fn chain_composes_parent_before_child() {
        let mut graph = SceneGraph::with_root("root");
        let mut a = Node::new("a");
        a.transform = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
        a.mesh_indices = vec![0];
        let a_id = graph.add_child(graph.root, a);

        let mut b = Node::new("b");
        b.transform = DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0));
        b.mesh_indices = vec![1];
        graph.add_child(a_id, b);

        let (_, assembly) = flatten_graph(graph, &table(&[0, 1])).unwrap();

        assert_eq!(assembly.len(), 2);
        assert_eq!(assembly[0].component, 0);
        assert_eq!(translation_of(&assembly[0]), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(assembly[1].component, 1);
        assert_eq!(translation_of(&assembly[1]), DVec3::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn flattened_graph_holds_absolute_transforms() {
        let mut graph = SceneGraph::with_root("root");
        let mut a = Node::new("a");
        a.transform = DMat4::from_translation(DVec3::new(0.0, 5.0, 0.0));
        let a_id = graph.add_child(graph.root, a);

        let mut b = Node::new("b");
        b.transform = DMat4::from_translation(DVec3::new(0.0, 0.0, 2.0));
        let b_id = graph.add_child(a_id, b);

        let (flat, _) = flatten_graph(graph, &table(&[])).unwrap();
        let expected = DMat4::from_translation(DVec3::new(0.0, 5.0, 2.0));
        assert_eq!(flat.node(b_id).unwrap().transform, expected);
        assert_eq!(flat.node(b_id).unwrap().parent_id, Some(a_id));
    }

    #[test]
    fn one_record_per_mesh_slot() {
        let mut graph = SceneGraph::with_root("root");
        let mut node = Node::new("pair");
        node.transform = DMat4::from_translation(DVec3::new(4.0, 0.0, 0.0));
        node.mesh_indices = vec![0, 1];
        graph.add_child(graph.root, node);

        let (_, assembly) = flatten_graph(graph, &table(&[0, 1])).unwrap();

        assert_eq!(assembly.len(), 2);
        assert_eq!(assembly[0].component, 0);
        assert_eq!(assembly[1].component, 1);
        assert_eq!(assembly[0].transform, assembly[1].transform);
    }

    #[test]
    fn records_follow_depth_first_order() {
        // root (mesh 0) with children a (mesh 1, child mesh 2) and b (mesh 3)
        let mut graph = SceneGraph::with_root("root");
        graph.nodes[graph.root].mesh_indices = vec![0];

        let mut a = Node::new("a");
        a.mesh_indices = vec![1];
        let a_id = graph.add_child(graph.root, a);

        let mut a_child = Node::new("a_child");
        a_child.mesh_indices = vec![2];
        graph.add_child(a_id, a_child);

        let mut b = Node::new("b");
        b.mesh_indices = vec![3];
        graph.add_child(graph.root, b);

        let (_, assembly) = flatten_graph(graph, &table(&[0, 1, 2, 3])).unwrap();
        let order: Vec<_> = assembly.iter().map(|r| r.component).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn root_transform_is_used_as_is() {
        let mut graph = SceneGraph::with_root("root");
        let root_transform = DMat4::from_translation(DVec3::new(7.0, 8.0, 9.0));
        graph.nodes[graph.root].transform = root_transform;
        graph.nodes[graph.root].mesh_indices = vec![0];

        let (flat, assembly) = flatten_graph(graph, &table(&[0])).unwrap();
        assert_eq!(flat.node(flat.root()).unwrap().transform, root_transform);
        assert_eq!(translation_of(&assembly[0]), DVec3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn transform_values_survive_identity_parent_exactly() {
        let mut values = [0.0; 16];
        for (i, value) in values.iter_mut().enumerate() {
            *value = i as f64 * 1.5;
        }

        let mut graph = SceneGraph::with_root("root");
        let mut node = Node::new("leaf");
        // Author the matrix so its row-major flattening is exactly `values`.
        node.transform = DMat4::from_cols_array(&values).transpose();
        node.mesh_indices = vec![0];
        graph.add_child(graph.root, node);

        let (_, assembly) = flatten_graph(graph, &table(&[0])).unwrap();
        assert_eq!(assembly[0].transform, values);
    }

    #[test]
    fn missing_component_is_a_hard_error() {
        let mut graph = SceneGraph::with_root("root");
        let mut node = Node::new("orphan");
        node.mesh_indices = vec![5];
        graph.add_child(graph.root, node);

        let result = flatten_graph(graph, &table(&[0]));
        assert!(matches!(
            result,
            Err(FlattenError::UnknownComponent { mesh_index: 5, .. })
        ));
    }
}
