use glam::DMat4;
use id_arena::Arena;

use crate::mesh::{Material, Mesh};
use crate::scene_graph::node::{Node, NodeId};

/// Node hierarchy with exactly one root. Transforms are local to the parent
/// until the graph is consumed by the flattener.
pub struct SceneGraph {
    pub nodes: Arena<Node>,
    pub root: NodeId,
}

impl SceneGraph {
    pub fn with_root(name: impl Into<String>) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.alloc(Node::new(name));
        Self { nodes, root }
    }

    /// Allocates `node` under `parent`, wiring both directions of the
    /// relationship.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        node.parent_id = Some(parent);
        let id = self.nodes.alloc(node);
        self.nodes[parent].child_ids.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn root_name(&self) -> &str {
        &self.nodes[self.root].name
    }
}

/// Fully imported representation of a model file.
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub graph: SceneGraph,
}

impl Scene {
    /// Borrowed single-mesh sub-scene sharing this scene's material list.
    /// The view owns nothing; dropping it leaves the scene untouched.
    pub fn single_mesh_view(&self, index: usize) -> Option<SubScene<'_>> {
        let mesh = self.meshes.get(index)?;
        Some(SubScene {
            root_name: self.graph.root_name(),
            root_transform: DMat4::IDENTITY,
            mesh,
            materials: &self.materials,
        })
    }
}

/// Transient single-mesh view handed to an exporter.
pub struct SubScene<'a> {
    pub root_name: &'a str,
    pub root_transform: DMat4,
    pub mesh: &'a Mesh,
    pub materials: &'a [Material],
}
