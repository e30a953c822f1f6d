use glam::DMat4;
use id_arena::Id;

pub type NodeId = Id<Node>;

/// One entry in the scene's transform hierarchy.
///
/// `transform` is relative to the parent node until the flattener rewrites
/// it into a scene-absolute transform; see [`crate::flatten::flatten_graph`].
pub struct Node {
    pub name: String,
    pub transform: DMat4,
    pub parent_id: Option<NodeId>,
    pub child_ids: Vec<NodeId>,
    /// Indices into the owning scene's flat mesh list.
    pub mesh_indices: Vec<usize>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: DMat4::IDENTITY,
            parent_id: None,
            child_ids: Vec::new(),
            mesh_indices: Vec::new(),
        }
    }
}
