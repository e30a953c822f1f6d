mod node;
mod scene;

pub use node::{Node, NodeId};
pub use scene::{Scene, SceneGraph, SubScene};
