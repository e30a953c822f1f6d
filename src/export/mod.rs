mod ply;

pub use ply::{PlyExporter, PlyFormat};

use std::path::Path;

use thiserror::Error;

use crate::scene_graph::SubScene;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Bake the sub-scene root transform into the vertex data before
    /// encoding. The extractor leaves this off; transform composition
    /// belongs to the flattener.
    pub pre_transform_vertices: bool,
}

/// Encoder for single-mesh sub-scenes. Implementations are caller-owned;
/// the extractor takes whichever one it is handed.
pub trait MeshExporter {
    fn export(
        &self,
        scene: &SubScene<'_>,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError>;
}
