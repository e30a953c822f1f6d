mod gltf_parser;
mod obj_parser;
pub mod postprocess;

use std::ffi::OsStr;
use std::path::Path;

use thiserror::Error;

use crate::scene_graph::Scene;

use postprocess::PostProcess;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported model format \"{0}\"")]
    Unsupported(String),
    #[error("failed to parse glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("failed to parse OBJ: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("mesh \"{0}\" has no vertex positions")]
    MissingPositions(String),
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub postprocess: PostProcess,
}

/// Caller-owned importer. Dispatches on the input extension and applies the
/// configured post-processing steps to whatever was parsed.
pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn import(&self, path: &Path) -> Result<Scene, ImportError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let mut scene = match extension.as_str() {
            "gltf" | "glb" => gltf_parser::load(path, &self.options.postprocess)?,
            "obj" => obj_parser::load(path)?,
            other => return Err(ImportError::Unsupported(other.to_string())),
        };

        postprocess::apply(&mut scene, &self.options.postprocess);
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_rejected() {
        let importer = Importer::new(ImportOptions::default());
        let result = importer.import(Path::new("model.fbx"));
        assert!(matches!(result, Err(ImportError::Unsupported(ext)) if ext == "fbx"));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let importer = Importer::new(ImportOptions::default());
        assert!(matches!(
            importer.import(Path::new("model")),
            Err(ImportError::Unsupported(_))
        ));
    }
}
