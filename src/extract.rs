use std::path::{Path, PathBuf};

use log::{debug, error};
use rayon::prelude::*;
use thiserror::Error;

use crate::export::{ExportOptions, MeshExporter};
use crate::manifest::{ComponentRecord, ComponentTable};
use crate::scene_graph::Scene;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to export {failed} of {total} components")]
    ExportFailed { failed: usize, total: usize },
}

/// Exports every mesh of the scene as its own component file and returns
/// the id table, ids assigned in mesh-index order with no gaps.
///
/// Exports run in parallel; the table is assembled positionally so the ids
/// do not depend on completion order. If any export fails, every failure is
/// logged, the error carries the counts, and no table is produced.
pub fn extract_components<E>(
    scene: &Scene,
    exporter: &E,
    prefix: &Path,
) -> Result<ComponentTable, ExtractError>
where
    E: MeshExporter + Sync,
{
    // The flattener owns transform composition; exported geometry stays in
    // mesh-local space.
    let options = ExportOptions {
        pre_transform_vertices: false,
    };

    let views: Vec<_> = (0..scene.meshes.len())
        .filter_map(|i| scene.single_mesh_view(i))
        .collect();

    let results: Vec<_> = views
        .par_iter()
        .enumerate()
        .map(|(i, view)| {
            let path = component_path(prefix, i);
            match exporter.export(view, &path, &options) {
                Ok(()) => Ok(ComponentRecord {
                    file: path.display().to_string(),
                    id: i as u32,
                }),
                Err(err) => Err((i, path, err)),
            }
        })
        .collect();

    let total = results.len();
    let mut records = Vec::with_capacity(total);
    let mut failed = 0;
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err((index, path, err)) => {
                failed += 1;
                error!("component {} export to {} failed: {}", index, path.display(), err);
            }
        }
    }

    if failed > 0 {
        return Err(ExtractError::ExportFailed { failed, total });
    }

    debug!("exported {total} components");
    Ok(ComponentTable::new(records))
}

fn component_path(prefix: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_part_{}.ply", prefix.display(), index))
}
