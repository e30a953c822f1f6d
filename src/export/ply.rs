//! PLY encoder for single-mesh sub-scenes.
//!
//! Positions, normals, texture coordinates and vertex colors are written
//! when present; faces are triangle lists. Tangents have no PLY property
//! and are not encoded.

use std::io::Write;
use std::path::Path;

use glam::{DMat4, Vec3};
use itertools::Itertools;

use crate::mesh::Mesh;
use crate::scene_graph::SubScene;

use super::{ExportError, ExportOptions, MeshExporter};

/// Output encoding for component files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlyFormat {
    #[default]
    Ascii,
    BinaryLittleEndian,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlyExporter {
    format: PlyFormat,
}

impl PlyExporter {
    pub fn new(format: PlyFormat) -> Self {
        Self { format }
    }

    /// Encodes the sub-scene without touching the filesystem.
    pub fn build(
        &self,
        scene: &SubScene<'_>,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        let mesh = scene.mesh;
        if mesh.positions.is_empty() {
            return Err(ExportError::InvalidMesh(format!(
                "mesh \"{}\" has no vertices",
                mesh.name
            )));
        }

        let transformed = options
            .pre_transform_vertices
            .then(|| apply_transform(mesh, scene.root_transform));
        let (positions, normals): (&[Vec3], &[Vec3]) = match &transformed {
            Some((positions, normals)) => (positions, normals),
            None => (&mesh.positions, &mesh.normals),
        };

        let write_normals = normals.len() == positions.len();
        let write_uvs = mesh.uvs.len() == positions.len();
        let write_colors = mesh.colors.len() == positions.len();

        let mut out = Vec::new();
        writeln!(out, "ply")?;
        let format = match self.format {
            PlyFormat::Ascii => "ascii",
            PlyFormat::BinaryLittleEndian => "binary_little_endian",
        };
        writeln!(out, "format {format} 1.0")?;
        writeln!(out, "comment node {}", scene.root_name)?;
        if let Some(material) = mesh.material.and_then(|i| scene.materials.get(i)) {
            writeln!(out, "comment material {}", material.name)?;
        }
        writeln!(out, "element vertex {}", positions.len())?;
        writeln!(out, "property float x")?;
        writeln!(out, "property float y")?;
        writeln!(out, "property float z")?;
        if write_normals {
            writeln!(out, "property float nx")?;
            writeln!(out, "property float ny")?;
            writeln!(out, "property float nz")?;
        }
        if write_uvs {
            writeln!(out, "property float s")?;
            writeln!(out, "property float t")?;
        }
        if write_colors {
            writeln!(out, "property uchar red")?;
            writeln!(out, "property uchar green")?;
            writeln!(out, "property uchar blue")?;
            writeln!(out, "property uchar alpha")?;
        }
        writeln!(out, "element face {}", mesh.triangle_count())?;
        writeln!(out, "property list uchar uint vertex_indices")?;
        writeln!(out, "end_header")?;

        match self.format {
            PlyFormat::Ascii => {
                for (i, position) in positions.iter().enumerate() {
                    write!(out, "{} {} {}", position.x, position.y, position.z)?;
                    if write_normals {
                        let n = normals[i];
                        write!(out, " {} {} {}", n.x, n.y, n.z)?;
                    }
                    if write_uvs {
                        let uv = mesh.uvs[i];
                        write!(out, " {} {}", uv.x, uv.y)?;
                    }
                    if write_colors {
                        let c = color_bytes(mesh.colors[i]);
                        write!(out, " {} {} {} {}", c[0], c[1], c[2], c[3])?;
                    }
                    writeln!(out)?;
                }
                for triangle in mesh.indices.chunks_exact(3) {
                    writeln!(out, "3 {}", triangle.iter().format(" "))?;
                }
            }
            PlyFormat::BinaryLittleEndian => {
                for (i, position) in positions.iter().enumerate() {
                    for value in [position.x, position.y, position.z] {
                        out.extend_from_slice(&value.to_le_bytes());
                    }
                    if write_normals {
                        let n = normals[i];
                        for value in [n.x, n.y, n.z] {
                            out.extend_from_slice(&value.to_le_bytes());
                        }
                    }
                    if write_uvs {
                        let uv = mesh.uvs[i];
                        out.extend_from_slice(&uv.x.to_le_bytes());
                        out.extend_from_slice(&uv.y.to_le_bytes());
                    }
                    if write_colors {
                        out.extend_from_slice(&color_bytes(mesh.colors[i]));
                    }
                }
                for triangle in mesh.indices.chunks_exact(3) {
                    out.push(3);
                    for &index in triangle {
                        out.extend_from_slice(&index.to_le_bytes());
                    }
                }
            }
        }

        Ok(out)
    }
}

impl MeshExporter for PlyExporter {
    fn export(
        &self,
        scene: &SubScene<'_>,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        let data = self.build(scene, options)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

fn apply_transform(mesh: &Mesh, transform: DMat4) -> (Vec<Vec3>, Vec<Vec3>) {
    let positions = mesh
        .positions
        .iter()
        .map(|p| transform.transform_point3(p.as_dvec3()).as_vec3())
        .collect();
    // Directions go through the inverse transpose so non-uniform scale
    // keeps them perpendicular to the surface.
    let normal_matrix = transform.inverse().transpose();
    let normals = mesh
        .normals
        .iter()
        .map(|n| {
            normal_matrix
                .transform_vector3(n.as_dvec3())
                .normalize_or_zero()
                .as_vec3()
        })
        .collect();
    (positions, normals)
}

fn color_bytes(color: [f32; 4]) -> [u8; 4] {
    color.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}
