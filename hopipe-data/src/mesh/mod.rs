//! Triangle meshes and the operations used to post-process extracted surfaces.

mod clean;
mod components;
mod obj;
mod smoothing;

pub use clean::{CleanReport, clean_mesh};
pub use components::{largest_component, split_components};
pub use obj::{load_obj, save_obj};
pub use smoothing::{LaplacianParams, filter_laplacian, mean_displacement};

use crate::types::{SimilarityTransform, Triangle};
use glam::{DMat4, Vec3};
use thiserror::Error;

/// Errors raised while reading, writing or processing meshes.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("face {face} references vertex {index} but mesh has {count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: usize,
        count: usize,
    },
}

/// An indexed triangle mesh with optional per-vertex colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[usize; 3]>,
    /// Either empty or one RGB color (0-1) per vertex.
    pub colors: Vec<Vec3>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            colors: Vec::new(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.len() == self.vertices.len()
    }

    /// Check that every face index points at an existing vertex.
    pub fn validate(&self) -> Result<(), MeshError> {
        let count = self.vertices.len();
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i >= count) {
                return Err(MeshError::IndexOutOfRange { face, index, count });
            }
        }
        Ok(())
    }

    pub fn triangle(&self, face: usize) -> Triangle {
        let [a, b, c] = self.faces[face];
        Triangle::new(self.vertices[a], self.vertices[b], self.vertices[c])
    }

    /// Enclosed volume, meaningful for closed consistently wound surfaces.
    pub fn signed_volume(&self) -> f64 {
        (0..self.faces.len())
            .map(|f| self.triangle(f).signed_volume())
            .sum()
    }

    pub fn centroid(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum = self
            .vertices
            .iter()
            .fold(glam::DVec3::ZERO, |acc, v| acc + v.as_dvec3());
        (sum / self.vertices.len() as f64).as_vec3()
    }

    pub fn apply_transform(&mut self, matrix: &DMat4) {
        SimilarityTransform::apply_matrix(matrix, &mut self.vertices);
    }

    /// Build a mesh from the given vertex subset, reindexing faces.
    ///
    /// `keep` is indexed by vertex; faces touching any dropped vertex are
    /// removed.
    pub fn submesh(&self, keep: &[bool]) -> TriangleMesh {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut vertices = Vec::new();
        let mut colors = Vec::new();
        let has_colors = self.has_colors();

        for (i, v) in self.vertices.iter().enumerate() {
            if keep[i] {
                remap[i] = vertices.len();
                vertices.push(*v);
                if has_colors {
                    colors.push(self.colors[i]);
                }
            }
        }

        let faces = self
            .faces
            .iter()
            .filter(|f| f.iter().all(|&i| keep[i]))
            .map(|f| [remap[f[0]], remap[f[1]], remap[f[2]]])
            .collect();

        TriangleMesh {
            vertices,
            faces,
            colors,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_meshes {
    use super::TriangleMesh;
    use glam::Vec3;

    /// A strip of `n` vertices along x with `n - 2` triangles and `2n - 3` edges.
    pub fn strip(n: usize, offset: Vec3) -> TriangleMesh {
        let vertices = (0..n)
            .map(|i| offset + Vec3::new((i / 2) as f32, (i % 2) as f32, 0.0))
            .collect();
        let faces = (0..n.saturating_sub(2)).map(|i| [i, i + 1, i + 2]).collect();
        TriangleMesh::new(vertices, faces)
    }

    /// Regular `nx x ny` grid in the xy plane, two triangles per cell.
    pub fn grid(nx: usize, ny: usize, offset: Vec3) -> TriangleMesh {
        let vertices = (0..ny)
            .flat_map(|y| (0..nx).map(move |x| offset + Vec3::new(x as f32, y as f32, 0.0)))
            .collect();
        let mut faces = Vec::new();
        for y in 0..ny.saturating_sub(1) {
            for x in 0..nx.saturating_sub(1) {
                let i = y * nx + x;
                faces.push([i, i + 1, i + nx + 1]);
                faces.push([i, i + nx + 1, i + nx]);
            }
        }
        TriangleMesh::new(vertices, faces)
    }

    /// Closed unit-ish octahedron centred at `center`.
    pub fn octahedron(center: Vec3, radius: f32) -> TriangleMesh {
        let vertices = vec![
            center + Vec3::X * radius,
            center - Vec3::X * radius,
            center + Vec3::Y * radius,
            center - Vec3::Y * radius,
            center + Vec3::Z * radius,
            center - Vec3::Z * radius,
        ];
        let faces = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        TriangleMesh::new(vertices, faces)
    }

    /// Append `other` to `mesh` as a disjoint piece.
    pub fn merge(mut mesh: TriangleMesh, other: &TriangleMesh) -> TriangleMesh {
        let base = mesh.vertices.len();
        mesh.vertices.extend_from_slice(&other.vertices);
        mesh.faces
            .extend(other.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));
        mesh
    }
}
