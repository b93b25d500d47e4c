//! Explicit Laplacian smoothing with an optional volume constraint.

use super::TriangleMesh;
use glam::{DVec3, Vec3};
use tracing::{debug, warn};

/// Parameters for [`filter_laplacian`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplacianParams {
    /// Damping factor: fraction of the way each vertex moves toward its
    /// neighbour average per iteration.
    pub lambda: f32,
    pub iterations: usize,
    /// Rescale about the centroid after every iteration so the enclosed
    /// volume matches the input. Rescaling about the origin instead gives the
    /// same volume but shifts meshes that sit away from the origin.
    pub volume_constraint: bool,
}

impl Default for LaplacianParams {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            iterations: 3,
            volume_constraint: true,
        }
    }
}

/// Unique edge neighbours of every vertex.
fn vertex_neighbors(mesh: &TriangleMesh) -> Vec<Vec<usize>> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); mesh.num_vertices()];
    for face in &mesh.faces {
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            if a == b {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// Smooth a mesh in place with uniformly weighted explicit Laplacian steps.
///
/// Vertices without neighbours do not move. The volume constraint is skipped
/// for surfaces whose enclosed volume is zero or not finite (open sheets).
pub fn filter_laplacian(mesh: &mut TriangleMesh, params: &LaplacianParams) {
    let neighbors = vertex_neighbors(mesh);
    let initial_volume = mesh.signed_volume();
    let constrain = params.volume_constraint && initial_volume.is_finite() && initial_volume != 0.0;
    if params.volume_constraint && !constrain {
        warn!("Mesh encloses no volume, smoothing without volume constraint");
    }

    let lambda = params.lambda as f64;
    for iteration in 0..params.iterations {
        let current: Vec<DVec3> = mesh.vertices.iter().map(|v| v.as_dvec3()).collect();
        for (i, list) in neighbors.iter().enumerate() {
            if list.is_empty() {
                continue;
            }
            let average = list.iter().map(|&n| current[n]).sum::<DVec3>() / list.len() as f64;
            mesh.vertices[i] = (current[i] + (average - current[i]) * lambda).as_vec3();
        }

        if constrain {
            let volume = mesh.signed_volume();
            let ratio = initial_volume / volume;
            if ratio.is_finite() && ratio > 0.0 {
                let factor = ratio.cbrt() as f32;
                let center = mesh.centroid();
                for v in &mut mesh.vertices {
                    *v = center + (*v - center) * factor;
                }
            }
            debug!(iteration, volume, factor = ratio.cbrt(), "Laplacian step");
        } else {
            debug!(iteration, "Laplacian step");
        }
    }
}

/// Mean distance moved per vertex between two versions of the same mesh.
pub fn mean_displacement(before: &[Vec3], after: &[Vec3]) -> f32 {
    if before.is_empty() {
        return 0.0;
    }
    before
        .iter()
        .zip(after)
        .map(|(a, b)| (*a - *b).length())
        .sum::<f32>()
        / before.len() as f32
}

#[cfg(test)]
mod tests {
    use super::super::test_meshes::{octahedron, strip};
    use super::*;

    fn bumpy_octahedron() -> TriangleMesh {
        let mut mesh = octahedron(Vec3::new(2.0, -1.0, 0.5), 1.0);
        mesh.vertices[0] += Vec3::X * 0.4;
        mesh
    }

    #[test]
    fn test_smoothing_moves_vertices() {
        let mut mesh = bumpy_octahedron();
        let before = mesh.vertices.clone();
        filter_laplacian(&mut mesh, &LaplacianParams::default());
        assert!(mean_displacement(&before, &mesh.vertices) > 0.0);
        assert_eq!(mesh.num_faces(), 8);
    }

    #[test]
    fn test_volume_constraint_preserves_volume() {
        let mut mesh = bumpy_octahedron();
        let initial = mesh.signed_volume();
        filter_laplacian(&mut mesh, &LaplacianParams::default());
        assert!((mesh.signed_volume() - initial).abs() / initial < 1e-4);
    }

    #[test]
    fn test_volume_constraint_keeps_off_origin_mesh_in_place() {
        let center = Vec3::new(0.0, 0.0, 5.0);
        let mut mesh = octahedron(center, 1.0);
        let initial = mesh.signed_volume();
        filter_laplacian(&mut mesh, &LaplacianParams::default());

        assert!((mesh.centroid() - center).length() < 1e-4);
        assert!((mesh.signed_volume() - initial).abs() / initial < 1e-4);
    }

    #[test]
    fn test_without_constraint_mesh_shrinks() {
        let mut mesh = bumpy_octahedron();
        let initial = mesh.signed_volume();
        let params = LaplacianParams {
            volume_constraint: false,
            ..LaplacianParams::default()
        };
        filter_laplacian(&mut mesh, &params);
        assert!(mesh.signed_volume() < initial);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mesh = bumpy_octahedron();
        let before = mesh.clone();
        let params = LaplacianParams {
            iterations: 0,
            ..LaplacianParams::default()
        };
        filter_laplacian(&mut mesh, &params);
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_open_sheet_smooths_without_constraint() {
        let mut mesh = strip(6, Vec3::ZERO);
        filter_laplacian(&mut mesh, &LaplacianParams::default());
        assert!(mesh.vertices.iter().all(|v| v.is_finite()));
    }
}
