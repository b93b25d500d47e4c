//! Mesh cleanup: duplicate vertices, degenerate faces, unreferenced vertices.

use super::TriangleMesh;
use crate::types::Triangle;
use ordered_float::OrderedFloat;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Faces with an area at or below this are treated as zero-area.
const DEGENERATE_AREA: f32 = 1e-12;

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub merged_vertices: usize,
    pub degenerate_faces: usize,
    pub duplicate_faces: usize,
    pub unreferenced_vertices: usize,
}

type PositionKey = [OrderedFloat<f32>; 3];

fn position_key(v: glam::Vec3) -> PositionKey {
    // Fold -0.0 into 0.0 so both signs hash together.
    [
        OrderedFloat(v.x + 0.0),
        OrderedFloat(v.y + 0.0),
        OrderedFloat(v.z + 0.0),
    ]
}

/// Clean a mesh in place and report what was dropped.
///
/// Steps, in order: merge vertices with identical positions, drop faces that
/// repeat a vertex or have zero area, drop faces that repeat another face's
/// vertex set, drop vertices no face references.
pub fn clean_mesh(mesh: &mut TriangleMesh) -> CleanReport {
    let mut report = CleanReport::default();

    // Merge identical positions onto the first occurrence.
    let mut first_seen: HashMap<PositionKey, usize> = HashMap::with_capacity(mesh.vertices.len());
    let remap: Vec<usize> = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, v)| *first_seen.entry(position_key(*v)).or_insert(i))
        .collect();
    report.merged_vertices = mesh.vertices.len() - first_seen.len();

    let mut seen_faces: HashSet<[usize; 3]> = HashSet::with_capacity(mesh.faces.len());
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let f = [remap[face[0]], remap[face[1]], remap[face[2]]];
        if f[0] == f[1] || f[1] == f[2] || f[2] == f[0] {
            report.degenerate_faces += 1;
            continue;
        }
        let tri = Triangle::new(mesh.vertices[f[0]], mesh.vertices[f[1]], mesh.vertices[f[2]]);
        if tri.area() <= DEGENERATE_AREA {
            report.degenerate_faces += 1;
            continue;
        }
        let mut sorted = f;
        sorted.sort_unstable();
        if !seen_faces.insert(sorted) {
            report.duplicate_faces += 1;
            continue;
        }
        faces.push(f);
    }
    mesh.faces = faces;

    let mut referenced = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &v in face {
            referenced[v] = true;
        }
    }
    let kept = referenced.iter().filter(|&&r| r).count();
    // Merged duplicates are never referenced after remapping, so they fall out here too.
    report.unreferenced_vertices = mesh.vertices.len() - kept - report.merged_vertices;
    *mesh = mesh.submesh(&referenced);

    debug!(?report, "Cleaned mesh");
    report
}
