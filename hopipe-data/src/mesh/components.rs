//! Connected component partitioning over face edges.

use super::TriangleMesh;
use tracing::debug;

/// Disjoint-set forest over vertex indices.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Split a mesh into edge-connected pieces.
///
/// Pieces are returned in the order their first face appears in the input.
/// Pieces with fewer than `min_vertices` vertices are dropped. Vertices not
/// referenced by any face belong to no piece.
pub fn split_components(mesh: &TriangleMesh, min_vertices: usize) -> Vec<TriangleMesh> {
    let n = mesh.num_vertices();
    let mut sets = UnionFind::new(n);
    for face in &mesh.faces {
        sets.union(face[0], face[1]);
        sets.union(face[1], face[2]);
    }

    // Root -> piece slot, assigned in face order.
    let mut slot_of_root = vec![usize::MAX; n];
    // Vertex -> index inside its piece.
    let mut local = vec![usize::MAX; n];
    let with_colors = mesh.has_colors();
    let mut pieces: Vec<TriangleMesh> = Vec::new();

    for face in &mesh.faces {
        let root = sets.find(face[0]);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = pieces.len();
            pieces.push(TriangleMesh::default());
        }
        let piece = &mut pieces[slot_of_root[root]];

        let mut tri = [0usize; 3];
        for (k, &v) in face.iter().enumerate() {
            if local[v] == usize::MAX {
                local[v] = piece.vertices.len();
                piece.vertices.push(mesh.vertices[v]);
                if with_colors {
                    piece.colors.push(mesh.colors[v]);
                }
            }
            tri[k] = local[v];
        }
        piece.faces.push(tri);
    }

    let total = pieces.len();
    let components: Vec<TriangleMesh> = pieces
        .into_iter()
        .filter(|piece| piece.num_vertices() >= min_vertices)
        .collect();

    debug!(
        "Split mesh into {} components, {} with at least {} vertices",
        total,
        components.len(),
        min_vertices
    );
    components
}

/// Pick the component with the most vertices; the earliest wins ties.
pub fn largest_component(components: Vec<TriangleMesh>) -> Option<TriangleMesh> {
    let mut best: Option<TriangleMesh> = None;
    for component in components {
        let larger = best
            .as_ref()
            .is_none_or(|b| component.num_vertices() > b.num_vertices());
        if larger {
            best = Some(component);
        }
    }
    best
}
