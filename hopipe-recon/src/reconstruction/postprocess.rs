//! Turning the engine's normalized mesh into the final real-scale object mesh.

use glam::DVec3;
use hopipe_data::mesh::mean_displacement;
use hopipe_data::{
    LaplacianParams, MeshError, SimilarityTransform, clean_mesh, filter_laplacian,
    largest_component, load_obj, save_obj, split_components,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Components with fewer vertices than this are treated as noise.
pub const MIN_COMPONENT_VERTICES: usize = 1000;

/// Output sub-directory for the final meshes.
pub const MESH_DIR: &str = "mesh";
pub const REAL_SCALE_MESH: &str = "mesh_real_scale.obj";
pub const LARGEST_COMPONENT_MESH: &str = "mesh_biggest_component.obj";
pub const SMOOTHED_MESH: &str = "mesh_biggest_component_smoothed.obj";

/// Config file written by the engine next to each extracted mesh.
const NORMALIZATION_CONFIG: &str = "config.yml";

#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("no extracted mesh matches {pattern}")]
    NoMeshFound { pattern: String },

    #[error("required input {path} does not exist")]
    MissingInput { path: PathBuf },

    #[error("failed to parse normalization from {path}: {source}")]
    Normalization {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("normalization in {path} is not invertible (sc_factor {scale})")]
    NotInvertible { path: PathBuf, scale: f64 },

    #[error("no component of {path} has at least {min_vertices} vertices")]
    NoViableMesh { path: PathBuf, min_vertices: usize },

    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("search failed: {0}")]
    Glob(#[from] glob::GlobError),
}

/// The three artifacts written by [`MeshPostprocessor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshArtifacts {
    pub real_scale: PathBuf,
    pub largest_component: PathBuf,
    pub smoothed: PathBuf,
}

impl MeshArtifacts {
    fn in_dir(mesh_dir: &Path) -> Self {
        Self {
            real_scale: mesh_dir.join(REAL_SCALE_MESH),
            largest_component: mesh_dir.join(LARGEST_COMPONENT_MESH),
            smoothed: mesh_dir.join(SMOOTHED_MESH),
        }
    }
}

/// `sc_factor` and `translation` as the engine records them.
#[derive(Debug, Clone, Deserialize)]
struct NormalizationRecord {
    sc_factor: f64,
    translation: [f64; 3],
}

/// Read the normalization the engine used for meshes in `dir`.
pub fn load_normalization(dir: &Path) -> Result<SimilarityTransform, PostprocessError> {
    let path = dir.join(NORMALIZATION_CONFIG);
    if !path.is_file() {
        return Err(PostprocessError::MissingInput { path });
    }
    let text = std::fs::read_to_string(&path)?;
    let record: NormalizationRecord =
        serde_yaml::from_str(&text).map_err(|source| PostprocessError::Normalization {
            path: path.clone(),
            source,
        })?;

    let transform = SimilarityTransform::new(record.sc_factor, DVec3::from_array(record.translation));
    if !transform.is_invertible() {
        return Err(PostprocessError::NotInvertible {
            path,
            scale: record.sc_factor,
        });
    }
    Ok(transform)
}

/// Last run of ASCII digits in the path below `root`, read as a step counter.
fn step_index(root: &Path, path: &Path) -> Option<u64> {
    let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy();
    let bytes = relative.as_bytes();
    let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |i| i + 1);
    relative[start..end].parse().ok()
}

/// Find the most recently extracted normalized-space mesh under `out_dir`.
///
/// Candidates match `**/nerf/*normalized_space.obj`. The one with the highest
/// step counter embedded in its path wins; equal or absent counters fall back
/// to the lexicographically greatest path.
pub fn find_latest_mesh(out_dir: &Path) -> Result<PathBuf, PostprocessError> {
    let pattern = format!(
        "{}/**/nerf/*normalized_space.obj",
        glob::Pattern::escape(&out_dir.to_string_lossy())
    );

    let mut candidates = Vec::new();
    for entry in glob::glob(&pattern)? {
        candidates.push(entry?);
    }
    debug!("{} candidate meshes for {}", candidates.len(), pattern);

    candidates
        .into_iter()
        .max_by(|a, b| {
            (step_index(out_dir, a), a).cmp(&(step_index(out_dir, b), b))
        })
        .ok_or(PostprocessError::NoMeshFound { pattern })
}

/// Restores real-world scale, keeps the dominant component, and smooths it.
#[derive(Debug, Clone)]
pub struct MeshPostprocessor {
    pub min_component_vertices: usize,
    pub smoothing: LaplacianParams,
}

impl Default for MeshPostprocessor {
    fn default() -> Self {
        Self {
            min_component_vertices: MIN_COMPONENT_VERTICES,
            smoothing: LaplacianParams::default(),
        }
    }
}

impl MeshPostprocessor {
    /// Post-process the latest mesh under `out_dir` into `<out_dir>/mesh/`.
    #[tracing::instrument(skip_all, fields(out_dir = %out_dir.display()))]
    pub fn run(&self, out_dir: &Path) -> Result<MeshArtifacts, PostprocessError> {
        let source = find_latest_mesh(out_dir)?;
        info!("Using {}", source.display());

        let mesh_dir = out_dir.join(MESH_DIR);
        std::fs::create_dir_all(&mesh_dir)?;
        info!("Saving meshes to {}", mesh_dir.display());
        let artifacts = MeshArtifacts::in_dir(&mesh_dir);

        let parent = source.parent().unwrap_or(out_dir);
        let normalization = load_normalization(parent)?;
        let mut mesh = load_obj(&source)?;
        mesh.apply_transform(&normalization.inverse_matrix());
        save_obj(&mesh, &artifacts.real_scale)?;

        let components = split_components(&mesh, self.min_component_vertices);
        let mut best = largest_component(components).ok_or_else(|| PostprocessError::NoViableMesh {
            path: source.clone(),
            min_vertices: self.min_component_vertices,
        })?;
        let report = clean_mesh(&mut best);
        info!(
            "Largest component: {} vertices, {} faces ({:?})",
            best.num_vertices(),
            best.num_faces(),
            report
        );
        save_obj(&best, &artifacts.largest_component)?;

        let before = best.vertices.clone();
        filter_laplacian(&mut best, &self.smoothing);
        debug!(
            "Smoothing moved vertices {:.6} on average",
            mean_displacement(&before, &best.vertices)
        );
        save_obj(&best, &artifacts.smoothed)?;

        Ok(artifacts)
    }
}

/// Post-process with the default thresholds.
pub fn postprocess_mesh(out_dir: &Path) -> Result<MeshArtifacts, PostprocessError> {
    MeshPostprocessor::default().run(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use hopipe_data::TriangleMesh;

    /// Closed box-like tube: two rings of `n` vertices joined into a band, capped.
    fn band(n: usize, center: Vec3) -> TriangleMesh {
        let mut vertices = Vec::new();
        for ring in 0..2 {
            for i in 0..n {
                let a = i as f32 / n as f32 * std::f32::consts::TAU;
                vertices.push(center + Vec3::new(a.cos(), a.sin(), ring as f32));
            }
        }
        let mut faces = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push([i, j, n + j]);
            faces.push([i, n + j, n + i]);
        }
        // Caps via a centre vertex on each ring.
        let bottom = vertices.len();
        vertices.push(center);
        let top = vertices.len();
        vertices.push(center + Vec3::Z);
        for i in 0..n {
            let j = (i + 1) % n;
            faces.push([bottom, j, i]);
            faces.push([top, n + i, n + j]);
        }
        TriangleMesh::new(vertices, faces)
    }

    fn write_nerf_output(out: &Path, step_dir: &str, mesh: &TriangleMesh, scale: f64, t: [f64; 3]) -> PathBuf {
        let dir = out.join("nerf_with_bundletrack_online").join(step_dir).join("nerf");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mesh_normalized_space.obj");
        save_obj(mesh, &path).unwrap();
        std::fs::write(
            dir.join(NORMALIZATION_CONFIG),
            format!("sc_factor: {scale}\ntranslation: [{}, {}, {}]\nfar: 2\n", t[0], t[1], t[2]),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_step_index_uses_last_digit_run() {
        let root = Path::new("/out");
        assert_eq!(step_index(root, Path::new("/out/a/step_0000200/nerf/mesh_normalized_space.obj")), Some(200));
        assert_eq!(step_index(root, Path::new("/out/a/nerf/mesh_normalized_space.obj")), None);
        assert_eq!(step_index(Path::new("/out7"), Path::new("/out7/x/nerf/m_normalized_space.obj")), None);
    }

    #[test]
    fn test_no_mesh_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = postprocess_mesh(tmp.path()).unwrap_err();
        match err {
            PostprocessError::NoMeshFound { pattern } => {
                assert!(pattern.ends_with("**/nerf/*normalized_space.obj"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!tmp.path().join(MESH_DIR).exists());
    }

    #[test]
    fn test_latest_mesh_by_step_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let mesh = band(8, Vec3::ZERO);
        write_nerf_output(tmp.path(), "step_900", &mesh, 1.0, [0.0; 3]);
        let newest = write_nerf_output(tmp.path(), "step_1200", &mesh, 1.0, [0.0; 3]);
        // "step_900" sorts after "step_1200" as a string; the counter must win.
        assert_eq!(find_latest_mesh(tmp.path()).unwrap(), newest);
    }

    #[test]
    fn test_latest_mesh_lexicographic_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let mesh = band(8, Vec3::ZERO);
        write_nerf_output(tmp.path(), "alpha", &mesh, 1.0, [0.0; 3]);
        let last = write_nerf_output(tmp.path(), "beta", &mesh, 1.0, [0.0; 3]);
        assert_eq!(find_latest_mesh(tmp.path()).unwrap(), last);
    }

    #[test]
    fn test_missing_normalization_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_nerf_output(tmp.path(), "s1", &band(8, Vec3::ZERO), 1.0, [0.0; 3]);
        std::fs::remove_file(path.parent().unwrap().join(NORMALIZATION_CONFIG)).unwrap();

        assert!(matches!(
            postprocess_mesh(tmp.path()),
            Err(PostprocessError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_nerf_output(tmp.path(), "s1", &band(8, Vec3::ZERO), 0.0, [0.0; 3]);
        assert!(matches!(
            postprocess_mesh(tmp.path()),
            Err(PostprocessError::NotInvertible { .. })
        ));
    }

    #[test]
    fn test_small_components_only_is_no_viable_mesh() {
        let tmp = tempfile::tempdir().unwrap();
        write_nerf_output(tmp.path(), "s1", &band(8, Vec3::ZERO), 1.0, [0.0; 3]);
        let err = postprocess_mesh(tmp.path()).unwrap_err();
        assert!(matches!(err, PostprocessError::NoViableMesh { min_vertices: 1000, .. }));
        // The real-scale mesh is still written before selection fails.
        assert!(tmp.path().join(MESH_DIR).join(REAL_SCALE_MESH).is_file());
    }

    #[test]
    fn test_closed_surface_below_vertex_threshold_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        // 802 vertices and 2400 unique edges.
        write_nerf_output(tmp.path(), "s1", &band(400, Vec3::ZERO), 1.0, [0.0; 3]);
        assert!(matches!(
            postprocess_mesh(tmp.path()),
            Err(PostprocessError::NoViableMesh { min_vertices: 1000, .. })
        ));
    }

    #[test]
    fn test_full_postprocess_restores_scale_and_drops_noise() {
        let tmp = tempfile::tempdir().unwrap();
        let scale = 2.0;
        let t = [0.5, -1.0, 0.25];

        // Real-world object: large band. Noise: small band far away.
        let mut normalized = band(600, Vec3::new(1.0, 2.0, 3.0));
        let noise = band(6, Vec3::splat(-5.0));
        let base = normalized.vertices.len();
        normalized.vertices.extend_from_slice(&noise.vertices);
        normalized
            .faces
            .extend(noise.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));
        let expected_first = (normalized.vertices[0].as_dvec3() / scale - DVec3::from_array(t)).as_vec3();

        write_nerf_output(tmp.path(), "step_0001000", &normalized, scale, t);
        let artifacts = postprocess_mesh(tmp.path()).unwrap();

        let real = load_obj(&artifacts.real_scale).unwrap();
        assert_eq!(real.num_vertices(), normalized.num_vertices());
        assert!((real.vertices[0] - expected_first).length() < 1e-5);

        let largest = load_obj(&artifacts.largest_component).unwrap();
        assert_eq!(largest.num_vertices(), 1202);
        assert_eq!(largest.num_faces(), 2400);

        let smoothed = load_obj(&artifacts.smoothed).unwrap();
        assert_eq!(smoothed.faces, largest.faces);
        assert!((smoothed.signed_volume() - largest.signed_volume()).abs() / largest.signed_volume().abs() < 1e-3);
    }
}
