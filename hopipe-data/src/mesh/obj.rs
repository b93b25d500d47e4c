//! Wavefront OBJ reading and writing.
//!
//! Only geometry is kept: `v` lines (with optional trailing RGB) and `f` lines.
//! Polygons are fan-triangulated; texture and normal indices are ignored.

use super::{MeshError, TriangleMesh};
use glam::Vec3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Load a triangle mesh from an OBJ file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_obj(path: impl AsRef<Path>) -> Result<TriangleMesh, MeshError> {
    let file = File::open(path.as_ref())?;
    let mesh = read_obj(BufReader::new(file))?;
    info!(
        "OBJ parsed: {} vertices, {} faces",
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(mesh)
}

/// Write a triangle mesh to an OBJ file, replacing any existing file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_obj(mesh: &TriangleMesh, path: impl AsRef<Path>) -> Result<(), MeshError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer)?;
    writer.flush()?;
    debug!(
        "Wrote {} vertices, {} faces",
        mesh.num_vertices(),
        mesh.num_faces()
    );
    Ok(())
}

pub(crate) fn read_obj<R: BufRead>(reader: R) -> Result<TriangleMesh, MeshError> {
    let mut vertices = Vec::new();
    let mut colors = Vec::new();
    let mut faces = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let line_no = line_no + 1;

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let values = parts
                    .map(|p| {
                        p.parse::<f32>().map_err(|_| MeshError::Parse {
                            line: line_no,
                            message: format!("invalid coordinate '{p}'"),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if values.len() < 3 {
                    return Err(MeshError::Parse {
                        line: line_no,
                        message: "vertex needs three coordinates".to_string(),
                    });
                }
                vertices.push(Vec3::new(values[0], values[1], values[2]));
                if values.len() >= 6 {
                    colors.push(Vec3::new(values[3], values[4], values[5]));
                }
            }
            Some("f") => {
                let polygon = parts
                    .map(|p| parse_face_index(p, vertices.len(), line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if polygon.len() < 3 {
                    return Err(MeshError::Parse {
                        line: line_no,
                        message: "face needs at least three vertices".to_string(),
                    });
                }
                for i in 1..polygon.len() - 1 {
                    faces.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    // Colors only count when every vertex carries one.
    if colors.len() != vertices.len() {
        colors.clear();
    }

    let mesh = TriangleMesh {
        vertices,
        faces,
        colors,
    };
    mesh.validate()?;
    Ok(mesh)
}

/// Resolve a `v`, `v/vt`, `v//vn` or `v/vt/vn` token to a 0-based vertex index.
fn parse_face_index(token: &str, vertex_count: usize, line: usize) -> Result<usize, MeshError> {
    let raw = token.split('/').next().unwrap_or(token);
    let index: i64 = raw.parse().map_err(|_| MeshError::Parse {
        line,
        message: format!("invalid face index '{token}'"),
    })?;

    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => vertex_count as i64 + i,
        _ => -1,
    };
    if resolved < 0 {
        return Err(MeshError::Parse {
            line,
            message: format!("face index '{token}' out of range"),
        });
    }
    Ok(resolved as usize)
}

pub(crate) fn write_obj<W: Write>(mesh: &TriangleMesh, writer: &mut W) -> Result<(), MeshError> {
    let with_colors = mesh.has_colors();
    for (i, v) in mesh.vertices.iter().enumerate() {
        if with_colors {
            let c = mesh.colors[i];
            writeln!(writer, "v {} {} {} {} {} {}", v.x, v.y, v.z, c.x, c.y, c.z)?;
        } else {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
    }
    for f in &mesh.faces {
        writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_triangulates_quads() {
        let src = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = read_obj(Cursor::new(src)).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(!mesh.has_colors());
    }

    #[test]
    fn test_read_slash_and_negative_indices() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2/5/1 -1\n";
        let mesh = read_obj(Cursor::new(src)).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_read_vertex_colors() {
        let src = "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf 1 2 3\n";
        let mesh = read_obj(Cursor::new(src)).unwrap();
        assert!(mesh.has_colors());
        assert_eq!(mesh.colors[1], Vec3::Y);
    }

    #[test]
    fn test_read_rejects_out_of_range_face() {
        let src = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(
            read_obj(Cursor::new(src)),
            Err(MeshError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_read_reports_line_of_bad_coordinate() {
        let src = "v 0 0 0\nv 1 x 0\n";
        match read_obj(Cursor::new(src)) {
            Err(MeshError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        let mesh = TriangleMesh::new(
            vec![Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.25, 0.0)],
            vec![[0, 1, 2]],
        );

        save_obj(&mesh, &path).unwrap();
        let loaded = load_obj(&path).unwrap();
        assert_eq!(loaded, mesh);
    }
}
