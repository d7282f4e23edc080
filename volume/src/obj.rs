//! Serialization of triangle meshes to the Wavefront OBJ text format.

use crate::Mesh;
use std::fmt::Write as _;

/// Serialize the mesh to OBJ bytes: one `v` line per vertex and one
/// `f` line per triangle, with 1-based vertex indices, in the exact
/// order of the mesh's vertex and triangle sequences.
pub fn export_obj(mesh: &Mesh) -> Vec<u8> {
    let mut out = String::with_capacity(mesh.vertices.len() * 32 + mesh.triangles.len() * 16);
    for v in &mesh.vertices {
        // infallible: writing to a String cannot fail
        let _ = writeln!(out, "v {} {} {}", v[0], v[1], v[2]);
    }
    for t in &mesh.triangles {
        let _ = writeln!(out, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1);
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::export_obj;
    use crate::Mesh;

    #[test]
    fn writes_vertices_then_faces_one_based() {
        let mesh = Mesh {
            vertices: vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
            triangles: vec![[0, 1, 2]],
        };
        let text = String::from_utf8(export_obj(&mesh)).unwrap();
        assert_eq!(text, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    }

    #[test]
    fn empty_mesh_writes_nothing() {
        assert!(export_obj(&Mesh::new()).is_empty());
    }

    #[test]
    fn output_is_deterministic() {
        let mesh = Mesh {
            vertices: vec![[0.5, -1.25, 3.0], [2.0, 0.0, 0.125]],
            triangles: vec![],
        };
        assert_eq!(export_obj(&mesh), export_obj(&mesh));
        let text = String::from_utf8(export_obj(&mesh)).unwrap();
        assert_eq!(text, "v 0.5 -1.25 3\nv 2 0 0.125\n");
    }
}
