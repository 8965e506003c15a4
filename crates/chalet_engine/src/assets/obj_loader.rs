//! OBJ file loader for the rendered model
//!
//! Reads positions and texture coordinates, fan-triangulates polygons and
//! merges vertices that share an identical (position, texcoord) pair. Normals
//! and materials are ignored; every vertex gets a white color.

use crate::render::{Mesh, Vertex};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// OBJ parsing errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// Underlying read failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A value on a line could not be parsed
    #[error("Parse error on line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },
    /// Structurally invalid content such as out-of-range indices
    #[error("Invalid format on line {line}: {message}")]
    InvalidFormat {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },
}

/// One corner of a face: position index and optional texcoord index, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceCorner {
    position: usize,
    tex_coord: Option<usize>,
}

/// Loader for Wavefront OBJ models
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and return a deduplicated mesh
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, ObjError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mesh = Self::parse(BufReader::new(file))?;
        log::info!(
            "Loaded {}: {} unique vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Parse OBJ text from any buffered reader
    pub fn parse<R: BufRead>(reader: R) -> Result<Mesh, ObjError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut builder = MeshBuilder::default();

        for (line_index, line) in reader.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };

            match keyword {
                "v" => {
                    let [x, y, z] = parse_floats::<3>(&mut parts, line_number, "vertex")?;
                    positions.push([x, y, z]);
                }
                "vt" => {
                    let [u, v] = parse_floats::<2>(&mut parts, line_number, "texture coordinate")?;
                    tex_coords.push([u, v]);
                }
                "f" => {
                    let corners = parts
                        .map(|token| {
                            parse_corner(token, positions.len(), tex_coords.len(), line_number)
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    if corners.len() < 3 {
                        return Err(ObjError::InvalidFormat {
                            line: line_number,
                            message: format!("face has {} corners, need at least 3", corners.len()),
                        });
                    }

                    // Fan triangulation
                    for i in 1..corners.len() - 1 {
                        for corner in [corners[0], corners[i], corners[i + 1]] {
                            builder.push(&positions, &tex_coords, corner);
                        }
                    }
                }
                // Normals, groups, materials and smoothing are not used
                _ => {}
            }
        }

        Ok(builder.finish())
    }
}

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    unique: HashMap<[u32; 5], u32>,
}

impl MeshBuilder {
    fn push(&mut self, positions: &[[f32; 3]], tex_coords: &[[f32; 2]], corner: FaceCorner) {
        let position = positions[corner.position];
        let [u, v] = corner.tex_coord.map_or([0.0, 0.0], |index| tex_coords[index]);
        let vertex = Vertex::new(position, [u, 1.0 - v], Vertex::WHITE);

        let next_index = self.vertices.len() as u32;
        let index = *self.unique.entry(vertex.dedup_key()).or_insert(next_index);
        if index == next_index {
            self.vertices.push(vertex);
        }
        self.indices.push(index);
    }

    fn finish(self) -> Mesh {
        Mesh::new(self.vertices, self.indices)
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<[f32; N], ObjError> {
    let mut values = [0.0f32; N];
    for (component, value) in values.iter_mut().enumerate() {
        let token = parts.next().ok_or_else(|| ObjError::ParseError {
            line,
            message: format!("{what} has fewer than {N} components"),
        })?;
        *value = token.parse().map_err(|_| ObjError::ParseError {
            line,
            message: format!("invalid {what} component {component}: '{token}'"),
        })?;
    }
    Ok(values)
}

/// Resolve a 1-based (or negative, relative) OBJ index to 0-based
fn resolve_index(raw: &str, count: usize, line: usize, what: &str) -> Result<usize, ObjError> {
    let value: i64 = raw.parse().map_err(|_| ObjError::ParseError {
        line,
        message: format!("invalid {what} index '{raw}'"),
    })?;

    let resolved = match value {
        v if v > 0 => v - 1,
        v if v < 0 => count as i64 + v,
        _ => -1,
    };

    if resolved < 0 || resolved >= count as i64 {
        return Err(ObjError::InvalidFormat {
            line,
            message: format!("{what} index {value} out of range (have {count})"),
        });
    }
    Ok(resolved as usize)
}

fn parse_corner(
    token: &str,
    position_count: usize,
    tex_coord_count: usize,
    line: usize,
) -> Result<FaceCorner, ObjError> {
    let mut fields = token.split('/');
    let position = resolve_index(fields.next().unwrap_or_default(), position_count, line, "position")?;
    let tex_coord = match fields.next() {
        Some(raw) if !raw.is_empty() => Some(resolve_index(raw, tex_coord_count, line, "texcoord")?),
        _ => None,
    };
    Ok(FaceCorner { position, tex_coord })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(source: &str) -> Mesh {
        ObjLoader::parse(source.as_bytes()).unwrap()
    }

    const QUAD: &str = "\
# two triangles sharing an edge
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn test_shared_corners_are_merged() {
        let mesh = parse(QUAD);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.indices.len(), 3 * mesh.triangle_count());
    }

    #[test]
    fn test_texcoord_v_is_flipped_and_color_is_white() {
        let mesh = parse(QUAD);
        let v2 = mesh.vertices[2];
        assert_relative_eq!(v2.tex_coord[0], 1.0);
        assert_relative_eq!(v2.tex_coord[1], 0.0);
        let v1 = mesh.vertices[1];
        assert_relative_eq!(v1.tex_coord[1], 1.0);
        assert!(mesh.vertices.iter().all(|v| v.color == Vertex::WHITE));
    }

    #[test]
    fn test_negative_zero_position_is_merged() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nv -0.000000 0 0\nf 1 2 3\nf 4 2 3\n");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_same_position_different_texcoord_stays_distinct() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 0.5 0.5\nf 1/1 2/1 3/1\nf 1/2 3/1 2/1\n");
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn test_polygon_is_fan_triangulated() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv -1 1 0\nf 1 2 3 4 5\n");
        assert_eq!(mesh.triangle_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn test_negative_indices_are_relative() {
        let mesh = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n");
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let err = ObjLoader::parse("v 0 0 0\nf 1 2 3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ObjError::InvalidFormat { line: 2, .. }));
    }

    #[test]
    fn test_bad_float_reports_line() {
        let err = ObjLoader::parse("v 0 0 0\nv 1 x 0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ObjError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_degenerate_face_is_rejected() {
        let err = ObjLoader::parse("v 0 0 0\nv 1 0 0\nf 1 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ObjError::InvalidFormat { .. }));
    }
}
