//! OBJ-style mesh loading.
//!
//! Only `v`, `vt`, `vn` and `f` lines are understood; everything else is skipped. Faces are
//! triangulated from both ends alternately, missing UVs/normals are synthesized per corner,
//! and corners are folded into unique vertices with an exact-equality backward scan.

use std::path::Path;

use glam::{Vec2, Vec3};

use crate::error::{MeshError, MeshParseKind};

/// Deduplicated, GPU-ready vertex data.
///
/// `indices` is empty for non-indexed geometry (drawn as ordered triangles).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Number of vertices a draw call consumes.
    pub fn draw_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len()
        } else {
            self.vertex_count()
        }
    }

    /// Two-triangle quad used until a model is loaded.
    pub fn quad() -> Self {
        #[rustfmt::skip]
        let positions = vec![
            1.0, 1.0, 0.0,   1.0, -1.0, 0.0,  -1.0, 1.0, 0.0,
            1.0, -1.0, 0.0, -1.0, -1.0, 0.0,  -1.0, 1.0, 0.0,
        ];
        #[rustfmt::skip]
        let uvs = vec![
            1.0, 0.0,  1.0, 1.0,  0.0, 0.0,
            1.0, 1.0,  0.0, 1.0,  0.0, 0.0,
        ];
        let normals = [0.0, 0.0, 1.0].repeat(6);
        Self {
            positions,
            uvs,
            normals,
            indices: Vec::new(),
        }
    }
}

/// Per-corner references into the raw attribute lists. `None` means absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Corner {
    vertex: i64,
    uv: Option<usize>,
    normal: Option<usize>,
}

/// Corner order for triangle `i` of an `n`-gon, alternating which end leads.
pub fn fan_from_both_ends(i: usize, n: usize) -> [usize; 3] {
    let half = i / 2;
    if i % 2 == 0 {
        [half + 1, n - half - 1, half]
    } else {
        [n - half - 1, half + 1, n - half - 2]
    }
}

pub fn load(path: &Path, smooth_normals: bool) -> Result<Mesh, MeshError> {
    let text = std::fs::read_to_string(path).map_err(|e| MeshError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(path, &text, smooth_normals)
}

/// Parse OBJ text. `origin` only labels errors.
pub fn parse(origin: &Path, text: &str, smooth_normals: bool) -> Result<Mesh, MeshError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut corners: Vec<Corner> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let fail = |kind| MeshError::Parse {
            path: origin.to_path_buf(),
            line: line_no + 1,
            kind,
        };
        match tokens.next() {
            Some("v") => {
                let [x, y, z] = parse_floats::<3>(&mut tokens).ok_or_else(|| fail(MeshParseKind::Vertex))?;
                positions.push(Vec3::new(x, y, z));
            }
            Some("vt") => {
                let [u, v] = parse_floats::<2>(&mut tokens).ok_or_else(|| fail(MeshParseKind::TexCoord))?;
                uvs.push(Vec2::new(u, v));
            }
            Some("vn") => {
                let [x, y, z] = parse_floats::<3>(&mut tokens).ok_or_else(|| fail(MeshParseKind::Normal))?;
                normals.push(Vec3::new(x, y, z));
            }
            Some("f") => {
                let face: Vec<Corner> = tokens.map(parse_corner).collect();
                if face.len() < 3 {
                    continue;
                }
                for i in 0..face.len() - 2 {
                    for j in fan_from_both_ends(i, face.len()) {
                        corners.push(face[j]);
                    }
                }
            }
            _ => {}
        }
    }

    let mut mesh = Mesh::default();
    for (i, corner) in corners.iter().enumerate() {
        let position = lookup_position(origin, &positions, corner.vertex)?;

        let uv = match corner.uv.filter(|&u| u < uvs.len()) {
            Some(u) => uvs[u],
            None => {
                uvs.push(Vec2::ZERO);
                Vec2::ZERO
            }
        };

        let normal = match corner.normal.filter(|&n| n < normals.len()) {
            Some(n) => normals[n],
            None => {
                let base = i - i % 3;
                let v1 = lookup_position(origin, &positions, corners[base].vertex)?;
                let v2 = lookup_position(origin, &positions, corners[base + 1].vertex)?;
                let v3 = lookup_position(origin, &positions, corners[base + 2].vertex)?;
                let n = normalized((v2 - v1).cross(v3 - v1));
                normals.push(n);
                n
            }
        };

        match find_existing(&mesh, position, uv, normal, smooth_normals) {
            Some(found) => {
                if smooth_normals {
                    for (k, c) in normal.to_array().into_iter().enumerate() {
                        mesh.normals[found * 3 + k] += c;
                    }
                }
                mesh.indices.push(found as u32);
            }
            None => {
                mesh.indices.push(mesh.vertex_count() as u32);
                mesh.positions.extend_from_slice(&position.to_array());
                mesh.uvs.extend_from_slice(&uv.to_array());
                mesh.normals.extend_from_slice(&normal.to_array());
            }
        }
    }

    if smooth_normals {
        for chunk in mesh.normals.chunks_exact_mut(3) {
            let n = normalized(Vec3::new(chunk[0], chunk[1], chunk[2]));
            chunk.copy_from_slice(&n.to_array());
        }
    }

    Ok(mesh)
}

// Most recently emitted first; exact float equality.
fn find_existing(mesh: &Mesh, position: Vec3, uv: Vec2, normal: Vec3, smooth: bool) -> Option<usize> {
    (0..mesh.vertex_count()).rev().find(|&j| {
        let p = &mesh.positions[3 * j..3 * j + 3];
        let t = &mesh.uvs[2 * j..2 * j + 2];
        let same = p == position.to_array() && t == uv.to_array();
        if !same {
            return false;
        }
        smooth || mesh.normals[3 * j..3 * j + 3] == normal.to_array()
    })
}

fn lookup_position(origin: &Path, positions: &[Vec3], index: i64) -> Result<Vec3, MeshError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| positions.get(i).copied())
        .ok_or_else(|| MeshError::BadIndex {
            path: origin.to_path_buf(),
            index: index + 1,
            count: positions.len(),
        })
}

// Zero-length vectors stay zero.
fn normalized(v: Vec3) -> Vec3 {
    let len = v.length();
    if len > f32::EPSILON {
        v / len
    } else {
        v
    }
}

fn parse_floats<'a, const N: usize>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

// `v/vt/vn` with 1-based indices; empty, zero or malformed fields count as absent.
fn parse_corner(part: &str) -> Corner {
    let mut fields = part.split('/');
    let mut next = || -> i64 {
        fields
            .next()
            .and_then(|f| f.trim().parse::<i64>().ok())
            .unwrap_or(0)
    };
    let vertex = next() - 1;
    let uv = next() - 1;
    let normal = next() - 1;
    Corner {
        vertex,
        uv: usize::try_from(uv).ok(),
        normal: usize::try_from(normal).ok(),
    }
}
