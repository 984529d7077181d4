//! STL mesh import and export.
//!
//! Export is always binary STL (80-byte header, little-endian u32
//! triangle count, 50-byte triangle records). Import accepts binary and
//! ASCII files, since building volumes arrive from external tooling.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use crate::geometry::Point3;
use crate::mesh::TerrainMesh;

const HEADER_LEN: usize = 80;
const TRIANGLE_RECORD_LEN: usize = 50;

fn face_normal(a: Point3, b: Point3, c: Point3) -> [f32; 3] {
    let u = (b.x - a.x, b.y - a.y, b.z - a.z);
    let v = (c.x - a.x, c.y - a.y, c.z - a.z);
    let nx = u.1 * v.2 - u.2 * v.1;
    let ny = u.2 * v.0 - u.0 * v.2;
    let nz = u.0 * v.1 - u.1 * v.0;
    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 0.0 {
        [(nx / len) as f32, (ny / len) as f32, (nz / len) as f32]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Writes `mesh` as binary STL.
pub fn write_stl(path: &str, mesh: &TerrainMesh) -> io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    let mut header = [0u8; HEADER_LEN];
    let tag = b"site_terrain stl export";
    header[..tag.len()].copy_from_slice(tag);
    w.write_all(&header)?;
    w.write_all(&(mesh.triangles.len() as u32).to_le_bytes())?;

    for tri in &mesh.triangles {
        let a = mesh.vertices[tri[0]];
        let b = mesh.vertices[tri[1]];
        let c = mesh.vertices[tri[2]];
        for comp in face_normal(a, b, c) {
            w.write_all(&comp.to_le_bytes())?;
        }
        for p in [a, b, c] {
            for comp in [p.x as f32, p.y as f32, p.z as f32] {
                w.write_all(&comp.to_le_bytes())?;
            }
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    w.flush()
}

/// Reads an STL file (binary or ASCII) into a mesh. Vertices are not
/// deduplicated; every triangle carries its own three vertices.
pub fn read_stl(path: &str) -> io::Result<TerrainMesh> {
    let bytes = fs::read(path)?;
    let mesh = if looks_ascii(&bytes) {
        parse_ascii(&bytes)?
    } else {
        parse_binary(&bytes)?
    };
    if mesh.triangles.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{path} contains no triangles"),
        ));
    }
    Ok(mesh)
}

fn looks_ascii(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"solid") {
        return false;
    }
    // Binary files may also begin with "solid"; trust the record math.
    if bytes.len() >= HEADER_LEN + 4 {
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        let expected = HEADER_LEN + 4 + count * TRIANGLE_RECORD_LEN;
        if expected == bytes.len() {
            return false;
        }
    }
    true
}

fn parse_binary(bytes: &[u8]) -> io::Result<TerrainMesh> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "binary STL shorter than its header",
        ));
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let expected = HEADER_LEN + 4 + count * TRIANGLE_RECORD_LEN;
    if bytes.len() < expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("binary STL truncated: {} of {expected} bytes", bytes.len()),
        ));
    }
    let mut vertices = Vec::with_capacity(count * 3);
    let mut triangles = Vec::with_capacity(count);
    let read_f32 = |offset: usize| -> f64 {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as f64
    };
    for i in 0..count {
        // Skip the 12-byte normal, read the three vertices.
        let base = HEADER_LEN + 4 + i * TRIANGLE_RECORD_LEN + 12;
        let start = vertices.len();
        for v in 0..3 {
            let o = base + v * 12;
            vertices.push(Point3::new(read_f32(o), read_f32(o + 4), read_f32(o + 8)));
        }
        triangles.push([start, start + 1, start + 2]);
    }
    Ok(TerrainMesh {
        vertices,
        triangles,
    })
}

fn parse_ascii(bytes: &[u8]) -> io::Result<TerrainMesh> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("vertex") {
            continue;
        }
        let coords: Vec<f64> = parts.filter_map(|s| s.parse().ok()).collect();
        if coords.len() != 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed vertex line: {line}"),
            ));
        }
        vertices.push(Point3::new(coords[0], coords[1], coords[2]));
        if vertices.len() % 3 == 0 {
            let start = vertices.len() - 3;
            triangles.push([start, start + 1, start + 2]);
        }
    }
    Ok(TerrainMesh {
        vertices,
        triangles,
    })
}
