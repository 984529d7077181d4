//! Terrain height lookup by vertical ray casting.

use log::warn;

use crate::geometry::{Point, Point3};
use crate::mesh::TerrainMesh;

/// Policy for height queries that miss the terrain footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightFallback {
    /// Return 0 and log a warning. Compatibility default; boundary
    /// buildings are expected to occasionally miss the mesh.
    #[default]
    Zero,
    /// Return the elevation of the nearest terrain vertex in XY.
    NearestVertex,
}

/// Answers "what is the terrain elevation under `(x, y)`" by casting a
/// vertical ray from above the terrain's Z range straight down and
/// keeping the highest intersection.
#[derive(Debug)]
pub struct HeightProbe<'a> {
    mesh: &'a TerrainMesh,
    fallback: HeightFallback,
}

impl<'a> HeightProbe<'a> {
    pub fn new(mesh: &'a TerrainMesh) -> Self {
        Self {
            mesh,
            fallback: HeightFallback::default(),
        }
    }

    pub fn with_fallback(mesh: &'a TerrainMesh, fallback: HeightFallback) -> Self {
        Self { mesh, fallback }
    }

    /// Terrain elevation under `(x, y)`. A query outside the mesh
    /// footprint is not an error; it degrades to the configured fallback
    /// with a logged warning so batch placement keeps going.
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let mut best: Option<f64> = None;
        for tri in &self.mesh.triangles {
            let a = self.mesh.vertices[tri[0]];
            let b = self.mesh.vertices[tri[1]];
            let c = self.mesh.vertices[tri[2]];
            if let Some((u, v, w)) = barycentric(Point::new(x, y), a, b, c) {
                if u >= -1e-12 && v >= -1e-12 && w >= -1e-12 {
                    let z = u * a.z + v * b.z + w * c.z;
                    best = Some(best.map_or(z, |prev: f64| prev.max(z)));
                }
            }
        }
        match best {
            Some(z) => z,
            None => {
                warn!("no terrain intersection found at ({x}, {y})");
                match self.fallback {
                    HeightFallback::Zero => 0.0,
                    HeightFallback::NearestVertex => self.nearest_vertex_height(x, y),
                }
            }
        }
    }

    fn nearest_vertex_height(&self, x: f64, y: f64) -> f64 {
        self.mesh
            .vertices
            .iter()
            .min_by(|p, q| {
                let dp = (p.x - x).powi(2) + (p.y - y).powi(2);
                let dq = (q.x - x).powi(2) + (q.y - y).powi(2);
                dp.partial_cmp(&dq).unwrap()
            })
            .map(|p| p.z)
            .unwrap_or(0.0)
    }
}

fn barycentric(p: Point, a: Point3, b: Point3, c: Point3) -> Option<(f64, f64, f64)> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let u = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let v = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    let w = 1.0 - u - v;
    Some((u, v, w))
}
