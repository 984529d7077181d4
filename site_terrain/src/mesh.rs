//! Triangulated terrain meshes built from sampled elevation points.

use std::collections::HashMap;

use log::info;
use rand::Rng;

use crate::complexity::{complexity_map, DEFAULT_VARIANCE_WINDOW};
use crate::error::{ModelError, Result};
use crate::geometry::{Point, Point3};
use crate::raster::ElevationRaster;
use crate::sampling::{adaptive_sample, SampleSet, SamplerConfig};

/// Terrain surface as a vertex list and triangle index list. The XY
/// projection of the triangles is the Delaunay triangulation of the
/// sampled points; Z carries elevation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TerrainMesh {
    pub vertices: Vec<Point3>,
    pub triangles: Vec<[usize; 3]>,
}

impl TerrainMesh {
    /// Builds a mesh from 3D points using Delaunay triangulation on the
    /// XY plane. Fewer than three points, or a collinear point set, is a
    /// degenerate mesh.
    pub fn from_points(points: Vec<Point3>) -> Result<Self> {
        if points.len() < 3 {
            return Err(ModelError::DegenerateMesh(format!(
                "{} points cannot be triangulated",
                points.len()
            )));
        }
        let coords: Vec<delaunator::Point> = points
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&coords);
        let triangles: Vec<[usize; 3]> = triangulation
            .triangles
            .chunks(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        if triangles.is_empty() {
            return Err(ModelError::DegenerateMesh(
                "point set has no 2D extent".to_string(),
            ));
        }
        Ok(Self {
            vertices: points,
            triangles,
        })
    }

    /// Lifts a sample set into 3D model space and triangulates it.
    ///
    /// Rows are stored top-down in the raster, so Y is flipped
    /// (`y = rows - row`) to get a south-to-north mesh. Points with
    /// non-finite elevation are dropped first. When `geocenter` is given
    /// the mesh is recentered on it, preserving mean elevation.
    pub fn from_samples(samples: &SampleSet, geocenter: Option<Point>) -> Result<Self> {
        let max_y = samples.rows as f64;
        let points: Vec<Point3> = samples
            .points
            .iter()
            .zip(&samples.values)
            .filter(|(_, v)| v.is_finite())
            .map(|(&(col, row), &v)| Point3::new(col as f64, max_y - row as f64, v))
            .collect();
        let mut mesh = Self::from_points(points)?;
        if let Some(center) = geocenter {
            mesh.recenter(center);
        }
        Ok(mesh)
    }

    /// Runs the full adaptive pipeline: complexity analysis, weighted
    /// sampling and triangulation.
    pub fn adaptive<R: Rng>(
        raster: &ElevationRaster,
        config: &SamplerConfig,
        geocenter: Option<Point>,
        rng: &mut R,
    ) -> Result<Self> {
        let complexity = complexity_map(raster, DEFAULT_VARIANCE_WINDOW);
        let samples = adaptive_sample(raster, &complexity, config, rng)?;
        let mesh = Self::from_samples(&samples, geocenter)?;
        info!(
            "adaptive TIN: {} samples -> {} vertices, {} faces",
            samples.len(),
            mesh.vertices.len(),
            mesh.triangles.len()
        );
        Ok(mesh)
    }

    /// Builds a uniform-grid mesh at a stride derived from
    /// `pixel_to_triangle_ratio` (see [`grid_stride`]), bypassing the
    /// adaptive sampler. Used when full-resolution fidelity is wanted.
    pub fn regular(
        raster: &ElevationRaster,
        pixel_to_triangle_ratio: f64,
        geocenter: Option<Point>,
    ) -> Result<Self> {
        let step = grid_stride(pixel_to_triangle_ratio)?;
        let max_y = raster.rows() as f64;
        let mut points = Vec::new();
        for row in (0..raster.rows()).step_by(step) {
            for col in (0..raster.cols()).step_by(step) {
                let v = raster.value(col, row);
                if v.is_finite() {
                    points.push(Point3::new(col as f64, max_y - row as f64, v));
                }
            }
        }
        let mut mesh = Self::from_points(points)?;
        if let Some(center) = geocenter {
            mesh.recenter(center);
        }
        info!(
            "regular mesh at stride {step}: {} vertices, {} faces",
            mesh.vertices.len(),
            mesh.triangles.len()
        );
        Ok(mesh)
    }

    /// Vertex-mean centroid of the mesh.
    pub fn centroid(&self) -> Point3 {
        let n = self.vertices.len() as f64;
        let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
        for v in &self.vertices {
            x += v.x;
            y += v.y;
            z += v.z;
        }
        Point3::new(x / n, y / n, z / n)
    }

    /// Translates every vertex by the given offsets.
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        for v in &mut self.vertices {
            v.x += dx;
            v.y += dy;
            v.z += dz;
        }
    }

    /// Moves the mesh so its XY centroid lands on `geocenter`. Elevations
    /// are untouched.
    pub fn recenter(&mut self, geocenter: Point) {
        let c = self.centroid();
        self.translate(geocenter.x - c.x, geocenter.y - c.y, 0.0);
    }

    /// Axis-aligned bounding box as `(min, max)` corners.
    pub fn bounds(&self) -> (Point3, Point3) {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        (min, max)
    }

    /// Total area of all triangles in 3D.
    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t[0]];
                let b = self.vertices[t[1]];
                let c = self.vertices[t[2]];
                let u = (b.x - a.x, b.y - a.y, b.z - a.z);
                let v = (c.x - a.x, c.y - a.y, c.z - a.z);
                let nx = u.1 * v.2 - u.2 * v.1;
                let ny = u.2 * v.0 - u.0 * v.2;
                let nz = u.0 * v.1 - u.1 * v.0;
                (nx * nx + ny * ny + nz * nz).sqrt() / 2.0
            })
            .sum()
    }

    /// Signed volume via the divergence theorem. Only meaningful for a
    /// closed mesh; open terrain sheets report the signed sum as-is.
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t[0]];
                let b = self.vertices[t[1]];
                let c = self.vertices[t[2]];
                (a.x * (b.y * c.z - b.z * c.y) - a.y * (b.x * c.z - b.z * c.x)
                    + a.z * (b.x * c.y - b.y * c.x))
                    / 6.0
            })
            .sum()
    }

    /// A mesh is watertight when every edge is shared by exactly two
    /// triangles.
    pub fn is_watertight(&self) -> bool {
        if self.triangles.is_empty() {
            return false;
        }
        let mut edges: HashMap<(usize, usize), u32> = HashMap::new();
        for t in &self.triangles {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        edges.values().all(|&c| c == 2)
    }

    /// Collects the summary statistics written next to every exported
    /// terrain mesh.
    pub fn summary(&self) -> MeshSummary {
        let (min, max) = self.bounds();
        MeshSummary {
            vertices_count: self.vertices.len(),
            faces_count: self.triangles.len(),
            volume: self.volume(),
            surface_area: self.surface_area(),
            is_watertight: self.is_watertight(),
            is_empty: self.vertices.is_empty(),
            bounds_min: min,
            bounds_max: max,
        }
    }

    /// Exports the mesh as binary STL.
    pub fn export_stl(&self, path: &str) -> Result<()> {
        crate::io::stl::write_stl(path, self)?;
        Ok(())
    }
}

/// Uniform grid stride for a `pixel_to_triangle_ratio` in (0, 1]:
/// `max(1, round(1 / ratio))`. Ratios above 1 are rejected, one
/// triangle-vertex per pixel is the finest supported density.
pub fn grid_stride(pixel_to_triangle_ratio: f64) -> Result<usize> {
    if !(pixel_to_triangle_ratio > 0.0 && pixel_to_triangle_ratio <= 1.0) {
        return Err(ModelError::Config(format!(
            "pixel_to_triangle_ratio must be in (0, 1], got {pixel_to_triangle_ratio}"
        )));
    }
    Ok(((1.0 / pixel_to_triangle_ratio).round() as usize).max(1))
}

/// Statistics of an exported mesh, written as a `key: value` log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MeshSummary {
    pub vertices_count: usize,
    pub faces_count: usize,
    pub volume: f64,
    pub surface_area: f64,
    pub is_watertight: bool,
    pub is_empty: bool,
    pub bounds_min: Point3,
    pub bounds_max: Point3,
}

impl MeshSummary {
    /// Writes the summary as plain `key: value` lines.
    pub fn write(&self, path: &str) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut out = String::new();
        writeln!(&mut out, "vertices_count: {}", self.vertices_count).unwrap();
        writeln!(&mut out, "faces_count: {}", self.faces_count).unwrap();
        writeln!(&mut out, "volume: {}", self.volume).unwrap();
        writeln!(&mut out, "surface_area: {}", self.surface_area).unwrap();
        writeln!(&mut out, "is_watertight: {}", self.is_watertight).unwrap();
        writeln!(&mut out, "is_empty: {}", self.is_empty).unwrap();
        writeln!(
            &mut out,
            "bounds_min: ({}, {}, {})",
            self.bounds_min.x, self.bounds_min.y, self.bounds_min.z
        )
        .unwrap();
        writeln!(
            &mut out,
            "bounds_max: ({}, {}, {})",
            self.bounds_max.x, self.bounds_max.y, self.bounds_max.z
        )
        .unwrap();
        crate::io::write_string(path, &out)
    }

    /// Writes the summary as pretty-printed JSON for machine consumers.
    pub fn write_json(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        crate::io::write_string(path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner_samples(rows: usize, cols: usize, z: f64) -> SampleSet {
        let points = vec![
            (0, 0),
            (cols - 1, 0),
            (0, rows - 1),
            (cols - 1, rows - 1),
        ];
        let values = vec![z; 4];
        SampleSet {
            points,
            values,
            rows,
            cols,
        }
    }

    #[test]
    fn flat_corner_mesh_spans_pixel_extent() {
        let samples = corner_samples(10, 10, 5.0);
        let mesh = TerrainMesh::from_samples(&samples, None).unwrap();
        let (min, max) = mesh.bounds();
        assert!((min.x - 0.0).abs() < 1e-12 && (max.x - 9.0).abs() < 1e-12);
        // row 9 flips to y = 1, row 0 to y = 10
        assert!((min.y - 1.0).abs() < 1e-12 && (max.y - 10.0).abs() < 1e-12);
        assert!((min.z - 5.0).abs() < 1e-12 && (max.z - 5.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let err = TerrainMesh::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::DegenerateMesh(_)));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let err = TerrainMesh::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ])
        .unwrap_err();
        assert!(matches!(err, ModelError::DegenerateMesh(_)));
    }

    #[test]
    fn stride_follows_ratio() {
        assert_eq!(grid_stride(1.0).unwrap(), 1);
        assert_eq!(grid_stride(0.5).unwrap(), 2);
        assert_eq!(grid_stride(0.3).unwrap(), 3);
        assert!(matches!(grid_stride(1.5), Err(ModelError::Config(_))));
        assert!(matches!(grid_stride(0.0), Err(ModelError::Config(_))));
    }

    #[test]
    fn regular_mesh_subsamples_grid() {
        let values: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let raster = ElevationRaster::from_grid(values, 5, 5).unwrap();
        let mesh = TerrainMesh::regular(&raster, 0.5, None).unwrap();
        // stride 2 keeps cols/rows {0, 2, 4}
        assert_eq!(mesh.vertices.len(), 9);
        assert_eq!(mesh.triangles.len(), 8);
    }

    #[test]
    fn geocenter_moves_centroid_preserving_elevation() {
        let samples = corner_samples(4, 4, 2.5);
        let mesh = TerrainMesh::from_samples(&samples, Some(Point::new(500.0, 600.0))).unwrap();
        let c = mesh.centroid();
        assert!((c.x - 500.0).abs() < 1e-9);
        assert!((c.y - 600.0).abs() < 1e-9);
        assert!((c.z - 2.5).abs() < 1e-9);
    }

    #[test]
    fn open_terrain_sheet_is_not_watertight() {
        let samples = corner_samples(3, 3, 0.0);
        let mesh = TerrainMesh::from_samples(&samples, None).unwrap();
        assert!(!mesh.is_watertight());
    }

    #[test]
    fn summary_reports_written() {
        let dir = tempfile::tempdir().unwrap();
        let samples = corner_samples(5, 5, 2.0);
        let mesh = TerrainMesh::from_samples(&samples, None).unwrap();
        let summary = mesh.summary();

        let txt = dir.path().join("mesh_summary.txt");
        summary.write(txt.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&txt).unwrap();
        assert!(text.contains("faces_count: 2"));
        assert!(text.contains("is_empty: false"));

        let json = dir.path().join("mesh_summary.json");
        summary.write_json(json.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(&json).unwrap();
        assert!(text.contains("\"faces_count\": 2"));
    }

    #[test]
    fn nonfinite_samples_are_dropped() {
        let mut samples = corner_samples(6, 6, 1.0);
        samples.points.push((3, 3));
        samples.values.push(f64::NAN);
        let mesh = TerrainMesh::from_samples(&samples, None).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
    }
}
