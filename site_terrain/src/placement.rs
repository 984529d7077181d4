//! Batch placement of building volumes onto a terrain mesh.
//!
//! Buildings are pre-extruded meshes produced upstream; placement only
//! translates each one vertically so its base rests on the terrain.
//! Buildings are independent of each other, so one bad input never
//! aborts its siblings.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{ModelError, Result};
use crate::geometry::Point3;
use crate::height::{HeightFallback, HeightProbe};
use crate::io::stl::{read_stl, write_stl};
use crate::mesh::TerrainMesh;

/// Suffix appended to a building file stem when writing its placed copy.
pub const PLACED_SUFFIX: &str = "_placed";

/// Options shared by a placement batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementOptions {
    /// Vertical distance between each building's local origin and its
    /// physical base, carried through from upstream extrusion.
    pub extrude_height: f64,
    /// Height-query policy for buildings outside the terrain footprint.
    pub fallback: HeightFallback,
}

/// Outcome of placing one building, keyed by its source file.
#[derive(Debug, Clone)]
pub struct PlacementRecord {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

/// Center of a building's base: the middle of the XY bounding box at
/// minimum Z.
pub fn base_center(mesh: &TerrainMesh) -> Point3 {
    let (min, max) = mesh.bounds();
    Point3::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0, min.z)
}

/// Translates `building` vertically so its base rests on the terrain
/// under its base center. Returns the applied Z translation.
pub fn place_on_terrain(
    building: &mut TerrainMesh,
    probe: &HeightProbe,
    extrude_height: f64,
) -> f64 {
    let base = base_center(building);
    let terrain_z = probe.height_at(base.x, base.y);
    let z_translation = terrain_z - base.z - extrude_height;
    building.translate(0.0, 0.0, z_translation);
    z_translation
}

/// Places every `.stl` building in `building_dir` on the terrain mesh at
/// `terrain_path`, writing `<stem>_placed.stl` files to `out_dir`.
///
/// Fails fast with a missing-terrain error when the terrain mesh cannot
/// be loaded; per-building failures are reported in the returned records
/// without stopping the batch.
pub fn place_buildings(
    terrain_path: &str,
    building_dir: &str,
    out_dir: &str,
    options: &PlacementOptions,
) -> Result<Vec<PlacementRecord>> {
    if !Path::new(terrain_path).exists() {
        return Err(ModelError::MissingTerrain(format!(
            "terrain mesh not found at {terrain_path}"
        )));
    }
    let terrain = read_stl(terrain_path)
        .map_err(|e| ModelError::MissingTerrain(format!("cannot load {terrain_path}: {e}")))?;
    info!("using terrain mesh {terrain_path} ({} faces)", terrain.triangles.len());

    let mut building_paths: Vec<PathBuf> = fs::read_dir(building_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("stl"))
                .unwrap_or(false)
        })
        .collect();
    building_paths.sort();

    place_building_files(&terrain, &building_paths, out_dir, options)
}

/// Places an explicit list of building mesh files on `terrain`. Exposed
/// separately so callers can drive placement with their own file set.
pub fn place_building_files(
    terrain: &TerrainMesh,
    building_paths: &[PathBuf],
    out_dir: &str,
    options: &PlacementOptions,
) -> Result<Vec<PlacementRecord>> {
    fs::create_dir_all(out_dir)?;
    let probe = HeightProbe::with_fallback(terrain, options.fallback);

    let mut records = Vec::with_capacity(building_paths.len());
    for path in building_paths {
        match place_one(path, &probe, out_dir, options.extrude_height) {
            Ok(output) => {
                info!("placed {} -> {}", path.display(), output.display());
                records.push(PlacementRecord {
                    source: path.clone(),
                    output: Some(output),
                    error: None,
                });
            }
            Err(e) => {
                warn!("failed to place {}: {e}", path.display());
                records.push(PlacementRecord {
                    source: path.clone(),
                    output: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Ok(records)
}

fn place_one(
    path: &Path,
    probe: &HeightProbe,
    out_dir: &str,
    extrude_height: f64,
) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ModelError::InvalidInput(format!("non-UTF8 path {}", path.display())))?;
    let mut building = read_stl(path_str)?;
    place_on_terrain(&mut building, probe, extrude_height);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ModelError::InvalidInput(format!("unusable file name {}", path.display())))?;
    let output = Path::new(out_dir).join(format!("{stem}{PLACED_SUFFIX}.stl"));
    let output_str = output
        .to_str()
        .ok_or_else(|| ModelError::InvalidInput(format!("non-UTF8 path {}", output.display())))?;
    write_stl(output_str, &building)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_terrain(z: f64) -> TerrainMesh {
        TerrainMesh::from_points(vec![
            Point3::new(0.0, 0.0, z),
            Point3::new(20.0, 0.0, z),
            Point3::new(20.0, 20.0, z),
            Point3::new(0.0, 20.0, z),
        ])
        .unwrap()
    }

    fn building_at(x: f64, y: f64, base_z: f64) -> TerrainMesh {
        TerrainMesh {
            vertices: vec![
                Point3::new(x, y, base_z),
                Point3::new(x + 2.0, y, base_z),
                Point3::new(x + 1.0, y + 2.0, base_z),
                Point3::new(x + 1.0, y + 1.0, base_z + 5.0),
            ],
            triangles: vec![[0, 1, 2], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        }
    }

    #[test]
    fn base_lands_on_terrain_elevation() {
        let terrain = flat_terrain(12.0);
        let probe = HeightProbe::new(&terrain);
        let mut building = building_at(5.0, 5.0, 3.0);
        let dz = place_on_terrain(&mut building, &probe, 0.0);
        assert!((dz - 9.0).abs() < 1e-9);
        let (min, _) = building.bounds();
        assert!((min.z - 12.0).abs() < 1e-9);
    }

    #[test]
    fn extrude_offset_is_subtracted() {
        let terrain = flat_terrain(12.0);
        let probe = HeightProbe::new(&terrain);
        let mut building = building_at(5.0, 5.0, 0.0);
        let dz = place_on_terrain(&mut building, &probe, 2.0);
        assert!((dz - 10.0).abs() < 1e-9);
        let (min, _) = building.bounds();
        assert!((min.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_terrain_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let buildings = dir.path().join("buildings");
        fs::create_dir(&buildings).unwrap();
        let err = place_buildings(
            dir.path().join("terrain.stl").to_str().unwrap(),
            buildings.to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
            &PlacementOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::MissingTerrain(_)));
    }

    #[test]
    fn bad_building_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let terrain_path = dir.path().join("terrain.stl");
        write_stl(terrain_path.to_str().unwrap(), &flat_terrain(4.0)).unwrap();

        let buildings = dir.path().join("buildings");
        fs::create_dir(&buildings).unwrap();
        write_stl(
            buildings.join("a.stl").to_str().unwrap(),
            &building_at(3.0, 3.0, 0.0),
        )
        .unwrap();
        fs::write(buildings.join("b.stl"), b"not an stl").unwrap();

        let records = place_buildings(
            terrain_path.to_str().unwrap(),
            buildings.to_str().unwrap(),
            dir.path().join("out").to_str().unwrap(),
            &PlacementOptions::default(),
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        let ok = records.iter().find(|r| r.source.ends_with("a.stl")).unwrap();
        assert!(ok.output.is_some() && ok.error.is_none());
        let bad = records.iter().find(|r| r.source.ends_with("b.stl")).unwrap();
        assert!(bad.output.is_none() && bad.error.is_some());
    }
}
