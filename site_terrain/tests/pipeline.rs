use rand::rngs::StdRng;
use rand::SeedableRng;

use site_terrain::complexity::{complexity_map, DEFAULT_VARIANCE_WINDOW};
use site_terrain::io::stl::read_stl;
use site_terrain::mesh::TerrainMesh;
use site_terrain::raster::ElevationRaster;
use site_terrain::sampling::SamplerConfig;

fn write_gray_tiff(path: &std::path::Path, width: u32, height: u32, data: &[f32]) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = tiff::encoder::TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<tiff::encoder::colortype::Gray32Float>(width, height, data)
        .unwrap();
}

#[test]
fn adaptive_pipeline_from_geotiff() {
    let dir = tempfile::tempdir().unwrap();
    let dem_path = dir.path().join("site_dem.tif");
    // A ridge running down the middle of a 16x16 tile.
    let data: Vec<f32> = (0..256)
        .map(|i| {
            let col = (i % 16) as f32;
            100.0 - (col - 8.0).abs() * 4.0
        })
        .collect();
    write_gray_tiff(&dem_path, 16, 16, &data);

    let raster = ElevationRaster::load(dem_path.to_str().unwrap(), 1).unwrap();
    let config = SamplerConfig {
        sample_ratio: 0.4,
        min_samples: 20,
        max_samples: 500,
    };
    let mut rng = StdRng::seed_from_u64(99);
    let mesh = TerrainMesh::adaptive(&raster, &config, None, &mut rng).unwrap();

    let (min, max) = mesh.bounds();
    // Landmarks pin the mesh to the full raster extent.
    assert!((min.x - 0.0).abs() < 1e-9 && (max.x - 15.0).abs() < 1e-9);
    assert!((min.y - 1.0).abs() < 1e-9 && (max.y - 16.0).abs() < 1e-9);
    assert!(min.z >= 68.0 - 1e-9 && max.z <= 100.0 + 1e-9);

    let stl_path = dir.path().join("site_dem_tin.stl");
    mesh.export_stl(stl_path.to_str().unwrap()).unwrap();
    let reread = read_stl(stl_path.to_str().unwrap()).unwrap();
    assert_eq!(reread.triangles.len(), mesh.triangles.len());

    let summary = mesh.summary();
    assert_eq!(summary.vertices_count, mesh.vertices.len());
    assert!(!summary.is_empty);
    let summary_path = dir.path().join("mesh_summary.txt");
    summary.write(summary_path.to_str().unwrap()).unwrap();
    let text = std::fs::read_to_string(&summary_path).unwrap();
    assert!(text.contains("vertices_count:"));
    assert!(text.contains("is_watertight:"));
    assert!(text.contains("bounds_min:"));
}

#[test]
fn flat_raster_mesh_is_constant_z() {
    let raster = ElevationRaster::from_grid(vec![5.0; 100], 10, 10).unwrap();
    let config = SamplerConfig {
        sample_ratio: 0.3,
        min_samples: 10,
        max_samples: 1_000_000,
    };
    let mut rng = StdRng::seed_from_u64(1);
    let mesh = TerrainMesh::adaptive(&raster, &config, None, &mut rng).unwrap();
    assert!(mesh.vertices.iter().all(|v| (v.z - 5.0).abs() < 1e-12));
    let (min, max) = mesh.bounds();
    assert!((min.x - 0.0).abs() < 1e-12 && (max.x - 9.0).abs() < 1e-12);
}

#[test]
fn regular_mesh_matches_adaptive_extent() {
    let values: Vec<f64> = (0..144).map(|i| 10.0 + (i % 12) as f64).collect();
    let raster = ElevationRaster::from_grid(values, 12, 12).unwrap();
    let mesh = TerrainMesh::regular(&raster, 1.0, None).unwrap();
    assert_eq!(mesh.vertices.len(), 144);
    let (min, max) = mesh.bounds();
    assert!((min.x - 0.0).abs() < 1e-12 && (max.x - 11.0).abs() < 1e-12);
    assert!((min.y - 1.0).abs() < 1e-12 && (max.y - 12.0).abs() < 1e-12);
}

#[test]
fn complexity_concentrates_samples_on_rough_ground() {
    // Flat plain with a rough block in the north-east corner.
    let mut values = vec![0.0; 40 * 40];
    for row in 0..12 {
        for col in 28..40 {
            values[row * 40 + col] = if (row + col) % 2 == 0 { 0.0 } else { 30.0 };
        }
    }
    let raster = ElevationRaster::from_grid(values, 40, 40).unwrap();
    let map = complexity_map(&raster, DEFAULT_VARIANCE_WINDOW);
    let config = SamplerConfig {
        sample_ratio: 0.05,
        min_samples: 40,
        max_samples: 60,
    };
    let mut rng = StdRng::seed_from_u64(5);
    let set = site_terrain::sampling::adaptive_sample(&raster, &map, &config, &mut rng).unwrap();

    let rough = set
        .points
        .iter()
        .filter(|&&(c, r)| c >= 28 && r < 12)
        .count();
    let smooth = set.len() - rough;
    // The rough block is < 10% of the area but should draw most of the
    // exploratory budget; landmarks all land in the smooth region.
    assert!(rough * 2 > smooth, "rough {rough} vs smooth {smooth}");
}
