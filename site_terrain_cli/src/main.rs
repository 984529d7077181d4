use std::path::Path;

use clap::{Parser, Subcommand};
use log::info;

use site_terrain::geometry::Point;
use site_terrain::io::geojson::read_aoi_centroid;
use site_terrain::mesh::TerrainMesh;
use site_terrain::placement::{place_buildings, PlacementOptions};
use site_terrain::raster::ElevationRaster;
use site_terrain::sampling::SamplerConfig;
use site_terrain::height::HeightFallback;
use site_terrain::ModelError;

#[derive(Parser)]
#[command(name = "site_terrain", about = "Builds 3D site models from elevation rasters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an adaptive TIN terrain mesh from a DEM raster.
    Tin {
        /// Input single-band elevation raster (GeoTIFF).
        #[arg(long)]
        dem: String,
        /// Output directory for the mesh and its summary.
        #[arg(long, default_value = ".")]
        out: String,
        /// Fraction of raster pixels to sample, in (0, 1].
        #[arg(long, default_value_t = 0.2)]
        sample_ratio: f64,
        #[arg(long, default_value_t = 100)]
        min_samples: usize,
        #[arg(long, default_value_t = 1_000_000)]
        max_samples: usize,
        /// Area-of-interest polygon; its centroid becomes the geocenter.
        #[arg(long)]
        aoi: Option<String>,
        /// 1-based raster band to read.
        #[arg(long, default_value_t = 1)]
        band: usize,
    },
    /// Build a full-density regular grid mesh from a DEM raster.
    Grid {
        #[arg(long)]
        dem: String,
        #[arg(long, default_value = ".")]
        out: String,
        /// Pixels per triangle vertex, in (0, 1]. 1 keeps every pixel.
        #[arg(long, default_value_t = 1.0)]
        ratio: f64,
        #[arg(long)]
        aoi: Option<String>,
        #[arg(long, default_value_t = 1)]
        band: usize,
    },
    /// Place building volumes onto a terrain mesh.
    Place {
        /// Terrain mesh STL produced by `tin` or `grid`.
        #[arg(long)]
        terrain: String,
        /// Directory of building volume STL files.
        #[arg(long)]
        buildings: String,
        #[arg(long, default_value = "placed_buildings")]
        out: String,
        /// Offset between each building's origin and its physical base.
        #[arg(long, default_value_t = 0.0)]
        extrude_height: f64,
        /// Use the nearest terrain vertex instead of 0 when a building
        /// sits outside the terrain footprint.
        #[arg(long)]
        nearest_fallback: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> site_terrain::Result<()> {
    match command {
        Commands::Tin {
            dem,
            out,
            sample_ratio,
            min_samples,
            max_samples,
            aoi,
            band,
        } => {
            let raster = ElevationRaster::load(&dem, band)?;
            let config = SamplerConfig {
                sample_ratio,
                min_samples,
                max_samples,
            };
            let geocenter = load_geocenter(aoi.as_deref())?;
            let mesh = TerrainMesh::adaptive(&raster, &config, geocenter, &mut rand::thread_rng())?;
            export_terrain(&mesh, &dem, &out, "_tin")
        }
        Commands::Grid {
            dem,
            out,
            ratio,
            aoi,
            band,
        } => {
            let raster = ElevationRaster::load(&dem, band)?;
            let geocenter = load_geocenter(aoi.as_deref())?;
            let mesh = TerrainMesh::regular(&raster, ratio, geocenter)?;
            export_terrain(&mesh, &dem, &out, "_trn")
        }
        Commands::Place {
            terrain,
            buildings,
            out,
            extrude_height,
            nearest_fallback,
        } => {
            let options = PlacementOptions {
                extrude_height,
                fallback: if nearest_fallback {
                    HeightFallback::NearestVertex
                } else {
                    HeightFallback::Zero
                },
            };
            let records = place_buildings(&terrain, &buildings, &out, &options)?;
            let placed = records.iter().filter(|r| r.output.is_some()).count();
            for record in &records {
                match (&record.output, &record.error) {
                    (Some(output), _) => println!("placed {}", output.display()),
                    (None, Some(e)) => println!("failed {}: {e}", record.source.display()),
                    _ => {}
                }
            }
            println!("{placed} of {} buildings placed", records.len());
            Ok(())
        }
    }
}

fn load_geocenter(aoi: Option<&str>) -> site_terrain::Result<Option<Point>> {
    match aoi {
        Some(path) => {
            let center = read_aoi_centroid(path)?;
            info!("geocenter from {path}: ({}, {})", center.x, center.y);
            Ok(Some(center))
        }
        None => Ok(None),
    }
}

fn export_terrain(
    mesh: &TerrainMesh,
    dem: &str,
    out: &str,
    suffix: &str,
) -> site_terrain::Result<()> {
    std::fs::create_dir_all(out)?;
    let stem = Path::new(dem)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ModelError::InvalidInput(format!("unusable raster file name {dem}")))?;
    let mesh_path = Path::new(out).join(format!("{stem}{suffix}.stl"));
    let mesh_path = mesh_path
        .to_str()
        .ok_or_else(|| ModelError::InvalidInput("non-UTF8 output path".to_string()))?;
    mesh.export_stl(mesh_path)?;
    println!("mesh exported to {mesh_path}");

    let summary = mesh.summary();
    let summary_path = Path::new(out).join("mesh_summary.txt");
    summary.write(&summary_path.to_string_lossy())?;
    println!(
        "{} vertices, {} faces, watertight: {}",
        summary.vertices_count, summary.faces_count, summary.is_watertight
    );
    Ok(())
}
