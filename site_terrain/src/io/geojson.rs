//! GeoJSON helpers for the area-of-interest polygon.

use std::io;

use geojson::{GeoJson, Value};

use crate::geometry::{polygon_centroid, Point};

use super::read_to_string;

/// Reads the first polygon of a GeoJSON file and returns its centroid.
/// This is the geocenter the terrain and building meshes are relocated
/// to; the coordinates are used as-is and are expected to already be in
/// a projected planar frame.
pub fn read_aoi_centroid(path: &str) -> io::Result<Point> {
    let text = read_to_string(path)?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e}")))?;
    let ring = first_polygon_ring(&geojson).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{path} contains no polygon feature"),
        )
    })?;
    polygon_centroid(&ring)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty polygon ring"))
}

fn first_polygon_ring(geojson: &GeoJson) -> Option<Vec<Point>> {
    match geojson {
        GeoJson::Geometry(geometry) => ring_from_value(&geometry.value),
        GeoJson::Feature(feature) => ring_from_value(&feature.geometry.as_ref()?.value),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .iter()
            .filter_map(|f| ring_from_value(&f.geometry.as_ref()?.value))
            .next(),
    }
}

fn ring_from_value(value: &Value) -> Option<Vec<Point>> {
    let ring = match value {
        Value::Polygon(rings) => rings.first()?,
        Value::MultiPolygon(polygons) => polygons.first()?.first()?,
        _ => return None,
    };
    Some(
        ring.iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| Point::new(pos[0], pos[1]))
            .collect(),
    )
}
