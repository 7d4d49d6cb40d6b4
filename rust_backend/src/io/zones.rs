//! Zone loading from GeoJSON.
//!
//! Accepts a `FeatureCollection` whose features carry `Polygon` or `MultiPolygon`
//! geometries and `id`, `name`, `population` and optional `area_km2` properties.
//! A missing area is computed geodesically from the outline.

use anyhow::{bail, Context, Result};
use geo::{GeodesicArea, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::core::{Zone, ZoneId};

type Ring = Vec<[f64; 2]>;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: ZoneProperties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct ZoneProperties {
    id: u32,
    name: String,
    population: i64,
    #[serde(default)]
    area_km2: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

fn polygon(rings: Vec<Ring>) -> Result<Polygon<f64>> {
    let mut rings = rings
        .into_iter()
        .map(|ring| LineString::from(ring.into_iter().map(|[lon, lat]| (lon, lat)).collect::<Vec<_>>()));
    let exterior = rings.next().context("polygon has no exterior ring")?;
    Ok(Polygon::new(exterior, rings.collect()))
}

impl Geometry {
    fn into_multi_polygon(self) -> Result<MultiPolygon<f64>> {
        let polygons = match self {
            Geometry::Polygon(rings) => vec![polygon(rings)?],
            Geometry::MultiPolygon(parts) => parts.into_iter().map(polygon).collect::<Result<_>>()?,
        };
        Ok(MultiPolygon::new(polygons))
    }
}

/// Parse zones from a GeoJSON string.
pub fn parse_zones_geojson(content: &str) -> Result<Vec<Zone>> {
    let deserializer = &mut serde_json::Deserializer::from_str(content);
    let collection: FeatureCollection =
        serde_path_to_error::deserialize(deserializer).context("Failed to parse zone GeoJSON")?;
    if collection.kind != "FeatureCollection" {
        bail!("Expected a FeatureCollection, got '{}'", collection.kind);
    }

    let mut seen = HashSet::new();
    let mut zones = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties;
        if !seen.insert(props.id) {
            bail!("Duplicate zone id {} (feature {})", props.id, index);
        }
        let boundary = feature
            .geometry
            .into_multi_polygon()
            .with_context(|| format!("Invalid geometry for zone {} ({})", props.id, props.name))?;
        let area_km2 = props
            .area_km2
            .unwrap_or_else(|| boundary.geodesic_area_unsigned() / 1_000_000.0);
        let zone = Zone::new(ZoneId(props.id), props.name, props.population, area_km2, boundary)
            .with_context(|| format!("Invalid zone at feature {}", index))?;
        zones.push(zone);
    }
    Ok(zones)
}

/// Load zones from a GeoJSON file.
pub fn load_zones_geojson(path: &Path) -> Result<Vec<Zone>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read zone file {}", path.display()))?;
    let zones = parse_zones_geojson(&content)
        .with_context(|| format!("Failed to load zones from {}", path.display()))?;
    log::info!("Loaded {} zones from {}", zones.len(), path.display());
    Ok(zones)
}
