use crate::types::Uf;
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use geojson::GeoJson;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeSet;
use std::convert::TryInto;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One federative unit's boundary, keyed by its `sigla` with the display
/// `nome` carried along for tooltips.
#[derive(Debug, Clone)]
pub struct StateShape {
    pub code: Uf,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

// Wrapper for RTree indexing
struct ShapeIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ShapeIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// The authoritative state-shape reference: boundary polygons plus a spatial
/// index for point location.
pub struct StateBoundaries {
    shapes: Vec<StateShape>,
    tree: RTree<ShapeIndex>,
}

impl StateBoundaries {
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s: &str| s.to_lowercase())
            .ok_or_else(|| anyhow!("Boundary file has no extension"))?;

        let shapes = match extension.as_str() {
            "shp" => load_shapefile(path)?,
            "json" | "geojson" => load_geojson(path)?,
            _ => return Err(anyhow!("Unsupported boundary format: {}", extension)),
        };
        println!("Loaded boundaries for {} states", shapes.len());
        Ok(Self::from_shapes(shapes))
    }

    pub fn from_shapes(shapes: Vec<StateShape>) -> Self {
        let tree_items: Vec<ShapeIndex> = shapes
            .iter()
            .enumerate()
            .filter_map(|(i, shape)| {
                let rect = shape.geometry.bounding_rect()?;
                Some(ShapeIndex {
                    index: i,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        let tree = RTree::bulk_load(tree_items);
        StateBoundaries { shapes, tree }
    }

    pub fn shapes(&self) -> &[StateShape] {
        &self.shapes
    }

    /// The state-code universe the coverage resolver subtracts against.
    pub fn codes(&self) -> BTreeSet<Uf> {
        self.shapes.iter().map(|s| s.code).collect()
    }

    /// Point-locates a coordinate to the state containing it.
    pub fn locate(&self, lat: f64, lon: f64) -> Option<Uf> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);
        for candidate in self.tree.locate_in_envelope_intersecting(&envelope) {
            if let Some(shape) = self.shapes.get(candidate.index) {
                if shape.geometry.contains(&point) {
                    return Some(shape.code);
                }
            }
        }
        None
    }
}

fn load_geojson(path: &Path) -> Result<Vec<StateShape>> {
    println!("Loading boundary GeoJSON from {:?}...", path);
    let file =
        File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse boundary GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("Boundary GeoJSON must be a FeatureCollection")),
    };

    let mut shapes = Vec::new();
    for feature in collection.features {
        let props = feature.properties.as_ref();
        let sigla = props
            .and_then(|p| p.get("sigla"))
            .and_then(|v| v.as_str());
        let Some(code) = sigla.and_then(Uf::from_code) else {
            // Features without a recognizable sigla stay unmapped.
            continue;
        };
        let name = props
            .and_then(|p| p.get("nome"))
            .and_then(|v| v.as_str())
            .unwrap_or(code.as_str())
            .to_string();

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry for {}: {:?}", code, e))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue,
                }
            }
            None => continue,
        };

        shapes.push(StateShape {
            code,
            name,
            geometry,
        });
    }
    Ok(shapes)
}

fn load_shapefile(path: &Path) -> Result<Vec<StateShape>> {
    println!("Loading boundary Shapefile from {:?}...", path);
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut shapes = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let sigla = match record.get("sigla") {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => s.clone(),
            _ => continue,
        };
        let Some(code) = Uf::from_code(&sigla) else {
            continue;
        };
        let name = match record.get("nome") {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => s.clone(),
            _ => code.as_str().to_string(),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("Failed to convert polygon for {}: {:?}", code, e))?,
            _ => continue,
        };

        shapes.push(StateShape {
            code,
            name,
            geometry,
        });
    }
    Ok(shapes)
}
