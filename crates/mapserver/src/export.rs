//! Conversion of decoded features into `geo` and GeoJSON types.

use geo::orient::{Direction, Orient};
use geo::{LineString, MultiLineString, MultiPolygon, Polygon, Winding};
use geojson::{FeatureCollection, Value};

use crate::models::{Feature, FeatureSet, Geometry};

impl Geometry {
    /// Convert to a `geo` geometry.
    ///
    /// Polygon rings are grouped by winding: each clockwise ring starts a
    /// new polygon and the counter-clockwise rings after it are its holes.
    /// Single paths and single polygons are not wrapped in multi types.
    pub fn to_geo(&self) -> geo::Geometry {
        match self {
            Self::Point(point) => geo::Geometry::Point(*point),
            Self::Polyline { paths } if paths.len() == 1 => {
                geo::Geometry::LineString(paths[0].clone())
            }
            Self::Polyline { paths } => {
                geo::Geometry::MultiLineString(MultiLineString::new(paths.clone()))
            }
            Self::Polygon { rings } => {
                let mut polygons = group_rings(rings);
                if polygons.len() == 1 {
                    geo::Geometry::Polygon(polygons.remove(0))
                } else {
                    geo::Geometry::MultiPolygon(MultiPolygon::new(polygons))
                }
            }
        }
    }

    /// GeoJSON geometry with RFC 7946 ring orientation.
    pub fn to_geojson(&self) -> geojson::Geometry {
        let value = match self {
            Self::Point(point) => Value::Point(vec![point.x(), point.y()]),
            Self::Polyline { paths } if paths.len() == 1 => {
                Value::LineString(line_to_positions(&paths[0]))
            }
            Self::Polyline { paths } => {
                Value::MultiLineString(paths.iter().map(line_to_positions).collect())
            }
            Self::Polygon { rings } => match group_rings(rings).as_slice() {
                [polygon] => Value::Polygon(polygon_to_positions(polygon)),
                polygons => Value::MultiPolygon(polygons.iter().map(polygon_to_positions).collect()),
            },
        };
        geojson::Geometry::new(value)
    }
}

impl Feature {
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: self.geometry.as_ref().map(Geometry::to_geojson),
            id: None,
            properties: Some(self.attributes.to_json()),
            foreign_members: None,
        }
    }
}

impl FeatureSet {
    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.iter().map(Feature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

fn group_rings(rings: &[LineString]) -> Vec<Polygon> {
    let mut groups: Vec<(LineString, Vec<LineString>)> = Vec::new();

    for ring in rings {
        match groups.last_mut() {
            Some((_, holes)) if !ring.is_cw() => holes.push(ring.clone()),
            _ => groups.push((ring.clone(), Vec::new())),
        }
    }

    groups
        .into_iter()
        .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
        .collect()
}

fn line_to_positions(line: &LineString) -> Vec<Vec<f64>> {
    line.coords().map(|c| vec![c.x, c.y]).collect()
}

fn polygon_to_positions(polygon: &Polygon) -> Vec<Vec<Vec<f64>>> {
    let polygon = polygon.orient(Direction::Default);
    let mut rings = vec![line_to_positions(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(line_to_positions));
    rings
}
