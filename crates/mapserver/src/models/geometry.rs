//! Esri-JSON geometries.
//!
//! The set of geometry kinds a layer can hold is closed: points, polylines
//! and polygons. Envelopes only appear as spatial filters.

use geo::{Coord, LineString, Point};
use serde_json::{Value, json};
use strum::{AsRefStr, Display, EnumString};

use crate::error::DecodeError;

// ============================================================================
// Geometry Types
// ============================================================================

/// Geometry type declared by a layer, named as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum GeometryType {
    #[strum(serialize = "esriGeometryPoint")]
    Point,
    #[strum(serialize = "esriGeometryPolyline")]
    Polyline,
    #[strum(serialize = "esriGeometryPolygon")]
    Polygon,
}

impl GeometryType {
    pub fn from_esri(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A feature geometry.
///
/// Paths and rings keep the order and orientation the server sent them in.
/// Esri polygons mark exterior rings clockwise and holes counter-clockwise;
/// see [`Geometry::to_geo`] for the grouped form.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Point),
    Polyline { paths: Vec<LineString> },
    Polygon { rings: Vec<LineString> },
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::Polyline { .. } => GeometryType::Polyline,
            Self::Polygon { .. } => GeometryType::Polygon,
        }
    }

    pub fn to_esri_json(&self) -> Value {
        match self {
            Self::Point(point) => json!({ "x": point.x(), "y": point.y() }),
            Self::Polyline { paths } => json!({ "paths": encode_lines(paths) }),
            Self::Polygon { rings } => json!({ "rings": encode_lines(rings) }),
        }
    }

    /// Decode an Esri-JSON geometry, inferring its kind from its keys.
    ///
    /// Returns `Ok(None)` for `null` and for empty points (`"x": null` or
    /// `"x": "NaN"`).
    pub fn from_esri_json(value: &Value) -> Result<Option<Self>, DecodeError> {
        let object = match value {
            Value::Null => return Ok(None),
            Value::Object(object) => object,
            other => {
                return Err(DecodeError::Schema(format!(
                    "geometry is not an object: {other}"
                )));
            }
        };

        if let Some(x) = object.get("x") {
            if is_empty_ordinate(x) {
                return Ok(None);
            }
            let (Some(x), Some(y)) = (x.as_f64(), object.get("y").and_then(Value::as_f64)) else {
                return Err(DecodeError::Schema(
                    "point geometry needs numeric x and y".to_string(),
                ));
            };
            return Ok(Some(Self::Point(Point::new(x, y))));
        }

        if let Some(paths) = object.get("paths") {
            return Ok(Some(Self::Polyline {
                paths: decode_lines(paths, "paths")?,
            }));
        }

        if let Some(rings) = object.get("rings") {
            return Ok(Some(Self::Polygon {
                rings: decode_lines(rings, "rings")?,
            }));
        }

        let kind = if object.contains_key("points") {
            "multipoint"
        } else if object.contains_key("xmin") {
            "envelope"
        } else if object.contains_key("curvePaths") || object.contains_key("curveRings") {
            "curve"
        } else {
            return Err(DecodeError::Schema(format!(
                "unrecognized geometry: {value}"
            )));
        };
        Err(DecodeError::UnsupportedGeometry(kind.to_string()))
    }

    /// Decode a geometry and check it against the layer's declared type.
    pub fn from_esri_json_as(
        value: &Value,
        expected: GeometryType,
    ) -> Result<Option<Self>, DecodeError> {
        let geometry = Self::from_esri_json(value)?;
        if let Some(found) = geometry.as_ref().map(Geometry::geometry_type) {
            if found != expected {
                return Err(DecodeError::GeometryMismatch { expected, found });
            }
        }
        Ok(geometry)
    }
}

fn is_empty_ordinate(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.eq_ignore_ascii_case("nan"),
        _ => false,
    }
}

fn encode_lines(lines: &[LineString]) -> Vec<Vec<[f64; 2]>> {
    lines
        .iter()
        .map(|line| line.coords().map(|c| [c.x, c.y]).collect())
        .collect()
}

fn decode_lines(value: &Value, key: &str) -> Result<Vec<LineString>, DecodeError> {
    let lines = value
        .as_array()
        .ok_or_else(|| DecodeError::Schema(format!("{key} is not an array")))?;

    lines
        .iter()
        .map(|line| {
            let coords = line
                .as_array()
                .ok_or_else(|| DecodeError::Schema(format!("{key} entry is not an array")))?;
            coords
                .iter()
                .map(decode_coord)
                .collect::<Result<Vec<_>, _>>()
                .map(LineString::new)
        })
        .collect()
}

/// `[x, y]`, `[x, y, z]` or `[x, y, z, m]`; only x and y are kept.
fn decode_coord(value: &Value) -> Result<Coord, DecodeError> {
    let ordinates = value
        .as_array()
        .ok_or_else(|| DecodeError::Schema(format!("coordinate is not an array: {value}")))?;

    match (
        ordinates.first().and_then(Value::as_f64),
        ordinates.get(1).and_then(Value::as_f64),
    ) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(DecodeError::Schema(format!(
            "coordinate needs numeric x and y: {value}"
        ))),
    }
}

// ============================================================================
// Filter Geometries
// ============================================================================

/// Axis-aligned bounding box, the cheapest spatial filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    /// Build from any two opposite corners.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        }
    }

    pub fn to_esri_json(&self) -> Value {
        json!({
            "xmin": self.xmin,
            "ymin": self.ymin,
            "xmax": self.xmax,
            "ymax": self.ymax,
        })
    }
}

/// Geometry usable as the `geometry` parameter of a query.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterGeometry {
    Geometry(Geometry),
    Envelope(Envelope),
}

impl FilterGeometry {
    pub fn esri_type(&self) -> &'static str {
        match self {
            Self::Geometry(Geometry::Point(_)) => "esriGeometryPoint",
            Self::Geometry(Geometry::Polyline { .. }) => "esriGeometryPolyline",
            Self::Geometry(Geometry::Polygon { .. }) => "esriGeometryPolygon",
            Self::Envelope(_) => "esriGeometryEnvelope",
        }
    }

    pub fn to_esri_json(&self) -> Value {
        match self {
            Self::Geometry(geometry) => geometry.to_esri_json(),
            Self::Envelope(envelope) => envelope.to_esri_json(),
        }
    }
}

impl From<Geometry> for FilterGeometry {
    fn from(geometry: Geometry) -> Self {
        Self::Geometry(geometry)
    }
}

impl From<Envelope> for FilterGeometry {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}
