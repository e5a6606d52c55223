use arcgis_mapserver::{Feature, Geometry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsmpKind {
    Trail,
    Junction,
    Access,
}

/// A feature fetched from one of the OSMP lookups.
#[derive(Clone, Debug, PartialEq)]
pub struct OsmpFeature {
    kind: OsmpKind,
    feature: Feature,
}

impl OsmpFeature {
    pub fn new(kind: OsmpKind, feature: Feature) -> Self {
        Self { kind, feature }
    }

    pub fn kind(&self) -> OsmpKind {
        self.kind
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn into_feature(self) -> Feature {
        self.feature
    }

    pub fn is_line(&self) -> bool {
        self.feature.is_line()
    }

    pub fn is_point(&self) -> bool {
        self.feature.is_point()
    }

    /// `(lat, lon)` pairs: the first path of a line, or the point itself.
    /// `None` for polygons and features without geometry.
    pub fn latlon_coords(&self) -> Option<Vec<(f64, f64)>> {
        match self.feature.geometry.as_ref()? {
            Geometry::Point(point) => Some(vec![(point.y(), point.x())]),
            Geometry::Polyline { paths } => {
                let path = paths.first()?;
                Some(path.coords().map(|c| (c.y, c.x)).collect())
            }
            Geometry::Polygon { .. } => None,
        }
    }

    /// Trail name from `TRAILNAME`. Junctions and access points have none.
    pub fn name(&self) -> Option<&str> {
        match self.kind {
            OsmpKind::Trail => self.feature.attribute("TRAILNAME")?.as_str(),
            OsmpKind::Junction | OsmpKind::Access => None,
        }
    }
}
