//! Features and feature sets returned by a query.

use serde::{Deserialize, Serialize};

use crate::identifiers::ObjectId;
use crate::models::attributes::{AttributeValue, Attributes};
use crate::models::geometry::{Geometry, GeometryType};

/// Spatial reference as reported by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<u32>,
}

impl SpatialReference {
    /// The current well-known id, preferring `latestWkid`.
    pub fn epsg(&self) -> Option<u32> {
        self.latest_wkid.or(self.wkid)
    }
}

/// One geographic record.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// `None` only when the server omitted the geometry.
    pub geometry: Option<Geometry>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    pub fn attribute(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes.get(field)
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry.as_ref().map(Geometry::geometry_type)
    }

    pub fn is_point(&self) -> bool {
        self.geometry_type() == Some(GeometryType::Point)
    }

    pub fn is_line(&self) -> bool {
        self.geometry_type() == Some(GeometryType::Polyline)
    }

    pub fn is_polygon(&self) -> bool {
        self.geometry_type() == Some(GeometryType::Polygon)
    }

    pub fn object_id(&self, field: &str) -> Option<ObjectId> {
        self.attribute(field)
            .and_then(AttributeValue::as_i64)
            .map(ObjectId::new)
    }
}

/// The decoded result of one or more query pages.
///
/// Immutable once built; [`FeatureSet::next_offset`] is the continuation
/// token for the page that follows it.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    features: Vec<Feature>,
    exceeded_transfer_limit: bool,
    geometry_type: Option<GeometryType>,
    spatial_reference: Option<SpatialReference>,
    object_id_field: Option<String>,
    offset: u32,
}

impl FeatureSet {
    pub(crate) fn from_parts(
        features: Vec<Feature>,
        exceeded_transfer_limit: bool,
        geometry_type: Option<GeometryType>,
        spatial_reference: Option<SpatialReference>,
        object_id_field: Option<String>,
        offset: u32,
    ) -> Self {
        Self {
            features,
            exceeded_transfer_limit,
            geometry_type,
            spatial_reference,
            object_id_field,
            offset,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Whether the server truncated the response.
    pub fn exceeded_transfer_limit(&self) -> bool {
        self.exceeded_transfer_limit
    }

    /// `resultOffset` this set was requested with.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Offset to request next, if the server reported more results.
    ///
    /// Advances by the number of features actually returned, which equals
    /// the page size unless the server capped the page further. A truncated
    /// but empty page yields `None` so a cursor cannot spin in place.
    pub fn next_offset(&self) -> Option<u32> {
        if !self.exceeded_transfer_limit || self.features.is_empty() {
            return None;
        }
        let returned = u32::try_from(self.features.len()).unwrap_or(u32::MAX);
        self.offset.checked_add(returned)
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry_type
    }

    pub fn spatial_reference(&self) -> Option<SpatialReference> {
        self.spatial_reference
    }

    pub fn object_id_field(&self) -> Option<&str> {
        self.object_id_field.as_deref()
    }
}

impl IntoIterator for FeatureSet {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn feature(id: i64) -> Feature {
        let mut attributes = Attributes::default();
        attributes.insert("OBJECTID", AttributeValue::Integer(id));
        Feature::new(Some(Geometry::Point(Point::new(0.0, 0.0))), attributes)
    }

    #[test]
    fn test_next_offset_only_when_truncated() {
        let full = FeatureSet::from_parts(vec![feature(1), feature(2)], false, None, None, None, 10);
        assert_eq!(full.next_offset(), None);

        let truncated = FeatureSet::from_parts(vec![feature(1), feature(2)], true, None, None, None, 10);
        assert_eq!(truncated.next_offset(), Some(12));
    }

    #[test]
    fn test_empty_truncated_page_ends_paging() {
        let empty = FeatureSet::from_parts(vec![], true, None, None, None, 0);
        assert_eq!(empty.next_offset(), None);
    }

    #[test]
    fn test_feature_helpers() {
        let f = feature(7);
        assert!(f.is_point());
        assert!(!f.is_line());
        assert_eq!(f.object_id("OBJECTID"), Some(ObjectId::new(7)));
        assert_eq!(f.object_id("FID"), None);
    }

    #[test]
    fn test_spatial_reference_prefers_latest_wkid() {
        let sr: SpatialReference =
            serde_json::from_str(r#"{"wkid": 102100, "latestWkid": 3857}"#).unwrap();
        assert_eq!(sr.epsg(), Some(3857));

        let legacy: SpatialReference = serde_json::from_str(r#"{"wkid": 4326}"#).unwrap();
        assert_eq!(legacy.epsg(), Some(4326));
    }
}
