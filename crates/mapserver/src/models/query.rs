//! Query values and their wire encoding.

use strum::{AsRefStr, Display, EnumString};

use crate::error::QueryError;
use crate::identifiers::LayerId;
use crate::models::geometry::{FilterGeometry, GeometryType};

/// `where` clause sent when the caller gives no attribute filter.
pub const MATCH_ALL: &str = "1=1";

/// Decimal places requested for every returned coordinate.
///
/// Six places in WGS84 is roughly 0.1 m, finer than any trail survey.
pub const GEOMETRY_PRECISION: u8 = 6;

/// Page size used when a query does not set one; the ArcGIS default
/// `maxRecordCount`.
pub const DEFAULT_RESULT_LIMIT: u32 = 1000;

// ============================================================================
// Filters
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum SpatialRelation {
    #[default]
    #[strum(serialize = "esriSpatialRelIntersects")]
    Intersects,
    #[strum(serialize = "esriSpatialRelContains")]
    Contains,
    #[strum(serialize = "esriSpatialRelCrosses")]
    Crosses,
    #[strum(serialize = "esriSpatialRelEnvelopeIntersects")]
    EnvelopeIntersects,
    #[strum(serialize = "esriSpatialRelIndexIntersects")]
    IndexIntersects,
    #[strum(serialize = "esriSpatialRelOverlaps")]
    Overlaps,
    #[strum(serialize = "esriSpatialRelTouches")]
    Touches,
    #[strum(serialize = "esriSpatialRelWithin")]
    Within,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpatialFilter {
    pub geometry: FilterGeometry,
    pub relation: SpatialRelation,
    /// Spatial reference of `geometry`; the server assumes the layer's own
    /// when unset.
    pub in_sr: Option<u32>,
}

impl SpatialFilter {
    pub fn new(geometry: impl Into<FilterGeometry>, relation: SpatialRelation) -> Self {
        Self {
            geometry: geometry.into(),
            relation,
            in_sr: None,
        }
    }

    pub fn intersects(geometry: impl Into<FilterGeometry>) -> Self {
        Self::new(geometry, SpatialRelation::Intersects)
    }

    pub fn with_in_sr(mut self, wkid: u32) -> Self {
        self.in_sr = Some(wkid);
        self
    }
}

/// Fields to return; `All` is sent as `*`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutFields {
    #[default]
    All,
    Fields(Vec<String>),
}

impl OutFields {
    pub fn list<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn to_param(&self) -> String {
        match self {
            Self::Fields(fields) if !fields.is_empty() => fields.join(","),
            _ => "*".to_string(),
        }
    }
}

impl From<&str> for OutFields {
    /// Parses `*` or a comma separated field list.
    fn from(s: &str) -> Self {
        let fields: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "*")
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            Self::All
        } else {
            Self::Fields(fields)
        }
    }
}

/// `field='value'` with single quotes in `value` doubled.
pub fn field_equals(field: &str, value: &str) -> String {
    format!("{field}='{}'", value.replace('\'', "''"))
}

// ============================================================================
// Query
// ============================================================================

/// One query against one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    layer_id: LayerId,
    spatial_filter: Option<SpatialFilter>,
    attribute_filter: Option<String>,
    output_fields: OutFields,
    result_offset: u32,
    result_limit: u32,
    return_geometry: bool,
    order_by_fields: Vec<String>,
    expected_geometry: Option<GeometryType>,
}

impl Query {
    pub fn builder(layer_id: LayerId) -> QueryBuilder {
        QueryBuilder::new(layer_id)
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn spatial_filter(&self) -> Option<&SpatialFilter> {
        self.spatial_filter.as_ref()
    }

    pub fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_deref()
    }

    pub fn output_fields(&self) -> &OutFields {
        &self.output_fields
    }

    pub fn result_offset(&self) -> u32 {
        self.result_offset
    }

    pub fn result_limit(&self) -> u32 {
        self.result_limit
    }

    pub fn return_geometry(&self) -> bool {
        self.return_geometry
    }

    pub fn order_by_fields(&self) -> &[String] {
        &self.order_by_fields
    }

    pub fn expected_geometry(&self) -> Option<GeometryType> {
        self.expected_geometry
    }

    /// Same query continuing at `offset`, e.g. a [`FeatureSet::next_offset`].
    ///
    /// [`FeatureSet::next_offset`]: crate::models::feature::FeatureSet::next_offset
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.result_offset = offset;
        self
    }

    /// Same query with a different page size. Zero is kept at one.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.result_limit = limit.max(1);
        self
    }

    /// Query-string parameters, in the order they are sent.
    pub fn to_params(&self, out_sr: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (
                "where",
                self.attribute_filter
                    .clone()
                    .unwrap_or_else(|| MATCH_ALL.to_string()),
            ),
            ("outFields", self.output_fields.to_param()),
            ("returnGeometry", self.return_geometry.to_string()),
        ];

        if let Some(filter) = &self.spatial_filter {
            params.push(("geometry", filter.geometry.to_esri_json().to_string()));
            params.push(("geometryType", filter.geometry.esri_type().to_string()));
            params.push(("spatialRel", filter.relation.to_string()));
            if let Some(in_sr) = filter.in_sr {
                params.push(("inSR", in_sr.to_string()));
            }
        }

        params.push(("outSR", out_sr.to_string()));
        params.push(("geometryPrecision", GEOMETRY_PRECISION.to_string()));

        if !self.order_by_fields.is_empty() {
            params.push(("orderByFields", self.order_by_fields.join(",")));
        }

        params.push(("resultOffset", self.result_offset.to_string()));
        params.push(("resultRecordCount", self.result_limit.to_string()));
        params.push(("f", "json".to_string()));
        params
    }
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    fn new(layer_id: LayerId) -> Self {
        Self {
            query: Query {
                layer_id,
                spatial_filter: None,
                attribute_filter: None,
                output_fields: OutFields::All,
                result_offset: 0,
                result_limit: DEFAULT_RESULT_LIMIT,
                return_geometry: true,
                order_by_fields: Vec::new(),
                expected_geometry: None,
            },
        }
    }

    pub fn spatial_filter(mut self, filter: SpatialFilter) -> Self {
        self.query.spatial_filter = Some(filter);
        self
    }

    /// SQL-92 `where` clause, e.g. `TRAILNAME LIKE 'Mesa%'`.
    pub fn attribute_filter(mut self, clause: impl Into<String>) -> Self {
        self.query.attribute_filter = Some(clause.into());
        self
    }

    pub fn output_fields(mut self, fields: OutFields) -> Self {
        self.query.output_fields = fields;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.query.result_offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.query.result_limit = limit;
        self
    }

    pub fn return_geometry(mut self, return_geometry: bool) -> Self {
        self.query.return_geometry = return_geometry;
        self
    }

    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.order_by_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Reject features whose geometry is not of this type.
    pub fn expect_geometry(mut self, geometry_type: GeometryType) -> Self {
        self.query.expected_geometry = Some(geometry_type);
        self
    }

    pub fn build(self) -> Result<Query, QueryError> {
        if self.query.result_limit == 0 {
            return Err(QueryError::ZeroLimit);
        }
        Ok(self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geometry::Envelope;

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_defaults() {
        let query = Query::builder(LayerId::new(4)).build().unwrap();
        let params = query.to_params(4326);

        assert_eq!(param(&params, "where"), Some("1=1"));
        assert_eq!(param(&params, "outFields"), Some("*"));
        assert_eq!(param(&params, "returnGeometry"), Some("true"));
        assert_eq!(param(&params, "outSR"), Some("4326"));
        assert_eq!(param(&params, "geometryPrecision"), Some("6"));
        assert_eq!(param(&params, "resultOffset"), Some("0"));
        assert_eq!(param(&params, "resultRecordCount"), Some("1000"));
        assert_eq!(param(&params, "f"), Some("json"));
        assert_eq!(param(&params, "geometry"), None);
        assert_eq!(param(&params, "orderByFields"), None);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert_eq!(
            Query::builder(LayerId::new(0)).limit(0).build().unwrap_err(),
            QueryError::ZeroLimit
        );
    }

    #[test]
    fn test_spatial_filter_params() {
        let query = Query::builder(LayerId::new(1))
            .spatial_filter(
                SpatialFilter::new(Envelope::new(-105.3, 39.9, -105.2, 40.1), SpatialRelation::Within)
                    .with_in_sr(4326),
            )
            .build()
            .unwrap();
        let params = query.to_params(4326);

        assert_eq!(param(&params, "geometryType"), Some("esriGeometryEnvelope"));
        assert_eq!(param(&params, "spatialRel"), Some("esriSpatialRelWithin"));
        assert_eq!(param(&params, "inSR"), Some("4326"));

        let geometry: serde_json::Value =
            serde_json::from_str(param(&params, "geometry").unwrap()).unwrap();
        assert_eq!(geometry["xmin"], serde_json::json!(-105.3));
    }

    #[test]
    fn test_out_fields() {
        assert_eq!(OutFields::All.to_param(), "*");
        assert_eq!(OutFields::list(["TRAILNAME", "SEGMENTID"]).to_param(), "TRAILNAME,SEGMENTID");
        assert_eq!(OutFields::Fields(vec![]).to_param(), "*");
        assert_eq!(OutFields::from(" TRAILNAME , MILEAGE "), OutFields::list(["TRAILNAME", "MILEAGE"]));
        assert_eq!(OutFields::from("*"), OutFields::All);
    }

    #[test]
    fn test_field_equals_escapes_quotes() {
        assert_eq!(field_equals("SEGMENTID", "101-202-303"), "SEGMENTID='101-202-303'");
        assert_eq!(field_equals("TRAILNAME", "Mallory's Cave"), "TRAILNAME='Mallory''s Cave'");
    }

    #[test]
    fn test_with_offset_keeps_everything_else() {
        let query = Query::builder(LayerId::new(2))
            .attribute_filter("DOGREG = 'LVS'")
            .order_by(["OBJECTID"])
            .limit(50)
            .build()
            .unwrap();
        let next = query.clone().with_offset(50);

        assert_eq!(next.result_offset(), 50);
        assert_eq!(next.result_limit(), 50);
        assert_eq!(next.attribute_filter(), query.attribute_filter());
        assert_eq!(next.order_by_fields(), ["OBJECTID".to_string()]);

        let smaller = next.with_limit(20);
        assert_eq!(smaller.result_limit(), 20);
        assert_eq!(smaller.result_offset(), 50);
        assert_eq!(smaller.with_limit(0).result_limit(), 1);
    }
}
