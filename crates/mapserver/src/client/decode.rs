//! Response classification and decoding.
//!
//! Order matters: HTTP status first, then JSON syntax, then an embedded
//! `error` object, then the expected schema.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{DecodeError, Error, ServerError};
use crate::models::{
    Attributes, Feature, FeatureSet, Geometry, GeometryType, Query, SpatialReference,
};
use crate::network::HttpResponse;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeatureSet {
    features: Vec<RawFeature>,
    #[serde(default)]
    exceeded_transfer_limit: bool,
    #[serde(default)]
    geometry_type: Option<String>,
    #[serde(default)]
    object_id_field_name: Option<String>,
    #[serde(default)]
    spatial_reference: Option<SpatialReference>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    attributes: Option<Map<String, Value>>,
}

/// Map a response to its JSON body or to a server error.
pub(crate) fn parse_body(response: &HttpResponse) -> Result<Value, Error> {
    if !response.is_success() {
        let body = String::from_utf8_lossy(&response.body).into_owned();
        warn!(status = response.status, "MapServer returned HTTP error status");
        return Err(ServerError::Http {
            status: response.status,
            body,
        }
        .into());
    }

    let value: Value = serde_json::from_slice(&response.body).map_err(DecodeError::from)?;

    if let Some(error) = value.get("error") {
        let error = embedded_error(error, response.status);
        warn!(code = error.code(), message = error.message(), "MapServer returned an error object");
        return Err(error.into());
    }

    Ok(value)
}

/// Fields are read one by one so a single oddly typed one, such as a
/// string `code`, does not lose the others.
fn embedded_error(error: &Value, status: u16) -> ServerError {
    let code = match error.get("code") {
        Some(Value::Number(code)) => code.as_i64(),
        Some(Value::String(code)) => code.trim().parse().ok(),
        _ => None,
    };
    let message = match error.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let details = error
        .get("details")
        .and_then(Value::as_array)
        .map(|details| {
            details
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ServerError::Embedded {
        code: code.unwrap_or(i64::from(status)),
        message,
        details,
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, Error> {
    let value = parse_body(response)?;
    serde_json::from_value(value).map_err(|e| DecodeError::from(e).into())
}

pub(crate) fn decode_feature_set(response: &HttpResponse, query: &Query) -> Result<FeatureSet, Error> {
    let value = parse_body(response)?;
    let raw: RawFeatureSet = serde_json::from_value(value).map_err(DecodeError::from)?;

    let declared = raw
        .geometry_type
        .as_deref()
        .map(|name| {
            GeometryType::from_esri(name)
                .ok_or_else(|| DecodeError::UnsupportedGeometry(name.to_string()))
        })
        .transpose()?;

    if let (Some(expected), Some(found)) = (query.expected_geometry(), declared) {
        if expected != found {
            return Err(DecodeError::GeometryMismatch { expected, found }.into());
        }
    }
    let geometry_type = declared.or(query.expected_geometry());

    let mut features = raw
        .features
        .into_iter()
        .map(|feature| decode_feature(feature, geometry_type))
        .collect::<Result<Vec<_>, _>>()?;

    // A page never holds more than was asked for; anything beyond the limit
    // is left for the next page.
    let mut exceeded_transfer_limit = raw.exceeded_transfer_limit;
    let limit = query.result_limit() as usize;
    if features.len() > limit {
        warn!(
            returned = features.len(),
            limit,
            "Server returned more features than requested, truncating page"
        );
        features.truncate(limit);
        exceeded_transfer_limit = true;
    }

    Ok(FeatureSet::from_parts(
        features,
        exceeded_transfer_limit,
        geometry_type,
        raw.spatial_reference,
        raw.object_id_field_name,
        query.result_offset(),
    ))
}

fn decode_feature(raw: RawFeature, geometry_type: Option<GeometryType>) -> Result<Feature, DecodeError> {
    let geometry = match (&raw.geometry, geometry_type) {
        (Some(value), Some(expected)) => Geometry::from_esri_json_as(value, expected)?,
        (Some(value), None) => Geometry::from_esri_json(value)?,
        (None, _) => None,
    };

    let attributes = match &raw.attributes {
        Some(object) => Attributes::from_json(object)?,
        None => Attributes::default(),
    };

    Ok(Feature::new(geometry, attributes))
}
