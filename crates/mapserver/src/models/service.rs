//! MapServer and layer metadata (`?f=json` on the service and layer URLs).

use serde::Deserialize;

use crate::identifiers::LayerId;
use crate::models::feature::SpatialReference;
use crate::models::geometry::GeometryType;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceInfo {
    pub service_description: Option<String>,
    pub map_name: Option<String>,
    pub layers: Vec<LayerSummary>,
    pub tables: Vec<LayerSummary>,
    pub max_record_count: Option<u32>,
    pub spatial_reference: Option<SpatialReference>,
}

impl ServiceInfo {
    pub fn layer_by_id(&self, id: LayerId) -> Option<&LayerSummary> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Exact, case-sensitive match on the layer name.
    pub fn layer_by_name(&self, name: &str) -> Option<&LayerSummary> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

/// A layer as listed by its service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub id: LayerId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub geometry_type: Option<String>,
}

impl LayerSummary {
    /// `None` for group layers, tables and unsupported geometry kinds.
    pub fn geometry(&self) -> Option<GeometryType> {
        self.geometry_type.as_deref().and_then(GeometryType::from_esri)
    }
}

/// Full description of a single layer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub geometry_type: Option<String>,
    #[serde(default)]
    pub max_record_count: Option<u32>,
    #[serde(default)]
    pub object_id_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub advanced_query_capabilities: Option<QueryCapabilities>,
}

impl LayerInfo {
    pub fn geometry(&self) -> Option<GeometryType> {
        self.geometry_type.as_deref().and_then(GeometryType::from_esri)
    }

    /// Page size the layer advertises, if any.
    pub fn page_size(&self) -> Option<u32> {
        self.max_record_count.filter(|&count| count > 0)
    }

    /// Servers older than 10.3 do not report this and cannot page.
    pub fn supports_pagination(&self) -> bool {
        self.advanced_query_capabilities
            .as_ref()
            .is_some_and(|caps| caps.supports_pagination)
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryCapabilities {
    pub supports_pagination: bool,
    pub supports_order_by: bool,
}
