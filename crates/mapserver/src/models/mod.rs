//! Query, feature, geometry and metadata types.

pub mod attributes;
pub mod feature;
pub mod geometry;
pub mod query;
pub mod service;

// Re-exports for convenience
pub use attributes::{AttributeValue, Attributes};
pub use feature::{Feature, FeatureSet, SpatialReference};
pub use geometry::{Envelope, FilterGeometry, Geometry, GeometryType};
pub use query::{OutFields, Query, QueryBuilder, SpatialFilter, SpatialRelation, field_equals};
pub use service::{FieldInfo, LayerInfo, LayerSummary, QueryCapabilities, ServiceInfo};
