//! # arcgis-mapserver
//!
//! Typed client for the ArcGIS REST MapServer `query` operation.
//!
//! ## Features
//!
//! - **Typed queries**: spatial and attribute filters, output fields, paging
//! - **Decoded geometry**: Esri JSON points, polylines and polygons as `geo` types
//! - **Pagination**: single pages, a lazy page cursor, or every page merged
//! - **Classified errors**: transport, server and decode failures are distinct
//! - **Pluggable networking**: implement [`Transport`] to replace `reqwest`
//!
//! ## Example
//!
//! ```no_run
//! use arcgis_mapserver::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(
//!     "https://maps.bouldercolorado.gov/arcgis2/rest/services/osmp/Trails/MapServer/",
//! );
//! let client = MapServerClient::new(config)?;
//!
//! let query = Query::builder(LayerId::new(4))
//!     .attribute_filter(field_equals("TRAILNAME", "Mesa Trail"))
//!     .output_fields(OutFields::list(["SEGMENTID", "TRAILNAME"]))
//!     .limit(100)
//!     .build()?;
//!
//! let trails = client.query_all(&query).await?;
//! for feature in &trails {
//!     println!("{:?}", feature.attribute("SEGMENTID"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod identifiers;
pub mod models;
pub mod network;
pub mod retry;

pub use geo;
pub use geojson;

// Re-exports for convenience
pub mod prelude {
    pub use crate::client::{MapServerClient, Pages};
    pub use crate::config::ClientConfig;
    pub use crate::error::{
        ConfigError, DecodeError, Error, QueryError, Result, ServerError, TransportError,
    };
    pub use crate::identifiers::*;
    pub use crate::models::*;
    pub use crate::network::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
    pub use crate::retry::RetryPolicy;
}

pub use prelude::*;
