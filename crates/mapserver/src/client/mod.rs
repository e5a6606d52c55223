//! The MapServer query client.

mod decode;
pub mod pages;

pub use pages::Pages;

use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ConfigError, QueryError, Result};
use crate::identifiers::LayerId;
use crate::models::{
    Feature, FeatureSet, LayerInfo, LayerSummary, OutFields, Query, QueryBuilder, ServiceInfo,
    field_equals,
};
use crate::network::{HttpRequest, ReqwestTransport, Transport};

/// Client for one MapServer.
///
/// Holds no per-query state; the transport (a connection pool for the
/// default [`ReqwestTransport`]) is shared by all calls and released when
/// the client is dropped. Share it between tasks by reference or `Arc`.
pub struct MapServerClient<T = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    base_url: Url,
}

impl MapServerClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> MapServerClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> std::result::Result<Self, ConfigError> {
        let base_url = config.validate()?;
        Ok(Self {
            transport,
            config,
            base_url,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builder for the configured default layer (layer 0 when unset) with
    /// the configured page size as its limit.
    pub fn query_builder(&self) -> QueryBuilder {
        Query::builder(self.config.default_layer.unwrap_or_default()).limit(self.config.page_size)
    }

    /// Run one query request and return that single page.
    ///
    /// When the server truncates the result, the returned set reports
    /// `exceeded_transfer_limit()` and its `next_offset()` is the offset to
    /// continue from. Use [`MapServerClient::pages`] or
    /// [`MapServerClient::query_all`] to follow continuations.
    pub async fn query(&self, query: &Query) -> Result<FeatureSet> {
        if query.result_limit() > self.config.page_size {
            return Err(QueryError::LimitExceedsPageSize {
                limit: query.result_limit(),
                page_size: self.config.page_size,
            }
            .into());
        }

        let url = self.layer_url(query.layer_id(), Some("query"));
        let request = self.build_request(url, &query.to_params(self.config.out_sr));

        debug!(
            layer = %query.layer_id(),
            offset = query.result_offset(),
            limit = query.result_limit(),
            method = ?request.method,
            "Querying MapServer layer"
        );

        let response = self.transport.execute(request).await?;
        let features = decode::decode_feature_set(&response, query)?;

        debug!(
            layer = %query.layer_id(),
            count = features.len(),
            exceeded_transfer_limit = features.exceeded_transfer_limit(),
            "MapServer query page received"
        );

        Ok(features)
    }

    /// Lazy, restartable sequence of pages starting at the query's offset.
    pub fn pages(&self, query: Query) -> Pages<'_, T> {
        Pages::new(self, query)
    }

    /// Follow every continuation and merge the pages in order.
    ///
    /// The layer's description is fetched first. The query's limit is
    /// lowered to the layer's `maxRecordCount` when that is smaller, and a
    /// layer that cannot page is answered with its first page only.
    pub async fn query_all(&self, query: &Query) -> Result<FeatureSet> {
        let info = self.layer_info(query.layer_id()).await?;
        let page_size = self.fit_page_size(&info);
        let query = if query.result_limit() > page_size {
            query.clone().with_limit(page_size)
        } else {
            query.clone()
        };

        if !info.supports_pagination() {
            warn!(
                layer = %query.layer_id(),
                "Layer does not support pagination, returning the first page only"
            );
            return self.query(&query).await;
        }

        self.pages(query).collect_all().await
    }

    /// Largest page the layer will serve: the configured page size, lowered
    /// to the layer's advertised `maxRecordCount` when that is smaller.
    pub async fn layer_page_size(&self, layer: LayerId) -> Result<u32> {
        let info = self.layer_info(layer).await?;
        Ok(self.fit_page_size(&info))
    }

    fn fit_page_size(&self, info: &LayerInfo) -> u32 {
        let page_size = info
            .page_size()
            .map_or(self.config.page_size, |advertised| advertised.min(self.config.page_size));
        debug!(
            layer = %info.id,
            advertised = ?info.page_size(),
            page_size,
            "Resolved layer page size"
        );
        page_size
    }

    pub async fn service_info(&self) -> Result<ServiceInfo> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("f", "json");

        debug!(url = %url, "Fetching MapServer service info");
        let response = self.transport.execute(HttpRequest::get(url)).await?;
        decode::decode_json(&response)
    }

    pub async fn layer_info(&self, layer: LayerId) -> Result<LayerInfo> {
        let mut url = self.layer_url(layer, None);
        url.query_pairs_mut().append_pair("f", "json");

        debug!(url = %url, layer = %layer, "Fetching MapServer layer info");
        let response = self.transport.execute(HttpRequest::get(url)).await?;
        decode::decode_json(&response)
    }

    pub async fn layer_by_id(&self, id: LayerId) -> Result<Option<LayerSummary>> {
        Ok(self.service_info().await?.layer_by_id(id).cloned())
    }

    pub async fn layer_by_name(&self, name: &str) -> Result<Option<LayerSummary>> {
        Ok(self.service_info().await?.layer_by_name(name).cloned())
    }

    /// Look up a single feature by an identifying field.
    ///
    /// Returns the first match. Several matches are logged, since the field
    /// is then not actually unique.
    pub async fn get_feature(
        &self,
        layer: LayerId,
        id_field: &str,
        id_value: &str,
        fields: OutFields,
    ) -> Result<Option<Feature>> {
        let query = Query::builder(layer)
            .attribute_filter(field_equals(id_field, id_value))
            .output_fields(fields)
            .limit(self.config.page_size.min(2))
            .build()?;

        let features = self.query(&query).await?;
        if features.len() > 1 {
            warn!(
                layer = %layer,
                field = id_field,
                value = id_value,
                "Multiple features share an id, using the first"
            );
        }

        Ok(features.into_features().into_iter().next())
    }

    /// `{base}/{layer}` or `{base}/{layer}/{operation}`.
    fn layer_url(&self, layer: LayerId, operation: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // http(s) URLs always have path segments; validate() checked the scheme.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&layer.to_string());
            if let Some(operation) = operation {
                segments.push(operation);
            }
        }
        url
    }

    /// GET unless the URL gets too long, then the same parameters as a
    /// form-encoded POST.
    fn build_request(&self, mut url: Url, params: &[(&'static str, String)]) -> HttpRequest {
        url.query_pairs_mut().extend_pairs(params);
        if url.as_str().len() <= self.config.max_get_url_len {
            return HttpRequest::get(url);
        }

        let body = url.query().unwrap_or_default().to_string();
        url.set_query(None);
        HttpRequest::post_form(url, body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, TransportError};
    use crate::models::{Envelope, Geometry, SpatialFilter};
    use crate::network::{HttpResponse, Method};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub fn with_bodies(bodies: &[&str]) -> Self {
            let mock = Self::default();
            for body in bodies {
                mock.push(Ok(HttpResponse {
                    status: 200,
                    body: body.as_bytes().to_vec(),
                }));
            }
            mock
        }

        pub fn push(&self, response: std::result::Result<HttpResponse, TransportError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub fn param(&self, index: usize, key: &str) -> Option<String> {
            let requests = self.requests.lock().unwrap();
            let request = requests.get(index)?;
            let query = match request.method {
                Method::Get => request.url.query().unwrap_or_default().to_string(),
                Method::Post => request.body.clone().unwrap_or_default(),
            };
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        }
    }

    impl Transport for MockTransport {
        async fn execute(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, TransportError> {
            let url = request.url.to_string();
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Request {
                    url,
                    message: "no canned response".to_string(),
                }))
        }
    }

    pub(crate) fn client(mock: MockTransport) -> MapServerClient<MockTransport> {
        let config = ClientConfig::new("https://example.com/arcgis/rest/services/osmp/Trails/MapServer")
            .with_page_size(100);
        MapServerClient::with_transport(config, mock).unwrap()
    }

    #[tokio::test]
    async fn test_query_url_and_params() {
        let client = client(MockTransport::with_bodies(&[r#"{"features": []}"#]));
        let query = Query::builder(LayerId::new(4))
            .attribute_filter("TRAILNAME = 'Mesa Trail'")
            .limit(25)
            .build()
            .unwrap();

        client.query(&query).await.unwrap();

        let requests = client.transport().requests.lock().unwrap().clone();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(
            requests[0].url.path(),
            "/arcgis/rest/services/osmp/Trails/MapServer/4/query"
        );
        drop(requests);

        let mock = client.transport();
        assert_eq!(mock.param(0, "where").as_deref(), Some("TRAILNAME = 'Mesa Trail'"));
        assert_eq!(mock.param(0, "outFields").as_deref(), Some("*"));
        assert_eq!(mock.param(0, "resultRecordCount").as_deref(), Some("25"));
        assert_eq!(mock.param(0, "f").as_deref(), Some("json"));
    }

    #[tokio::test]
    async fn test_limit_above_page_size_is_rejected_without_io() {
        let client = client(MockTransport::default());
        let query = Query::builder(LayerId::new(4)).limit(101).build().unwrap();

        let err = client.query(&query).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::LimitExceedsPageSize { limit: 101, page_size: 100 })
        ));
        assert!(client.transport().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_filter_switches_to_post() {
        let client = client(MockTransport::with_bodies(&[r#"{"features": []}"#]));
        let ring: Vec<(f64, f64)> = (0..400)
            .map(|i| (-105.0 - f64::from(i) * 0.25, 40.0 + f64::from(i) * 0.125))
            .collect();
        let polygon = Geometry::Polygon {
            rings: vec![geo::LineString::from(ring)],
        };
        let query = Query::builder(LayerId::new(4))
            .spatial_filter(SpatialFilter::intersects(polygon.clone()))
            .limit(10)
            .build()
            .unwrap();

        client.query(&query).await.unwrap();

        let mock = client.transport();
        let request = mock.requests.lock().unwrap()[0].clone();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url.query(), None);

        let geometry: serde_json::Value =
            serde_json::from_str(&mock.param(0, "geometry").unwrap()).unwrap();
        assert_eq!(Geometry::from_esri_json(&geometry).unwrap(), Some(polygon));
        assert_eq!(mock.param(0, "geometryType").as_deref(), Some("esriGeometryPolygon"));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let mock = MockTransport::default();
        mock.push(Err(TransportError::Timeout {
            url: "https://example.com".to_string(),
        }));
        let client = client(mock);
        let query = Query::builder(LayerId::new(4)).limit(10).build().unwrap();

        let err = client.query(&query).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_service_info_and_layer_lookup() {
        let body = r#"{"layers": [{"id": 1, "name": "Junctions"}, {"id": 4, "name": "Trails"}]}"#;
        let client = client(MockTransport::with_bodies(&[body, body]));

        let by_name = client.layer_by_name("Trails").await.unwrap().unwrap();
        assert_eq!(by_name.id, LayerId::new(4));
        assert!(client.layer_by_id(LayerId::new(2)).await.unwrap().is_none());

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].url.path(), "/arcgis/rest/services/osmp/Trails/MapServer/");
        assert_eq!(requests[0].url.query(), Some("f=json"));
    }

    #[tokio::test]
    async fn test_layer_info_url() {
        let body = r#"{"id": 4, "name": "Trails", "geometryType": "esriGeometryPolyline", "maxRecordCount": 1000}"#;
        let client = client(MockTransport::with_bodies(&[body]));

        let info = client.layer_info(LayerId::new(4)).await.unwrap();
        assert_eq!(info.page_size(), Some(1000));

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].url.path(), "/arcgis/rest/services/osmp/Trails/MapServer/4");
    }

    #[tokio::test]
    async fn test_get_feature_escapes_and_takes_first() {
        let body = r#"{"features": [
            {"attributes": {"SEGMENTID": "101-202-303", "TRAILNAME": "Mesa"}},
            {"attributes": {"SEGMENTID": "101-202-303", "TRAILNAME": "Mesa (dup)"}}
        ]}"#;
        let client = client(MockTransport::with_bodies(&[body, r#"{"features": []}"#]));

        let feature = client
            .get_feature(LayerId::new(4), "SEGMENTID", "101-202-303", OutFields::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feature.attribute("TRAILNAME").and_then(|v| v.as_str()), Some("Mesa"));
        assert_eq!(
            client.transport().param(0, "where").as_deref(),
            Some("SEGMENTID='101-202-303'")
        );

        let missing = client
            .get_feature(LayerId::new(4), "TRAILNAME", "O'Hara", OutFields::list(["TRAILNAME"]))
            .await
            .unwrap();
        assert!(missing.is_none());
        assert_eq!(
            client.transport().param(1, "where").as_deref(),
            Some("TRAILNAME='O''Hara'")
        );
        assert_eq!(client.transport().param(1, "outFields").as_deref(), Some("TRAILNAME"));
    }

    const PAGED_LAYER: &str = r#"{"id": 4, "name": "Trails", "maxRecordCount": 2,
        "advancedQueryCapabilities": {"supportsPagination": true}}"#;

    #[tokio::test]
    async fn test_layer_page_size_takes_smaller_of_config_and_layer() {
        let unlimited = r#"{"id": 4, "name": "Trails"}"#;
        let large = r#"{"id": 4, "name": "Trails", "maxRecordCount": 2000}"#;
        let client = client(MockTransport::with_bodies(&[PAGED_LAYER, unlimited, large]));

        assert_eq!(client.layer_page_size(LayerId::new(4)).await.unwrap(), 2);
        assert_eq!(client.layer_page_size(LayerId::new(4)).await.unwrap(), 100);
        assert_eq!(client.layer_page_size(LayerId::new(4)).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_query_all_respects_layer_max_record_count() {
        let first = r#"{"objectIdFieldName": "OBJECTID", "exceededTransferLimit": true,
            "features": [{"attributes": {"OBJECTID": 1}}, {"attributes": {"OBJECTID": 2}}]}"#;
        let last = r#"{"objectIdFieldName": "OBJECTID",
            "features": [{"attributes": {"OBJECTID": 3}}]}"#;
        let client = client(MockTransport::with_bodies(&[PAGED_LAYER, first, last]));
        let query = Query::builder(LayerId::new(4)).limit(100).build().unwrap();

        let all = client.query_all(&query).await.unwrap();

        assert_eq!(all.len(), 3);
        let mock = client.transport();
        assert_eq!(mock.param(1, "resultRecordCount").as_deref(), Some("2"));
        assert_eq!(mock.param(2, "resultRecordCount").as_deref(), Some("2"));
        assert_eq!(mock.param(2, "resultOffset").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_query_all_without_pagination_returns_first_page() {
        let legacy = r#"{"id": 4, "name": "Trails", "maxRecordCount": 1000}"#;
        let page = r#"{"exceededTransferLimit": true,
            "features": [{"attributes": {"OBJECTID": 1}}]}"#;
        let client = client(MockTransport::with_bodies(&[legacy, page]));
        let query = Query::builder(LayerId::new(4)).limit(50).build().unwrap();

        let first = client.query_all(&query).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(first.exceeded_transfer_limit());
        assert_eq!(client.transport().requests.lock().unwrap().len(), 2);
        assert_eq!(client.transport().param(1, "resultRecordCount").as_deref(), Some("50"));
    }

    #[test]
    fn test_query_builder_uses_config_defaults() {
        let mut config = ClientConfig::new("https://example.com/MapServer/")
            .with_default_layer(LayerId::new(7))
            .with_page_size(250);
        config.out_sr = 3857;
        let client = MapServerClient::with_transport(config, MockTransport::default()).unwrap();

        let query = client.query_builder().build().unwrap();
        assert_eq!(query.layer_id(), LayerId::new(7));
        assert_eq!(query.result_limit(), 250);
    }

    #[test]
    fn test_envelope_filter_stays_on_get() {
        let client = client(MockTransport::default());
        let query = Query::builder(LayerId::new(1))
            .spatial_filter(SpatialFilter::intersects(Envelope::new(-105.3, 39.9, -105.2, 40.1)))
            .build()
            .unwrap();
        let request = client.build_request(
            client.layer_url(LayerId::new(1), Some("query")),
            &query.to_params(4326),
        );
        assert_eq!(request.method, Method::Get);
        assert!(request.body.is_none());
    }
}
