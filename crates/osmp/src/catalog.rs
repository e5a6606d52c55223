//! Lookups across the OSMP MapServers.

use arcgis_mapserver::{
    ClientConfig, LayerId, MapServerClient, OutFields, ReqwestTransport, Transport,
};
use tracing::debug;

use crate::error::OsmpError;
use crate::feature::{OsmpFeature, OsmpKind};
use crate::service::{DEFAULT_ROOT, OsmpService};
use crate::trail_id::TrailId;

/// Entry point to the OSMP services.
///
/// `config` is a template: each service gets its own [`MapServerClient`]
/// with `base_url` replaced by the service URL. All clients share one
/// transport. Lookups are retried according to `config.retry`.
pub struct Osmp<T = ReqwestTransport> {
    root: String,
    config: ClientConfig,
    transport: T,
}

impl Osmp<ReqwestTransport> {
    pub fn new() -> Result<Self, OsmpError> {
        Self::with_config(DEFAULT_ROOT, ClientConfig::default())
    }

    pub fn with_config(root: impl Into<String>, config: ClientConfig) -> Result<Self, OsmpError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(root, config, transport))
    }
}

impl<T: Transport + Clone> Osmp<T> {
    pub fn with_transport(root: impl Into<String>, config: ClientConfig, transport: T) -> Self {
        Self {
            root: root.into(),
            config,
            transport,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn client(&self, service: OsmpService) -> Result<MapServerClient<T>, OsmpError> {
        let config = ClientConfig {
            base_url: service.url(&self.root),
            ..self.config.clone()
        };
        Ok(MapServerClient::with_transport(config, self.transport.clone())?)
    }

    /// Segment ids are looked up in `Trails`, anything else by `GlobalID`
    /// in `TrailsNEW`.
    pub async fn trail(&self, id: &TrailId) -> Result<Option<OsmpFeature>, OsmpError> {
        let (service, layer, field) = id.location();
        self.lookup(OsmpKind::Trail, service, layer, field, &id.to_string())
            .await
    }

    pub async fn junction(&self, id: &str) -> Result<Option<OsmpFeature>, OsmpError> {
        self.lookup(
            OsmpKind::Junction,
            OsmpService::Trails,
            LayerId::new(1),
            "JUNCTIONID",
            id,
        )
        .await
    }

    pub async fn access(&self, id: &str) -> Result<Option<OsmpFeature>, OsmpError> {
        self.lookup(
            OsmpKind::Access,
            OsmpService::TrailheadsAccessPoints,
            LayerId::new(0),
            "ACCESSID",
            id,
        )
        .await
    }

    async fn lookup(
        &self,
        kind: OsmpKind,
        service: OsmpService,
        layer: LayerId,
        field: &str,
        id: &str,
    ) -> Result<Option<OsmpFeature>, OsmpError> {
        let client = self.client(service)?;
        debug!(service = %service, layer = %layer, field, id, "Looking up OSMP feature");

        let feature = self
            .config
            .retry
            .run(|| client.get_feature(layer, field, id, OutFields::All))
            .await?;

        Ok(feature.map(|feature| OsmpFeature::new(kind, feature)))
    }
}
