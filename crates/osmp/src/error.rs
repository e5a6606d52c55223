use arcgis_mapserver::{ConfigError, Error};

#[derive(Debug, thiserror::Error)]
pub enum OsmpError {
    #[error("Invalid OSMP client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MapServer(#[from] Error),
}

impl OsmpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MapServer(error) if error.is_retryable())
    }
}
