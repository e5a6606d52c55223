//! Error taxonomy for MapServer requests.
//!
//! Every failure of a request surfaces as exactly one of [`TransportError`],
//! [`ServerError`] or [`DecodeError`]. [`QueryError`] covers preconditions
//! that are checked locally before anything is sent.

use std::path::PathBuf;

use crate::models::geometry::GeometryType;

/// The request never produced an HTTP response.
///
/// Never carries a parsed body. Callers may retry these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url } | Self::Connect { url, .. } | Self::Request { url, .. } => url,
        }
    }
}

/// The server answered, but with an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// Non-success HTTP status. The raw body is kept as received.
    #[error("HTTP {status} from server")]
    Http { status: u16, body: String },

    /// HTTP 200 whose JSON body is an `{"error": {...}}` object.
    #[error("Server error {code}: {message}")]
    Embedded {
        code: i64,
        message: String,
        details: Vec<String>,
    },
}

impl ServerError {
    /// HTTP status for transport-level failures, or the upstream error code
    /// for embedded errors (ArcGIS mirrors HTTP codes there).
    pub fn code(&self) -> i64 {
        match self {
            Self::Http { status, .. } => i64::from(*status),
            Self::Embedded { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Http { body, .. } => body,
            Self::Embedded { message, .. } => message,
        }
    }
}

/// The response body did not match the expected schema.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    Schema(String),

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Geometry type mismatch: layer declares {expected}, got {found}")]
    GeometryMismatch {
        expected: GeometryType,
        found: GeometryType,
    },

    #[error("Attribute {field} is not a string, number or null")]
    NonScalarAttribute { field: String },
}

/// A query was rejected before any request was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Result limit must be greater than zero")]
    ZeroLimit,

    #[error("Result limit {limit} exceeds the server page size of {page_size}")]
    LimitExceedsPageSize { limit: u32, page_size: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),
}

impl Error {
    /// Only transport failures are worth re-issuing unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status of a [`ServerError::Http`] failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server(ServerError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Invalid client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid base URL {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("Page size must be greater than zero")]
    ZeroPageSize,

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}
