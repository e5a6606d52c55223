//! [`Transport`] backed by a pooled `reqwest::Client`.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{trace, warn};

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};
use crate::network::traits::{HttpRequest, HttpResponse, Method, Transport};

/// Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::new(config.timeout, &config.user_agent)
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.to_string();

        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self
                .client
                .post(request.url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.body.unwrap_or_default()),
        };

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status().as_u16();

        let body = response.bytes().await.map_err(|e| classify(&url, e))?;
        trace!(url = %url, status, bytes = body.len(), "HTTP response body read");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify(url: &str, error: reqwest::Error) -> TransportError {
    warn!(
        url,
        error = %error,
        is_connect = error.is_connect(),
        is_timeout = error.is_timeout(),
        "HTTP request failed"
    );

    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
