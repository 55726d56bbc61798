//! Transport seam between the mount controller and the device webserver.
//!
//! The controller talks through [`DeviceTransport`] so tests can run against
//! a scripted double; production uses the HTTP implementation, which maps
//! request timeouts to [`Error::Timeout`] and everything else unreachable to
//! [`Error::Connectivity`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

/// Outcome of one device exchange.
#[derive(Debug, Clone)]
pub struct DeviceResponse {
    pub status: u16,
    pub body: String,
}

impl DeviceResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response access to the mount's webserver.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// PUT a command or control request, with optional body.
    async fn put(
        &self,
        route: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<DeviceResponse>;

    /// GET a status value or listing.
    async fn get(&self, route: &str, query: &[(&str, String)]) -> Result<DeviceResponse>;
}

/// HTTP transport over the mount webserver.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Connect to `host:port` with a per-request timeout.
    pub fn new(host: &str, port: u16, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            client,
        })
    }

    fn classify(route: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(format!("device request to {route} timed out"))
        } else {
            Error::Connectivity(format!("device request to {route} failed: {e}"))
        }
    }

    async fn read(route: &str, response: reqwest::Response) -> Result<DeviceResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(route, e))?;
        debug!(route, status, "device exchange complete");
        Ok(DeviceResponse { status, body })
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn put(
        &self,
        route: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<DeviceResponse> {
        let mut request = self
            .client
            .put(format!("{}{}", self.base_url, route))
            .query(query);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await.map_err(|e| Self::classify(route, e))?;
        Self::read(route, response).await
    }

    async fn get(&self, route: &str, query: &[(&str, String)]) -> Result<DeviceResponse> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, route))
            .query(query)
            .send()
            .await
            .map_err(|e| Self::classify(route, e))?;
        Self::read(route, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_ok_covers_2xx_only() {
        assert!(DeviceResponse { status: 200, body: String::new() }.ok());
        assert!(DeviceResponse { status: 204, body: String::new() }.ok());
        assert!(!DeviceResponse { status: 404, body: String::new() }.ok());
        assert!(!DeviceResponse { status: 500, body: String::new() }.ok());
    }
}
