//! Transport seam between the request layer and the network.
//!
//! DESIGN
//! ======
//! [`Transport`] takes a fully built [`OutgoingRequest`] and yields the raw
//! status and body bytes. Everything auth-related happens above it, so tests
//! can swap in a scripted transport while production uses [`ReqwestTransport`].

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap};

use super::body::RequestBody;
use crate::config::Timeouts;
use crate::error::ClientError;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Status and body bytes as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

// =============================================================================
// ERROR
// =============================================================================

/// Failures that leave the request layer without any HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout and the like.
    #[error("{0}")]
    Network(String),

    /// The request could not be assembled (bad header value, bad MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return its status and body.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was obtained.
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError>;
}

// =============================================================================
// REQWEST
// =============================================================================

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(timeouts: Timeouts) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        let OutgoingRequest { method, url, mut headers, body } = request;

        let mut builder = self.http.request(method, url);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(text) | RequestBody::Text(text) => builder.body(text),
            RequestBody::Multipart(form) => {
                // reqwest writes its own multipart content type with the boundary.
                headers.remove(CONTENT_TYPE);
                builder.multipart(form.to_reqwest()?)
            }
        };

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                tracing::warn!(status, error = %e, "response body read failed");
                Vec::new()
            }
        };

        Ok(RawResponse { status, body })
    }
}
