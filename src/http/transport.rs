//! Outbound HTTP transport.
//!
//! The forwarder talks to origins through the `Transport` trait so redirect
//! handling stays in one place and tests can count outbound calls. The
//! production implementation is a `reqwest` client with automatic redirects
//! disabled: every hop comes back to the forwarder.

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{Request, Response};
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use crate::config::TimeoutConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The outbound request could not be constructed.
    #[error("invalid outbound request: {0}")]
    Build(String),
    /// Connecting to or talking with the origin failed.
    #[error("upstream request failed: {0}")]
    Network(#[source] reqwest::Error),
}

/// A single outbound hop. Implementations must not follow redirects.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let (parts, body) = request.into_parts();
        let url = parts.uri.to_string();

        let mut builder = self
            .client
            .request(parts.method, url)
            .headers(parts.headers);

        // An empty body is sent without chunked framing.
        if body.size_hint().exact() != Some(0) {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::Build(e.to_string())
            } else {
                TransportError::Network(e)
            }
        })?;

        let status = upstream.status();
        let headers = upstream.headers().clone();

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
