//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use axum::Router;
use tokio::net::TcpListener;

use subproxy::addressing::{AddressingStrategy, HostCodec, Origin, SharedStrategy};
use subproxy::config::RedirectConfig;
use subproxy::http::{Transport, TransportError};
use subproxy::{Forwarder, PublicDomain};

pub const DOMAIN: &str = "proxy.example.com";

/// What the stub transport saw for one outbound hop.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport that records every hop and answers from a script.
///
/// Once the script runs dry every further hop gets `200 OK`.
#[derive(Default)]
pub struct StubTransport {
    sent: Mutex<Vec<SentRequest>>,
    script: Mutex<VecDeque<Response<Body>>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(responses: Vec<Response<Body>>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(responses.into()),
        })
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, usize::MAX)
            .await
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.sent.lock().unwrap().push(SentRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| Response::new(Body::from("ok"))))
    }
}

pub fn redirect(status: StatusCode, location: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("location", location)
        .body(Body::empty())
        .unwrap()
}

pub fn follow(max_hops: u32) -> RedirectConfig {
    RedirectConfig {
        follow: true,
        max_hops,
    }
}

pub fn no_follow() -> RedirectConfig {
    RedirectConfig {
        follow: false,
        max_hops: 10,
    }
}

pub fn public_domain() -> PublicDomain {
    PublicDomain::new(DOMAIN, "https", None)
}

pub fn forwarder(
    strategy: SharedStrategy,
    transport: Arc<dyn Transport>,
    redirects: RedirectConfig,
) -> Forwarder {
    Forwarder::new(strategy, transport, public_domain(), redirects)
}

pub fn codec_forwarder(transport: Arc<dyn Transport>, redirects: RedirectConfig) -> Forwarder {
    forwarder(Arc::new(HostCodec), transport, redirects)
}

/// Codec label for an origin URL such as `https://origin.example`.
pub async fn codec_label(origin: &str) -> String {
    let origin: Origin = origin.parse().unwrap();
    HostCodec.encode(&origin).await.unwrap().into_string()
}

/// Inbound request addressed to `<label>.proxy.example.com`.
pub fn inbound(method: Method, label: &str, path: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("host", format!("{}.{}", label, DOMAIN))
        .body(body)
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Serve `router` on an ephemeral localhost port.
pub async fn start_origin(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
