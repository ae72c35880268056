//! Request forwarding engine.
//!
//! # State Machine
//! ```text
//! Resolve ──(no host / unknown label)──▶ BadRequest (no outbound call)
//!    │
//!    ▼
//! Dispatch ──(bad request shape / network failure)─▶ BadRequest / InternalError
//!    │   ▲
//!    │   └── Redirect hop: re-encode Location origin, rewrite to proxy domain
//!    ▼
//! Forwarded: headers copied, Bearer challenge rewritten, body streamed
//! ```
//!
//! # Design Decisions
//! - The outbound request carries a clone of the inbound headers with `Host`
//!   overwritten for the current hop
//! - Redirect and realm rewriting fail open: the unrewritten value is used
//! - A streamed inbound body cannot be replayed, so 307/308 hops are only
//!   followed when the inbound body was empty

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::http::header::{
    CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, TRANSFER_ENCODING,
    WWW_AUTHENTICATE,
};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;
use url::Url;

use crate::addressing::{AddressError, AddressingStrategy, Origin, SharedStrategy};
use crate::config::{ProxyConfig, RedirectConfig};
use crate::http::request::request_id;
use crate::http::response::into_client_response;
use crate::http::transport::{ReqwestTransport, Transport, TransportError};
use crate::observability::metrics;
use crate::rewrite::{AuthChallengeRewriter, PublicDomain};

const BEARER_REALM: &str = "Bearer realm";

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request carries no host")]
    MissingHost,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::MissingHost | ForwardError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ForwardError::Address(AddressError::Decode(_) | AddressError::NotFound(_)) => {
                StatusCode::BAD_REQUEST
            }
            ForwardError::Address(AddressError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Transport(TransportError::Build(_)) => StatusCode::BAD_REQUEST,
            ForwardError::Transport(TransportError::Network(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// An inbound request bound to the origin its host label resolved to.
pub struct ProxiedRequest {
    pub origin: Origin,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

pub struct Forwarder {
    strategy: SharedStrategy,
    transport: Arc<dyn Transport>,
    domain: PublicDomain,
    auth: AuthChallengeRewriter,
    redirects: RedirectConfig,
}

impl Forwarder {
    pub fn new(
        strategy: SharedStrategy,
        transport: Arc<dyn Transport>,
        domain: PublicDomain,
        redirects: RedirectConfig,
    ) -> Self {
        let auth = AuthChallengeRewriter::new(strategy.clone(), domain.clone());
        Self {
            strategy,
            transport,
            domain,
            auth,
            redirects,
        }
    }

    /// Forwarder with the production reqwest transport.
    pub fn from_config(
        config: &ProxyConfig,
        strategy: SharedStrategy,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config.timeouts)?);
        Ok(Self::new(
            strategy,
            transport,
            PublicDomain::from_config(&config.domain),
            config.redirects.clone(),
        ))
    }

    pub fn domain(&self) -> &PublicDomain {
        &self.domain
    }

    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let request_id = request_id(&request);

        let proxied = match self.resolve(request).await {
            Ok(proxied) => proxied,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to resolve origin");
                return Err(e);
            }
        };

        tracing::info!(
            request_id = %request_id,
            method = %proxied.method,
            origin = %proxied.origin,
            url = %proxied.url,
            "Forwarding request"
        );

        let upstream = match self.dispatch(proxied).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Upstream request failed");
                return Err(e);
            }
        };

        let response = self.finish(upstream).await;
        tracing::info!(request_id = %request_id, status = %response.status(), "Forwarded");
        Ok(response)
    }

    /// Recover the target origin from the inbound host and build the outbound URL.
    pub async fn resolve(&self, request: Request<Body>) -> Result<ProxiedRequest, ForwardError> {
        let host = inbound_host(&request).ok_or(ForwardError::MissingHost)?;
        let label = PublicDomain::label_from_host(&host).ok_or(ForwardError::MissingHost)?;
        let origin = self.strategy.decode(label).await?;

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = Url::parse(&format!("{}{}", origin, path_and_query))
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;

        let (parts, body) = request.into_parts();
        Ok(ProxiedRequest {
            origin,
            method: parts.method,
            url,
            headers: parts.headers,
            body,
        })
    }

    async fn dispatch(&self, proxied: ProxiedRequest) -> Result<Response<Body>, ForwardError> {
        let ProxiedRequest {
            mut method,
            mut url,
            mut headers,
            body,
            ..
        } = proxied;

        let mut replayable = body.size_hint().exact() == Some(0);
        let mut body = Some(body);
        let mut hops = 0u32;

        loop {
            let body = body.take().unwrap_or_default();
            let request = outbound_request(&method, &url, &headers, body)?;
            let response = self.transport.send(request).await?;

            let Some(next) = redirect_target(&response, &url) else {
                return Ok(response);
            };

            let status = response.status();
            let stop = if !self.redirects.follow {
                Some("redirects are not followed")
            } else if hops >= self.redirects.max_hops {
                Some("redirect limit reached")
            } else if is_method_preserving(status) && !replayable {
                Some("request body cannot be replayed")
            } else {
                None
            };

            if let Some(reason) = stop {
                tracing::debug!(
                    status = %status,
                    location = %next,
                    reason,
                    "Returning redirect to client"
                );
                return Ok(self.rewrite_location(response, &next).await);
            }

            if !is_method_preserving(status) && method != Method::GET && method != Method::HEAD {
                method = Method::GET;
                for name in [CONTENT_LENGTH, CONTENT_TYPE, CONTENT_ENCODING, TRANSFER_ENCODING] {
                    headers.remove(name);
                }
                // The body is gone, so later 307/308 hops can be followed.
                replayable = true;
            }

            hops += 1;
            url = match self.translate(&next).await.and_then(|s| Url::parse(&s).ok()) {
                Some(rewritten) => {
                    tracing::info!(
                        hop = hops,
                        from = %next,
                        to = %rewritten,
                        "Redirect rewritten to proxy domain"
                    );
                    metrics::record_redirect_hop(true);
                    rewritten
                }
                None => {
                    tracing::info!(hop = hops, to = %next, "Following redirect unrewritten");
                    metrics::record_redirect_hop(false);
                    next
                }
            };
        }
    }

    /// Proxy-domain form of `target`, or `None` when its origin cannot be encoded.
    /// A target already under the proxy domain is returned as is.
    async fn translate(&self, target: &Url) -> Option<String> {
        if self.domain.is_proxied(target) {
            return Some(target.to_string());
        }
        let origin = Origin::from_url(target)?;
        match self.strategy.encode(&origin).await {
            Ok(label) => Some(self.domain.url_for(&label, target)),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Failed to encode redirect origin");
                None
            }
        }
    }

    async fn rewrite_location(&self, mut response: Response<Body>, target: &Url) -> Response<Body> {
        if let Some(value) = self
            .translate(target)
            .await
            .and_then(|rewritten| HeaderValue::from_str(&rewritten).ok())
        {
            response.headers_mut().insert(LOCATION, value);
        }
        response
    }

    async fn finish(&self, upstream: Response<Body>) -> Response<Body> {
        let (mut parts, body) = upstream.into_parts();

        let challenges: Vec<HeaderValue> =
            parts.headers.get_all(WWW_AUTHENTICATE).iter().cloned().collect();

        if challenges
            .iter()
            .any(|v| v.to_str().is_ok_and(|v| v.starts_with(BEARER_REALM)))
        {
            let mut rewritten = Vec::with_capacity(challenges.len());
            for value in challenges {
                rewritten.push(self.rewrite_challenge(value).await);
            }

            parts.headers.remove(WWW_AUTHENTICATE);
            for value in rewritten {
                parts.headers.append(WWW_AUTHENTICATE, value);
            }
        }

        into_client_response(Response::from_parts(parts, body))
    }

    /// One `WWW-Authenticate` value with a Bearer realm moved under the proxy
    /// domain. Anything else comes back byte-for-byte.
    async fn rewrite_challenge(&self, value: HeaderValue) -> HeaderValue {
        let Some(challenge) = value.to_str().ok().filter(|v| v.starts_with(BEARER_REALM)) else {
            return value;
        };

        let rewritten = self.auth.rewrite(challenge).await;
        if rewritten == challenge {
            return value;
        }
        match HeaderValue::from_str(&rewritten) {
            Ok(replacement) => {
                tracing::info!(from = %challenge, to = %rewritten, "Replaced WWW-Authenticate");
                replacement
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rewritten challenge is not a valid header value");
                value
            }
        }
    }
}

fn inbound_host(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
}

fn outbound_request(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: Body,
) -> Result<Request<Body>, ForwardError> {
    let mut target = url.clone();
    target.set_fragment(None);

    let host = match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(ForwardError::InvalidTarget(target.to_string())),
    };
    let host = HeaderValue::from_str(&host)
        .map_err(|e| TransportError::Build(e.to_string()))?;

    let mut request = Request::builder()
        .method(method.clone())
        .uri(target.as_str())
        .body(body)
        .map_err(|e| TransportError::Build(e.to_string()))?;

    let mut headers = headers.clone();
    headers.insert(HOST, host);
    *request.headers_mut() = headers;
    Ok(request)
}

fn is_method_preserving(status: StatusCode) -> bool {
    matches!(status, StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT)
}

fn redirect_target(response: &Response<Body>, current: &Url) -> Option<Url> {
    let followable = matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    );
    if !followable {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}
