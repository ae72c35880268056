//! `WWW-Authenticate` realm rewriting.
//!
//! A Bearer challenge such as
//! `Bearer realm="https://auth.example.com/token",service="registry.example.com"`
//! sends the client to the realm URL for a token. Pointing the realm at the
//! proxy keeps that credential request on the proxy domain too. Only the
//! `realm="..."` span changes; every other parameter stays byte-for-byte.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::addressing::{AddressingStrategy, Origin, SharedStrategy};
use crate::observability::metrics;
use crate::rewrite::PublicDomain;

static REALM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"realm="([^"]+)""#).expect("realm pattern is valid"));

#[derive(Debug, Clone)]
pub struct AuthChallengeRewriter {
    strategy: SharedStrategy,
    domain: PublicDomain,
}

impl AuthChallengeRewriter {
    pub fn new(strategy: SharedStrategy, domain: PublicDomain) -> Self {
        Self { strategy, domain }
    }

    /// Rewrite the realm URL of a challenge. Returns the header unchanged when
    /// there is no realm, the realm is not an absolute URL, or the strategy
    /// cannot encode its origin.
    pub async fn rewrite(&self, header: &str) -> String {
        let Some(captures) = REALM.captures(header) else {
            metrics::record_auth_rewrite("no_realm");
            return header.to_string();
        };
        let (Some(span), Some(realm)) = (captures.get(0), captures.get(1)) else {
            return header.to_string();
        };

        let Some((url, origin)) = Url::parse(realm.as_str())
            .ok()
            .and_then(|url| Origin::from_url(&url).map(|origin| (url, origin)))
        else {
            tracing::debug!(
                realm = %realm.as_str(),
                "Realm is not an absolute URL, leaving challenge as is"
            );
            metrics::record_auth_rewrite("not_url");
            return header.to_string();
        };

        if self.domain.is_proxied(&url) {
            metrics::record_auth_rewrite("already_proxied");
            return header.to_string();
        }

        let label = match self.strategy.encode(&origin).await {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!(
                    origin = %origin,
                    error = %e,
                    "Failed to encode realm origin, leaving challenge as is"
                );
                metrics::record_auth_rewrite("failed");
                return header.to_string();
            }
        };

        let proxied = self.domain.url_for(&label, &url);
        metrics::record_auth_rewrite("rewritten");
        format!(
            "{}realm=\"{}\"{}",
            &header[..span.start()],
            proxied,
            &header[span.end()..]
        )
    }
}
