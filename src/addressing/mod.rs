//! Origin addressing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound Host header ("<label>.<proxy-domain>")
//!     → rewrite::PublicDomain::label_from_host (leading DNS label)
//!     → AddressingStrategy::decode (label → Origin)
//!
//! Redirect Location / WWW-Authenticate realm
//!     → Origin::from_url
//!     → AddressingStrategy::encode (Origin → label)
//!     → rewrite::PublicDomain::url_for (public proxied URL)
//! ```
//!
//! # Strategies
//! - `codec.rs`: stateless base32 transform, no I/O
//! - `store.rs`: short hash labels persisted in SQLite
//!
//! Both are selected once at startup and shared behind `Arc<dyn AddressingStrategy>`.

pub mod codec;
pub mod shorten;
pub mod store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::{AddressingConfig, Strategy};

pub use codec::HostCodec;
pub use store::{MappingStore, OriginMappingRecord};

/// Longest label DNS accepts between two dots.
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Scheme and authority of a target server. Never carries a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    scheme: String,
    host: String,
}

impl Origin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Extract the origin of an absolute URL. The host keeps an explicit,
    /// non-default port (`example.com:8443`).
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Some(Self::new(url.scheme(), host))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host including an explicit port, if any.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

impl FromStr for Origin {
    type Err = DecodeError;

    /// Parse the strict `scheme://host` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DecodeError::MalformedOrigin(s.to_string());

        let (scheme, host) = s.split_once("://").ok_or_else(malformed)?;

        let mut scheme_chars = scheme.chars();
        let scheme_ok = scheme_chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

        let host_ok = !host.is_empty()
            && !host
                .chars()
                .any(|c| {
                    c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '\\')
                });

        if !scheme_ok || !host_ok {
            return Err(malformed());
        }
        Ok(Self::new(scheme, host))
    }
}

/// DNS-safe subdomain label standing in for an origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether the label fits a single DNS label. Longer labels are still
    /// produced; they just cannot be resolved by real DNS.
    pub fn fits_dns(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= MAX_DNS_LABEL_LEN
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A label could not be turned back into an origin.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("label is not valid base32: {0}")]
    InvalidBase32(String),
    #[error("decoded label is not valid UTF-8")]
    NotUtf8,
    #[error("malformed origin {0:?}")]
    MalformedOrigin(String),
}

/// Failure of either addressing strategy.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no origin registered for label {0}")]
    NotFound(String),
    #[error("mapping store error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Translation between origins and labels.
///
/// Implementations must be safe for unbounded concurrent use; the forwarder
/// shares one instance across every in-flight request.
#[async_trait]
pub trait AddressingStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs and the CLI.
    fn name(&self) -> &'static str;

    /// Label for an origin, registering it first if the strategy keeps state.
    async fn encode(&self, origin: &Origin) -> Result<Label, AddressError>;

    /// Origin behind a label. Labels are matched case-insensitively.
    async fn decode(&self, label: &str) -> Result<Origin, AddressError>;
}

pub type SharedStrategy = Arc<dyn AddressingStrategy>;

/// Build the strategy selected in configuration.
pub async fn from_config(config: &AddressingConfig) -> Result<SharedStrategy, AddressError> {
    let strategy: SharedStrategy = match config.strategy {
        Strategy::Codec => Arc::new(HostCodec),
        Strategy::Store => {
            Arc::new(MappingStore::connect(&config.database_url, config.max_connections).await?)
        }
    };
    tracing::info!(strategy = strategy.name(), "Addressing strategy ready");
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_display_and_parse() {
        let origin: Origin = "https://registry-1.docker.io".parse().unwrap();
        assert_eq!(origin.scheme(), "https");
        assert_eq!(origin.host(), "registry-1.docker.io");
        assert_eq!(origin.to_string(), "https://registry-1.docker.io");
    }

    #[test]
    fn origin_parse_keeps_port() {
        let origin: Origin = "http://127.0.0.1:8080".parse().unwrap();
        assert_eq!(origin.host(), "127.0.0.1:8080");
    }

    #[test]
    fn origin_rejects_paths_and_missing_parts() {
        for bad in [
            "example.com",
            "https://",
            "://example.com",
            "https://example.com/path",
            "1http://x",
            "https://a b",
        ] {
            assert!(bad.parse::<Origin>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn origin_from_url() {
        let url = Url::parse("https://auth.example.com/token?scope=pull").unwrap();
        assert_eq!(Origin::from_url(&url).unwrap(), Origin::new("https", "auth.example.com"));

        let url = Url::parse("http://localhost:3000/").unwrap();
        assert_eq!(Origin::from_url(&url).unwrap().host(), "localhost:3000");

        // Default port is dropped by the URL parser.
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(Origin::from_url(&url).unwrap().host(), "example.com");

        let url = Url::parse("data:text/plain,hi").unwrap();
        assert!(Origin::from_url(&url).is_none());
    }

    #[test]
    fn label_dns_fit() {
        assert!(Label::new("abc").fits_dns());
        assert!(!Label::new("").fits_dns());
        assert!(!Label::new("a".repeat(64)).fits_dns());
    }
}
