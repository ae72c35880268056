//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the subdomain proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Public domain every origin is mapped under.
    pub domain: DomainConfig,

    /// Origin/label translation strategy.
    pub addressing: AddressingConfig,

    /// Outbound timeouts.
    pub timeouts: TimeoutConfig,

    /// Redirect handling for outbound requests.
    pub redirects: RedirectConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The proxy's own public domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Domain name labels are prefixed to (e.g., "proxy.example.com").
    pub name: String,

    /// Scheme of proxied public URLs.
    pub scheme: String,

    /// Port appended to proxied public hosts, if not the scheme default.
    pub port: Option<u16>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            scheme: "https".to_string(),
            port: None,
        }
    }
}

/// Which addressing strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Stateless base32 codec.
    #[default]
    Codec,
    /// Short labels persisted in SQLite.
    Store,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AddressingConfig {
    pub strategy: Strategy,

    /// SQLite URL for the mapping store (store strategy only).
    pub database_url: String,

    /// Pool size for the mapping store.
    pub max_connections: u32,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Codec,
            database_url: "sqlite://subproxy.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Timeout configuration for outbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response, all hops) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Redirect configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Follow redirects on the client's behalf. When false the redirect is
    /// returned with its Location rewritten to the proxy domain.
    pub follow: bool,

    /// Maximum number of hops followed per request.
    pub max_hops: u32,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            follow: true,
            max_hops: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
