//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check the public domain can carry labels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, Strategy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("domain.name is required")]
    MissingDomain,
    #[error("domain.name {0:?} is not a valid host name")]
    InvalidDomain(String),
    #[error("domain.scheme must be http or https, got {0:?}")]
    InvalidScheme(String),
    #[error("{field} is not a socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("addressing.database_url is required for the store strategy")]
    MissingDatabaseUrl,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = config.domain.name.trim();
    if name.is_empty() {
        errors.push(ValidationError::MissingDomain);
    } else if !is_host_name(name) {
        errors.push(ValidationError::InvalidDomain(name.to_string()));
    }

    if !matches!(config.domain.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::InvalidScheme(config.domain.scheme.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.redirects.follow && config.redirects.max_hops == 0 {
        errors.push(ValidationError::Zero("redirects.max_hops"));
    }

    if config.addressing.strategy == Strategy::Store {
        if config.addressing.database_url.trim().is_empty() {
            errors.push(ValidationError::MissingDatabaseUrl);
        }
        if config.addressing.max_connections == 0 {
            errors.push(ValidationError::Zero("addressing.max_connections"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_name(name: &str) -> bool {
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
