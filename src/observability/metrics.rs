//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_redirect_hops_total` (counter): followed hops, by whether the
//!   target was rewritten to the proxy domain
//! - `proxy_auth_rewrites_total` (counter): WWW-Authenticate outcomes
//! - `proxy_label_mappings_created_total` (counter): new mapping store rows

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_redirect_hop(rewritten: bool) {
    counter!("proxy_redirect_hops_total", "rewritten" => rewritten.to_string()).increment(1);
}

pub fn record_auth_rewrite(outcome: &'static str) {
    counter!("proxy_auth_rewrites_total", "outcome" => outcome).increment(1);
}

pub fn record_mapping_created() {
    counter!("proxy_label_mappings_created_total").increment(1);
}
