use std::env;
use std::sync::OnceLock;

use metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

pub const METRICS_PORT_ENV: &str = "NM_METRICS_PORT";
pub const DEFAULT_METRICS_PORT: u16 = 9464;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn resolve_port(raw: Option<String>, default_port: u16) -> u16 {
    raw.and_then(|raw| raw.trim().parse::<u16>().ok())
        .filter(|port| *port > 0)
        .unwrap_or(default_port)
}

/// Starts the Prometheus exporter on `0.0.0.0:<port>` and registers the
/// matching counters. The port comes from `NM_METRICS_PORT` when set.
///
/// Safe to call more than once; later calls return the first handle.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    let port = resolve_port(env::var(METRICS_PORT_ENV).ok(), DEFAULT_METRICS_PORT);

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install_recorder()
    {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            describe_matching_metrics();
            info!(metrics_port = port, "started prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            PROMETHEUS_HANDLE.get()
        }
    }
}

fn describe_matching_metrics() {
    describe_counter!(
        "matching_requests_total",
        Unit::Count,
        "Completed matching requests by reported algorithm"
    );
    describe_counter!(
        "matching_fallback_total",
        Unit::Count,
        "Similarity requests answered by the rule-based fallback"
    );
    describe_counter!(
        "similarity_cache_hits_total",
        Unit::Count,
        "Similarity lookups served from the cache"
    );
    describe_counter!(
        "similarity_cache_misses_total",
        Unit::Count,
        "Similarity lookups that recomputed the pool"
    );
}
