//! # Prometheus Metrics
//!
//! Operational metrics for the gateway, served at `GET /metrics` in the
//! Prometheus text exposition format.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so they do not
//! collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Registry that owns all metrics below.
    registry: Registry,
    /// Accounts created through the gateway.
    pub accounts_created_total: IntCounter,
    /// Transaction flows started (issue + accept).
    pub flows_started_total: IntCounter,
    /// Flows that reached COMMITTED.
    pub flows_committed_total: IntCounter,
    /// Flows that ended ABORTED.
    pub flows_aborted_total: IntCounter,
    /// Queries served.
    pub queries_total: IntCounter,
    /// End-to-end flow latency in seconds.
    pub flow_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("pact".into()), None)
            .expect("failed to create prometheus registry");

        let accounts_created_total = IntCounter::new(
            "accounts_created_total",
            "Accounts created through the gateway",
        )
        .expect("metric creation");
        registry
            .register(Box::new(accounts_created_total.clone()))
            .expect("metric registration");

        let flows_started_total = IntCounter::new(
            "flows_started_total",
            "Transaction flows started (issue and accept)",
        )
        .expect("metric creation");
        registry
            .register(Box::new(flows_started_total.clone()))
            .expect("metric registration");

        let flows_committed_total =
            IntCounter::new("flows_committed_total", "Flows that reached COMMITTED")
                .expect("metric creation");
        registry
            .register(Box::new(flows_committed_total.clone()))
            .expect("metric registration");

        let flows_aborted_total =
            IntCounter::new("flows_aborted_total", "Flows that ended ABORTED")
                .expect("metric creation");
        registry
            .register(Box::new(flows_aborted_total.clone()))
            .expect("metric registration");

        let queries_total =
            IntCounter::new("queries_total", "Query projections served").expect("metric creation");
        registry
            .register(Box::new(queries_total.clone()))
            .expect("metric registration");

        let flow_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "flow_latency_seconds",
                "End-to-end transaction flow latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(flow_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            accounts_created_total,
            flows_started_total,
            flows_committed_total,
            flows_aborted_total,
            queries_total,
            flow_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics`.
pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<crate::api::AppState>,
) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_encode() {
        let metrics = NodeMetrics::new();
        metrics.flows_started_total.inc();
        metrics.flows_committed_total.inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("pact_flows_started_total"));
        assert!(text.contains("pact_flows_committed_total"));
    }
}
