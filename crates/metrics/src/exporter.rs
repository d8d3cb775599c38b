//! Two-registry Prometheus exporter served over one HTTP listener.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::TrafficCollector;
use crate::error::MetricsError;
use crate::params::ExporterParams;
use crate::Result;

/// The meta registry (flow counter, database size gauge) and the
/// accounting registry, served on separate paths of one endpoint.
pub struct FlowExporter {
    meta_registry: Registry,
    flow_registry: Registry,
    /// Flows seen by the owning segment
    pub flow_count: IntCounter,
    /// Live records across the owning segment's databases
    pub db_size: IntGauge,
}

impl FlowExporter {
    /// Create the exporter with its meta metrics registered.
    pub fn new() -> Self {
        let flow_count = IntCounter::new("flows_total", "Number of flows processed")
            .expect("static descriptor is valid");
        let db_size = IntGauge::new(
            "toptalkers_db_size",
            "Number of keys in the current toptalkers databases",
        )
        .expect("static descriptor is valid");

        let meta_registry = Registry::new();
        meta_registry
            .register(Box::new(flow_count.clone()))
            .expect("fresh registry accepts meta metrics");
        meta_registry
            .register(Box::new(db_size.clone()))
            .expect("fresh registry accepts meta metrics");

        Self {
            meta_registry,
            flow_registry: Registry::new(),
            flow_count,
            db_size,
        }
    }

    /// Register the scrape-time collector with the accounting registry.
    pub fn register_collector(&self, collector: TrafficCollector) -> Result<()> {
        self.flow_registry.register(Box::new(collector))?;
        Ok(())
    }

    /// Bind `params.endpoint` and serve both registries until `token`
    /// is cancelled. Returns the server task.
    pub async fn serve(
        &self,
        params: &ExporterParams,
        token: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let endpoint = normalize_endpoint(&params.endpoint);
        let metrics_path = normalize_path(&params.metrics_path);
        let flowdata_path = normalize_path(&params.flowdata_path);
        let listener =
            tokio::net::TcpListener::bind(&endpoint)
                .await
                .map_err(|source| MetricsError::Bind {
                    endpoint: endpoint.clone(),
                    source,
                })?;

        let index = format!(
            "<html><head><title>Flow Exporter</title></head><body>\
             <h1>Flow Exporter</h1>\
             <p><a href=\"{metrics_path}\">Metrics</a></p>\
             <p><a href=\"{flowdata_path}\">Flow Data</a></p>\
             </body></html>"
        );

        let app = Router::new()
            .route(
                &metrics_path,
                get(render_registry).with_state(self.meta_registry.clone()),
            )
            .route(
                &flowdata_path,
                get(render_registry).with_state(self.flow_registry.clone()),
            )
            .route("/", get(move || async move { axum::response::Html(index) }));

        tracing::info!(
            endpoint = %endpoint,
            metrics = %metrics_path,
            flowdata = %flowdata_path,
            "metrics endpoints enabled"
        );

        Ok(tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                tracing::error!(%error, "metrics server failed");
            }
        }))
    }
}

impl Default for FlowExporter {
    fn default() -> Self {
        Self::new()
    }
}

async fn render_registry(State(registry): State<Registry>) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::warn!(%error, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Accept Go-style `:8080` endpoints next to full socket addresses.
fn normalize_endpoint(endpoint: &str) -> String {
    if let Some(port) = endpoint.strip_prefix(':') {
        return format!("0.0.0.0:{port}");
    }
    endpoint.to_string()
}

/// Accept paths with or without the leading slash.
fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
