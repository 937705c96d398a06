//! Process-wide Prometheus recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder if no recorder is installed yet.
///
/// Safe to call from every `Application::build`; only the first call
/// installs anything.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Prometheus recorder not installed: {}", e);
                // Keep a detached handle so /metrics still renders.
                PrometheusBuilder::new().build_recorder().handle()
            }
        }
    });
}

/// Current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}
