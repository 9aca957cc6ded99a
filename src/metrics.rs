use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and describe our series.
    /// Later calls return the same handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| -> anyhow::Result<PrometheusHandle> {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!(
        "screener_requests_total",
        "Classification requests by flow (popup|page)."
    );
    describe_counter!(
        "screener_irrelevant_total",
        "Popup requests stopped by the relevance gate."
    );
    describe_counter!(
        "screener_classify_errors_total",
        "Classifier failures by kind."
    );
    describe_histogram!(
        "screener_classify_ms",
        "Classifier round-trip time in milliseconds."
    );
}
