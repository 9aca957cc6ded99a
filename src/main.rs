//! claim-screener: binary entrypoint.
//! Boots the Axum HTTP server, wiring config, relay, routes and the popup UI.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claim_screener::config::ScreenerConfig;
use claim_screener::metrics::Metrics;
use claim_screener::{app, run_model_probe, AppState};

/// RUST_LOG drives the filter; LOG_FORMAT=json switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("claim_screener=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ScreenerConfig::load().context("loading screener config")?;
    info!(
        bind = %cfg.server.bind,
        endpoint = %cfg.classifier.endpoint,
        mode = ?cfg.classifier.mode,
        threshold = cfg.relevance.threshold,
        "config loaded"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    if cfg.classifier.probe_on_start {
        let probe_cfg = cfg.classifier.clone();
        tokio::spawn(async move { run_model_probe(&probe_cfg).await });
    }

    let state = AppState::from_config(&cfg)?;
    let router = app(state, &cfg.server.ui_dir, metrics.as_ref());

    let listener = tokio::net::TcpListener::bind(cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(addr = %cfg.server.bind, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
