use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::warn;

use crate::classify::{build_classifier, DynClassifier};
use crate::config::ScreenerConfig;
use crate::extract::fetch_page;
use crate::flow::{self, FlowReport};
use crate::metrics::Metrics;
use crate::relay::Relay;
use crate::relevance::{Relevance, RelevanceScorer};
use crate::render::{Renderer, View};

#[derive(Clone)]
pub struct AppState {
    scorer: Arc<RelevanceScorer>,
    classifier: DynClassifier,
    relay: Relay,
    renderer: Arc<Mutex<Renderer>>,
    http: reqwest::Client,
    topic: Arc<str>,
}

impl AppState {
    /// Spawns the relay's background context, so this needs a Tokio runtime.
    pub fn new(
        scorer: RelevanceScorer,
        classifier: DynClassifier,
        topic: &str,
        relay_timeout: Duration,
    ) -> Self {
        let (relay, _background) = Relay::spawn(classifier.clone());
        Self {
            scorer: Arc::new(scorer),
            classifier,
            relay: relay.with_reply_timeout(relay_timeout),
            renderer: Arc::new(Mutex::new(Renderer::new())),
            http: reqwest::Client::new(),
            topic: Arc::from(topic),
        }
    }

    pub fn from_config(cfg: &ScreenerConfig) -> anyhow::Result<Self> {
        let scorer = cfg.relevance.build_scorer()?;
        let classifier = build_classifier(&cfg.classifier)?;
        Ok(Self::new(
            scorer,
            classifier,
            cfg.relevance.topic(),
            cfg.classifier.relay_timeout(),
        ))
    }

    pub fn renderer(&self) -> Arc<Mutex<Renderer>> {
        self.renderer.clone()
    }
}

/// API routes only (what the tests drive).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/classify", post(classify))
        .route("/api/page", post(classify_page))
        .route("/api/relevance", post(relevance))
        .route("/api/view", get(view))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Full app: API + optional `/metrics` + the popup UI as fallback.
pub fn app(state: AppState, ui_dir: &Path, metrics: Option<&Metrics>) -> Router {
    let mut app = router(state);
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    app.fallback_service(ServeDir::new(ui_dir))
}

#[derive(Deserialize)]
struct TextReq {
    text: String,
}

#[derive(Deserialize)]
struct PageReq {
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Serialize)]
struct ErrorResp {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResp>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorResp { error: msg.into() }))
}

async fn classify(State(state): State<AppState>, Json(body): Json<TextReq>) -> Json<FlowReport> {
    let report = flow::classify_input(
        &body.text,
        &state.scorer,
        state.classifier.as_ref(),
        &state.renderer,
        &state.topic,
    )
    .await;
    Json(report)
}

async fn classify_page(
    State(state): State<AppState>,
    Json(body): Json<PageReq>,
) -> Result<Json<FlowReport>, ApiError> {
    let html = match (body.html, body.url) {
        (Some(html), _) => html,
        (None, Some(url)) => fetch_page(&state.http, &url).await.map_err(|e| {
            warn!(error = %e, "page fetch failed");
            api_error(StatusCode::BAD_GATEWAY, format!("{e:#}"))
        })?,
        (None, None) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "either `html` or `url` is required",
            ))
        }
    };
    let report = flow::classify_page(&html, &state.relay, &state.renderer).await;
    Ok(Json(report))
}

async fn relevance(State(state): State<AppState>, Json(body): Json<TextReq>) -> Json<Relevance> {
    Json(state.scorer.evaluate(&body.text))
}

async fn view(State(state): State<AppState>) -> Json<View> {
    Json(flow::lock(&state.renderer).view())
}
