//! Classification client: one POST to the model server, JSON parse, unit
//! normalization. Everything leaving this module is in percent (0..=100).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ClassifierConfig, ClassifierMode};
use crate::relevance::anon_hash;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Label + confidence + per-class probabilities, all in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub prediction: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Lowercased class label -> percent. May be empty when the server sent none.
    #[serde(default)]
    pub probabilities: BTreeMap<String, f64>,
}

impl ClassificationResult {
    pub fn probability(&self, label: &str) -> Option<f64> {
        self.probabilities.get(&label.to_lowercase()).copied()
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("client build failed: {0}")]
    Build(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClassifyError {
    /// Short tag for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::Build(_) => "build",
            ClassifyError::Timeout(_) => "timeout",
            ClassifyError::Network(_) => "network",
            ClassifyError::Status { .. } => "status",
            ClassifyError::Decode(_) => "decode",
        }
    }
}

/// Trait object used by the relay, the flows and tests.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// One attempt, no retries.
    async fn try_classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;

    /// Boundary form: failures are logged and counted, the caller sees `None`.
    async fn classify(&self, text: &str) -> Option<ClassificationResult> {
        let started = Instant::now();
        let out = self.try_classify(text).await;
        histogram!("screener_classify_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        match out {
            Ok(r) => Some(r),
            Err(e) => {
                counter!("screener_classify_errors_total", "kind" => e.kind()).increment(1);
                warn!(
                    provider = self.name(),
                    id = %anon_hash(text),
                    error = %e,
                    "classification failed"
                );
                None
            }
        }
    }
}

pub type DynClassifier = Arc<dyn Classifier>;

/// Factory: `mode = "mock"` (or CLASSIFIER_TEST_MODE=mock, folded into the config)
/// gives a deterministic mock, otherwise the HTTP client.
pub fn build_classifier(cfg: &ClassifierConfig) -> Result<DynClassifier, ClassifyError> {
    match cfg.mode {
        ClassifierMode::Mock => Ok(Arc::new(MockClassifier::default())),
        ClassifierMode::Http => Ok(Arc::new(HttpClassifier::from_config(cfg)?)),
    }
}

// ------------------------------------------------------------
// Wire format
// ------------------------------------------------------------

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default, alias = "predicted_label")]
    prediction: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    probabilities: Option<BTreeMap<String, f64>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl PredictResponse {
    /// Percent convention: probabilities summing to <= 1 are fractions and get
    /// scaled. Confidence follows the probabilities' unit when there are any,
    /// otherwise a confidence <= 1 is taken as a fraction.
    ///
    /// A body with neither label nor probabilities still parses, with an empty
    /// label; the renderer turns it into the missing-data view.
    fn into_result(self) -> ClassificationResult {
        let raw = self.probabilities.unwrap_or_default();
        let sum: f64 = raw.values().sum();
        let scale = if raw.is_empty() {
            None
        } else if sum <= 1.0 + 1e-6 {
            Some(100.0)
        } else {
            Some(1.0)
        };
        let probabilities: BTreeMap<String, f64> = raw
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v * scale.unwrap_or(1.0)))
            .collect();

        let prediction = match self.prediction.filter(|p| !p.trim().is_empty()) {
            Some(p) => p,
            None => probabilities
                .iter()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| k.clone())
                .unwrap_or_default(),
        };

        let confidence = match (self.confidence, scale) {
            (Some(c), Some(s)) => Some(c * s),
            (Some(c), None) if c <= 1.0 => Some(c * 100.0),
            (Some(c), None) => Some(c),
            (None, _) => probabilities.get(&prediction.to_lowercase()).copied(),
        };

        ClassificationResult {
            prediction,
            confidence,
            probabilities,
        }
    }
}

/// Parse a 2xx body from the model server.
pub fn parse_response(body: &[u8]) -> Result<ClassificationResult, ClassifyError> {
    let raw: PredictResponse =
        serde_json::from_slice(body).map_err(|e| ClassifyError::Decode(e.to_string()))?;
    Ok(raw.into_result())
}

// ------------------------------------------------------------
// HTTP client
// ------------------------------------------------------------

pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ClassifyError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClassifyError::Build(format!("invalid endpoint {endpoint:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("claim-screener/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Build(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self, ClassifyError> {
        Self::new(&cfg.endpoint, cfg.timeout(), cfg.connect_timeout())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout(self.timeout)
        } else {
            ClassifyError::Network(e.to_string())
        }
    }

    /// GET on the server root. Only used for a startup log line.
    pub async fn probe(&self) -> Result<String, ClassifyError> {
        let mut root = self.endpoint.clone();
        root.set_path("/");
        root.set_query(None);
        let resp = self
            .http
            .get(root)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;
        if !status.is_success() {
            return Err(ClassifyError::Status {
                status,
                message: snippet(&body),
            });
        }
        Ok(snippet(&body))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn try_classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&PredictRequest { text })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| snippet(&String::from_utf8_lossy(&body)));
            return Err(ClassifyError::Status { status, message });
        }

        let result = parse_response(&body)?;
        info!(
            id = %anon_hash(text),
            prediction = %result.prediction,
            confidence = ?result.confidence,
            "classified"
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn snippet(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() > 200 {
        s.chars().take(200).collect::<String>() + "..."
    } else {
        s.to_string()
    }
}

// ------------------------------------------------------------
// Mock
// ------------------------------------------------------------

/// Returns a fixed result; used for local runs without a model server.
#[derive(Clone)]
pub struct MockClassifier {
    pub fixed: ClassificationResult,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self {
            fixed: ClassificationResult {
                prediction: "real".to_string(),
                confidence: Some(87.0),
                probabilities: BTreeMap::from([
                    ("false".to_string(), 13.0),
                    ("real".to_string(), 87.0),
                ]),
            },
        }
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn try_classify(&self, _text: &str) -> Result<ClassificationResult, ClassifyError> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
