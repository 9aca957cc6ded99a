// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod extract;
pub mod flow;
pub mod metrics;
pub mod relay;
pub mod relevance;
pub mod render;

// ---- Re-exports for stable public API ----
pub use crate::api::{app, router, AppState};
pub use crate::classify::{ClassificationResult, Classifier, DynClassifier};
pub use crate::relevance::{score, KeywordSet, RelevanceScorer};

use tracing::{info, warn};

use crate::classify::HttpClassifier;
use crate::config::{ClassifierConfig, ClassifierMode};

/// One-off reachability check of the model server (GET on its root).
/// It won't fail the caller; it just logs the result.
pub async fn run_model_probe(cfg: &ClassifierConfig) {
    if cfg.mode == ClassifierMode::Mock {
        info!("model probe skipped: mock classifier");
        return;
    }
    let client = match HttpClassifier::from_config(cfg) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "model probe: client build failed");
            return;
        }
    };
    match client.probe().await {
        Ok(body) => info!(endpoint = %client.endpoint(), %body, "model server reachable"),
        Err(e) => warn!(
            endpoint = %client.endpoint(),
            error = %e,
            "model server not reachable; classifications will fail until it is up"
        ),
    }
}
