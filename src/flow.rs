// src/flow.rs
//! The two user-triggered chains:
//! - popup: validate -> score -> gate -> classify -> render
//! - page:  extract -> relay -> render
//!
//! The renderer lock is only taken for synchronous render calls, never across
//! an await.

use std::sync::{Mutex, MutexGuard};

use metrics::counter;
use serde::Serialize;
use tracing::info;

use crate::classify::{ClassificationResult, Classifier};
use crate::extract::extract_text;
use crate::relay::Relay;
use crate::relevance::{anon_hash, Relevance, RelevanceScorer};
use crate::render::{Renderer, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Blank input, nothing processed.
    EmptyInput,
    /// Below the relevance threshold; no network call was made.
    Irrelevant,
    /// Label and chart rendered.
    Classified,
    /// Server answered but without usable probabilities.
    Incomplete,
    /// Transport/server failure.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Relevance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub view: View,
}

pub(crate) fn lock(renderer: &Mutex<Renderer>) -> MutexGuard<'_, Renderer> {
    renderer.lock().unwrap_or_else(|e| e.into_inner())
}

/// Popup flow. The classifier is only called for relevant, non-blank text.
pub async fn classify_input(
    text: &str,
    scorer: &RelevanceScorer,
    classifier: &dyn Classifier,
    renderer: &Mutex<Renderer>,
    topic: &str,
) -> FlowReport {
    counter!("screener_requests_total", "flow" => "popup").increment(1);

    if text.trim().is_empty() {
        let mut r = lock(renderer);
        r.render_empty_input();
        return FlowReport {
            outcome: Outcome::EmptyInput,
            relevance: None,
            result: None,
            summary: None,
            view: r.view(),
        };
    }

    let relevance = scorer.evaluate(text);
    info!(
        id = %anon_hash(text),
        score = relevance.score,
        threshold = relevance.threshold,
        "relevance"
    );

    if !relevance.relevant {
        counter!("screener_irrelevant_total").increment(1);
        let mut r = lock(renderer);
        r.render_irrelevant(topic);
        return FlowReport {
            outcome: Outcome::Irrelevant,
            relevance: Some(relevance),
            result: None,
            summary: None,
            view: r.view(),
        };
    }

    let result = classifier.classify(text).await;
    let (outcome, view) = render_classification(renderer, result.as_ref());
    FlowReport {
        outcome,
        relevance: Some(relevance),
        result,
        summary: None,
        view,
    }
}

/// Page flow. No relevance gate here; the page goes straight to the relay.
pub async fn classify_page(html: &str, relay: &Relay, renderer: &Mutex<Renderer>) -> FlowReport {
    counter!("screener_requests_total", "flow" => "page").increment(1);

    let text = extract_text(html);
    if text.trim().is_empty() {
        let mut r = lock(renderer);
        r.render_no_page_text();
        return FlowReport {
            outcome: Outcome::EmptyInput,
            relevance: None,
            result: None,
            summary: None,
            view: r.view(),
        };
    }

    info!(id = %anon_hash(&text), chars = text.chars().count(), "page text extracted");
    let result = relay.classify_text(text).await;
    let summary = match &result {
        Some(r) if !r.prediction.is_empty() => {
            format!("Text classification result: {}", r.prediction)
        }
        _ => "Text classification result: unavailable".to_string(),
    };
    let (outcome, view) = render_classification(renderer, result.as_ref());
    FlowReport {
        outcome,
        relevance: None,
        result,
        summary: Some(summary),
        view,
    }
}

fn render_classification(
    renderer: &Mutex<Renderer>,
    result: Option<&ClassificationResult>,
) -> (Outcome, View) {
    let mut r = lock(renderer);
    let outcome = match result {
        Some(res) if r.render_result(res) => Outcome::Classified,
        Some(_) => Outcome::Incomplete,
        None => {
            r.render_unavailable();
            Outcome::Unavailable
        }
    };
    (outcome, r.view())
}
