// src/relay.rs
//! Message relay between the unprivileged flows and the privileged background
//! context that owns the classifier. Request/response with a single-shot reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::classify::{ClassificationResult, DynClassifier};
use crate::relevance::anon_hash;

const QUEUE_DEPTH: usize = 32;
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Action-tagged message, wire shape `{"action":"classifyText","text":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RelayMessage {
    #[serde(rename = "classifyText")]
    ClassifyText { text: String },
}

/// `{"result": ClassificationResult | null}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub result: Option<ClassificationResult>,
}

struct Envelope {
    message: RelayMessage,
    reply: oneshot::Sender<RelayResponse>,
}

/// Sending half, cheap to clone. Every `send` resolves, worst case with `result: None`.
#[derive(Clone)]
pub struct Relay {
    tx: mpsc::Sender<Envelope>,
    reply_timeout: Duration,
}

impl Relay {
    /// Start the background context. Each message is handled on its own task,
    /// so a slow classification does not hold up the next one.
    pub fn spawn(classifier: DynClassifier) -> (Relay, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(QUEUE_DEPTH);
        let handle = tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = rx.recv().await {
                let classifier = classifier.clone();
                tokio::spawn(async move {
                    let response = handle_message(classifier, message).await;
                    // caller may have timed out already
                    let _ = reply.send(response);
                });
            }
            debug!("relay background context stopped");
        });
        (
            Relay {
                tx,
                reply_timeout: DEFAULT_REPLY_TIMEOUT,
            },
            handle,
        )
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub async fn send(&self, message: RelayMessage) -> RelayResponse {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Envelope { message, reply }).await.is_err() {
            warn!("relay: background context unreachable");
            return RelayResponse::default();
        }
        match timeout(self.reply_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                warn!("relay: background context dropped the reply");
                RelayResponse::default()
            }
            Err(_) => {
                warn!(timeout = ?self.reply_timeout, "relay: no reply in time");
                RelayResponse::default()
            }
        }
    }

    pub async fn classify_text(&self, text: impl Into<String>) -> Option<ClassificationResult> {
        self.send(RelayMessage::ClassifyText { text: text.into() })
            .await
            .result
    }
}

async fn handle_message(classifier: DynClassifier, message: RelayMessage) -> RelayResponse {
    match message {
        RelayMessage::ClassifyText { text } => {
            debug!(id = %anon_hash(&text), "relay: classifyText");
            RelayResponse {
                result: classifier.classify(&text).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_wire_shape() {
        let m = RelayMessage::ClassifyText {
            text: "hello".into(),
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({"action": "classifyText", "text": "hello"})
        );
        let back: RelayMessage =
            serde_json::from_value(json!({"action": "classifyText", "text": "x"})).unwrap();
        assert_eq!(back, RelayMessage::ClassifyText { text: "x".into() });
    }

    #[test]
    fn unknown_action_is_rejected() {
        let r = serde_json::from_value::<RelayMessage>(json!({"action": "other", "text": "x"}));
        assert!(r.is_err());
    }

    #[test]
    fn empty_response_serializes_null_result() {
        assert_eq!(
            serde_json::to_value(RelayResponse::default()).unwrap(),
            json!({"result": null})
        );
    }
}
