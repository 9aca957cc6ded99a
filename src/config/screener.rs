// src/config/screener.rs
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::relevance::{
    parse_threshold, KeywordSet, RelevanceScorer, DEFAULT_RELEVANCE_THRESHOLD,
    ENV_RELEVANCE_THRESHOLD,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/screener.toml";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5001/predict";

pub const ENV_CONFIG_PATH: &str = "SCREENER_CONFIG_PATH";
pub const ENV_BIND: &str = "SCREENER_BIND";
pub const ENV_ENDPOINT: &str = "CLASSIFIER_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "CLASSIFIER_TIMEOUT_SECS";
pub const ENV_TEST_MODE: &str = "CLASSIFIER_TEST_MODE";

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_ui_dir() -> PathBuf {
    PathBuf::from("ui")
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_relay_timeout_secs() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}

/// Which classifier implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    #[default]
    Http,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Directory with the popup UI (index.html, popup.js).
    #[serde(default = "default_ui_dir")]
    pub ui_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ui_dir: default_ui_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on waiting for the background context's reply.
    #[serde(default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,
    #[serde(default)]
    pub mode: ClassifierMode,
    #[serde(default = "default_true")]
    pub probe_on_start: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            relay_timeout_secs: default_relay_timeout_secs(),
            mode: ClassifierMode::default(),
            probe_on_start: true,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Shown in the "irrelevant" message; defaults to the built-in list's topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Optional replacement for the built-in keyword list.
    #[serde(default)]
    pub keywords_path: Option<PathBuf>,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            topic: None,
            keywords_path: None,
        }
    }
}

impl RelevanceConfig {
    pub fn topic(&self) -> &str {
        match self.topic.as_deref() {
            Some(topic) => topic,
            None => KeywordSet::builtin_topic(),
        }
    }

    /// Build the scorer: custom keyword file if configured, otherwise the built-in list.
    pub fn build_scorer(&self) -> anyhow::Result<RelevanceScorer> {
        let keywords = match &self.keywords_path {
            Some(p) => KeywordSet::from_toml_file(p)?,
            None => KeywordSet::builtin(),
        };
        Ok(RelevanceScorer::new(keywords, self.threshold))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub relevance: RelevanceConfig,
}

impl ScreenerConfig {
    /// Resolve the path ($SCREENER_CONFIG_PATH or config/screener.toml), load it,
    /// then apply env overrides. A missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: ScreenerConfig = toml::from_str(s)?;

        // harden: keep a sane threshold even if TOML is odd
        let t = cfg.relevance.threshold;
        cfg.relevance.threshold = if t.is_finite() {
            t.clamp(0.0, 1.0)
        } else {
            DEFAULT_RELEVANCE_THRESHOLD
        };

        if cfg.classifier.endpoint.trim().is_empty() {
            anyhow::bail!("classifier.endpoint must not be empty");
        }
        Ok(cfg)
    }

    /// Environment wins over the file.
    pub fn apply_env(&mut self) {
        if let Some(bind) = env::var(ENV_BIND).ok().and_then(|v| v.trim().parse().ok()) {
            self.server.bind = bind;
        }
        if let Ok(ep) = env::var(ENV_ENDPOINT) {
            let ep = ep.trim();
            if !ep.is_empty() {
                self.classifier.endpoint = ep.to_string();
            }
        }
        if let Some(secs) = env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.classifier.timeout_secs = secs;
        }
        if env::var(ENV_TEST_MODE).map(|v| v == "mock").unwrap_or(false) {
            self.classifier.mode = ClassifierMode::Mock;
        }
        if let Some(t) = parse_threshold(env::var(ENV_RELEVANCE_THRESHOLD).ok().as_deref()) {
            self.relevance.threshold = t;
        }
    }
}
