// tests/config_env.rs
// These mutate process env, so they run serially.

use std::env;
use std::fs;

use claim_screener::config::{ClassifierMode, ScreenerConfig};
use claim_screener::AppState;

const KEYS: &[&str] = &[
    "SCREENER_CONFIG_PATH",
    "SCREENER_BIND",
    "CLASSIFIER_ENDPOINT",
    "CLASSIFIER_TIMEOUT_SECS",
    "CLASSIFIER_TEST_MODE",
    "RELEVANCE_THRESHOLD",
];

/// Small RAII helper to snapshot & restore env vars in each test.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}
impl EnvSnapshot {
    /// Clears every config key, then applies `pairs`.
    fn set(pairs: &[(&str, &str)]) -> Self {
        let saved = KEYS
            .iter()
            .map(|k| (k.to_string(), env::var(k).ok()))
            .collect();
        for k in KEYS {
            env::remove_var(k);
        }
        for (k, v) in pairs {
            env::set_var(k, v);
        }
        Self { saved }
    }
}
impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, maybe_v) in self.saved.drain(..) {
            match maybe_v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

#[serial_test::serial]
#[test]
fn missing_file_falls_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nope.toml");
    let _env = EnvSnapshot::set(&[("SCREENER_CONFIG_PATH", path.to_str().unwrap())]);

    let cfg = ScreenerConfig::load().expect("defaults");
    assert_eq!(cfg.classifier.endpoint, "http://127.0.0.1:5001/predict");
    assert_eq!(cfg.relevance.threshold, 0.1);
}

#[serial_test::serial]
#[test]
fn env_overrides_file_values() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("screener.toml");
    fs::write(
        &path,
        r#"
[classifier]
endpoint = "http://from-file:5001/predict"
timeout_secs = 30

[relevance]
threshold = 0.3
"#,
    )
    .unwrap();

    let _env = EnvSnapshot::set(&[
        ("SCREENER_CONFIG_PATH", path.to_str().unwrap()),
        ("CLASSIFIER_ENDPOINT", "http://from-env:5001/predict"),
        ("CLASSIFIER_TIMEOUT_SECS", "2"),
        ("CLASSIFIER_TEST_MODE", "mock"),
        ("RELEVANCE_THRESHOLD", "0.05"),
        ("SCREENER_BIND", "127.0.0.1:9911"),
    ]);

    let cfg = ScreenerConfig::load().expect("load");
    assert_eq!(cfg.classifier.endpoint, "http://from-env:5001/predict");
    assert_eq!(cfg.classifier.timeout_secs, 2);
    assert_eq!(cfg.classifier.mode, ClassifierMode::Mock);
    assert_eq!(cfg.relevance.threshold, 0.05);
    assert_eq!(cfg.server.bind.port(), 9911);
}

#[serial_test::serial]
#[test]
fn malformed_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("broken.toml");
    fs::write(&path, "[classifier\nendpoint = ").unwrap();
    let _env = EnvSnapshot::set(&[("SCREENER_CONFIG_PATH", path.to_str().unwrap())]);

    assert!(ScreenerConfig::load().is_err());
}

#[tokio::test]
#[serial_test::serial]
async fn custom_keyword_file_drives_the_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let kw = tmp.path().join("keywords.toml");
    fs::write(&kw, r#"terms = ["asthma", "inhaler"]"#).unwrap();
    let cfg_path = tmp.path().join("screener.toml");
    fs::write(
        &cfg_path,
        format!(
            "[classifier]\nmode = \"mock\"\n\n[relevance]\ntopic = \"asthma\"\nkeywords_path = {:?}\n",
            kw.to_str().unwrap()
        ),
    )
    .unwrap();
    let _env = EnvSnapshot::set(&[("SCREENER_CONFIG_PATH", cfg_path.to_str().unwrap())]);

    let cfg = ScreenerConfig::load().expect("load");
    let scorer = cfg.relevance.build_scorer().expect("scorer");
    assert!(scorer.is_relevant("My inhaler helps my asthma"));
    assert!(!scorer.is_relevant("Insulin and diabetes"));

    // full state builds from the same config
    let _state = AppState::from_config(&cfg).expect("state");
}
