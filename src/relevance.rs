// src/relevance.rs
//! Relevance gate: text normalization, tokenizer, word-frequency table, keyword
//! set and the threshold decision that guards the classifier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

// --- defaults & env names ---
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.1;
pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";

const BUILTIN_KEYWORDS: &str = include_str!("../config/keywords.toml");

// ASCII word characters only: accented letters split a word in two.
static RE_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9A-Za-z_\s]").expect("non-word regex"));

static BUILTIN: Lazy<KeywordFile> = Lazy::new(|| {
    toml::from_str(BUILTIN_KEYWORDS).expect("embedded keywords.toml is valid")
});

/// Short, stable id for a piece of text. Logs carry this instead of the text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// parse optional float env and clamp to <0.0..=1.0>
pub(crate) fn parse_threshold(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/* ----------------------------
Keyword set
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct KeywordFile {
    #[serde(default)]
    topic: Option<String>,
    terms: Vec<String>,
}

/// Ordered, lowercase domain terms. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl KeywordSet {
    /// Lowercases and trims every term; blanks are dropped, order and duplicates kept.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// The diabetes list shipped in `config/keywords.toml`.
    pub fn builtin() -> Self {
        Self::new(&BUILTIN.terms)
    }

    /// Topic name of the built-in list ("diabetes").
    pub fn builtin_topic() -> &'static str {
        BUILTIN.topic.as_deref().unwrap_or("diabetes")
    }

    /// Load a list from a TOML file of the form `terms = ["..."]`.
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read keywords at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let file: KeywordFile = toml::from_str(s)?;
        let set = Self::new(&file.terms);
        if set.is_empty() {
            anyhow::bail!("keyword list is empty");
        }
        Ok(set)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/* ----------------------------
Tokenizer + frequency table
---------------------------- */

/// Lowercase and replace every non-word, non-space char with a space.
pub fn normalize(text: &str) -> String {
    RE_NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .into_owned()
}

/// Whitespace tokenizer over normalized text. Empty tokens never appear.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Token -> count. Built per call, dropped afterwards.
#[derive(Debug, Default, Clone)]
pub struct WordFrequencyTable {
    counts: HashMap<String, usize>,
    total: usize,
}

impl WordFrequencyTable {
    pub fn from_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        let mut table = Self::default();
        for t in tokens {
            *table.counts.entry(t).or_insert(0) += 1;
            table.total += 1;
        }
        table
    }

    pub fn count(&self, token: &str) -> usize {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Number of tokens seen (not distinct tokens).
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Sum of keyword counts over the token count; 0.0 when there are no tokens.
///
/// A keyword containing a space can only match a token equal to the whole
/// phrase, which the tokenizer never produces.
pub fn score(text: &str, keywords: &KeywordSet) -> f64 {
    let table = WordFrequencyTable::from_tokens(tokenize(text));
    keyword_hits(&table, keywords).0 as f64 / table.total().max(1) as f64
}

fn keyword_hits(table: &WordFrequencyTable, keywords: &KeywordSet) -> (usize, Vec<String>) {
    let mut sum = 0usize;
    let mut matched = Vec::new();
    for kw in keywords.terms() {
        let n = table.count(kw);
        if n > 0 {
            sum += n;
            matched.push(kw.clone());
        }
    }
    (sum, matched)
}

/* ----------------------------
Scorer (keywords + threshold)
---------------------------- */

/// Result of relevance evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relevance {
    pub score: f64,
    pub tokens: usize,
    pub hits: usize,
    pub matched: Vec<String>,
    pub threshold: f64,
    pub relevant: bool,
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    keywords: KeywordSet,
    threshold: f64,
}

impl RelevanceScorer {
    pub fn new(keywords: KeywordSet, threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_RELEVANCE_THRESHOLD
        };
        Self {
            keywords,
            threshold,
        }
    }

    /// Built-in diabetes keywords with the default 0.1 threshold.
    pub fn builtin() -> Self {
        Self::new(KeywordSet::builtin(), DEFAULT_RELEVANCE_THRESHOLD)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn evaluate(&self, text: &str) -> Relevance {
        let table = WordFrequencyTable::from_tokens(tokenize(text));
        let (hits, matched) = keyword_hits(&table, &self.keywords);
        let tokens = table.total();
        let score = if tokens == 0 {
            0.0
        } else {
            hits as f64 / tokens as f64
        };
        let relevant = tokens > 0 && score >= self.threshold;

        // Never log raw text. Only hashed id + numbers.
        debug!(
            target: "relevance",
            id = %anon_hash(text),
            score,
            tokens,
            hits,
            threshold = self.threshold,
            relevant,
            "relevance scored"
        );

        Relevance {
            score,
            tokens,
            hits,
            matched,
            threshold: self.threshold,
            relevant,
        }
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.evaluate(text).relevant
    }
}

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn kws() -> KeywordSet {
        KeywordSet::new(["diabetes", "insulin", "blood sugar", "HbA1c"])
    }

    #[test]
    fn normalize_replaces_punctuation_with_spaces() {
        assert_eq!(normalize("Type-2 Diabetes!"), "type 2 diabetes ");
        assert_eq!(normalize("snake_case stays"), "snake_case stays");
    }

    #[test]
    fn non_ascii_letters_split_words() {
        assert_eq!(normalize("Insulinémie"), "insulin mie");
        assert_eq!(tokenize("insulinémie"), vec!["insulin", "mie"]);
        assert!((score("insulinémie", &KeywordSet::builtin()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn accented_filler_dilutes_the_score_below_threshold() {
        let text = "insulin naïve naïve naïve naïve naïve";
        assert_eq!(tokenize(text).len(), 11);
        let s = RelevanceScorer::builtin();
        let r = s.evaluate(text);
        assert!((r.score - 1.0 / 11.0).abs() < 1e-9);
        assert!(!r.relevant);
    }

    #[test]
    fn tokenizer_drops_empty_tokens() {
        assert_eq!(tokenize("  Insulin,, glucose\n\tpump "), vec!["insulin", "glucose", "pump"]);
        assert!(tokenize("   ...  ").is_empty());
    }

    #[test]
    fn keyword_set_lowercases_and_keeps_order() {
        let k = KeywordSet::new([" HbA1c ", "", "Insulin", "insulin"]);
        assert_eq!(k.terms(), &["hba1c", "insulin", "insulin"]);
    }

    #[test]
    fn frequency_table_counts_tokens() {
        let t = WordFrequencyTable::from_tokens(tokenize("insulin insulin glucose"));
        assert_eq!(t.count("insulin"), 2);
        assert_eq!(t.count("glucose"), 1);
        assert_eq!(t.count("sugar"), 0);
        assert_eq!(t.total(), 3);
    }

    #[test]
    fn score_is_hits_over_tokens() {
        // 2 hits out of 4 tokens
        let s = score("Diabetes needs insulin daily", &kws());
        assert!((s - 0.5).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn mixed_case_keyword_matches_after_lowercasing() {
        let s = score("hba1c", &kws());
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(score("", &kws()), 0.0);
        assert_eq!(score(" !? ", &kws()), 0.0);
    }

    #[test]
    fn builtin_list_loads() {
        let k = KeywordSet::builtin();
        assert!(k.len() > 50);
        assert_eq!(k.terms()[0], "diabetes");
        assert_eq!(KeywordSet::builtin_topic(), "diabetes");
    }

    #[test]
    fn scorer_threshold_boundary_is_inclusive() {
        // 1 hit in 10 tokens = 0.1 exactly
        let sc = RelevanceScorer::new(kws(), 0.1);
        let r = sc.evaluate("insulin a b c d e f g h i");
        assert_eq!(r.tokens, 10);
        assert!(r.relevant, "score == threshold passes: {r:?}");

        let r = sc.evaluate("insulin a b c d e f g h i j");
        assert!(!r.relevant, "score below threshold fails: {r:?}");
    }

    #[test]
    fn scorer_sanitizes_threshold() {
        assert_eq!(RelevanceScorer::new(kws(), f64::NAN).threshold(), 0.1);
        assert_eq!(RelevanceScorer::new(kws(), 4.0).threshold(), 1.0);
    }

    #[test]
    fn threshold_parsing_clamps() {
        assert_eq!(parse_threshold(Some(" 0.25 ")), Some(0.25));
        assert_eq!(parse_threshold(Some("7")), Some(1.0));
        assert_eq!(parse_threshold(Some("nope")), None);
        assert_eq!(parse_threshold(None), None);
    }

    #[test]
    fn keyword_toml_rejects_empty_list() {
        assert!(KeywordSet::from_toml_str("terms = []").is_err());
        let k = KeywordSet::from_toml_str(r#"terms = ["Asthma", "inhaler"]"#).unwrap();
        assert_eq!(k.terms(), &["asthma", "inhaler"]);
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("some text");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("some text"));
        assert_ne!(a, anon_hash("other text"));
    }
}
