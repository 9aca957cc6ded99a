// src/render.rs
//! Result renderer: result text, alert line and a single-slot bar chart.

use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::ClassificationResult;

pub const CHART_LABELS: [&str; 2] = ["Real", "False"];
pub const CHART_DATASET_LABEL: &str = "Confidence Scores";
pub const CHART_COLORS: [&str; 2] = ["#4caf50", "#f44336"];
pub const CHART_Y_MAX: f64 = 100.0;

pub const MSG_EMPTY_INPUT: &str = "Please paste some text to classify!";
pub const MSG_NO_PAGE_TEXT: &str = "No text found on the page.";
pub const MSG_SERVER_ERROR: &str = "Server error. Please try again later.";
pub const MSG_UNCLASSIFIED: &str = "Error: Unable to classify text.";
pub const MSG_MISSING_DATA: &str = "Error: Unable to display chart due to missing data.";

/// What the chart shows. Serialized for the popup UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChartSpec {
    pub id: u64,
    pub labels: Vec<String>,
    pub dataset_label: String,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
    pub y_max: f64,
}

impl BarChartSpec {
    fn real_vs_false(id: u64, real: f64, fals: f64) -> Self {
        Self {
            id,
            labels: CHART_LABELS.iter().map(|s| s.to_string()).collect(),
            dataset_label: CHART_DATASET_LABEL.to_string(),
            values: vec![real, fals],
            colors: CHART_COLORS.iter().map(|s| s.to_string()).collect(),
            y_max: CHART_Y_MAX,
        }
    }
}

/// The canvas region. Hands out chart instances and tracks how many are alive.
#[derive(Debug, Default)]
pub struct Canvas {
    next_id: u64,
    live: usize,
    visible: bool,
}

impl Canvas {
    fn create(&mut self, real: f64, fals: f64) -> BarChart {
        self.next_id += 1;
        self.live += 1;
        BarChart {
            spec: BarChartSpec::real_vs_false(self.next_id, real, fals),
        }
    }

    fn destroy(&mut self, chart: BarChart) {
        self.live = self.live.saturating_sub(1);
        debug!(chart_id = chart.spec.id, "chart destroyed");
    }

    pub fn live_charts(&self) -> usize {
        self.live
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// A live chart instance. Only the canvas can create or destroy one.
#[derive(Debug)]
pub struct BarChart {
    spec: BarChartSpec,
}

impl BarChart {
    pub fn spec(&self) -> &BarChartSpec {
        &self.spec
    }
}

/// Holds at most one chart; the old one is destroyed before the new one lands.
#[derive(Debug, Default)]
pub struct ChartSlot {
    current: Option<BarChart>,
}

impl ChartSlot {
    fn replace(&mut self, canvas: &mut Canvas, real: f64, fals: f64) -> &BarChart {
        if let Some(old) = self.current.take() {
            canvas.destroy(old);
        }
        self.current.insert(canvas.create(real, fals))
    }

    pub fn current(&self) -> Option<&BarChart> {
        self.current.as_ref()
    }
}

/// Snapshot of everything on screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct View {
    pub result_text: String,
    pub alert: Option<String>,
    pub chart_visible: bool,
    /// Present only while the chart is shown.
    pub chart: Option<BarChartSpec>,
}

#[derive(Debug, Default)]
pub struct Renderer {
    result_text: String,
    alert: Option<String>,
    canvas: Canvas,
    slot: ChartSlot,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a classification. Returns false (and hides the chart) when
    /// `real`/`false` probabilities are missing.
    pub fn render_result(&mut self, result: &ClassificationResult) -> bool {
        self.alert = None;

        let (Some(real), Some(fals)) = (result.probability("real"), result.probability("false"))
        else {
            warn!(
                prediction = %result.prediction,
                keys = ?result.probabilities.keys().collect::<Vec<_>>(),
                "invalid probabilities"
            );
            self.result_text = MSG_UNCLASSIFIED.to_string();
            self.alert = Some(MSG_MISSING_DATA.to_string());
            self.canvas.visible = false;
            return false;
        };

        self.result_text = format!("Prediction: {}", result.prediction);
        self.slot.replace(&mut self.canvas, real, fals);
        self.canvas.visible = true;
        true
    }

    pub fn render_irrelevant(&mut self, topic: &str) {
        self.alert = None;
        self.result_text = format!("The text is irrelevant to {topic} topics.");
        self.canvas.visible = false;
    }

    pub fn render_unavailable(&mut self) {
        self.alert = None;
        self.result_text = MSG_SERVER_ERROR.to_string();
        self.canvas.visible = false;
    }

    /// Only raises the prompt; the rest of the screen stays as it was.
    pub fn render_empty_input(&mut self) {
        self.alert = Some(MSG_EMPTY_INPUT.to_string());
    }

    /// Page flow counterpart of `render_empty_input`.
    pub fn render_no_page_text(&mut self) {
        self.alert = Some(MSG_NO_PAGE_TEXT.to_string());
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn chart(&self) -> Option<&BarChart> {
        self.slot.current()
    }

    pub fn view(&self) -> View {
        let chart_visible = self.canvas.visible && self.slot.current().is_some();
        View {
            result_text: self.result_text.clone(),
            alert: self.alert.clone(),
            chart_visible,
            chart: if chart_visible {
                self.slot.current().map(|c| c.spec().clone())
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn result(label: &str, probs: &[(&str, f64)]) -> ClassificationResult {
        ClassificationResult {
            prediction: label.to_string(),
            confidence: None,
            probabilities: probs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn success_shows_label_and_bars() {
        let mut r = Renderer::new();
        assert!(r.render_result(&result("Real", &[("real", 87.0), ("false", 13.0)])));
        let v = r.view();
        assert!(v.result_text.contains("Real"));
        assert!(v.chart_visible);
        let chart = v.chart.expect("chart shown");
        assert_eq!(chart.values, vec![87.0, 13.0]);
        assert_eq!(chart.labels, vec!["Real", "False"]);
        assert_eq!(chart.y_max, 100.0);
    }

    #[test]
    fn missing_probability_hides_chart_and_alerts() {
        let mut r = Renderer::new();
        assert!(!r.render_result(&result("real", &[("real", 90.0)])));
        let v = r.view();
        assert!(!v.chart_visible);
        assert!(v.chart.is_none());
        assert_eq!(v.result_text, MSG_UNCLASSIFIED);
        assert_eq!(v.alert.as_deref(), Some(MSG_MISSING_DATA));
    }

    #[test]
    fn replacing_chart_keeps_one_live_instance() {
        let mut r = Renderer::new();
        r.render_result(&result("real", &[("real", 60.0), ("false", 40.0)]));
        let first = r.chart().unwrap().spec().id;
        r.render_result(&result("false", &[("real", 20.0), ("false", 80.0)]));
        assert_eq!(r.canvas().live_charts(), 1);
        let second = r.chart().unwrap().spec();
        assert_ne!(second.id, first);
        assert_eq!(second.values, vec![20.0, 80.0]);
    }

    #[test]
    fn later_render_clears_previous_alert() {
        let mut r = Renderer::new();
        r.render_result(&result("real", &[]));
        assert!(r.view().alert.is_some());
        r.render_unavailable();
        let v = r.view();
        assert!(v.alert.is_none());
        assert_eq!(v.result_text, MSG_SERVER_ERROR);
    }

    #[test]
    fn irrelevant_hides_existing_chart() {
        let mut r = Renderer::new();
        r.render_result(&result("real", &[("real", 60.0), ("false", 40.0)]));
        r.render_irrelevant("diabetes");
        let v = r.view();
        assert_eq!(v.result_text, "The text is irrelevant to diabetes topics.");
        assert!(!v.chart_visible);
        assert!(!r.canvas().is_visible());
        // hidden, not destroyed
        assert_eq!(r.canvas().live_charts(), 1);
    }

    #[test]
    fn empty_input_only_alerts() {
        let mut r = Renderer::new();
        r.render_irrelevant("diabetes");
        r.render_empty_input();
        let v = r.view();
        assert_eq!(v.alert.as_deref(), Some(MSG_EMPTY_INPUT));
        assert_eq!(v.result_text, "The text is irrelevant to diabetes topics.");
    }
}
