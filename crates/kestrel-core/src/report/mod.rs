//! Per-metric series extraction across persisted snapshots, used by the
//! chart and report commands.

use crate::snapshot::PerformanceSnapshot;
use serde::{Deserialize, Serialize};

/// The scalar metrics charted across a results directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    AvgFps,
    MinFps,
    LoadEvent,
    DomContentLoaded,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::AvgFps,
        Metric::MinFps,
        Metric::LoadEvent,
        Metric::DomContentLoaded,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Metric::AvgFps => "Average FPS",
            Metric::MinFps => "Minimum FPS",
            Metric::LoadEvent => "Load Event (ms)",
            Metric::DomContentLoaded => "DOM Content Loaded (ms)",
        }
    }

    /// File name of the rendered chart image.
    pub fn file_name(&self) -> &'static str {
        match self {
            Metric::AvgFps => "avg-fps.png",
            Metric::MinFps => "min-fps.png",
            Metric::LoadEvent => "load-event.png",
            Metric::DomContentLoaded => "dom-content-loaded.png",
        }
    }

    /// Extract this metric's scalar from a snapshot. Absent FPS values
    /// chart as zero.
    pub fn value_of(&self, snapshot: &PerformanceSnapshot) -> f64 {
        match self {
            Metric::AvgFps => snapshot.avg_fps.unwrap_or(0) as f64,
            Metric::MinFps => snapshot.min_fps.unwrap_or(0) as f64,
            Metric::LoadEvent => snapshot.load_event,
            Metric::DomContentLoaded => snapshot.dom_content_loaded,
        }
    }
}

/// One bar-chart worth of data: a label and a value per snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSeries {
    pub metric: Metric,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Collect one metric across snapshots, labeled by target URL.
pub fn collect_series(snapshots: &[PerformanceSnapshot], metric: Metric) -> MetricSeries {
    let labels = snapshots.iter().map(|s| url_label(&s.url)).collect();
    let values = snapshots.iter().map(|s| metric.value_of(s)).collect();

    MetricSeries {
        metric,
        labels,
        values,
    }
}

/// Derive a chart label from a target URL: the last path segment, or the
/// host for a bare origin.
pub fn url_label(target: &str) -> String {
    if let Ok(parsed) = url::Url::parse(target) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).next_back() {
                return last.to_string();
            }
        }
        if let Some(host) = parsed.host_str() {
            return host.to_string();
        }
    }

    // Not an absolute URL; fall back to the last non-empty slash-separated
    // piece of the raw string.
    target
        .trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(target)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(url: &str, avg_fps: Option<u32>, load_event: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            url: url.to_string(),
            timestamp: "2026-08-07T12:00:00Z".to_string(),
            dom_content_loaded: load_event / 2.0,
            load_event,
            lcp: None,
            avg_fps,
            min_fps: avg_fps.map(|v| v.saturating_sub(10)),
            fps_sample_duration_ms: avg_fps.map(|_| 3000),
            api_calls: vec![],
            failed_requests: vec![],
        }
    }

    #[test]
    fn test_url_label_uses_last_path_segment() {
        assert_eq!(url_label("https://example.com/worlds/plaza"), "plaza");
        assert_eq!(url_label("https://example.com/worlds/plaza/"), "plaza");
        assert_eq!(url_label("http://example.com/lobby"), "lobby");
    }

    #[test]
    fn test_url_label_bare_origin_uses_host() {
        assert_eq!(url_label("https://example.com/"), "example.com");
        assert_eq!(url_label("https://example.com"), "example.com");
    }

    #[test]
    fn test_collect_series_pairs_labels_and_values() {
        let snapshots = vec![
            snapshot("https://example.com/worlds/plaza", Some(58), 1400.0),
            snapshot("https://example.com/worlds/arena", None, 900.0),
        ];

        let series = collect_series(&snapshots, Metric::AvgFps);
        assert_eq!(series.labels, vec!["plaza", "arena"]);
        assert_eq!(series.values, vec![58.0, 0.0]);

        let series = collect_series(&snapshots, Metric::LoadEvent);
        assert_eq!(series.values, vec![1400.0, 900.0]);
    }

    #[test]
    fn test_metric_file_names_are_distinct() {
        let mut names: Vec<_> = Metric::ALL.iter().map(|m| m.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Metric::ALL.len());
    }
}
