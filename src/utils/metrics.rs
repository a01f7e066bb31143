//! Pipeline Metrics
//!
//! Counters, gauges, and latency histograms recorded by the capture, render,
//! and export paths and by the call controller. Names are `&'static str`
//! constants from [`metric_names`]; every component shares one
//! [`MetricsCollector`] through an `Arc`.
//!
//! Exports:
//! - [`MetricsCollector::export_json`] for the session summary
//! - [`MetricsCollector::export_prometheus`] as a text exposition with an
//!   `arcall_` prefix and histograms rendered as summaries

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write;
use std::time::{Duration, Instant, SystemTime};

/// Observations retained per histogram for percentile estimates
pub const HISTOGRAM_WINDOW: usize = 1024;

const PROMETHEUS_PREFIX: &str = "arcall_";

#[derive(Default)]
struct Series {
    counters: HashMap<&'static str, u64>,
    gauges: HashMap<&'static str, f64>,
    histograms: HashMap<&'static str, Window>,
}

/// Metrics collector shared by every pipeline component
pub struct MetricsCollector {
    series: RwLock<Series>,
    created: Instant,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            series: RwLock::new(Series::default()),
            created: Instant::now(),
        }
    }

    /// Add `value` to a counter
    pub fn increment_counter(&self, name: &'static str, value: u64) {
        *self.series.write().counters.entry(name).or_insert(0) += value;
    }

    /// Overwrite a gauge
    pub fn set_gauge(&self, name: &'static str, value: f64) {
        self.series.write().gauges.insert(name, value);
    }

    /// Add one observation to a histogram
    pub fn record_histogram(&self, name: &'static str, value: f64) {
        self.series
            .write()
            .histograms
            .entry(name)
            .or_default()
            .record(value);
    }

    /// Record the time elapsed since `started` in microseconds
    pub fn record_elapsed_us(&self, name: &'static str, started: Instant) {
        self.record_histogram(name, started.elapsed().as_secs_f64() * 1e6);
    }

    /// Current counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.series.read().counters.get(name).copied()
    }

    /// Current gauge value
    pub fn get_gauge(&self, name: &str) -> Option<f64> {
        self.series.read().gauges.get(name).copied()
    }

    /// Summary of a histogram
    pub fn get_histogram(&self, name: &str) -> Option<HistogramStats> {
        self.series.read().histograms.get(name).map(Window::stats)
    }

    /// Capture every series at once, sorted by name
    pub fn snapshot(&self) -> MetricsSnapshot {
        let series = self.series.read();
        MetricsSnapshot {
            taken_at: SystemTime::now(),
            uptime: self.created.elapsed(),
            counters: series
                .counters
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            gauges: series
                .gauges
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            histograms: series
                .histograms
                .iter()
                .map(|(name, window)| (name.to_string(), window.stats()))
                .collect(),
        }
    }

    /// Prometheus text exposition of the current snapshot
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        for (name, value) in &snapshot.counters {
            let _ = writeln!(out, "# TYPE {PROMETHEUS_PREFIX}{name} counter");
            let _ = writeln!(out, "{PROMETHEUS_PREFIX}{name} {value}");
        }
        for (name, value) in &snapshot.gauges {
            let _ = writeln!(out, "# TYPE {PROMETHEUS_PREFIX}{name} gauge");
            let _ = writeln!(out, "{PROMETHEUS_PREFIX}{name} {value}");
        }
        for (name, stats) in &snapshot.histograms {
            let _ = writeln!(out, "# TYPE {PROMETHEUS_PREFIX}{name} summary");
            for (quantile, value) in [("0.5", stats.p50), ("0.95", stats.p95), ("0.99", stats.p99)] {
                let _ = writeln!(
                    out,
                    "{PROMETHEUS_PREFIX}{name}{{quantile=\"{quantile}\"}} {value}"
                );
            }
            let _ = writeln!(out, "{PROMETHEUS_PREFIX}{name}_sum {}", stats.sum);
            let _ = writeln!(out, "{PROMETHEUS_PREFIX}{name}_count {}", stats.count);
        }

        out
    }

    /// Pretty JSON of the current snapshot
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding window of recent observations plus lifetime totals
#[derive(Default)]
struct Window {
    recent: VecDeque<f64>,
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Window {
    fn record(&mut self, value: f64) {
        if self.recent.len() == HISTOGRAM_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn stats(&self) -> HistogramStats {
        if self.count == 0 {
            return HistogramStats::default();
        }

        let mut sorted: Vec<f64> = self.recent.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        HistogramStats {
            count: self.count,
            sum: self.sum,
            min: self.min.unwrap_or_default(),
            max: self.max.unwrap_or_default(),
            mean: self.sum / self.count as f64,
            p50: nearest_rank(&sorted, 0.50),
            p95: nearest_rank(&sorted, 0.95),
            p99: nearest_rank(&sorted, 0.99),
        }
    }
}

/// Value at `q` of ascending `sorted`, rounding the rank down
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        len => sorted[(((len - 1) as f64 * q) as usize).min(len - 1)],
    }
}

/// Histogram summary
///
/// `count`, `sum`, `min`, `max`, and `mean` cover every observation; the
/// percentiles cover the last [`HISTOGRAM_WINDOW`] observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramStats {
    /// Observations recorded
    pub count: u64,
    /// Sum of observations
    pub sum: f64,
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
    /// Mean observation
    pub mean: f64,
    /// Median
    pub p50: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Point-in-time copy of every series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Wall-clock time of the snapshot
    pub taken_at: SystemTime,
    /// Time since the collector was created
    pub uptime: Duration,
    /// Counters by name
    pub counters: BTreeMap<String, u64>,
    /// Gauges by name
    pub gauges: BTreeMap<String, f64>,
    /// Histogram summaries by name
    pub histograms: BTreeMap<String, HistogramStats>,
}

pub mod metric_names {
    //! Metric names shared by the pipeline components.

    /// Raw frames handed to the effect engine
    pub const FRAMES_SUBMITTED: &str = "frames_submitted_total";
    /// Raw frames discarded before the effect engine processed them
    pub const FRAMES_DROPPED: &str = "frames_dropped_total";
    /// Render cycles completed
    pub const RENDER_CYCLES: &str = "render_cycles_total";
    /// Render cycle time histogram (microseconds)
    pub const RENDER_CYCLE_US: &str = "render_cycle_us";
    /// Composited frames offered to the export hand-off
    pub const EXPORTS_OFFERED: &str = "exports_offered_total";
    /// Composited frames replaced before the transport took them
    pub const EXPORTS_OVERWRITTEN: &str = "exports_overwritten_total";
    /// Composited frames pushed to the transport
    pub const EXPORTS_SENT: &str = "exports_sent_total";
    /// Transport push time histogram (microseconds)
    pub const EXPORT_PUSH_US: &str = "export_push_us";

    /// Remote participants not rendered because every slot was taken
    pub const CAPACITY_REJECTIONS: &str = "capacity_rejections_total";
    /// Transport warnings and errors received
    pub const TRANSPORT_WARNINGS: &str = "transport_warnings_total";
    /// Effect engine errors received
    pub const EFFECT_ERRORS: &str = "effect_errors_total";
    /// Current number of view slots
    pub const VIEW_SLOTS: &str = "view_slots";
    /// Join latency histogram (milliseconds)
    pub const JOIN_LATENCY_MS: &str = "join_latency_ms";
    /// Completed start attempts
    pub const PIPELINE_STARTS: &str = "pipeline_starts_total";
    /// Start attempts rolled back
    pub const STARTUP_FAILURES: &str = "startup_failures_total";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsCollector::new();
        assert_eq!(metrics.get_counter(metric_names::EXPORTS_SENT), None);

        metrics.increment_counter(metric_names::EXPORTS_SENT, 1);
        metrics.increment_counter(metric_names::EXPORTS_SENT, 4);
        assert_eq!(metrics.get_counter(metric_names::EXPORTS_SENT), Some(5));
    }

    #[test]
    fn test_gauge_overwrites() {
        let metrics = MetricsCollector::new();
        metrics.set_gauge(metric_names::VIEW_SLOTS, 3.0);
        metrics.set_gauge(metric_names::VIEW_SLOTS, 1.0);
        assert_eq!(metrics.get_gauge(metric_names::VIEW_SLOTS), Some(1.0));
    }

    #[test]
    fn test_histogram_summary() {
        let metrics = MetricsCollector::new();
        for value in [10.0, 20.0, 30.0, 40.0, 50.0] {
            metrics.record_histogram(metric_names::RENDER_CYCLE_US, value);
        }

        let stats = metrics.get_histogram(metric_names::RENDER_CYCLE_US).unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.sum, 150.0);
        assert_eq!((stats.min, stats.max), (10.0, 50.0));
        assert_eq!(stats.mean, 30.0);
        assert_eq!(stats.p50, 30.0);
    }

    #[test]
    fn test_negative_observations_keep_true_extremes() {
        let metrics = MetricsCollector::new();
        metrics.record_histogram("drift", -4.0);
        metrics.record_histogram("drift", -1.0);

        let stats = metrics.get_histogram("drift").unwrap();
        assert_eq!((stats.min, stats.max), (-4.0, -1.0));
    }

    #[test]
    fn test_nearest_rank() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(nearest_rank(&values, 0.50), 5.0);
        assert_eq!(nearest_rank(&values, 0.95), 9.0);
        assert_eq!(nearest_rank(&[], 0.5), 0.0);
    }

    #[test]
    fn test_window_bounds_percentiles_not_totals() {
        let mut window = Window::default();
        for i in 0..(HISTOGRAM_WINDOW as u64 + 10) {
            window.record(i as f64);
        }

        let stats = window.stats();
        assert_eq!(window.recent.len(), HISTOGRAM_WINDOW);
        assert_eq!(stats.count, HISTOGRAM_WINDOW as u64 + 10);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.p50, (10 + (HISTOGRAM_WINDOW - 1) / 2) as f64);
    }

    #[test]
    fn test_record_elapsed_us() {
        let metrics = MetricsCollector::new();
        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        metrics.record_elapsed_us(metric_names::EXPORT_PUSH_US, started);

        let stats = metrics.get_histogram(metric_names::EXPORT_PUSH_US).unwrap();
        assert!(stats.max >= 2000.0);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter(metric_names::RENDER_CYCLES, 2);
        metrics.increment_counter(metric_names::EXPORTS_SENT, 1);

        let names: Vec<_> = metrics.snapshot().counters.into_keys().collect();
        assert_eq!(names, vec!["exports_sent_total", "render_cycles_total"]);
    }

    #[test]
    fn test_prometheus_exposition() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter(metric_names::EXPORTS_SENT, 42);
        metrics.set_gauge(metric_names::VIEW_SLOTS, 2.0);
        metrics.record_histogram(metric_names::JOIN_LATENCY_MS, 120.0);

        let output = metrics.export_prometheus();
        assert!(output.contains("arcall_exports_sent_total 42"));
        assert!(output.contains("# TYPE arcall_view_slots gauge"));
        assert!(output.contains("arcall_join_latency_ms{quantile=\"0.5\"} 120"));
        assert!(output.contains("arcall_join_latency_ms_count 1"));
    }

    #[test]
    fn test_json_export() {
        let metrics = MetricsCollector::new();
        metrics.increment_counter(metric_names::PIPELINE_STARTS, 1);

        let json = metrics.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["counters"]["pipeline_starts_total"], 1);
    }
}
