//! Dual-writer metrics for Prometheus
//!
//! Tracks per-store call durations, divergence outcomes, and data-syncer
//! results. Families are labeled by (mode, resource, method, ...); the
//! recorder is safe under parallel updates.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::store::DualWriterMode;

/// Histogram bucket boundaries in seconds
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Default)]
struct Histogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; 11],
}

impl Histogram {
    fn observe(&self, seconds: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
        for (i, &boundary) in DURATION_BUCKETS.iter().enumerate() {
            if seconds <= boundary {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }
}

type DurationKey = (String, bool);
type OutcomeKey = (String, String, bool);

/// Metrics recorder shared by the dual writer and the data syncer
#[derive(Debug)]
pub struct DualWriterMetrics {
    mode: &'static str,
    resource: String,
    legacy_duration: RwLock<HashMap<DurationKey, Histogram>>,
    storage_duration: RwLock<HashMap<DurationKey, Histogram>>,
    /// (method, name, equal) -> count
    outcome: RwLock<HashMap<OutcomeKey, AtomicU64>>,
    /// synced -> count
    sync_outcome: RwLock<HashMap<bool, AtomicU64>>,
    /// is_error -> histogram
    sync_duration: RwLock<HashMap<bool, Histogram>>,
}

impl DualWriterMetrics {
    /// Create a recorder labeled with the given mode and resource tag
    pub fn new(mode: DualWriterMode, resource: impl Into<String>) -> Self {
        Self {
            mode: mode.as_str(),
            resource: resource.into(),
            legacy_duration: RwLock::new(HashMap::new()),
            storage_duration: RwLock::new(HashMap::new()),
            outcome: RwLock::new(HashMap::new()),
            sync_outcome: RwLock::new(HashMap::new()),
            sync_duration: RwLock::new(HashMap::new()),
        }
    }

    /// The resource tag this recorder labels its families with
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Record the duration of a legacy-store call
    pub fn record_legacy_duration(&self, is_error: bool, method: &str, start: Instant) {
        observe_histogram(
            &self.legacy_duration,
            (method.to_string(), is_error),
            start.elapsed().as_secs_f64(),
        );
    }

    /// Record the duration of a unified-store call
    pub fn record_storage_duration(&self, is_error: bool, method: &str, start: Instant) {
        observe_histogram(
            &self.storage_duration,
            (method.to_string(), is_error),
            start.elapsed().as_secs_f64(),
        );
    }

    /// Record a comparison outcome for the named object
    pub fn record_outcome(&self, method: &str, name: &str, equal: bool) {
        bump_counter(
            &self.outcome,
            (method.to_string(), name.to_string(), equal),
        );
    }

    /// Record whether a sync pass converged everything it attempted
    pub fn record_sync_outcome(&self, synced: bool) {
        bump_counter(&self.sync_outcome, synced);
    }

    /// Record the duration of a sync pass body
    pub fn record_sync_duration(&self, is_error: bool, start: Instant) {
        observe_histogram(&self.sync_duration, is_error, start.elapsed().as_secs_f64());
    }

    /// Export all families in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(8 * 1024);

        writeln!(output, "# HELP janus_dualwriter_legacy_duration_seconds Duration of legacy store calls").unwrap();
        writeln!(output, "# TYPE janus_dualwriter_legacy_duration_seconds histogram").unwrap();
        self.render_duration_family(
            &mut output,
            "janus_dualwriter_legacy_duration_seconds",
            &self.legacy_duration,
        );

        writeln!(output, "# HELP janus_dualwriter_storage_duration_seconds Duration of unified store calls").unwrap();
        writeln!(output, "# TYPE janus_dualwriter_storage_duration_seconds histogram").unwrap();
        self.render_duration_family(
            &mut output,
            "janus_dualwriter_storage_duration_seconds",
            &self.storage_duration,
        );

        writeln!(output, "# HELP janus_dualwriter_outcome_total Comparison outcomes between legacy and unified results").unwrap();
        writeln!(output, "# TYPE janus_dualwriter_outcome_total counter").unwrap();
        for ((method, name, equal), count) in self.outcome.read().iter() {
            let outcome = if *equal { "equal" } else { "diverged" };
            writeln!(
                output,
                "janus_dualwriter_outcome_total{{mode=\"{}\",resource=\"{}\",method=\"{}\",name=\"{}\",outcome=\"{}\"}} {}",
                self.mode,
                self.resource,
                method,
                name,
                outcome,
                count.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        writeln!(output, "# HELP janus_dualwriter_sync_outcome_total Data syncer pass outcomes").unwrap();
        writeln!(output, "# TYPE janus_dualwriter_sync_outcome_total counter").unwrap();
        for (synced, count) in self.sync_outcome.read().iter() {
            let outcome = if *synced { "synced" } else { "out_of_sync" };
            writeln!(
                output,
                "janus_dualwriter_sync_outcome_total{{mode=\"{}\",resource=\"{}\",outcome=\"{}\"}} {}",
                self.mode,
                self.resource,
                outcome,
                count.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        writeln!(output, "# HELP janus_dualwriter_sync_duration_seconds Duration of data syncer passes").unwrap();
        writeln!(output, "# TYPE janus_dualwriter_sync_duration_seconds histogram").unwrap();
        for (is_error, hist) in self.sync_duration.read().iter() {
            let labels = format!(
                "mode=\"{}\",resource=\"{}\",is_error=\"{}\"",
                self.mode, self.resource, is_error
            );
            render_histogram(&mut output, "janus_dualwriter_sync_duration_seconds", &labels, hist);
        }

        output
    }

    fn render_duration_family(
        &self,
        output: &mut String,
        family: &str,
        map: &RwLock<HashMap<DurationKey, Histogram>>,
    ) {
        for ((method, is_error), hist) in map.read().iter() {
            let labels = format!(
                "mode=\"{}\",resource=\"{}\",method=\"{}\",is_error=\"{}\"",
                self.mode, self.resource, method, is_error
            );
            render_histogram(output, family, &labels, hist);
        }
    }
}

fn observe_histogram<K: std::hash::Hash + Eq + Clone>(
    map: &RwLock<HashMap<K, Histogram>>,
    key: K,
    seconds: f64,
) {
    if let Some(hist) = map.read().get(&key) {
        hist.observe(seconds);
        return;
    }
    map.write().entry(key).or_default().observe(seconds);
}

fn bump_counter<K: std::hash::Hash + Eq + Clone>(map: &RwLock<HashMap<K, AtomicU64>>, key: K) {
    if let Some(count) = map.read().get(&key) {
        count.fetch_add(1, Ordering::Relaxed);
        return;
    }
    map.write()
        .entry(key)
        .or_default()
        .fetch_add(1, Ordering::Relaxed);
}

fn render_histogram(output: &mut String, family: &str, labels: &str, hist: &Histogram) {
    let total = hist.count.load(Ordering::Relaxed);
    let sum_micros = hist.sum_micros.load(Ordering::Relaxed);

    let mut cumulative = 0u64;
    for (i, boundary) in DURATION_BUCKETS.iter().enumerate() {
        cumulative += hist.buckets[i].load(Ordering::Relaxed);
        writeln!(
            output,
            "{family}_bucket{{{labels},le=\"{boundary}\"}} {cumulative}"
        )
        .unwrap();
    }
    writeln!(output, "{family}_bucket{{{labels},le=\"+Inf\"}} {total}").unwrap();
    writeln!(
        output,
        "{family}_sum{{{labels}}} {}",
        sum_micros as f64 / 1_000_000.0
    )
    .unwrap();
    writeln!(output, "{family}_count{{{labels}}} {total}").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_durations_and_export() {
        let metrics = DualWriterMetrics::new(DualWriterMode::Mode2, "savedviews");
        metrics.record_legacy_duration(false, "create", Instant::now());
        metrics.record_storage_duration(true, "create", Instant::now());

        let output = metrics.export_prometheus();
        assert!(output.contains("janus_dualwriter_legacy_duration_seconds_bucket"));
        assert!(output.contains("method=\"create\",is_error=\"false\""));
        assert!(output.contains("janus_dualwriter_storage_duration_seconds_count"));
        assert!(output.contains("is_error=\"true\""));
        assert!(output.contains("resource=\"savedviews\""));
        assert!(output.contains("mode=\"2\""));
    }

    #[test]
    fn test_record_outcomes() {
        let metrics = DualWriterMetrics::new(DualWriterMode::Mode2, "savedviews");
        metrics.record_outcome("create", "a", false);
        metrics.record_outcome("create", "a", false);
        metrics.record_outcome("get", "b", true);

        let output = metrics.export_prometheus();
        assert!(output.contains("name=\"a\",outcome=\"diverged\"} 2"));
        assert!(output.contains("name=\"b\",outcome=\"equal\"} 1"));
    }

    #[test]
    fn test_sync_families() {
        let metrics = DualWriterMetrics::new(DualWriterMode::Mode2, "savedviews");
        metrics.record_sync_outcome(true);
        metrics.record_sync_outcome(false);
        metrics.record_sync_duration(false, Instant::now());

        let output = metrics.export_prometheus();
        assert!(output.contains("outcome=\"synced\"} 1"));
        assert!(output.contains("outcome=\"out_of_sync\"} 1"));
        assert!(output.contains("janus_dualwriter_sync_duration_seconds_count"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let hist = Histogram::default();
        hist.observe(0.003); // first bucket
        hist.observe(0.3); // le 0.5
        hist.observe(42.0); // above all boundaries, +Inf only

        let mut out = String::new();
        render_histogram(&mut out, "f", "l=\"1\"", &hist);
        assert!(out.contains("f_bucket{l=\"1\",le=\"0.005\"} 1"));
        assert!(out.contains("f_bucket{l=\"1\",le=\"0.5\"} 2"));
        assert!(out.contains("f_bucket{l=\"1\",le=\"10\"} 2"));
        assert!(out.contains("f_bucket{l=\"1\",le=\"+Inf\"} 3"));
        assert!(out.contains("f_count{l=\"1\"} 3"));
    }
}
