//! Submission counters and latency statistics for the classifier service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the classifier service
pub struct ServiceMetrics {
    /// Total submissions handled
    pub submissions: AtomicU64,
    /// Submissions rejected by the form before reconciliation
    pub rejected: AtomicU64,
    /// Submissions with missing or extra columns
    pub reconciliation_warnings: AtomicU64,
    /// Classifier invocations that failed
    pub prediction_failures: AtomicU64,
    /// Successful predictions by label
    predictions_by_label: RwLock<BTreeMap<String, u64>>,
    /// Handling times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            submissions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            reconciliation_warnings: AtomicU64::new(0),
            prediction_failures: AtomicU64::new(0),
            predictions_by_label: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a handled submission and how long it took
    pub fn record_submission(&self, processing_time: Duration) {
        self.submissions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn record_prediction(&self, label: &str) {
        if let Ok(mut by_label) = self.predictions_by_label.write() {
            *by_label.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    pub fn record_prediction_failure(&self) {
        self.prediction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconciliation_warning(&self) {
        self.reconciliation_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (submissions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.submissions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get successful predictions by label
    pub fn get_predictions_by_label(&self) -> BTreeMap<String, u64> {
        self.predictions_by_label
            .read()
            .map(|by_label| by_label.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let submissions = self.submissions.load(Ordering::Relaxed);
        let failures = self.prediction_failures.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let warnings = self.reconciliation_warnings.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            submissions = submissions,
            rejected = rejected,
            prediction_failures = failures,
            reconciliation_warnings = warnings,
            throughput = format!("{:.2} req/s", self.get_throughput()),
            "Classifier service summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Submission handling time"
        );

        let by_label = self.get_predictions_by_label();
        let predicted: u64 = by_label.values().sum();
        for (label, count) in &by_label {
            let pct = if predicted > 0 {
                (*count as f64 / predicted as f64) * 100.0
            } else {
                0.0
            };
            info!(label = %label, count = count, "  {:>5.1}% of predictions", pct);
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_submission(Duration::from_micros(100));
        metrics.record_submission(Duration::from_micros(300));
        metrics.record_prediction("Insomnia");
        metrics.record_prediction("Insomnia");
        metrics.record_prediction_failure();
        metrics.record_reconciliation_warning();

        assert_eq!(metrics.submissions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.prediction_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.reconciliation_warnings.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_predictions_by_label().get("Insomnia"), Some(&2));
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [100, 200, 300, 400] {
            metrics.record_submission(Duration::from_micros(us));
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);
    }
}
