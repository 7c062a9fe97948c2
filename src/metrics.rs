//! Service metrics and statistics tracking for NeuroGuard.

use crate::types::alert::DeliveryStatus;
use crate::types::prediction::Verdict;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for request handling
pub struct ServiceMetrics {
    /// Uploads that produced a verdict
    uploads_processed: AtomicU64,
    /// Rows scored across all uploads
    rows_scored: AtomicU64,
    /// Uploads with a "Safe" verdict
    verdicts_safe: AtomicU64,
    /// Uploads with a "Seizure Detected" verdict
    verdicts_seizure: AtomicU64,
    /// Uploads rejected as invalid (4xx)
    uploads_rejected: AtomicU64,
    /// Uploads that failed inside the model (5xx)
    internal_failures: AtomicU64,
    /// Emergency requests that passed validation
    alerts_requested: AtomicU64,
    /// Alerts accepted by the email provider
    alerts_delivered: AtomicU64,
    /// Alerts written to the log only
    alerts_logged: AtomicU64,
    /// Alerts the transport failed or timed out on
    alerts_failed: AtomicU64,
    /// Upload handling times (in microseconds)
    upload_times: RwLock<Vec<u64>>,
    /// Start time for uptime
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            uploads_processed: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            verdicts_safe: AtomicU64::new(0),
            verdicts_seizure: AtomicU64::new(0),
            uploads_rejected: AtomicU64::new(0),
            internal_failures: AtomicU64::new(0),
            alerts_requested: AtomicU64::new(0),
            alerts_delivered: AtomicU64::new(0),
            alerts_logged: AtomicU64::new(0),
            alerts_failed: AtomicU64::new(0),
            upload_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored upload
    pub fn record_upload(&self, processing_time: Duration, rows: usize, verdict: Verdict) {
        self.uploads_processed.fetch_add(1, Ordering::Relaxed);
        self.rows_scored.fetch_add(rows as u64, Ordering::Relaxed);
        match verdict {
            Verdict::Safe => self.verdicts_safe.fetch_add(1, Ordering::Relaxed),
            Verdict::SeizureDetected => self.verdicts_seizure.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut times) = self.upload_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record an upload rejected by validation
    pub fn record_rejection(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload that failed during scaling or prediction
    pub fn record_internal_failure(&self) {
        self.internal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one alert dispatch
    pub fn record_alert(&self, delivery: &DeliveryStatus) {
        self.alerts_requested.fetch_add(1, Ordering::Relaxed);
        let counter = match delivery {
            DeliveryStatus::Delivered { .. } => &self.alerts_delivered,
            DeliveryStatus::Logged => &self.alerts_logged,
            DeliveryStatus::Failed { .. } => &self.alerts_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get upload latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let times = match self.upload_times.read() {
            Ok(times) => times,
            Err(poisoned) => poisoned.into_inner(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            uploads_processed: self.uploads_processed.load(Ordering::Relaxed),
            rows_scored: self.rows_scored.load(Ordering::Relaxed),
            verdicts_safe: self.verdicts_safe.load(Ordering::Relaxed),
            verdicts_seizure: self.verdicts_seizure.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            internal_failures: self.internal_failures.load(Ordering::Relaxed),
            alerts_requested: self.alerts_requested.load(Ordering::Relaxed),
            alerts_delivered: self.alerts_delivered.load(Ordering::Relaxed),
            alerts_logged: self.alerts_logged.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
            upload_latency: self.get_latency_stats(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let s = self.snapshot();
        let seizure_rate = if s.uploads_processed > 0 {
            (s.verdicts_seizure as f64 / s.uploads_processed as f64) * 100.0
        } else {
            0.0
        };
        let latency = &s.upload_latency;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║                NEUROGUARD - METRICS SUMMARY                  ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Uploads Scored: {:>8}  │  Rows Scored: {:>10}          ║",
            s.uploads_processed, s.rows_scored
        );
        info!(
            "║ Seizure Verdicts: {:>6}  │  Seizure Rate: {:>6.1}%          ║",
            s.verdicts_seizure, seizure_rate
        );
        info!(
            "║ Rejected (4xx): {:>8}  │  Internal Failures (5xx): {:>5}  ║",
            s.uploads_rejected, s.internal_failures
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Upload Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Alerts: req={:>5} sent={:>5} logged={:>5} failed={:>5}      ║",
            s.alerts_requested, s.alerts_delivered, s.alerts_logged, s.alerts_failed
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Upload latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view served at `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub uploads_processed: u64,
    pub rows_scored: u64,
    pub verdicts_safe: u64,
    pub verdicts_seizure: u64,
    pub uploads_rejected: u64,
    pub internal_failures: u64,
    pub alerts_requested: u64,
    pub alerts_delivered: u64,
    pub alerts_logged: u64,
    pub alerts_failed: u64,
    pub upload_latency: LatencyStats,
}

/// Real-time metrics reporter that prints periodic summaries
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
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
