//! Metrics collection for observability
//!
//! Prometheus metrics for the anchoring pipeline:
//!
//! - `anchor_submissions_total` - Successful submissions
//! - `anchor_failures_total` - Submissions that exhausted their attempts
//! - `anchor_batches_sealed_total` - Batches sealed by the aggregator
//! - `anchor_batch_size` - Histogram of batch sizes
//! - `anchor_submit_duration_seconds` - Histogram of submission latencies
//! - `anchor_rate_limit_wait_seconds` - Histogram of admission waits
//! - `anchor_reconciliation_repairs_total` - Entities re-anchored by the
//!   reconciliation job

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful submissions
    pub submissions_total: IntCounter,
    /// Failed submissions
    pub failures_total: IntCounter,
    /// Batches sealed
    pub batches_sealed_total: IntCounter,
    /// Batch size distribution
    pub batch_size: Histogram,
    /// Submission latency distribution
    pub submit_duration: Histogram,
    /// Rate-limit wait distribution
    pub rate_limit_wait: Histogram,
    /// Reconciliation repairs
    pub reconciliation_repairs_total: IntCounter,
    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a collector with its own registry
    ///
    /// Instance-scoped on purpose: the global-registry macros panic on
    /// repeated registration, which breaks test isolation.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let submissions_total = IntCounter::with_opts(Opts::new(
            "anchor_submissions_total",
            "Successful ledger submissions",
        ))?;
        registry.register(Box::new(submissions_total.clone()))?;

        let failures_total = IntCounter::with_opts(Opts::new(
            "anchor_failures_total",
            "Ledger submissions that exhausted their attempts",
        ))?;
        registry.register(Box::new(failures_total.clone()))?;

        let batches_sealed_total = IntCounter::with_opts(Opts::new(
            "anchor_batches_sealed_total",
            "Merkle batches sealed by the aggregator",
        ))?;
        registry.register(Box::new(batches_sealed_total.clone()))?;

        let batch_size = Histogram::with_opts(
            HistogramOpts::new("anchor_batch_size", "Items per sealed batch")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(batch_size.clone()))?;

        let submit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "anchor_submit_duration_seconds",
                "Ledger submission latency",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(submit_duration.clone()))?;

        let rate_limit_wait = Histogram::with_opts(
            HistogramOpts::new(
                "anchor_rate_limit_wait_seconds",
                "Time spent waiting for rate-limit admission",
            )
            .buckets(vec![0.0, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
        )?;
        registry.register(Box::new(rate_limit_wait.clone()))?;

        let reconciliation_repairs_total = IntCounter::with_opts(Opts::new(
            "anchor_reconciliation_repairs_total",
            "Entities re-anchored by the reconciliation job",
        ))?;
        registry.register(Box::new(reconciliation_repairs_total.clone()))?;

        Ok(Self {
            submissions_total,
            failures_total,
            batches_sealed_total,
            batch_size,
            submit_duration,
            rate_limit_wait,
            reconciliation_repairs_total,
            registry,
        })
    }

    /// Record a successful submission
    pub fn record_submission(&self, duration_seconds: f64, rate_limit_wait_seconds: f64) {
        self.submissions_total.inc();
        self.submit_duration.observe(duration_seconds);
        self.rate_limit_wait.observe(rate_limit_wait_seconds);
    }

    /// Record a failed submission
    pub fn record_failure(&self) {
        self.failures_total.inc();
    }

    /// Record a sealed batch
    pub fn record_batch(&self, size: usize) {
        self.batches_sealed_total.inc();
        self.batch_size.observe(size as f64);
    }

    /// Record a reconciliation repair
    pub fn record_repair(&self) {
        self.reconciliation_repairs_total.inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
