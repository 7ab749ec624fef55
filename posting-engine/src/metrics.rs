//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the posting worker.
//!
//! # Metrics
//!
//! - `posting_requests_total` - Requests processed by the worker
//! - `posting_failures_total` - Requests answered with an error
//! - `posting_validation_failures_total` - Requests rejected by the validator
//! - `posting_duration_seconds` - Histogram of per-request processing time
//! - `chart_refreshes_total` - Chart-of-accounts rebuilds
//! - `posting_mailbox_timeouts_total` - Callers that gave up before the reply

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Requests processed
    pub requests_total: IntCounter,

    /// Requests answered with an error
    pub failures_total: IntCounter,

    /// Requests rejected by validation
    pub validation_failures_total: IntCounter,

    /// Processing duration histogram
    pub duration: Histogram,

    /// Chart rebuilds
    pub chart_refreshes_total: IntCounter,

    /// Caller deadlines that expired
    pub mailbox_timeouts_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total = IntCounter::new(
            "posting_requests_total",
            "Total number of posting requests processed",
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let failures_total = IntCounter::new(
            "posting_failures_total",
            "Total number of posting requests answered with an error",
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let validation_failures_total = IntCounter::new(
            "posting_validation_failures_total",
            "Total number of posting requests rejected by validation",
        )?;
        registry.register(Box::new(validation_failures_total.clone()))?;

        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "posting_duration_seconds",
                "Histogram of posting request latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(duration.clone()))?;

        let chart_refreshes_total = IntCounter::new(
            "chart_refreshes_total",
            "Total number of chart-of-accounts rebuilds",
        )?;
        registry.register(Box::new(chart_refreshes_total.clone()))?;

        let mailbox_timeouts_total = IntCounter::new(
            "posting_mailbox_timeouts_total",
            "Total number of callers whose reply deadline expired",
        )?;
        registry.register(Box::new(mailbox_timeouts_total.clone()))?;

        Ok(Self {
            requests_total,
            failures_total,
            validation_failures_total,
            duration,
            chart_refreshes_total,
            mailbox_timeouts_total,
            registry,
        })
    }

    /// Record a finished request
    pub fn record_request(&self, duration_seconds: f64, result: &crate::Result<impl Sized>) {
        self.requests_total.inc();
        self.duration.observe(duration_seconds);
        if let Err(err) = result {
            self.failures_total.inc();
            if matches!(err.root(), crate::Error::Validation(_)) {
                self.validation_failures_total.inc();
            }
        }
    }

    /// Record a chart rebuild
    pub fn record_chart_refresh(&self) {
        self.chart_refreshes_total.inc();
    }

    /// Record an expired caller deadline
    pub fn record_timeout(&self) {
        self.mailbox_timeouts_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
