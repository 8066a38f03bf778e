//! Prometheus metrics for swarmcrawl workers and the monitor
//!
//! This module tracks:
//! - Workers: task outcomes, fetch latency, routed and submitted URLs, heartbeat errors
//! - Monitor: queue depths sampled on every snapshot
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram, Counter,
    CounterVec, Encoder, GaugeVec, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all metrics
struct SwarmMetrics {
    tasks: CounterVec,
    urls_routed: CounterVec,
    links_submitted: Counter,
    fetch_duration: Histogram,
    heartbeat_errors: Counter,
    queue_depth: GaugeVec,
}

/// Global metrics storage
static METRICS: OnceLock<SwarmMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = swarmcrawl::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = SwarmMetrics {
        tasks: register_counter_vec!(
            "swarmcrawl_tasks_total",
            "Worker ticks by outcome",
            &["outcome"]
        )?,
        urls_routed: register_counter_vec!(
            "swarmcrawl_urls_routed_total",
            "URLs moved from the master queue into a ready queue",
            &["strategy"]
        )?,
        links_submitted: register_counter!(
            "swarmcrawl_links_submitted_total",
            "Discovered links accepted into the frontier"
        )?,
        fetch_duration: register_histogram!(
            "swarmcrawl_fetch_duration_seconds",
            "Page fetch duration in seconds",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        )?,
        heartbeat_errors: register_counter!(
            "swarmcrawl_heartbeat_errors_total",
            "Heartbeat or registration writes that failed"
        )?,
        queue_depth: register_gauge_vec!(
            "swarmcrawl_queue_depth",
            "Depth of each coordination queue at the last snapshot",
            &["queue"]
        )?,
    };

    METRICS
        .set(metrics)
        .map_err(|_| "Metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the outcome of one worker tick
pub fn record_task_outcome(outcome: &str) {
    if let Some(m) = METRICS.get() {
        m.tasks.with_label_values(&[outcome]).inc();
    }
}

/// Record a URL routed by a strategy
pub fn record_url_routed(strategy: &str) {
    if let Some(m) = METRICS.get() {
        m.urls_routed.with_label_values(&[strategy]).inc();
    }
}

/// Record links accepted into the frontier
pub fn record_links_submitted(count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = METRICS.get() {
        m.links_submitted.inc_by(count as f64);
    }
}

/// Record a heartbeat error
pub fn record_heartbeat_error() {
    if let Some(m) = METRICS.get() {
        m.heartbeat_errors.inc();
    }
}

/// Set the sampled depth of one queue
pub fn set_queue_depth(queue: &str, depth: usize) {
    if let Some(m) = METRICS.get() {
        m.queue_depth.with_label_values(&[queue]).set(depth as f64);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a fetch timer
pub fn start_fetch_timer() -> MetricsTimer {
    match METRICS.get() {
        Some(m) => MetricsTimer::new(m.fetch_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
