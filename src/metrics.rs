/// Metrics Module - Prometheus Instrumentation
///
/// Counters and gauges for scan passes, classification outcomes and node RPC,
/// all registered on one registry and rendered by `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Standard latency buckets for histograms (seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0];

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // 1. SCAN PROGRESS
    // ========================================================================

    /// Labels: index (identity, data)
    pub static ref BLOCKS_SCANNED: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_blocks_scanned_total", "Blocks scanned by index"),
        &["index"]
    ).unwrap();

    /// Labels: index (identity, data)
    pub static ref TRANSACTIONS_INSPECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_transactions_inspected_total", "Transactions fetched and classified by index"),
        &["index"]
    ).unwrap();

    /// Labels: index (identity, data)
    pub static ref LAST_SCANNED_HEIGHT: IntGaugeVec = IntGaugeVec::new(
        Opts::new("twistindex_last_scanned_height", "Last block height persisted by index"),
        &["index"]
    ).unwrap();

    pub static ref CHAIN_TIP_HEIGHT: IntGauge = IntGauge::new(
        "twistindex_chain_tip_height",
        "Chain height last reported by the node"
    ).unwrap();

    /// Labels: index (identity, data)
    pub static ref PASSES_ABORTED: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_passes_aborted_total", "Scan passes that ended without saving a checkpoint"),
        &["index"]
    ).unwrap();

    // ========================================================================
    // 2. CLASSIFICATION
    // ========================================================================

    /// Labels: kind (registration, message, data)
    pub static ref RECORDS_ACCEPTED: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_records_accepted_total", "Protocol records accepted into an index"),
        &["kind"]
    ).unwrap();

    /// Labels: kind (registration, message, data), reason
    pub static ref RECORDS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_records_rejected_total", "Protocol records rejected by validation"),
        &["kind", "reason"]
    ).unwrap();

    // ========================================================================
    // 3. NODE RPC
    // ========================================================================

    /// Labels: method (getblockcount, getblockhash, getblock, getrawtransaction)
    pub static ref RPC_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("twistindex_rpc_call_duration_seconds", "RPC call latency")
            .buckets(LATENCY_BUCKETS.to_vec()),
        &["method"]
    ).unwrap();

    /// Labels: method, error_type (transport, rpc, malformed)
    pub static ref RPC_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("twistindex_rpc_errors_total", "Failed RPC calls"),
        &["method", "error_type"]
    ).unwrap();
}

fn register<M>(metric: &M) -> Result<(), prometheus::Error>
where
    M: prometheus::core::Collector + Clone + 'static,
{
    match REGISTRY.register(Box::new(metric.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register every metric with the global registry. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(&*BLOCKS_SCANNED)?;
    register(&*TRANSACTIONS_INSPECTED)?;
    register(&*LAST_SCANNED_HEIGHT)?;
    register(&*CHAIN_TIP_HEIGHT)?;
    register(&*PASSES_ABORTED)?;
    register(&*RECORDS_ACCEPTED)?;
    register(&*RECORDS_REJECTED)?;
    register(&*RPC_CALL_DURATION)?;
    register(&*RPC_ERRORS)?;
    Ok(())
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn increment_blocks_scanned(index: &str) {
    BLOCKS_SCANNED.with_label_values(&[index]).inc();
}

pub fn increment_transactions_inspected(index: &str) {
    TRANSACTIONS_INSPECTED.with_label_values(&[index]).inc();
}

pub fn set_last_scanned_height(index: &str, height: u64) {
    LAST_SCANNED_HEIGHT
        .with_label_values(&[index])
        .set(height as i64);
}

pub fn set_chain_tip_height(height: u64) {
    CHAIN_TIP_HEIGHT.set(height as i64);
}

pub fn increment_passes_aborted(index: &str) {
    PASSES_ABORTED.with_label_values(&[index]).inc();
}

pub fn increment_records_accepted(kind: &str) {
    RECORDS_ACCEPTED.with_label_values(&[kind]).inc();
}

pub fn increment_records_rejected(kind: &str, reason: &str) {
    RECORDS_REJECTED.with_label_values(&[kind, reason]).inc();
}

pub fn record_rpc_call_duration(method: &str, duration_secs: f64) {
    RPC_CALL_DURATION
        .with_label_values(&[method])
        .observe(duration_secs);
}

pub fn increment_rpc_errors(method: &str, error_type: &str) {
    RPC_ERRORS.with_label_values(&[method, error_type]).inc();
}
