//! Prometheus metrics for lobbyd.
//!
//! Exposed on the HTTP edge at `/metrics`. Everything is registered once at
//! startup via [`init`]; recording helpers are no-ops until then, which keeps
//! unit tests free of global setup.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Membership-change events consumed.
pub static VOICE_EVENTS: OnceLock<IntCounter> = OnceLock::new();

/// Ephemeral rooms created.
pub static ROOMS_CREATED: OnceLock<IntCounter> = OnceLock::new();

/// Ephemeral rooms deleted (event path and reconciler).
pub static ROOMS_DELETED: OnceLock<IntCounter> = OnceLock::new();

/// Ownership transfers after an owner departed.
pub static OWNERSHIP_TRANSFERS: OnceLock<IntCounter> = OnceLock::new();

/// Remote calls retried after a transient failure.
pub static REMOTE_RETRIES: OnceLock<IntCounter> = OnceLock::new();

/// Reconciler sweeps started.
pub static RECONCILER_RUNS: OnceLock<IntCounter> = OnceLock::new();

/// Stale room records removed by the reconciler.
pub static RECONCILER_REMOVED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Currently tracked rooms across all guilds.
pub static ACTIVE_ROOMS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Labeled counters
// ========================================================================

/// Commands processed by kind (setup, rename, ban, ...).
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by kind and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at daemon startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(VOICE_EVENTS, IntCounter::new("lobbyd_voice_events_total", "Membership-change events consumed"));
    register!(ROOMS_CREATED, IntCounter::new("lobbyd_rooms_created_total", "Ephemeral rooms created"));
    register!(ROOMS_DELETED, IntCounter::new("lobbyd_rooms_deleted_total", "Ephemeral rooms deleted"));
    register!(OWNERSHIP_TRANSFERS, IntCounter::new("lobbyd_ownership_transfers_total", "Room ownership transfers"));
    register!(REMOTE_RETRIES, IntCounter::new("lobbyd_remote_retries_total", "Remote calls retried after transient failure"));
    register!(RECONCILER_RUNS, IntCounter::new("lobbyd_reconciler_runs_total", "Reconciler sweeps started"));
    register!(RECONCILER_REMOVED, IntCounter::new("lobbyd_reconciler_removed_total", "Stale room records removed by the reconciler"));
    register!(ACTIVE_ROOMS, IntGauge::new("lobbyd_active_rooms", "Currently tracked rooms"));
    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("lobbyd_command_total", "Room commands processed by kind"), &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("lobbyd_command_errors_total", "Room command errors by kind"), &["command", "error"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn voice_event() {
    inc(&VOICE_EVENTS);
}

#[inline]
pub fn room_created() {
    inc(&ROOMS_CREATED);
    if let Some(g) = ACTIVE_ROOMS.get() {
        g.inc();
    }
}

#[inline]
pub fn room_deleted() {
    inc(&ROOMS_DELETED);
    if let Some(g) = ACTIVE_ROOMS.get() {
        g.dec();
    }
}

#[inline]
pub fn ownership_transferred() {
    inc(&OWNERSHIP_TRANSFERS);
}

#[inline]
pub fn remote_retry() {
    inc(&REMOTE_RETRIES);
}

#[inline]
pub fn reconciler_run() {
    inc(&RECONCILER_RUNS);
}

#[inline]
pub fn reconciler_removed(count: u64) {
    if let Some(c) = RECONCILER_REMOVED.get() {
        c.inc_by(count);
    }
}

/// Record a command execution.
#[inline]
pub fn record_command(command: &str) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}
