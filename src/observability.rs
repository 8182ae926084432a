use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "roomledger_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "roomledger_http_request_duration_seconds";

// ── Reservation engine ──────────────────────────────────────────

/// Counter: reservations created. Labels: kind (booking, hold).
pub const RESERVATIONS_CREATED_TOTAL: &str = "roomledger_reservations_created_total";

/// Counter: guarded state transitions applied. Labels: transition.
pub const TRANSITIONS_TOTAL: &str = "roomledger_transitions_total";

/// Counter: allocations refused because a day was booked or held. Labels: kind.
pub const CONFLICTS_TOTAL: &str = "roomledger_conflicts_total";

/// Counter: notification deliveries that failed. Labels: kind.
pub const NOTIFICATION_FAILURES_TOTAL: &str = "roomledger_notification_failures_total";

// ── Sweeper ─────────────────────────────────────────────────────

/// Counter: completed sweep runs.
pub const SWEEP_RUNS_TOTAL: &str = "roomledger_sweep_runs_total";

/// Counter: reservations expired by the sweeper. Labels: status.
pub const SWEEP_EXPIRED_TOTAL: &str = "roomledger_sweep_expired_total";

/// Counter: sweep items that failed and were skipped.
pub const SWEEP_FAILURES_TOTAL: &str = "roomledger_sweep_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomledger_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomledger_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "roomledger_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
