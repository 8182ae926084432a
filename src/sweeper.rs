use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;

/// Background task that periodically expires lapsed reservations and
/// retires past ledger days.
pub async fn run_sweeper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let report = engine.sweep().await;
        if report.failures > 0 {
            warn!("sweep finished with {} failures", report.failures);
        } else if report.holds_expired + report.bookings_expired > 0 {
            info!(
                "sweep expired {} holds, {} bookings",
                report.holds_expired, report.bookings_expired
            );
        }
    }
}

/// Background task that compacts the WAL when it grows past `threshold` appends.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends >= threshold {
            match engine.compact_wal().await {
                Ok(()) => {
                    metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
                    info!("compacted WAL after {appends} appends");
                }
                Err(e) => warn!("WAL compaction failed: {e}"),
            }
        }
    }
}
