use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task: rewrite the tenant's WAL once enough appends have
/// accumulated since the last compaction. Runs for the lifetime of the
/// engine.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        tracing::info!(appends, threshold, "compacting WAL");
        if let Err(e) = engine.compact_wal().await {
            tracing::error!("WAL compaction failed: {e}");
        }
    }
}
