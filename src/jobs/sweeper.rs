use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;
use crate::jobs::JobStore;

/// Periodically evict finished job records that have outlived the configured
/// retention. Reads the interval and TTL from the current config snapshot on
/// every pass, so a reload takes effect without restarting the loop.
pub async fn run_sweeper(
    jobs: Arc<RwLock<JobStore>>,
    config: Arc<ConfigStore>,
    shutdown: CancellationToken,
) {
    loop {
        let snapshot = config.current().await;
        let interval = tokio::time::Duration::from_secs(snapshot.sweep_interval_secs.max(1));
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("retention sweeper stopping");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let ttl = chrono::Duration::seconds(snapshot.job_retention_secs as i64);
        let evicted = jobs.write().await.sweep_expired(ttl);
        if evicted > 0 {
            tracing::info!(evicted, "evicted expired job records");
        }
    }
}
