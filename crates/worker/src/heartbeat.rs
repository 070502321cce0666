//! Lease renewal for the job a worker is running.

use std::sync::Arc;
use std::time::Duration;

use litessay_core::types::JobLease;
use litessay_pipeline::JobStore;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Spawn a task renewing `lease` every `interval`.
///
/// The task stops when the returned guard is dropped or when the store
/// reports the lease gone.
pub fn spawn_heartbeat(store: Arc<dyn JobStore>, lease: JobLease, interval: Duration) -> DropGuard {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; the claim already stamped
        // a heartbeat.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    match store.heartbeat(lease).await {
                        Ok(true) => {
                            tracing::debug!(job_id = lease.job_id, "Heartbeat");
                        }
                        Ok(false) => {
                            tracing::warn!(job_id = lease.job_id, "Lease lost, stopping heartbeat");
                            break;
                        }
                        Err(e) => {
                            tracing::error!(job_id = lease.job_id, error = %e, "Heartbeat failed");
                        }
                    }
                }
            }
        }
    });

    cancel.drop_guard()
}

#[cfg(test)]
mod tests {
    use litessay_pipeline::testing::MemoryJobStore;

    use super::*;

    async fn claimed(store: &MemoryJobStore) -> JobLease {
        let document = store.add_document("11", "Alice was beginning to get very tired.");
        store.enqueue(document.id).await.unwrap();
        let job = store.claim_next().await.unwrap().unwrap();
        job.lease().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn renews_until_guard_is_dropped() {
        let store = Arc::new(MemoryJobStore::new());
        let lease = claimed(&store).await;

        let guard = spawn_heartbeat(store.clone(), lease, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(store.heartbeat_count(lease.job_id), 2);

        drop(guard);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.heartbeat_count(lease.job_id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_lease_is_revoked() {
        let store = Arc::new(MemoryJobStore::new());
        let lease = claimed(&store).await;

        let _guard = spawn_heartbeat(store.clone(), lease, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(store.heartbeat_count(lease.job_id), 1);

        store.revoke_lease(lease.job_id);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.heartbeat_count(lease.job_id), 1);
    }
}
