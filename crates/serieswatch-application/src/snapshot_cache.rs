// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use serieswatch_domain::TorrentJob;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::torrent_client::{TorrentClient, TorrentClientError};

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

struct Snapshot {
    jobs: Arc<Vec<TorrentJob>>,
    fetched_at: Instant,
}

/// Short-lived cache in front of the torrent client's job listing.
///
/// A snapshot is served while it is younger than the freshness window. The
/// check, the fetch and the store happen under one lock, so concurrent callers
/// never trigger duplicate fetches.
pub struct JobSnapshotCache {
    client: Arc<dyn TorrentClient>,
    window: Duration,
    snapshot: Mutex<Option<Snapshot>>,
}

impl JobSnapshotCache {
    pub fn new(client: Arc<dyn TorrentClient>, window: Duration) -> Self {
        Self {
            client,
            window,
            snapshot: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current jobs, from cache when fresh. A failed fetch clears the cache
    /// so the next call goes back to the client.
    pub async fn current_jobs(&self) -> Result<Arc<Vec<TorrentJob>>, TorrentClientError> {
        let mut slot = self.snapshot.lock().await;

        if let Some(snapshot) = slot.as_ref() {
            let age = snapshot.fetched_at.elapsed();
            if age < self.window {
                trace!(target: "snapshot", ?age, "serving cached job snapshot");
                return Ok(snapshot.jobs.clone());
            }
        }

        match self.client.list_jobs().await {
            Ok(jobs) => {
                let jobs = Arc::new(jobs);
                debug!(target: "snapshot", jobs = jobs.len(), "refreshed job snapshot");
                *slot = Some(Snapshot {
                    jobs: jobs.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(jobs)
            }
            Err(err) => {
                warn!(target: "snapshot", error = %err, "job listing failed, cache invalidated");
                *slot = None;
                Err(err)
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.snapshot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTorrentClient;
    use chrono::Utc;

    fn cache_with(client: Arc<FakeTorrentClient>) -> JobSnapshotCache {
        JobSnapshotCache::new(client, DEFAULT_FRESHNESS_WINDOW)
    }

    #[tokio::test(start_paused = true)]
    async fn calls_inside_window_fetch_once() {
        let client = Arc::new(FakeTorrentClient::with_jobs(vec![TorrentJob::new(
            1,
            "[Tag] Show - 01",
            Utc::now(),
        )]));
        let cache = cache_with(client.clone());

        let first = cache.current_jobs().await.expect("first fetch");
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = cache.current_jobs().await.expect("cached fetch");

        assert_eq!(client.list_calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_snapshot_is_refetched() {
        let client = Arc::new(FakeTorrentClient::default());
        let cache = cache_with(client.clone());

        cache.current_jobs().await.expect("first fetch");
        tokio::time::advance(Duration::from_secs(60)).await;
        client.set_jobs(vec![TorrentJob::new(2, "[Tag] Show - 02", Utc::now())]);
        let refreshed = cache.current_jobs().await.expect("second fetch");

        assert_eq!(client.list_calls(), 2);
        assert_eq!(refreshed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_invalidates_cache() {
        let client = Arc::new(FakeTorrentClient::default());
        let cache = cache_with(client.clone());

        cache.current_jobs().await.expect("first fetch");
        tokio::time::advance(Duration::from_secs(61)).await;

        client.fail_listing(true);
        assert!(cache.current_jobs().await.is_err());

        // no stale snapshot is served after a failure, even inside the window
        client.fail_listing(false);
        cache.current_jobs().await.expect("retry after failure");
        assert_eq!(client.list_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_invalidate_forces_refetch() {
        let client = Arc::new(FakeTorrentClient::default());
        let cache = cache_with(client.clone());

        cache.current_jobs().await.expect("first fetch");
        cache.invalidate().await;
        cache.current_jobs().await.expect("second fetch");

        assert_eq!(client.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_fetch() {
        let client = Arc::new(FakeTorrentClient::default());
        client.delay_listing(Duration::from_millis(200));
        let cache = Arc::new(cache_with(client.clone()));

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.current_jobs().await.map(|jobs| jobs.len()) }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.current_jobs().await.map(|jobs| jobs.len()) }
        });

        assert!(a.await.expect("task a").is_ok());
        assert!(b.await.expect("task b").is_ok());
        assert_eq!(client.list_calls(), 1);
    }
}
