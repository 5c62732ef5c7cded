// SPDX-License-Identifier: GPL-3.0-or-later
//! In-memory collaborators shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serieswatch_domain::{AddOutcome, Feed, PlacementSettings, TorrentJob};

use crate::feeds::{FeedError, FeedFetcher};
use crate::torrent_client::{TorrentClient, TorrentClientError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub source: String,
    pub placement: PlacementSettings,
}

#[derive(Default)]
pub struct FakeTorrentClient {
    jobs: Mutex<Vec<TorrentJob>>,
    list_calls: AtomicUsize,
    fail_list: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
    rejected_sources: Mutex<Vec<String>>,
    submissions: Mutex<Vec<Submission>>,
}

impl FakeTorrentClient {
    pub fn with_jobs(jobs: Vec<TorrentJob>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            ..Self::default()
        }
    }

    pub fn set_jobs(&self, jobs: Vec<TorrentJob>) {
        *self.jobs.lock().expect("jobs lock") = jobs;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn delay_listing(&self, delay: Duration) {
        *self.list_delay.lock().expect("delay lock") = Some(delay);
    }

    pub fn reject_source(&self, source: &str) {
        self.rejected_sources
            .lock()
            .expect("rejected lock")
            .push(source.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().expect("submissions lock").clone()
    }
}

#[async_trait]
impl TorrentClient for FakeTorrentClient {
    async fn list_jobs(&self) -> Result<Vec<TorrentJob>, TorrentClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(TorrentClientError::Request("connection refused".to_string()));
        }
        Ok(self.jobs.lock().expect("jobs lock").clone())
    }

    async fn add_job(
        &self,
        source: &str,
        placement: &PlacementSettings,
    ) -> Result<AddOutcome, TorrentClientError> {
        let rejected = self
            .rejected_sources
            .lock()
            .expect("rejected lock")
            .iter()
            .any(|s| s == source);
        if rejected {
            return Err(TorrentClientError::Rpc {
                method: "torrent-add".to_string(),
                result: "invalid or corrupt torrent file".to_string(),
            });
        }

        self.submissions
            .lock()
            .expect("submissions lock")
            .push(Submission {
                source: source.to_string(),
                placement: placement.clone(),
            });
        Ok(AddOutcome::Added)
    }
}

#[derive(Default)]
pub struct FakeFeedFetcher {
    feeds: Mutex<HashMap<String, Feed>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeFeedFetcher {
    pub fn with_feed(self, url: &str, feed: Feed) -> Self {
        self.feeds
            .lock()
            .expect("feeds lock")
            .insert(url.to_string(), feed);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().expect("fetched lock").clone()
    }
}

#[async_trait]
impl FeedFetcher for FakeFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        self.fetched
            .lock()
            .expect("fetched lock")
            .push(url.to_string());

        self.feeds
            .lock()
            .expect("feeds lock")
            .get(url)
            .cloned()
            .ok_or(FeedError::HttpStatus { status: 404 })
    }
}
