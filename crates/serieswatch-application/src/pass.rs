// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serieswatch_domain::{AddOutcome, FeedItem, TorrentJob};
use tracing::{debug, error, info, warn};

use crate::feed_registry::{FeedRegistry, FeedSource};
use crate::feeds::FeedFetcher;
use crate::series::SeriesPattern;
use crate::series_index::SeriesIndex;
use crate::snapshot_cache::JobSnapshotCache;
use crate::torrent_client::TorrentClient;

pub const DEFAULT_MAX_FEED_AGE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// What to do with one feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Published before the cutoff (or undated): stop reading this feed.
    PastCutoff,
    /// No known torrent for this series.
    Untracked,
    /// The latest known torrent was added at or after the item's publication.
    AlreadyHave { previous: &'a TorrentJob },
    /// Would be submitted, but the item has nothing to submit.
    MissingLink { previous: &'a TorrentJob },
    Submit {
        previous: &'a TorrentJob,
        link: &'a str,
    },
}

/// Decide on `item` against the series index of its feed.
pub fn evaluate<'a>(
    item: &'a FeedItem,
    cutoff: DateTime<Utc>,
    index: &'a SeriesIndex,
    pattern: &SeriesPattern,
) -> Decision<'a> {
    if item.is_older_than(cutoff) {
        return Decision::PastCutoff;
    }
    let Some(published) = item.published else {
        return Decision::PastCutoff;
    };

    let Some(previous) = pattern
        .extract(&item.title)
        .and_then(|series| index.get(series))
    else {
        return Decision::Untracked;
    };

    if previous.added_at >= published {
        return Decision::AlreadyHave { previous };
    }

    match item.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(link) => Decision::Submit { previous, link },
        None => Decision::MissingLink { previous },
    }
}

/// Counters for one pass, logged when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sources: usize,
    pub fetch_failures: usize,
    pub snapshot_failures: usize,
    pub items_seen: usize,
    pub skipped_untracked: usize,
    pub skipped_not_newer: usize,
    pub skipped_no_link: usize,
    pub submitted: usize,
    pub duplicates: usize,
    pub submit_failures: usize,
}

/// Runs one polling pass over every registered feed.
pub struct FeedPass {
    registry: Arc<FeedRegistry>,
    fetcher: Arc<dyn FeedFetcher>,
    client: Arc<dyn TorrentClient>,
    snapshots: JobSnapshotCache,
    max_age: chrono::Duration,
}

impl FeedPass {
    pub fn new(
        registry: Arc<FeedRegistry>,
        fetcher: Arc<dyn FeedFetcher>,
        client: Arc<dyn TorrentClient>,
        cache_window: Duration,
        max_age: Duration,
    ) -> Self {
        let snapshots = JobSnapshotCache::new(client.clone(), cache_window);
        debug!(target: "pass", cache_window = ?snapshots.window(), ?max_age, "feed pass configured");

        Self {
            registry,
            fetcher,
            snapshots,
            client,
            max_age: chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub fn registry(&self) -> &Arc<FeedRegistry> {
        &self.registry
    }

    pub async fn run(&self) -> PassSummary {
        self.run_at(Utc::now()).await
    }

    /// Run a pass as if the current time were `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> PassSummary {
        // held for the whole pass so a reload cannot interleave
        let feeds = self.registry.lock().await;
        let cutoff = now
            .checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut summary = PassSummary {
            sources: feeds.len(),
            ..PassSummary::default()
        };
        info!(target: "pass", feeds = feeds.len(), %cutoff, "starting pass");

        for source in feeds.iter() {
            self.process_source(source, cutoff, &mut summary).await;
        }

        info!(
            target: "pass",
            sources = summary.sources,
            items = summary.items_seen,
            submitted = summary.submitted,
            duplicates = summary.duplicates,
            fetch_failures = summary.fetch_failures,
            snapshot_failures = summary.snapshot_failures,
            submit_failures = summary.submit_failures,
            "pass finished"
        );
        summary
    }

    async fn process_source(
        &self,
        source: &FeedSource,
        cutoff: DateTime<Utc>,
        summary: &mut PassSummary,
    ) {
        let feed = match self.fetcher.fetch(&source.url).await {
            Ok(feed) => feed,
            Err(err) => {
                warn!(target: "pass", url = %source.url, error = %err, "could not fetch feed");
                summary.fetch_failures += 1;
                return;
            }
        };

        info!(
            target: "pass",
            feed = %feed.display_title(&source.url),
            items = feed.items.len(),
            "parsing feed"
        );

        let jobs = match self.snapshots.current_jobs().await {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(
                    target: "pass",
                    url = %source.url,
                    error = %err,
                    "could not list torrents, skipping feed"
                );
                summary.snapshot_failures += 1;
                return;
            }
        };
        let index = SeriesIndex::build(&jobs, &source.pattern);
        if index.is_empty() {
            debug!(target: "pass", url = %source.url, "no torrents match this feed's pattern");
        } else {
            debug!(target: "pass", url = %source.url, series = index.len(), "series index built");
        }

        for item in &feed.items {
            match evaluate(item, cutoff, &index, &source.pattern) {
                Decision::PastCutoff => {
                    debug!(target: "pass", title = %item.title, "reached items past the cutoff");
                    break;
                }
                Decision::Untracked => {
                    summary.items_seen += 1;
                    summary.skipped_untracked += 1;
                }
                Decision::AlreadyHave { previous } => {
                    summary.items_seen += 1;
                    summary.skipped_not_newer += 1;
                    debug!(
                        target: "pass",
                        title = %item.title,
                        latest = %previous.name,
                        "already have this or a newer one"
                    );
                }
                Decision::MissingLink { .. } => {
                    summary.items_seen += 1;
                    summary.skipped_no_link += 1;
                    warn!(target: "pass", title = %item.title, "matching item has no link");
                }
                Decision::Submit { previous, link } => {
                    summary.items_seen += 1;
                    self.submit(item, previous, link, summary).await;
                }
            }
        }
    }

    async fn submit(
        &self,
        item: &FeedItem,
        previous: &TorrentJob,
        link: &str,
        summary: &mut PassSummary,
    ) {
        match self.client.add_job(link, &previous.placement).await {
            Ok(AddOutcome::Added) => {
                summary.submitted += 1;
                info!(target: "pass", title = %item.title, after = %previous.name, "added");
            }
            Ok(AddOutcome::Duplicate) => {
                summary.duplicates += 1;
                info!(target: "pass", title = %item.title, "torrent client already has it");
            }
            Err(err) => {
                summary.submit_failures += 1;
                error!(target: "pass", title = %item.title, error = %err, "error adding");
            }
        }
    }
}
