// SPDX-License-Identifier: GPL-3.0-or-later
pub mod feed_registry;
pub mod feeds;
pub mod pass;
pub mod series;
pub mod series_index;
pub mod snapshot_cache;
pub mod torrent_client;
#[cfg(test)]
mod testing;

pub use feed_registry::{FeedRegistry, FeedSource, RegistryError};
pub use feeds::{parse_feed, FeedError, FeedFetcher, HttpFeedFetcher};
pub use pass::{evaluate, Decision, FeedPass, PassSummary};
pub use series::{extract_series, PatternError, SeriesPattern, DEFAULT_SERIES_PATTERN};
pub use series_index::SeriesIndex;
pub use snapshot_cache::JobSnapshotCache;
pub use torrent_client::{TorrentClient, TorrentClientError, TransmissionClient};

use std::sync::Arc;

use anyhow::{Context, Result};
use serieswatch_config::AppConfig;
use tracing::{info, warn};

/// Everything a running daemon needs, wired from the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<FeedRegistry>,
    pub transmission: Arc<TransmissionClient>,
    pub pass: Arc<FeedPass>,
}

impl AppState {
    /// Validate the feeds and build the collaborators. Errors here are fatal.
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = Arc::new(
            FeedRegistry::from_config(&config.feeds).context("invalid feed configuration")?,
        );
        let transmission = Arc::new(
            TransmissionClient::from_config(&config.transmission)
                .context("cannot create transmission client")?,
        );
        let fetcher = Arc::new(
            HttpFeedFetcher::new(config.poll.feed_timeout()).context("cannot create feed client")?,
        );

        let pass = Arc::new(FeedPass::new(
            registry.clone(),
            fetcher,
            transmission.clone(),
            config.poll.job_cache_window(),
            config.poll.max_feed_age(),
        ));

        Ok(Self {
            config,
            registry,
            transmission,
            pass,
        })
    }

    /// Log which daemon we talk to. An unreachable client is not fatal: each pass retries.
    pub async fn on_start(&self) {
        match self.transmission.session_version().await {
            Ok(version) => info!(
                target: "application",
                rpc = %self.transmission.rpc_url(),
                version = version.as_deref().unwrap_or("unknown"),
                "connected to transmission"
            ),
            Err(err) => warn!(
                target: "application",
                rpc = %self.transmission.rpc_url(),
                error = %err,
                "transmission is not reachable yet"
            ),
        }
    }
}
