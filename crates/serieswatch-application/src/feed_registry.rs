// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use reqwest::Url;
use serieswatch_config::FeedConfig;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::series::{PatternError, SeriesPattern};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("feed `{url}`: {source}")]
    Pattern {
        url: String,
        #[source]
        source: PatternError,
    },
    #[error("feed url `{url}` is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A validated feed: where to fetch it and how to read series names from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub url: String,
    pub pattern: SeriesPattern,
}

/// The active list of feed sources.
///
/// A pass holds [`FeedRegistry::lock`] for its whole run and [`FeedRegistry::replace`]
/// takes the same lock, so a reload waits for the running pass to finish.
pub struct FeedRegistry {
    feeds: Mutex<Arc<Vec<FeedSource>>>,
}

impl FeedRegistry {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self {
            feeds: Mutex::new(Arc::new(sources)),
        }
    }

    pub fn from_config(configs: &[FeedConfig]) -> Result<Self, RegistryError> {
        let sources = Self::validate(configs)?;
        if sources.is_empty() {
            warn!(target: "registry", "no feeds configured");
        }
        Ok(Self::new(sources))
    }

    /// Compile every pattern and check every URL. Any failure rejects the whole list.
    pub fn validate(configs: &[FeedConfig]) -> Result<Vec<FeedSource>, RegistryError> {
        configs
            .iter()
            .map(|config| {
                let url = config.url.trim();
                check_url(url)?;

                let pattern = SeriesPattern::or_default(config.pattern.as_deref()).map_err(
                    |source| RegistryError::Pattern {
                        url: url.to_string(),
                        source,
                    },
                )?;

                Ok(FeedSource {
                    url: url.to_string(),
                    pattern,
                })
            })
            .collect()
    }

    /// Validate `configs` and swap them in. On error the active list is kept.
    pub async fn replace(&self, configs: &[FeedConfig]) -> Result<usize, RegistryError> {
        let sources = Self::validate(configs)?;
        let count = sources.len();

        let mut feeds = self.feeds.lock().await;
        *feeds = Arc::new(sources);
        info!(target: "registry", feeds = count, "feed list replaced");

        Ok(count)
    }

    pub async fn current(&self) -> Arc<Vec<FeedSource>> {
        self.feeds.lock().await.clone()
    }

    /// Exclusive access for the duration of a pass.
    pub async fn lock(&self) -> MutexGuard<'_, Arc<Vec<FeedSource>>> {
        self.feeds.lock().await
    }
}

fn check_url(url: &str) -> Result<(), RegistryError> {
    let parsed = Url::parse(url).map_err(|err| RegistryError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(RegistryError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme `{scheme}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(url: &str, pattern: Option<&str>) -> FeedConfig {
        FeedConfig {
            url: url.to_string(),
            pattern: pattern.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn missing_pattern_uses_default() {
        let registry = FeedRegistry::from_config(&[feed("https://example.org/rss", None)])
            .expect("valid config");

        let current = registry.current().await;
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].pattern, SeriesPattern::default());
    }

    #[tokio::test]
    async fn valid_replace_is_visible_immediately() {
        let registry = FeedRegistry::from_config(&[feed("https://a.example/rss", None)])
            .expect("valid config");

        let count = registry
            .replace(&[
                feed("https://b.example/rss", Some(r"^(.+) - \d+$")),
                feed("https://c.example/rss", None),
            ])
            .await
            .expect("valid replace");

        assert_eq!(count, 2);
        let current = registry.current().await;
        let urls: Vec<&str> = current.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.example/rss", "https://c.example/rss"]);
        assert_eq!(current[0].pattern.as_str(), r"^(.+) - \d+$");
    }

    #[tokio::test]
    async fn invalid_pattern_leaves_list_untouched() {
        let registry = FeedRegistry::from_config(&[feed("https://a.example/rss", None)])
            .expect("valid config");
        let before = registry.current().await;

        let result = registry
            .replace(&[
                feed("https://b.example/rss", None),
                feed("https://c.example/rss", Some("([unclosed")),
            ])
            .await;

        assert!(matches!(result, Err(RegistryError::Pattern { .. })));
        let after = registry.current().await;
        assert_eq!(*before, *after);
        assert_eq!(after[0].url, "https://a.example/rss");
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let result = FeedRegistry::validate(&[feed("https://a.example/rss", Some(r"Show - \d+"))]);
        assert!(matches!(
            result,
            Err(RegistryError::Pattern {
                source: PatternError::NoCaptureGroup(_),
                ..
            })
        ));
    }

    #[test]
    fn bad_urls_are_rejected() {
        assert!(matches!(
            FeedRegistry::validate(&[feed("not a url", None)]),
            Err(RegistryError::InvalidUrl { .. })
        ));
        assert!(matches!(
            FeedRegistry::validate(&[feed("ftp://example.org/rss", None)]),
            Err(RegistryError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn replace_waits_for_held_pass_lock() {
        let registry = Arc::new(
            FeedRegistry::from_config(&[feed("https://a.example/rss", None)])
                .expect("valid config"),
        );

        let guard = registry.lock().await;
        let reload = tokio::spawn({
            let registry = registry.clone();
            async move {
                registry
                    .replace(&[feed("https://b.example/rss", None)])
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reload.is_finished());
        assert_eq!(guard[0].url, "https://a.example/rss");

        drop(guard);
        reload.await.expect("reload task").expect("valid replace");
        assert_eq!(registry.current().await[0].url, "https://b.example/rss");
    }
}
