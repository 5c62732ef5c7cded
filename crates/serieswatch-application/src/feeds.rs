// SPDX-License-Identifier: GPL-3.0-or-later
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use serieswatch_domain::{Feed, FeedItem};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("serieswatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("feed responded with status {status}")]
    HttpStatus { status: u16 },
    #[error("feed parse error: {0}")]
    Parse(String),
}

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url`. Items keep the source's order.
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError>;
}

/// Fetches RSS 2.0 or Atom feeds over HTTP.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Parse an RSS 2.0 document, falling back to Atom.
pub fn parse_feed(xml: &str) -> Result<Feed, FeedError> {
    let rss_error = match from_str::<RssEnvelope>(xml) {
        Ok(envelope) => return Ok(envelope.into_feed()),
        Err(error) => error,
    };

    match from_str::<AtomFeed>(xml) {
        Ok(feed) if !feed.entries.is_empty() || feed.title.is_some() => Ok(feed.into_feed()),
        Ok(_) | Err(_) => Err(FeedError::Parse(rss_error.to_string())),
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    debug!(target: "feeds", %value, "unparsable feed timestamp");
    None
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct RssEnvelope {
    channel: RssChannel,
}

impl RssEnvelope {
    fn into_feed(self) -> Feed {
        Feed {
            title: non_blank(self.channel.title),
            items: self
                .channel
                .items
                .into_iter()
                .map(|item| FeedItem {
                    title: item.title.trim().to_string(),
                    published: parse_timestamp(item.pub_date.as_deref()),
                    link: non_blank(item.link)
                        .or_else(|| item.enclosure.and_then(|e| non_blank(e.url))),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssRawItem>,
}

#[derive(Debug, Deserialize)]
struct RssRawItem {
    #[serde(default)]
    title: String,
    link: Option<String>,
    enclosure: Option<RssEnclosure>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssEnclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<AtomText>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

impl AtomFeed {
    fn into_feed(self) -> Feed {
        Feed {
            title: non_blank(self.title.map(|t| t.value)),
            items: self
                .entries
                .into_iter()
                .map(|entry| {
                    let published = parse_timestamp(
                        entry.published.as_deref().or(entry.updated.as_deref()),
                    );
                    FeedItem {
                        title: entry
                            .title
                            .map(|t| t.value.trim().to_string())
                            .unwrap_or_default(),
                        link: preferred_link(entry.links),
                        published,
                    }
                })
                .collect(),
        }
    }
}

/// `rel="enclosure"` first (the downloadable payload), then `rel="alternate"`
/// or no rel, then anything else with an href.
fn preferred_link(links: Vec<AtomLink>) -> Option<String> {
    let rank = |link: &AtomLink| match link.rel.as_deref() {
        Some("enclosure") => 0,
        None | Some("alternate") => 1,
        Some(_) => 2,
    };

    links
        .into_iter()
        .filter_map(|link| {
            let rank = rank(&link);
            non_blank(link.href).map(|href| (rank, href))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, href)| href)
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}
