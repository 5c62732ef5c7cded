// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Torrent client side
// ============================================================================

/// Destination and priority fields copied verbatim from an existing job onto a
/// newly submitted one. The matching engine never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSettings {
    pub download_dir: Option<String>,
    pub bandwidth_priority: Option<i64>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A torrent as reported by the torrent client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentJob {
    pub id: i64,
    pub name: String,
    pub added_at: DateTime<Utc>,
    pub placement: PlacementSettings,
}

impl TorrentJob {
    pub fn new(id: i64, name: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            added_at,
            placement: PlacementSettings::default(),
        }
    }

    pub fn with_placement(mut self, placement: PlacementSettings) -> Self {
        self.placement = placement;
        self
    }
}

/// What the torrent client did with a submitted source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddOutcome {
    Added,
    /// The client already had this torrent and ignored the request.
    Duplicate,
}

// ============================================================================
// Feed side
// ============================================================================

/// One entry of a syndication feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    /// `None` when the feed omitted the date or it could not be parsed.
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            title: title.into(),
            link: Some(link.into()),
            published,
        }
    }

    /// True when the item was published strictly before `cutoff`.
    /// Undated items are always considered older than any cutoff.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        match self.published {
            Some(published) => published < cutoff,
            None => true,
        }
    }
}

/// A fetched feed, items in the order the source returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

impl Feed {
    /// Channel title when present, otherwise the given fallback (usually the URL).
    pub fn display_title<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(fallback)
    }
}
