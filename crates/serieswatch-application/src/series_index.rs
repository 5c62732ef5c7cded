// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serieswatch_domain::TorrentJob;

use crate::series::SeriesPattern;

/// Latest known torrent per series, keyed by series identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesIndex {
    latest: HashMap<String, TorrentJob>,
}

impl SeriesIndex {
    /// Index `jobs` by the series their name extracts to under `pattern`.
    ///
    /// Jobs whose name does not match are left out. Among jobs of the same
    /// series the one added last wins; on equal `added_at` the first seen stays.
    pub fn build(jobs: &[TorrentJob], pattern: &SeriesPattern) -> Self {
        let mut latest: HashMap<String, TorrentJob> = HashMap::new();

        for job in jobs {
            let Some(series) = pattern.extract(&job.name) else {
                continue;
            };

            match latest.entry(series.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(job.clone());
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().added_at < job.added_at {
                        slot.insert(job.clone());
                    }
                }
            }
        }

        Self { latest }
    }

    pub fn get(&self, series: &str) -> Option<&TorrentJob> {
        self.latest.get(series)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
