// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Bracketed group tag, the series name, then ` - ` and an episode number,
/// e.g. `[Group] Some Show - 07 [1080p].mkv`.
pub const DEFAULT_SERIES_PATTERN: &str = r"\[[\w\d\-_ ]+\] ?(.+) - \d+";

lazy_static! {
    static ref DEFAULT_REGEX: Regex =
        Regex::new(DEFAULT_SERIES_PATTERN).expect("valid default series regex");
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern `{pattern}` does not compile: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("pattern `{0}` has no capturing group for the series name")]
    NoCaptureGroup(String),
}

/// A compiled title pattern whose first capturing group names the series.
#[derive(Clone)]
pub struct SeriesPattern {
    regex: Regex,
}

impl SeriesPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Compile {
            pattern: pattern.to_string(),
            source,
        })?;

        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 2 {
            return Err(PatternError::NoCaptureGroup(pattern.to_string()));
        }

        Ok(Self { regex })
    }

    /// Compile `pattern` if it is set and non-blank, otherwise use the default.
    pub fn or_default(pattern: Option<&str>) -> Result<Self, PatternError> {
        match pattern.map(str::trim).filter(|p| !p.is_empty()) {
            Some(pattern) => Self::new(pattern),
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn extract<'t>(&self, title: &'t str) -> Option<&'t str> {
        extract_series(title, &self.regex)
    }
}

impl Default for SeriesPattern {
    fn default() -> Self {
        Self {
            regex: DEFAULT_REGEX.clone(),
        }
    }
}

impl PartialEq for SeriesPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for SeriesPattern {}

impl fmt::Debug for SeriesPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SeriesPattern").field(&self.as_str()).finish()
    }
}

/// Series identifier of `title`: the text of the first capturing group.
///
/// Returns `None` when the pattern does not match, has no capturing group, or
/// the group did not participate or captured nothing.
pub fn extract_series<'t>(title: &'t str, regex: &Regex) -> Option<&'t str> {
    regex
        .captures(title)?
        .get(1)
        .map(|group| group.as_str())
        .filter(|series| !series.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_extracts_name_between_tag_and_episode() {
        let pattern = SeriesPattern::default();

        assert_eq!(pattern.extract("[Tag] Show - 01"), Some("Show"));
        assert_eq!(
            pattern.extract("[Sub-Group] Long Show Name - 12 [1080p].mkv"),
            Some("Long Show Name")
        );
        assert_eq!(pattern.extract("[Tag]Tight - 3"), Some("Tight"));
    }

    #[test]
    fn default_pattern_rejects_untagged_titles() {
        let pattern = SeriesPattern::default();

        assert_eq!(pattern.extract("Show - 01"), None);
        assert_eq!(pattern.extract("[Tag] Show episode one"), None);
        assert_eq!(pattern.extract(""), None);
    }

    #[test]
    fn extract_returns_first_group_exactly() {
        let pattern = SeriesPattern::new(r"^(\S+) S(\d+)E\d+").expect("valid pattern");

        assert_eq!(pattern.extract("Some.Show S02E05 720p"), Some("Some.Show"));
    }

    #[test]
    fn unparticipating_or_empty_group_is_unmatched() {
        let optional = Regex::new(r"^x(a)?").expect("valid regex");
        assert_eq!(extract_series("xyz", &optional), None);

        let empty = Regex::new(r"^\[(\w*)\]").expect("valid regex");
        assert_eq!(extract_series("[] Show - 01", &empty), None);
        assert_eq!(extract_series("[Show] - 01", &empty), Some("Show"));
    }

    #[test]
    fn regex_without_group_never_extracts() {
        let no_group = Regex::new(r"Show - \d+").expect("valid regex");
        assert_eq!(extract_series("[Tag] Show - 01", &no_group), None);
    }

    #[test]
    fn new_rejects_patterns_without_capture_group() {
        let result = SeriesPattern::new(r"Show - \d+");
        assert!(matches!(result, Err(PatternError::NoCaptureGroup(_))));

        // non-capturing groups do not count
        let result = SeriesPattern::new(r"(?:Show) - \d+");
        assert!(matches!(result, Err(PatternError::NoCaptureGroup(_))));
    }

    #[test]
    fn new_rejects_invalid_regex() {
        let result = SeriesPattern::new(r"[unclosed (.+)");
        assert!(matches!(result, Err(PatternError::Compile { .. })));
    }

    #[test]
    fn or_default_uses_default_for_missing_or_blank() {
        let default = SeriesPattern::default();

        assert_eq!(SeriesPattern::or_default(None).expect("default"), default);
        assert_eq!(SeriesPattern::or_default(Some("  ")).expect("default"), default);

        let custom = SeriesPattern::or_default(Some(r"^(.+) #\d+$")).expect("custom");
        assert_eq!(custom.as_str(), r"^(.+) #\d+$");
        assert_eq!(custom.extract("Webcomic #41"), Some("Webcomic"));
    }
}
