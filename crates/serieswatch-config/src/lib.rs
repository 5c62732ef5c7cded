// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "serieswatch.toml";
pub const CONFIG_PATH_ENV: &str = "SERIESWATCH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_minutes: u64,
    pub max_feed_age_days: u32,
    pub job_cache_seconds: u64,
    pub feed_timeout_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 10,
            max_feed_age_days: 14,
            job_cache_seconds: 60,
            feed_timeout_seconds: 30,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }

    pub fn max_feed_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_feed_age_days) * 24 * 60 * 60)
    }

    pub fn job_cache_window(&self) -> Duration {
        Duration::from_secs(self.job_cache_seconds)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub rpc_path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9091,
            ssl: false,
            rpc_path: "/transmission/rpc".to_string(),
            username: None,
            password: None,
            timeout_seconds: 30,
        }
    }
}

impl TransmissionConfig {
    /// Full RPC endpoint, e.g. `http://localhost:9091/transmission/rpc`.
    pub fn rpc_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let path = if self.rpc_path.starts_with('/') {
            self.rpc_path.clone()
        } else {
            format!("/{}", self.rpc_path)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadConfig {
    pub enabled: bool,
    pub poll_seconds: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_seconds: 5,
        }
    }
}

/// One configured feed. `pattern` falls back to the built-in default when
/// absent or blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub poll: PollConfig,
    pub transmission: TransmissionConfig,
    pub telemetry: TelemetryConfig,
    pub reload: ReloadConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl AppConfig {
    /// Sections that differ from `other` and only take effect after a restart.
    pub fn restart_sections(&self, other: &AppConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.poll != other.poll {
            changed.push("poll");
        }
        if self.transmission != other.transmission {
            changed.push("transmission");
        }
        if self.telemetry != other.telemetry {
            changed.push("telemetry");
        }
        if self.reload != other.reload {
            changed.push("reload");
        }
        changed
    }
}

/// Load configuration from defaults, the TOML file, and environment overrides (prefix: SERIESWATCH_).
pub fn load(config_path: &Path) -> Result<AppConfig> {
    if !config_path.is_file() {
        bail!("configuration file {} not found", config_path.display());
    }

    let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("SERIESWATCH_").split("__").ignore(&["config"]))
        .extract()?;

    info!(
        target: "config",
        path = %config_path.display(),
        feeds = config.feeds.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Pick the configuration file: explicit path, then `SERIESWATCH_CONFIG`, then the
/// first existing of `./serieswatch.toml`, `$XDG_CONFIG_HOME/serieswatch/serieswatch.toml`
/// and `$HOME/.config/serieswatch/serieswatch.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }

    candidate_paths().into_iter().find(|candidate| {
        let exists = candidate.is_file();
        debug!(target: "config", path = %candidate.display(), exists, "probing config path");
        exists
    })
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(xdg).join("serieswatch").join(CONFIG_FILE_NAME));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        candidates.push(
            PathBuf::from(home)
                .join(".config")
                .join("serieswatch")
                .join(CONFIG_FILE_NAME),
        );
    }

    candidates
}
