// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use serieswatch_application::AppState;
use serieswatch_config::{load as load_config, resolve_config_path, AppConfig, TelemetryConfig};
use serieswatch_scheduler::jobs::ConfigReloadJob;
use serieswatch_scheduler::Scheduler;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "serieswatch")]
#[command(version)]
#[command(about = "Adds new episodes of series already in Transmission as they appear in feeds")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SERIESWATCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, config) = load_with_bootstrap_logging(cli.config.as_deref())?;
    init_tracing(&config.telemetry);

    let state = AppState::new(config)?;
    state.on_start().await;

    if cli.once {
        let summary = state.pass.run().await;
        info!(target: "cli", submitted = summary.submitted, "single pass finished");
        return Ok(());
    }

    let scheduler = Scheduler::new(state, &config_path);
    let reload = scheduler.register_jobs().await;
    let scheduler_handle = scheduler.start();

    run_until_shutdown(reload).await?;
    scheduler_handle.abort();

    Ok(())
}

/// Find and load the configuration file. The configured subscriber does not
/// exist yet, so a temporary stderr one filtered by `RUST_LOG` (default `info`)
/// records what the config loader logs.
fn load_with_bootstrap_logging(explicit: Option<&Path>) -> Result<(PathBuf, AppConfig)> {
    let bootstrap = fmt::Subscriber::builder()
        .with_env_filter(env_filter("info"))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::with_default(bootstrap, || {
        let config_path = resolve_config_path(explicit).ok_or_else(|| {
            anyhow!(
                "no configuration file found; pass --config or create ./{}",
                serieswatch_config::CONFIG_FILE_NAME
            )
        })?;
        let config = load_config(&config_path)?;
        Ok((config_path, config))
    })
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let env_filter = env_filter(&telemetry.log_level);
    let registry = tracing_subscriber::registry().with(env_filter);

    if telemetry.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

/// `RUST_LOG` wins; otherwise the configured level, falling back to `info` when it does not parse.
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Wait for SIGINT/SIGTERM. SIGHUP reloads the feed list and keeps running.
async fn run_until_shutdown(reload: ConfigReloadJob) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;

        loop {
            tokio::select! {
                _ = interrupt.recv() => break,
                _ = terminate.recv() => break,
                _ = hangup.recv() => {
                    info!(target: "cli", "SIGHUP received");
                    spawn_reload(&reload);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = &reload;
        tokio::signal::ctrl_c().await?;
    }

    info!(target: "cli", "shutdown signal received");
    Ok(())
}

/// Reload in the background: `replace` waits for a running pass, and signals
/// must keep being handled meanwhile. Failures are logged by the reload job
/// and leave the old feeds active.
fn spawn_reload(reload: &ConfigReloadJob) -> JoinHandle<()> {
    let reload = reload.clone();
    tokio::spawn(async move {
        let _ = reload.reload_now().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_config_and_once() {
        let cli = Cli::try_parse_from(["serieswatch", "--config", "/etc/serieswatch.toml", "--once"])
            .expect("valid args");

        assert_eq!(cli.config, Some(PathBuf::from("/etc/serieswatch.toml")));
        assert!(cli.once);
    }

    #[test]
    fn cli_defaults_to_daemon_mode() {
        let cli = Cli::try_parse_from(["serieswatch", "-c", "x.toml"]).expect("valid args");
        assert!(!cli.once);
    }

    #[test]
    fn configured_level_used_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(env_filter("debug").to_string(), "debug");
        }
    }

    #[test]
    fn bootstrap_load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");

        let result = load_with_bootstrap_logging(Some(&missing));

        assert!(result.is_err());
    }

    #[test]
    fn bootstrap_load_returns_resolved_path_and_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("serieswatch.toml");
        std::fs::write(&path, "[[feeds]]\nurl = \"https://a.example/rss\"\n").expect("write config");

        let (resolved, config) = load_with_bootstrap_logging(Some(&path)).expect("config loads");

        assert_eq!(resolved, path);
        assert_eq!(config.feeds.len(), 1);
    }

    #[tokio::test]
    async fn reload_does_not_wait_for_a_running_pass() {
        use serieswatch_application::FeedRegistry;
        use serieswatch_config::FeedConfig;
        use std::sync::Arc;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("serieswatch.toml");
        std::fs::write(&path, "[[feeds]]\nurl = \"https://b.example/rss\"\n").expect("write config");

        let registry = Arc::new(
            FeedRegistry::from_config(&[FeedConfig {
                url: "https://a.example/rss".to_string(),
                pattern: None,
            }])
            .expect("valid feeds"),
        );
        let reload = ConfigReloadJob::new(&path, registry.clone());

        let pass_guard = registry.lock().await;
        let handle = spawn_reload(&reload);
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());
        assert_eq!(pass_guard[0].url, "https://a.example/rss");
        drop(pass_guard);

        handle.await.expect("reload task");
        assert_eq!(registry.current().await[0].url, "https://b.example/rss");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_signal_kinds_available() {
        use tokio::signal::unix::SignalKind;
        let _ = SignalKind::interrupt();
        let _ = SignalKind::terminate();
        let _ = SignalKind::hangup();
    }
}
