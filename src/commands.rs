//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use clap::ValueEnum;
use tracing::debug;

use crate::Result;
use crate::config::Config;
use crate::directory::TrackedRepository;
use crate::output;
use crate::snapshot::{Snapshot, SnapshotBuilder, SnapshotCache, SnapshotSource};

/// Default file written by `config init`
pub const DEFAULT_CONFIG_FILE: &str = "buildboard.yaml";

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// Machine-readable JSON output
    Json,
}

fn print(snapshot: &Snapshot, config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::json(snapshot),
        OutputFormat::Text => {
            let staleness = TimeDelta::hours(config.artifacts.staleness_hours);
            output::snapshot(snapshot, Utc::now(), staleness);
            Ok(())
        }
    }
}

/// Run one refresh and print the result
pub async fn snapshot(config: &Config, format: OutputFormat) -> Result<()> {
    let builder = SnapshotBuilder::from_config(config)?;

    let spinner = (format == OutputFormat::Text).then(|| {
        output::spinner(&format!(
            "Refreshing {} repositories",
            builder.directory().len()
        ))
    });
    let result = builder.build(Utc::now()).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    print(&result?, config, format)
}

/// Poll through the snapshot cache, printing each new snapshot
pub async fn watch(
    config: &Config,
    interval_secs: u64,
    force_refresh: bool,
    format: OutputFormat,
) -> Result<()> {
    let builder = SnapshotBuilder::from_config(config)?;
    let cache = SnapshotCache::new(
        Arc::new(builder),
        TimeDelta::seconds(config.cache.ttl_secs),
    );

    if format == OutputFormat::Text {
        output::info(&format!(
            "Watching every {}s (cache TTL {}s). Press Ctrl-C to stop.",
            interval_secs, config.cache.ttl_secs
        ));
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut last_captured: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                return Ok(());
            }
        }

        if force_refresh {
            cache.invalidate().await;
        }

        match cache.get().await {
            Ok(snapshot) if last_captured != Some(snapshot.captured_at) => {
                last_captured = Some(snapshot.captured_at);
                print(&snapshot, config, format)?;
            }
            Ok(_) => debug!("Snapshot unchanged"),
            Err(e) => {
                last_captured = None;
                output::error(&format!("No data available: {}", e));
            }
        }
    }
}

/// Show current effective configuration
pub async fn config_show(config: &Config, format: OutputFormat) -> Result<()> {
    let mut shown = config.clone();
    if shown.api.token.is_some() {
        shown.api.token = Some("********".to_string());
    }

    match format {
        OutputFormat::Json => output::json(&shown),
        OutputFormat::Text => {
            println!("{}", serde_yaml::to_string(&shown)?);
            Ok(())
        }
    }
}

/// Write a starter configuration file
pub async fn config_init(output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    write_starter_config(&path)?;
    output::success(&format!("Wrote configuration to {}", path.display()));
    Ok(())
}

fn starter_config() -> Config {
    Config {
        repositories: vec![
            TrackedRepository::new("redox-os/kernel", "master").with_packages(["kernel"]),
            TrackedRepository::new("redox-os/relibc", "master").with_packages(["relibc"]),
        ],
        ..Config::default()
    }
}

fn write_starter_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(crate::Error::Config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(&starter_config())?,
        _ => serde_yaml::to_string(&starter_config())?,
    };
    std::fs::write(path, content)?;
    Ok(())
}
