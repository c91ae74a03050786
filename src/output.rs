//! Output formatting utilities

use chrono::{DateTime, TimeDelta, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::artifacts::ArtifactIndexEntry;
use crate::reconcile::{PackageReconciliation, SyncState};
use crate::snapshot::{PlatformSnapshot, Snapshot};

/// Create a spinner for indeterminate operations
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("[OK]").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("[WARN]").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("[INFO]").blue().bold(), message);
}

/// Print a table
pub fn table<T: Tabled>(items: &[T], title: Option<&str>) {
    if let Some(t) = title {
        println!("\n{}\n", style(t).bold());
    }

    if items.is_empty() {
        println!("{}", style("  (no items)").dim());
    } else {
        let table = Table::new(items);
        println!("{}", table);
    }
}

/// Print any serializable value as pretty JSON
pub fn json<T: Serialize>(value: &T) -> crate::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line of the repository table
#[derive(Debug, Tabled)]
pub struct RepositoryRow {
    /// Tracked path
    #[tabled(rename = "Repository")]
    pub repository: String,
    /// Latest pipeline state
    #[tabled(rename = "Pipeline")]
    pub pipeline: String,
    /// Latest commit short hash
    #[tabled(rename = "Commit")]
    pub commit: String,
    /// Latest commit title
    #[tabled(rename = "Message")]
    pub message: String,
}

impl RepositoryRow {
    /// Rows for every resolved repository, in tracked order
    pub fn from_snapshot(snapshot: &Snapshot) -> Vec<Self> {
        snapshot
            .repositories
            .iter()
            .map(|repo| Self {
                repository: repo.path.clone(),
                pipeline: repo.pipeline_state.to_string(),
                commit: repo.short_commit().to_string(),
                message: repo
                    .latest_commit
                    .as_ref()
                    .map(|c| truncate(&c.message, 60))
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// One line of a platform's package table
#[derive(Debug, Tabled)]
pub struct PackageRow {
    /// Package name
    #[tabled(rename = "Package")]
    pub package: String,
    /// Owning repository
    #[tabled(rename = "Repository")]
    pub repository: String,
    /// Commit the published package was built from
    #[tabled(rename = "Built")]
    pub built: String,
    /// Repository's latest commit
    #[tabled(rename = "Latest")]
    pub latest: String,
    /// Classification
    #[tabled(rename = "State")]
    pub state: SyncState,
}

impl From<&PackageReconciliation> for PackageRow {
    fn from(package: &PackageReconciliation) -> Self {
        Self {
            package: package.package_name.clone(),
            repository: package.repository.path.clone(),
            built: package.built_commit().to_string(),
            latest: package.latest_commit().to_string(),
            state: package.sync_state,
        }
    }
}

/// Print a snapshot as text tables
pub fn snapshot(snapshot: &Snapshot, now: DateTime<Utc>, staleness: TimeDelta) {
    println!(
        "{} captured {} ({} ago)",
        style("Snapshot").bold(),
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_age(snapshot.age(now))
    );

    table(&RepositoryRow::from_snapshot(snapshot), Some("Repositories"));

    if snapshot.platforms.is_empty() {
        warning("No platform listings available");
    }

    for platform in &snapshot.platforms {
        platform_section(platform, now, staleness);
    }
}

fn platform_section(platform: &PlatformSnapshot, now: DateTime<Utc>, staleness: TimeDelta) {
    let summary = platform.summary();
    println!(
        "\n{}  {} synced, {} pending, {} outdated",
        style(&platform.platform).cyan().bold(),
        style(summary.synced).green(),
        style(summary.pending).yellow(),
        style(summary.outdated).red()
    );
    println!(
        "  packages: {}",
        index_line(platform.package_index.as_ref(), now, staleness)
    );
    println!(
        "  images:   {}",
        index_line(platform.image_index.as_ref(), now, staleness)
    );

    let rows: Vec<PackageRow> = platform.packages.iter().map(PackageRow::from).collect();
    table(&rows, None);
}

fn index_line(entry: Option<&ArtifactIndexEntry>, now: DateTime<Utc>, staleness: TimeDelta) -> String {
    match entry {
        Some(entry) => {
            let age = format!("{} ago", format_age(entry.age(now)));
            let age = if entry.is_stale(now, staleness) {
                style(format!("{age}, stale")).red().to_string()
            } else {
                age
            };
            format!("{} ({})", entry.name, age)
        }
        None => style("not published").dim().to_string(),
    }
}

/// Compact human-readable duration, e.g. `2d 3h`, `4h 10m`, `7m`
pub fn format_age(age: TimeDelta) -> String {
    let minutes = age.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes / 60) % 24, minutes % 60);

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
