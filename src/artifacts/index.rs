//! Directory listing parser.
//!
//! The artifact host serves Apache-style autoindex pages. Each directory row
//! carries a folder icon, an anchor whose href and text are the entry name,
//! and a right-aligned `YYYY-MM-DD HH:MM` modification time. We only read
//! those three cells; everything else on the page is ignored.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::host::join_url;

static ROW_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<tr[\s>]").expect("row split regex"));

static DIR_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<img[^>]*src="[^"]*folder[^"]*"[^>]*>.*?<a\s+href="([^"]+)"[^>]*>([^<]+)</a>.*?<td[^>]*align="right"[^>]*>([^<]*)</td>"#,
    )
    .expect("directory row regex")
});

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One directory row as it appears in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Link target, relative to the listing.
    pub href: String,
    /// Displayed entry name, without trailing slash.
    pub name: String,
    /// Modification time as printed, in the server's local time.
    pub last_modified: NaiveDateTime,
}

/// The listing entry selected for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIndexEntry {
    /// Platform token the entry was selected for.
    pub platform: String,
    /// Entry name.
    pub name: String,
    /// Absolute URL of the entry.
    pub url: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl ArtifactIndexEntry {
    /// Time since the entry was last modified.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.last_modified
    }

    /// Whether the entry is older than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        self.age(now) > threshold
    }
}

/// Extract every well-formed directory row, in document order.
///
/// Rows without a folder icon or with an unreadable timestamp are skipped.
pub fn parse_rows(document: &str) -> Vec<ListingRow> {
    ROW_SPLIT_RE
        .split(document)
        .filter_map(|row| {
            let caps = DIR_ROW_RE.captures(row)?;
            let last_modified =
                NaiveDateTime::parse_from_str(caps[3].trim(), TIMESTAMP_FORMAT).ok()?;
            Some(ListingRow {
                href: caps[1].trim().to_string(),
                name: caps[2].trim().trim_end_matches('/').to_string(),
                last_modified,
            })
        })
        .collect()
}

/// Selects the listing entry belonging to a platform.
#[derive(Debug, Clone)]
pub struct ArtifactIndexParser {
    base_url: String,
}

impl ArtifactIndexParser {
    /// Create a parser for listings served at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Listing URL this parser resolves entries against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// First row whose name starts with `platform`, taken literally.
    pub fn find(&self, document: &str, platform: &str) -> Option<ArtifactIndexEntry> {
        parse_rows(document)
            .into_iter()
            .filter(|row| row.name.starts_with(platform))
            .find_map(|row| {
                let last_modified = Local
                    .from_local_datetime(&row.last_modified)
                    .earliest()?
                    .with_timezone(&Utc);
                Some(ArtifactIndexEntry {
                    platform: platform.to_string(),
                    url: join_url(&self.base_url, &row.href),
                    name: row.name,
                    last_modified,
                })
            })
    }
}
