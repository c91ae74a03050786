//! Time-to-live cache in front of a [`SnapshotSource`].
//!
//! The cache is either `Fresh` (a snapshot exists and is younger than the
//! TTL) or `Expired`. Reads in the fresh state return the stored snapshot
//! without touching the network. The first read after expiry runs one
//! refresh; concurrent readers wait for it and share its result.
//!
//! A failed refresh clears the stored snapshot, so the cache stays expired
//! and every caller sees the error instead of stale data.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::builder::SnapshotSource;
use super::model::Snapshot;
use crate::Result;

/// Freshness of the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// A snapshot is stored and within its TTL.
    Fresh,
    /// No snapshot, or its TTL has elapsed.
    Expired,
}

/// Holds the last good snapshot and refreshes it when it expires.
pub struct SnapshotCache {
    source: Arc<dyn SnapshotSource>,
    ttl: TimeDelta,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh: Mutex<()>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new(source: Arc<dyn SnapshotSource>, ttl: TimeDelta) -> Self {
        Self {
            source,
            ttl,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Time a snapshot is served before refreshing.
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Return the current snapshot, refreshing first if it has expired.
    pub async fn get_snapshot(&self, now: DateTime<Utc>) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.fresh(now).await {
            debug!("Serving cached snapshot from {}", snapshot.captured_at);
            return Ok(snapshot);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh(now).await {
            debug!("Snapshot refreshed by a concurrent caller");
            return Ok(snapshot);
        }

        match self.source.build(now).await {
            Ok(mut snapshot) => {
                snapshot.captured_at = now;
                let snapshot = Arc::new(snapshot);
                *self.current.write().await = Some(Arc::clone(&snapshot));
                info!("Snapshot refreshed at {}", now);
                Ok(snapshot)
            }
            Err(e) => {
                *self.current.write().await = None;
                warn!("Snapshot refresh failed: {}", e);
                Err(e)
            }
        }
    }

    /// [`get_snapshot`](Self::get_snapshot) at the current wall-clock time.
    pub async fn get(&self) -> Result<Arc<Snapshot>> {
        self.get_snapshot(Utc::now()).await
    }

    /// Freshness at `now`.
    pub async fn state(&self, now: DateTime<Utc>) -> CacheState {
        if self.fresh(now).await.is_some() {
            CacheState::Fresh
        } else {
            CacheState::Expired
        }
    }

    /// The stored snapshot regardless of age.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }

    /// Drop the stored snapshot so the next read refreshes.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    async fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|snapshot| snapshot.age(now) < self.ttl)
            .cloned()
    }
}
