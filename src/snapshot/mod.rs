//! Snapshot assembly and caching.
//!
//! A [`SnapshotBuilder`] runs one refresh cycle: it resolves every tracked
//! repository, reads the package and image listings, downloads descriptors
//! and classifies each package. [`SnapshotCache`] serves the result until
//! its TTL elapses.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use buildboard::config::Config;
//! use buildboard::snapshot::{SnapshotBuilder, SnapshotCache};
//!
//! # async fn example() -> buildboard::Result<()> {
//! let config = Config::from_env();
//! let builder = SnapshotBuilder::from_config(&config)?;
//! let cache = SnapshotCache::new(Arc::new(builder), chrono::TimeDelta::minutes(5));
//!
//! let snapshot = cache.get().await?;
//! for platform in &snapshot.platforms {
//!     println!("{}: {:?}", platform.platform, platform.summary());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod model;

pub use builder::{SnapshotBuilder, SnapshotSource};
pub use cache::{CacheState, SnapshotCache};
pub use model::{PlatformSnapshot, Snapshot, SyncSummary};
