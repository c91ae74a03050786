//! Published artifact discovery.
//!
//! Packages and disk images live on a static file server. Each artifact class
//! has a directory listing with one folder per platform; package folders also
//! hold one TOML descriptor per package plus a `repo.toml` summary.

pub mod descriptor;
pub mod error;
pub mod host;
pub mod index;

pub use descriptor::{
    DescriptorFetcher, DescriptorLookup, PackageDescriptor, RepositoryDescriptor,
    parse_timestamp,
};
pub use error::{ArtifactError, Result};
pub use host::{ArtifactHost, HttpArtifactHost, join_url};
pub use index::{ArtifactIndexEntry, ArtifactIndexParser, ListingRow, parse_rows};
