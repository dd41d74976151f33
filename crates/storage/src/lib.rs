//! Catalog and resource caching for the grid tile service.
//!
//! - [`Catalog`]: SQLite index of grid files and their valid times
//! - [`Indexer`]: directory sweep keeping the catalog current
//! - [`ResourceCache`]: bounded cache of opened grid handles and value ranges

pub mod catalog;
pub mod extract;
pub mod indexer;
pub mod resource_cache;

pub use catalog::{Catalog, DatasetRecord, ResolvedDataset};
pub use extract::{extract_metadata, ExtractedMetadata, FileStat, TimeSource};
pub use indexer::{Indexer, ReindexReport};
pub use resource_cache::{ResourceCache, ResourceCacheConfig, ResourceCacheStats};
