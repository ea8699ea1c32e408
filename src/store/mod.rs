//! Persistence for acquired content.
//!
//! Two layers with a strict ownership split:
//! - `files`: date-partitioned directories holding the authoritative bytes
//! - `index`: a derived SQLite index for search and fast lookups
//!
//! The filesystem is always the source of truth. The index can be dropped
//! and rebuilt from the files at any time.

pub mod files;
pub mod index;

pub use files::{FileStore, ItemFilter, StoreStats};
pub use index::{IndexManager, IndexStats, RebuildReport, SearchHit};
