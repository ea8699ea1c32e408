//! packrat - Content acquisition and storage engine
//!
//! Fetches web content through an escalating cascade of retrieval
//! strategies, stores it in a date-partitioned file tree, and maintains a
//! rebuildable SQLite index for lookup and full-text search.
//!
//! # Architecture
//!
//! The system is built around a single source of truth:
//! - Files on disk are authoritative; the index is derived and disposable
//! - Content ids are deterministic (sha256 of the normalized URL)
//! - Every accepted URL ends as a stored item, failed fetches included
//!
//! # Modules
//!
//! - `domain`: Data structures (ContentItem, ContentType, URL identity)
//! - `fetch`: The fetch cascade and its retrieval strategies
//! - `store`: FileStore (authoritative) and IndexManager (derived)
//! - `core`: Pipeline orchestration, retry policy, skip filter
//! - `config`: Layered configuration (file, environment, defaults)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Ingest a URL
//! packrat add https://example.com/article
//!
//! # Search stored content
//! packrat search "distributed consensus"
//!
//! # Rebuild the index from the files on disk
//! packrat rebuild
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod fetch;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::ResolvedConfig;
pub use core::{ContentPipeline, PipelineStats, RetryPolicy, SkipList};
pub use domain::{ContentItem, ContentType, ItemStatus, SourceType};
pub use fetch::{FetchCascade, FetchConfig, FetchError, FetchMethod, FetchOutcome, FetchStrategy};
pub use store::{FileStore, IndexManager, ItemFilter, SearchHit, StoreStats};
