//! Core orchestration logic.
//!
//! This module contains:
//! - Pipeline: URL ingestion orchestration and retry policy
//! - Skiplist: non-content URL filtering

pub mod pipeline;
pub mod skiplist;

// Re-export commonly used types
pub use pipeline::{ContentPipeline, PipelineStats, RetryPolicy};
pub use skiplist::SkipList;
