//! Domain types for the packrat engine.
//!
//! This module contains the core data structures:
//! - Item: the canonical `ContentItem` record and its closed enums
//! - Url: normalization and deterministic identity generation
//! - Detect: URL to content-type classification

pub mod detect;
pub mod item;
pub mod url;

// Re-export commonly used types
pub use detect::ContentTypeDetector;
pub use item::{ContentItem, ContentType, ItemStatus, SourceType};
pub use url::{domain_of, fallback_id, generate_id, normalize_url};
