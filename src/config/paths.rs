//! Canonical paths and file names for the packrat store.
//!
//! Single source of truth - import this instead of hardcoding names.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use packrat::config::paths;
//!
//! let meta = item_dir.join(paths::METADATA_FILE);
//! let body = item_dir.join(paths::CONTENT_FILE);
//! ```

use std::path::PathBuf;

// ============================================================================
// Directory and file names
// ============================================================================

/// Hidden directory name used for both engine state and config discovery
pub const PACKRAT_DIR: &str = ".packrat";

/// Config file name inside [`PACKRAT_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// SQLite index file name under the packrat home
pub const INDEX_FILE: &str = "index.db";

/// Per-item metadata file name
pub const METADATA_FILE: &str = "metadata.json";

/// Per-item extracted content file name
pub const CONTENT_FILE: &str = "content.md";

/// Per-item raw payload subdirectory
pub const RAW_DIR: &str = "raw";

// ============================================================================
// Browser discovery
// ============================================================================

/// Headless browser binaries probed in order when none is configured
pub const BROWSER_BINARIES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
    "google-chrome",
    "brave-browser",
];

// ============================================================================
// Runtime defaults
// ============================================================================

/// Default packrat home (~/.packrat)
pub fn default_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(PACKRAT_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_home_is_hidden() {
        if let Some(home) = default_home() {
            assert!(home.ends_with(PACKRAT_DIR));
        }
    }

    #[test]
    fn test_item_file_names_are_distinct() {
        assert_ne!(METADATA_FILE, CONTENT_FILE);
        assert_ne!(CONTENT_FILE, RAW_DIR);
    }
}
