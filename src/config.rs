//! Configuration for packrat paths and fetch behavior.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PACKRAT_HOME, PACKRAT_LIBRARY, PACKRAT_INDEX)
//! 2. Config file (.packrat/config.yaml)
//! 3. Defaults (~/.packrat)
//!
//! Config file discovery:
//! - Searches current directory and parents for .packrat/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! There is no process-global config. `ResolvedConfig::load` returns a value
//! and callers pass the pieces they need into constructors.

pub mod paths;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::pipeline::RetryPolicy;
use crate::fetch::FetchConfig;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub skip: Option<SkipConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to config file)
    pub home: Option<String>,
    /// Library directory (relative to config file)
    pub library: Option<String>,
    /// SQLite index path (relative to config file)
    pub index: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkipConfig {
    /// Extra glob patterns for URLs that are never ingested
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to packrat home (engine state)
    pub home: PathBuf,
    /// Absolute path to the content library
    pub library: PathBuf,
    /// Absolute path to the SQLite index
    pub index: PathBuf,
    /// Fetch cascade settings
    pub fetch: FetchConfig,
    /// Retry settings for transient fetch failures
    pub retry: RetryPolicy,
    /// Extra URL skip patterns from the config file
    pub skip_patterns: Vec<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        load_config()
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(paths::PACKRAT_DIR).join(paths::CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = paths::default_home().context("Failed to determine home directory")?;

    // Check for config file
    let config_file = find_config_file();

    let (home, library, index, fetch, retry, skip_patterns) =
        if let Some(ref config_path) = config_file {
            // Config file found - use it as base
            let config = load_config_file(config_path)?;

            // Base directory is the parent of .packrat/ (i.e., grandparent of config.yaml)
            let packrat_dir = config_path.parent().unwrap_or(Path::new("."));
            let base_dir = packrat_dir.parent().unwrap_or(Path::new("."));

            // Resolve home path
            let home = if let Ok(env_home) = std::env::var("PACKRAT_HOME") {
                PathBuf::from(env_home)
            } else if let Some(ref home_path) = config.paths.home {
                // home is relative to the .packrat/ directory
                resolve_path(packrat_dir, home_path)
            } else {
                default_home.clone()
            };

            // Resolve library path
            let library = if let Ok(env_lib) = std::env::var("PACKRAT_LIBRARY") {
                PathBuf::from(env_lib)
            } else if let Some(ref lib_path) = config.paths.library {
                resolve_path(base_dir, lib_path)
            } else {
                home.join("library")
            };

            // Resolve index path
            let index = if let Ok(env_index) = std::env::var("PACKRAT_INDEX") {
                PathBuf::from(env_index)
            } else if let Some(ref index_path) = config.paths.index {
                resolve_path(base_dir, index_path)
            } else {
                home.join(paths::INDEX_FILE)
            };

            (
                home,
                library,
                index,
                config.fetch.unwrap_or_default(),
                config.retry.unwrap_or_default(),
                config.skip.map(|s| s.patterns).unwrap_or_default(),
            )
        } else {
            // No config file - use env vars or defaults
            let home = std::env::var("PACKRAT_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_home.clone());

            let library = std::env::var("PACKRAT_LIBRARY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join("library"));

            let index = std::env::var("PACKRAT_INDEX")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(paths::INDEX_FILE));

            (
                home,
                library,
                index,
                FetchConfig::default(),
                RetryPolicy::default(),
                Vec::new(),
            )
        };

    Ok(ResolvedConfig {
        home,
        library,
        index,
        fetch,
        retry,
        skip_patterns,
        config_file,
    })
}
