//! Command-line interface for packrat.
//!
//! Provides commands for ingesting URLs, searching and listing the
//! library, and maintaining the store and its index.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::ResolvedConfig;
use crate::core::{ContentPipeline, SkipList};
use crate::domain::{ContentType, ItemStatus, SourceType};
use crate::fetch::FetchCascade;
use crate::store::{FileStore, IndexManager, ItemFilter};

/// packrat - content acquisition and storage engine
#[derive(Parser, Debug)]
#[command(name = "packrat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a URL and store it in the library
    Add {
        /// URL to ingest
        url: String,

        /// Tags to apply (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,

        /// Re-fetch even if the URL is already stored
        #[arg(short, long)]
        force: bool,

        /// How the item was discovered (manual, api, feed, email, migration)
        #[arg(short, long, default_value = "manual")]
        source: SourceType,
    },

    /// Full-text search over stored content
    Search {
        /// Search query (FTS5 syntax)
        query: String,

        /// Restrict to one content type
        #[arg(short = 't', long = "type")]
        content_type: Option<ContentType>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List stored items, newest first
    List {
        /// Filter by content type
        #[arg(short = 't', long = "type")]
        content_type: Option<ContentType>,

        /// Filter by status (pending, processing, completed, failed, duplicate)
        #[arg(short, long)]
        status: Option<ItemStatus>,

        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show details of a stored item
    Show {
        /// Content ID
        content_id: String,

        /// Also print the stored content body
        #[arg(short, long)]
        full: bool,
    },

    /// Delete an item from the store and the index
    Delete {
        /// Content ID
        content_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show store and index statistics
    Stats,

    /// Rebuild the index from the files on disk
    Rebuild,

    /// Remove empty date directories left behind by deletes
    Cleanup,

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = ResolvedConfig::load()?;
        prepare_dirs(&config)?;

        match self.command {
            Commands::Add {
                url,
                tags,
                force,
                source,
            } => add_url(&config, &url, tags, force, source).await,
            Commands::Search {
                query,
                content_type,
                limit,
            } => search_library(&config, &query, content_type, limit).await,
            Commands::List {
                content_type,
                status,
                limit,
            } => list_library(&config, content_type, status, limit).await,
            Commands::Show { content_id, full } => show_item(&config, &content_id, full).await,
            Commands::Delete { content_id, yes } => delete_item(&config, &content_id, yes).await,
            Commands::Stats => show_stats(&config).await,
            Commands::Rebuild => rebuild_index(&config).await,
            Commands::Cleanup => cleanup_library(&config).await,
            Commands::Config => show_config(&config).await,
        }
    }
}

/// Create the home, library, and index directories if missing
fn prepare_dirs(config: &ResolvedConfig) -> Result<()> {
    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create home directory: {}", config.home.display()))?;
    std::fs::create_dir_all(&config.library).with_context(|| {
        format!(
            "Failed to create library directory: {}",
            config.library.display()
        )
    })?;
    if let Some(parent) = config.index.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create index directory: {}", parent.display())
        })?;
    }
    Ok(())
}

fn open_library(config: &ResolvedConfig) -> Result<(FileStore, IndexManager)> {
    let store = FileStore::new(&config.library);
    let index = IndexManager::new(&config.index)?;
    Ok((store, index))
}

/// Ingest one URL through the full pipeline
async fn add_url(
    config: &ResolvedConfig,
    url: &str,
    tags: Option<String>,
    force: bool,
    source: SourceType,
) -> Result<()> {
    let (store, index) = open_library(config)?;
    let cascade = FetchCascade::new(config.fetch.clone())?;
    let skiplist = SkipList::new(&config.skip_patterns);
    let mut pipeline =
        ContentPipeline::new(store, index, cascade, skiplist, config.retry.clone());

    eprintln!("📥 Ingesting: {}", url);

    let result = pipeline.process_url(url, source, force, None).await?;

    let mut item = match result {
        Some(item) => item,
        None => {
            if pipeline.stats().duplicates > 0 {
                eprintln!("Already in library (use --force to re-fetch)");
            } else {
                eprintln!("Skipped: not a content URL");
            }
            return Ok(());
        }
    };

    if let Some(tags_str) = tags {
        let tag_list: Vec<String> = tags_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if !tag_list.is_empty() {
            for tag in tag_list {
                item.add_tag(tag);
            }

            let (dir, body) = {
                let store = pipeline.store();
                let body = store
                    .load_content(
                        &item.content_id,
                        Some(item.content_type),
                        Some(item.created_at.date_naive()),
                    )
                    .await?;
                let dir = store.save(&mut item, None, None).await?;
                (dir, body)
            };

            if let Err(e) =
                pipeline
                    .index_mut()
                    .index_item(&item, &dir.to_string_lossy(), body.as_deref())
            {
                warn!(content_id = %item.content_id, error = %e, "Index write failed, run rebuild to repair");
            }
        }
    }

    match item.status {
        ItemStatus::Completed => {
            eprintln!("\n✅ Stored: {}", item.title);
            eprintln!("   ID: {}", item.content_id);
            eprintln!("   Type: {}", item.content_type);
            if let Some(method) = item.extra.get("fetch_method").and_then(|v| v.as_str()) {
                eprintln!("   Fetched via: {}", method);
            }
            if let Some(words) = item.extra.get("word_count").and_then(|v| v.as_u64()) {
                eprintln!("   Words: {}", words);
            }
        }
        ItemStatus::Failed => {
            eprintln!(
                "\n❌ Fetch failed: {}",
                item.error_message.as_deref().unwrap_or("unknown error")
            );
            eprintln!("   Stored failed record {} for later retry", item.content_id);
            std::process::exit(1);
        }
        _ => {
            eprintln!("\nStored {} in state {}", item.content_id, item.status);
        }
    }

    Ok(())
}

/// Search the index
async fn search_library(
    config: &ResolvedConfig,
    query: &str,
    content_type: Option<ContentType>,
    limit: usize,
) -> Result<()> {
    let index = IndexManager::new(&config.index)?;
    let hits = index.search(query, content_type, limit)?;

    if hits.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s) for \"{}\":\n", hits.len(), query);
    println!("{:<18} {:<12} {:<10} {:<40}", "ID", "TYPE", "STATUS", "TITLE");
    println!("{}", "-".repeat(80));

    for hit in &hits {
        println!(
            "{:<18} {:<12} {:<10} {:<40}",
            hit.content_id,
            hit.content_type.to_string(),
            hit.status.to_string(),
            truncate(&hit.title, 37)
        );
    }

    Ok(())
}

/// List items straight from the file store
async fn list_library(
    config: &ResolvedConfig,
    content_type: Option<ContentType>,
    status: Option<ItemStatus>,
    limit: usize,
) -> Result<()> {
    let store = FileStore::new(&config.library);

    let mut filter = ItemFilter::default();
    if let Some(ct) = content_type {
        filter = filter.with_type(ct);
    }
    if let Some(st) = status {
        filter = filter.with_status(st);
    }

    let items = store.list_items(&filter, limit).await?;

    if items.is_empty() {
        println!("Library is empty. Use 'packrat add <url>' to ingest content.");
        return Ok(());
    }

    println!(
        "{:<18} {:<12} {:<10} {:<11} {:<40}",
        "ID", "TYPE", "STATUS", "DATE", "TITLE"
    );
    println!("{}", "-".repeat(92));

    for item in &items {
        println!(
            "{:<18} {:<12} {:<10} {:<11} {:<40}",
            item.content_id,
            item.content_type.to_string(),
            item.status.to_string(),
            item.created_at.format("%Y-%m-%d").to_string(),
            truncate(&item.title, 37)
        );
    }

    println!("\nTotal: {} item(s)", items.len());

    Ok(())
}

/// Show one item's metadata and, with --full, its content
async fn show_item(config: &ResolvedConfig, content_id: &str, full: bool) -> Result<()> {
    let store = FileStore::new(&config.library);

    let item = store
        .load(content_id, None, None)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Content not found: {}", content_id))?;

    println!("{}", "=".repeat(64));
    println!("  ID: {}", item.content_id);
    println!("  Title: {}", item.title);
    if let Some(url) = &item.url {
        println!("  URL: {}", url);
    }
    println!("  Type: {}", item.content_type);
    println!("  Source: {}", item.source_type);
    println!("  Status: {}", item.status);
    if let Some(author) = &item.author {
        println!("  Author: {}", author);
    }
    if let Some(description) = &item.description {
        println!("  Description: {}", description);
    }
    println!("  Created: {}", item.created_at.to_rfc3339());
    println!("  Ingested: {}", item.ingested_at.to_rfc3339());
    if let Some(published) = item.published_at {
        println!("  Published: {}", published.to_rfc3339());
    }
    if !item.tags.is_empty() {
        println!("  Tags: {}", item.tags.join(", "));
    }
    if item.processing_attempts > 0 {
        println!("  Fetch attempts: {}", item.processing_attempts);
    }
    if let Some(error) = &item.error_message {
        println!("  Error: {}", error);
    }
    if let Some(method) = item.extra.get("fetch_method").and_then(|v| v.as_str()) {
        println!("  Fetched via: {}", method);
    }
    println!("{}", "=".repeat(64));

    if full {
        let content = store
            .load_content(
                &item.content_id,
                Some(item.content_type),
                Some(item.created_at.date_naive()),
            )
            .await?;
        match content {
            Some(body) => println!("\n{}", body),
            None => println!("\n(no stored content)"),
        }
    } else {
        println!("\nUse --full to print the stored content");
    }

    Ok(())
}

/// Delete an item from disk, then drop it from the index
async fn delete_item(config: &ResolvedConfig, content_id: &str, yes: bool) -> Result<()> {
    let (store, mut index) = open_library(config)?;

    let item = store
        .load(content_id, None, None)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Content not found: {}", content_id))?;

    if !yes {
        eprint!("Delete \"{}\" ({})? [y/N] ", item.title, item.content_id);
        io::stderr().flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            eprintln!("Aborted");
            return Ok(());
        }
    }

    let removed = store.delete(&item.content_id, Some(item.content_type)).await?;

    if let Err(e) = index.remove_item(&item.content_id) {
        warn!(content_id = %item.content_id, error = %e, "Index removal failed, run rebuild to repair");
    }

    if removed {
        eprintln!("Deleted: {} ({})", item.title, item.content_id);
    } else {
        eprintln!("Nothing to delete for {}", item.content_id);
    }

    Ok(())
}

/// Print store and index statistics side by side
async fn show_stats(config: &ResolvedConfig) -> Result<()> {
    let (store, index) = open_library(config)?;

    let store_stats = store.get_stats().await?;
    let index_stats = index.get_stats()?;

    println!("Library: {}", config.library.display());
    println!();
    println!("{:<12} {:>8}", "TYPE", "ITEMS");
    println!("{}", "-".repeat(21));

    for content_type in ContentType::ALL {
        if let Some(count) = store_stats.items_by_type.get(&content_type) {
            println!("{:<12} {:>8}", content_type.to_string(), count);
        }
    }

    println!("{}", "-".repeat(21));
    println!("{:<12} {:>8}", "total", store_stats.total_items);
    println!();
    println!("Disk usage: {}", format_bytes(store_stats.total_bytes));
    println!("Available:  {}", format_bytes(store_stats.available_bytes));
    println!();
    println!(
        "Index: {} item(s), {} url(s), {} tag(s), {} relationship(s)",
        index_stats.total_items,
        index_stats.total_urls,
        index_stats.total_tags,
        index_stats.total_relationships
    );

    if index_stats.total_items != store_stats.total_items {
        println!("\n⚠️ Index out of sync with store, run 'packrat rebuild'");
    }

    Ok(())
}

/// Re-derive the whole index from the files on disk
async fn rebuild_index(config: &ResolvedConfig) -> Result<()> {
    let (store, mut index) = open_library(config)?;

    eprintln!("🔄 Rebuilding index from {}", config.library.display());

    let report = index.rebuild_from_files(&store).await?;

    eprintln!(
        "✅ Indexed {} item(s), {} failure(s)",
        report.indexed, report.failed
    );

    Ok(())
}

/// Remove empty date directories
async fn cleanup_library(config: &ResolvedConfig) -> Result<()> {
    let store = FileStore::new(&config.library);
    let removed = store.cleanup_empty_dirs().await?;

    println!("Removed {} empty directorie(s)", removed);

    Ok(())
}

/// Show the resolved configuration
async fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("{}", "=".repeat(64));
    println!("  Packrat Configuration");
    println!("{}", "=".repeat(64));
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", config.home.display());
    println!("  Library: {}", config.library.display());
    println!("  Index:   {}", config.index.display());
    println!();

    let mut strategies = vec!["direct"];
    if config.fetch.enable_browser {
        strategies.push("browser");
    }
    if config.fetch.enable_session && !config.fetch.credentials.is_empty() {
        strategies.push("session");
    }
    if config.fetch.enable_archive {
        strategies.push("archive");
    }
    if config.fetch.enable_resurrect {
        strategies.push("resurrect");
    }

    println!("Fetch:");
    println!("  User agent:      {}", config.fetch.user_agent);
    println!("  Request timeout: {}s", config.fetch.request_timeout_secs);
    println!("  Browser timeout: {}s", config.fetch.browser_timeout_secs);
    println!(
        "  Quality bar:     {} chars, {} words",
        config.fetch.min_content_chars, config.fetch.min_word_count
    );
    println!(
        "  Delay window:    {}-{}ms per domain",
        config.fetch.min_delay_ms, config.fetch.max_delay_ms
    );
    println!("  Strategies:      {}", strategies.join(", "));
    println!("  Credentials:     {} domain(s)", config.fetch.credentials.len());
    println!();
    println!("Retry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Delay:        {}ms initial, {}ms max, x{} backoff",
        config.retry.initial_delay_ms, config.retry.max_delay_ms, config.retry.backoff_multiplier
    );
    println!();

    if config.skip_patterns.is_empty() {
        println!("Skip patterns: (built-in only)");
    } else {
        println!("Skip patterns: {} extra", config.skip_patterns.len());
        for pattern in &config.skip_patterns {
            println!("  {}", pattern);
        }
    }

    Ok(())
}

/// Truncate a string to `max` characters, appending "..." when cut
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Human-readable byte sizes for stats output
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
