//! Date-partitioned filesystem storage for content items.
//!
//! Layout:
//!
//! ```text
//! {base}/{content_type}/{yyyy}/{mm}/{dd}/{content_id}/
//!     metadata.json     # full ContentItem, pretty-printed
//!     content.md        # extracted body, only when available
//!     raw/{filename}    # original payload (audio, PDF)
//! ```
//!
//! `{yyyy}/{mm}/{dd}` come from `created_at` in UTC, zero-padded. The
//! metadata file alone is enough to reconstruct an item; content and raw
//! files are optional siblings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::paths::{CONTENT_FILE, METADATA_FILE, RAW_DIR};
use crate::domain::{generate_id, ContentItem, ContentType, ItemStatus};

/// Filesystem-backed content store rooted at a library directory
#[derive(Debug, Clone)]
pub struct FileStore {
    base: PathBuf,
}

/// Optional constraints for [`FileStore::list_items`]
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub content_type: Option<ContentType>,
    pub status: Option<ItemStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ItemFilter {
    pub fn with_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn until(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }
}

/// Aggregate numbers for the whole store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_items: usize,
    pub items_by_type: HashMap<ContentType, usize>,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl FileStore {
    /// Create a store rooted at `base`. The directory is created lazily on
    /// first save.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Get the library root
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Get the directory an item lives in: {base}/{type}/{yyyy}/{mm}/{dd}/{id}
    pub fn item_dir(&self, item: &ContentItem) -> PathBuf {
        self.dated_dir(item.content_type, item.created_at.date_naive())
            .join(&item.content_id)
    }

    fn dated_dir(&self, content_type: ContentType, date: NaiveDate) -> PathBuf {
        self.base
            .join(content_type.to_string())
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }

    /// Save an item to disk, bumping its `updated_at`.
    ///
    /// Writes `metadata.json`, then `content.md` if `content` is given, then
    /// `raw/{filename}` if `raw` is given. The writes are not atomic as a
    /// group; the metadata file alone is enough to retry.
    pub async fn save(
        &self,
        item: &mut ContentItem,
        content: Option<&str>,
        raw: Option<(&str, &[u8])>,
    ) -> Result<PathBuf> {
        item.touch();

        let dir = self.item_dir(item);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create item directory: {}", dir.display()))?;

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = serde_json::to_string_pretty(item)?;
        fs::write(&metadata_path, metadata)
            .await
            .with_context(|| format!("Failed to write metadata: {}", metadata_path.display()))?;

        if let Some(body) = content {
            let content_path = dir.join(CONTENT_FILE);
            fs::write(&content_path, body)
                .await
                .with_context(|| format!("Failed to write content: {}", content_path.display()))?;
        }

        if let Some((filename, bytes)) = raw {
            let raw_dir = dir.join(RAW_DIR);
            fs::create_dir_all(&raw_dir)
                .await
                .with_context(|| format!("Failed to create raw directory: {}", raw_dir.display()))?;

            let raw_path = raw_dir.join(filename);
            fs::write(&raw_path, bytes)
                .await
                .with_context(|| format!("Failed to write raw payload: {}", raw_path.display()))?;
        }

        debug!(content_id = %item.content_id, path = %dir.display(), "Saved item");
        Ok(dir)
    }

    /// Load an item's metadata.
    ///
    /// With `content_type` and `date` known the path is joined directly;
    /// otherwise the type and date partitions are scanned for the id.
    pub async fn load(
        &self,
        content_id: &str,
        content_type: Option<ContentType>,
        date: Option<NaiveDate>,
    ) -> Result<Option<ContentItem>> {
        let dir = match self.locate(content_id, content_type, date)? {
            Some(dir) => dir,
            None => return Ok(None),
        };

        let item = read_item(&dir.join(METADATA_FILE)).await?;
        Ok(Some(item))
    }

    /// Load an item's extracted body (`content.md`), if it was stored
    pub async fn load_content(
        &self,
        content_id: &str,
        content_type: Option<ContentType>,
        date: Option<NaiveDate>,
    ) -> Result<Option<String>> {
        let dir = match self.locate(content_id, content_type, date)? {
            Some(dir) => dir,
            None => return Ok(None),
        };

        let path = dir.join(CONTENT_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read content: {}", path.display()))?;
        Ok(Some(content))
    }

    /// Check whether an item exists in the store
    pub fn exists(&self, content_id: &str, content_type: Option<ContentType>) -> Result<bool> {
        Ok(self.locate(content_id, content_type, None)?.is_some())
    }

    /// Check whether a URL has already been stored. This is the primary
    /// dedup gate, called before any network fetch.
    pub fn exists_by_url(&self, url: &str) -> Result<bool> {
        self.exists(&generate_id(url), None)
    }

    /// List items newest-first, stopping once `limit` items pass the filter.
    /// Partitions sharing a calendar date are read as one batch across
    /// content types and sorted by `created_at` before the limit applies.
    pub async fn list_items(&self, filter: &ItemFilter, limit: usize) -> Result<Vec<ContentItem>> {
        let types: Vec<ContentType> = match filter.content_type {
            Some(t) => vec![t],
            None => ContentType::ALL.to_vec(),
        };

        let mut partitions: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
        for content_type in &types {
            let pattern = self.base.join(content_type.to_string()).join("*/*/*");
            for path in glob_dirs(&pattern)? {
                let date = match partition_date(&path) {
                    Some(date) => date,
                    None => continue,
                };
                if let Some(start) = filter.start_date {
                    if date < start {
                        continue;
                    }
                }
                if let Some(end) = filter.end_date {
                    if date > end {
                        continue;
                    }
                }
                partitions.entry(date).or_default().push(path);
            }
        }

        let mut items = Vec::new();
        for dirs in partitions.values().rev() {
            let mut batch = Vec::new();
            for dir in dirs {
                let mut entries = fs::read_dir(dir)
                    .await
                    .with_context(|| format!("Failed to read partition: {}", dir.display()))?;

                while let Some(entry) = entries.next_entry().await? {
                    let metadata_path = entry.path().join(METADATA_FILE);
                    if !metadata_path.exists() {
                        continue;
                    }
                    match read_item(&metadata_path).await {
                        Ok(item) => {
                            if let Some(status) = filter.status {
                                if item.status != status {
                                    continue;
                                }
                            }
                            batch.push(item);
                        }
                        Err(e) => {
                            warn!(path = %metadata_path.display(), error = %e, "Skipping unreadable item")
                        }
                    }
                }
            }

            batch.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            for item in batch {
                items.push(item);
                if items.len() >= limit {
                    return Ok(items);
                }
            }
        }

        Ok(items)
    }

    /// Delete an item's directory. Returns false when the id is unknown.
    pub async fn delete(&self, content_id: &str, content_type: Option<ContentType>) -> Result<bool> {
        let dir = match self.locate(content_id, content_type, None)? {
            Some(dir) => dir,
            None => return Ok(false),
        };

        fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to remove item directory: {}", dir.display()))?;
        debug!(content_id, "Deleted item");
        Ok(true)
    }

    /// Delete one specific stored copy, addressed by the item's own type and
    /// date rather than an id scan. Returns false when that copy is not on
    /// disk.
    pub async fn delete_copy(&self, item: &ContentItem) -> Result<bool> {
        let dir = self.item_dir(item);
        if !dir.join(METADATA_FILE).exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to remove item directory: {}", dir.display()))?;
        debug!(content_id = %item.content_id, "Deleted item copy");
        Ok(true)
    }

    /// Count items and bytes across the whole store
    pub async fn get_stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();

        for content_type in ContentType::ALL {
            let pattern = self.base.join(content_type.to_string()).join("*/*/*/*");
            let mut count = 0usize;

            for path in glob_dirs(&pattern)? {
                if !path.join(METADATA_FILE).exists() {
                    continue;
                }
                count += 1;
                stats.total_bytes += dir_size(&path).await?;
            }

            if count > 0 {
                stats.items_by_type.insert(content_type, count);
            }
            stats.total_items += count;
        }

        stats.available_bytes = if self.base.exists() {
            fs2::available_space(&self.base)
                .with_context(|| format!("Failed to stat filesystem: {}", self.base.display()))?
        } else {
            0
        };

        Ok(stats)
    }

    /// Remove emptied date directories bottom-up. Returns how many were
    /// removed.
    pub async fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0usize;

        // Day dirs first, then month, then year
        for depth in ["*/*/*/*", "*/*/*", "*/*"] {
            let pattern = self.base.join(depth);
            for path in glob_dirs(&pattern)? {
                if is_empty_dir(&path).await? {
                    fs::remove_dir(&path)
                        .await
                        .with_context(|| format!("Failed to remove dir: {}", path.display()))?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, "Pruned empty date directories");
        }
        Ok(removed)
    }

    /// Find the directory for an id. Direct join when type and date are
    /// known, otherwise a partition scan.
    fn locate(
        &self,
        content_id: &str,
        content_type: Option<ContentType>,
        date: Option<NaiveDate>,
    ) -> Result<Option<PathBuf>> {
        if let (Some(ct), Some(date)) = (content_type, date) {
            let dir = self.dated_dir(ct, date).join(content_id);
            if dir.join(METADATA_FILE).exists() {
                return Ok(Some(dir));
            }
            return Ok(None);
        }

        let types: Vec<ContentType> = match content_type {
            Some(t) => vec![t],
            None => ContentType::ALL.to_vec(),
        };

        for ct in types {
            let pattern = self
                .base
                .join(ct.to_string())
                .join("*/*/*")
                .join(content_id);
            for path in glob_dirs(&pattern)? {
                if path.join(METADATA_FILE).exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }
}

/// Expand a glob pattern to the directories it matches
fn glob_dirs(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = match pattern.to_str() {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };

    let mut dirs = Vec::new();
    for entry in glob::glob(pattern).context("Invalid glob pattern")? {
        match entry {
            Ok(path) if path.is_dir() => dirs.push(path),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable path"),
        }
    }
    Ok(dirs)
}

/// Parse the trailing yyyy/mm/dd components of a partition directory
fn partition_date(path: &Path) -> Option<NaiveDate> {
    let mut components = path.components().rev();
    let day = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let month = components.next()?.as_os_str().to_str()?.parse().ok()?;
    let year = components.next()?.as_os_str().to_str()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

async fn read_item(path: &Path) -> Result<ContentItem> {
    let metadata = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;

    serde_json::from_str(&metadata)
        .with_context(|| format!("Failed to parse metadata: {}", path.display()))
}

/// Size of everything under an item directory, raw/ included
async fn dir_size(dir: &Path) -> Result<u64> {
    let mut size = 0u64;
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                size += meta.len();
            }
        }
    }

    Ok(size)
}

async fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_item_dir_layout() {
        let store = FileStore::new("/library");
        let mut item = ContentItem::new("https://example.com/post", ContentType::Article);
        item.created_at = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();

        let dir = store.item_dir(&item);
        let expected = PathBuf::from("/library/article/2025/03/07").join(&item.content_id);
        assert_eq!(dir, expected);
    }

    #[test]
    fn test_item_dir_zero_padding() {
        let store = FileStore::new("/library");
        let mut item = ContentItem::new("https://example.com/x", ContentType::Video);
        item.created_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let dir = store.item_dir(&item);
        let as_str = dir.to_string_lossy();
        assert!(as_str.contains("/video/2024/01/02/"), "got {}", as_str);
    }

    #[test]
    fn test_partition_date_parses() {
        let date = partition_date(Path::new("/library/article/2025/03/07")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
    }

    #[test]
    fn test_partition_date_rejects_garbage() {
        assert!(partition_date(Path::new("/library/article/2025/03/notaday")).is_none());
        assert!(partition_date(Path::new("/library/article/2025/13/01")).is_none());
    }

    #[test]
    fn test_filter_builders() {
        let filter = ItemFilter::default()
            .with_type(ContentType::Podcast)
            .with_status(ItemStatus::Completed)
            .since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        assert_eq!(filter.content_type, Some(ContentType::Podcast));
        assert_eq!(filter.status, Some(ItemStatus::Completed));
        assert!(filter.start_date.is_some());
        assert!(filter.end_date.is_none());
    }
}
