//! SQLite index over the file store.
//!
//! Derived data only: fast queries the directory walk cannot serve
//! (full-text search, URL dedup lookup, podcast/channel filters). The
//! index can be deleted and rebuilt from the files at any time; it is
//! never authoritative.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use super::files::{FileStore, ItemFilter};
use crate::domain::{normalize_url, ContentItem, ContentType, ItemStatus};

/// SQLite-backed query index
pub struct IndexManager {
    conn: Connection,
}

/// One search or listing result, projected from the `content` table
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub content_id: String,
    pub title: String,
    pub content_type: ContentType,
    pub status: ItemStatus,
    pub url: String,
    pub description: Option<String>,
    pub file_path: String,
    pub created_at: String,
}

/// Row counts for the whole index
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub total_items: usize,
    pub items_by_type: HashMap<ContentType, usize>,
    pub total_urls: usize,
    pub total_tags: usize,
    pub total_relationships: usize,
}

/// Outcome of a full rebuild from the file store
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    pub indexed: usize,
    pub failed: usize,
}

impl IndexManager {
    /// Open or create the index database at `path`
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open index database: {}", path.display()))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Create an in-memory index, for tests and ephemeral use
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Index an item, replacing any previous entry for the same id.
    ///
    /// Replaces the content row, its tag rows, and its FTS document; adds
    /// url and relationship rows. Must be called after the corresponding
    /// `FileStore::save` so the index never references bytes that are not
    /// on disk.
    pub fn index_item(
        &mut self,
        item: &ContentItem,
        file_path: &str,
        search_text: Option<&str>,
    ) -> Result<()> {
        let word_count: Option<i64> = item
            .extra
            .get("word_count")
            .and_then(|v| v.as_i64())
            .or_else(|| search_text.map(|t| t.split_whitespace().count() as i64));

        let tx = self.conn.transaction()?;

        // An UPDATE keeps the rowid stable so the FTS document can be
        // swapped by rowid.
        let existing: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM content WHERE content_id = ?1",
                params![item.content_id],
                |row| row.get(0),
            )
            .optional()?;

        let rowid = match existing {
            Some(rowid) => {
                tx.execute(
                    "UPDATE content SET
                        title = ?1, content_type = ?2, source_type = ?3, status = ?4,
                        url = ?5, author = ?6, description = ?7, podcast_name = ?8,
                        channel_name = ?9, episode_number = ?10, duration_seconds = ?11,
                        created_at = ?12, updated_at = ?13, ingested_at = ?14,
                        published_at = ?15, file_path = ?16, word_count = ?17
                     WHERE rowid = ?18",
                    params![
                        item.title,
                        item.content_type.to_string(),
                        item.source_type.to_string(),
                        item.status.to_string(),
                        item.url,
                        item.author,
                        item.description,
                        item.podcast_name,
                        item.channel_name,
                        item.episode_number,
                        item.duration_seconds,
                        item.created_at.to_rfc3339(),
                        item.updated_at.to_rfc3339(),
                        item.ingested_at.to_rfc3339(),
                        item.published_at.map(|d| d.to_rfc3339()),
                        file_path,
                        word_count,
                        rowid,
                    ],
                )?;
                tx.execute("DELETE FROM content_fts WHERE rowid = ?1", params![rowid])?;
                tx.execute(
                    "DELETE FROM tags WHERE content_id = ?1",
                    params![item.content_id],
                )?;
                rowid
            }
            None => {
                tx.execute(
                    "INSERT INTO content (
                        content_id, title, content_type, source_type, status, url,
                        author, description, podcast_name, channel_name,
                        episode_number, duration_seconds, created_at, updated_at,
                        ingested_at, published_at, file_path, word_count
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                               ?13, ?14, ?15, ?16, ?17, ?18)",
                    params![
                        item.content_id,
                        item.title,
                        item.content_type.to_string(),
                        item.source_type.to_string(),
                        item.status.to_string(),
                        item.url,
                        item.author,
                        item.description,
                        item.podcast_name,
                        item.channel_name,
                        item.episode_number,
                        item.duration_seconds,
                        item.created_at.to_rfc3339(),
                        item.updated_at.to_rfc3339(),
                        item.ingested_at.to_rfc3339(),
                        item.published_at.map(|d| d.to_rfc3339()),
                        file_path,
                        word_count,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.execute(
            "INSERT INTO content_fts (rowid, title, description, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                rowid,
                item.title,
                item.description.as_deref().unwrap_or(""),
                search_text.unwrap_or(""),
            ],
        )?;

        for tag in &item.tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (content_id, tag) VALUES (?1, ?2)",
                params![item.content_id, tag],
            )?;
        }

        if let Some(url) = item.url.as_deref() {
            if !url.is_empty() {
                tx.execute(
                    "INSERT OR REPLACE INTO urls (url, content_id) VALUES (?1, ?2)",
                    params![normalize_url(url), item.content_id],
                )?;
            }
        }

        if let Some(parent) = &item.parent_id {
            tx.execute(
                "INSERT OR IGNORE INTO relationships (parent_id, child_id) VALUES (?1, ?2)",
                params![parent, item.content_id],
            )?;
        }
        for child in &item.child_ids {
            tx.execute(
                "INSERT OR IGNORE INTO relationships (parent_id, child_id) VALUES (?1, ?2)",
                params![item.content_id, child],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove an item and everything hanging off it. Returns false when the
    /// id was not indexed.
    pub fn remove_item(&mut self, content_id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;

        let rowid: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM content WHERE content_id = ?1",
                params![content_id],
                |row| row.get(0),
            )
            .optional()?;

        let rowid = match rowid {
            Some(rowid) => rowid,
            None => return Ok(false),
        };

        tx.execute("DELETE FROM content_fts WHERE rowid = ?1", params![rowid])?;
        // urls and tags go with the content row via ON DELETE CASCADE
        tx.execute(
            "DELETE FROM content WHERE content_id = ?1",
            params![content_id],
        )?;
        tx.execute(
            "DELETE FROM relationships WHERE parent_id = ?1 OR child_id = ?1",
            params![content_id],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Resolve a URL to a content id, if indexed. The query is normalized
    /// first, so tracking-parameter variants of a stored URL still hit.
    pub fn lookup_url(&self, url: &str) -> Result<Option<String>> {
        let content_id = self
            .conn
            .query_row(
                "SELECT content_id FROM urls WHERE url = ?1",
                params![normalize_url(url)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(content_id)
    }

    /// Full-text search over title, description, and body
    pub fn search(
        &self,
        query: &str,
        content_type: Option<ContentType>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let hits = match content_type {
            Some(ct) => {
                let mut stmt = self.conn.prepare(
                    "SELECT c.content_id, c.title, c.content_type, c.status, c.url,
                            c.description, c.file_path, c.created_at
                     FROM content c
                     JOIN content_fts fts ON c.rowid = fts.rowid
                     WHERE content_fts MATCH ?1 AND c.content_type = ?2
                     ORDER BY rank
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![query, ct.to_string(), limit as i64], row_to_hit)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT c.content_id, c.title, c.content_type, c.status, c.url,
                            c.description, c.file_path, c.created_at
                     FROM content c
                     JOIN content_fts fts ON c.rowid = fts.rowid
                     WHERE content_fts MATCH ?1
                     ORDER BY rank
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![query, limit as i64], row_to_hit)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(hits)
    }

    /// List items of one type, newest first
    pub fn list_by_type(
        &self,
        content_type: ContentType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, title, content_type, status, url,
                    description, file_path, created_at
             FROM content
             WHERE content_type = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let hits = stmt
            .query_map(
                params![content_type.to_string(), limit as i64, offset as i64],
                row_to_hit,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    /// List episodes of one podcast, newest first
    pub fn list_by_podcast(&self, name: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, title, content_type, status, url,
                    description, file_path, created_at
             FROM content
             WHERE podcast_name = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let hits = stmt
            .query_map(params![name, limit as i64], row_to_hit)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    /// List videos of one channel, newest first
    pub fn list_by_channel(&self, name: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, title, content_type, status, url,
                    description, file_path, created_at
             FROM content
             WHERE channel_name = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;

        let hits = stmt
            .query_map(params![name, limit as i64], row_to_hit)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    /// Drop everything and re-derive the index from the file store.
    ///
    /// The designated remedy for index drift. The clear runs in one
    /// transaction; items are then re-indexed one by one, so a failure on
    /// one item never blocks the rest.
    pub async fn rebuild_from_files(&mut self, store: &FileStore) -> Result<RebuildReport> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM content_fts", [])?;
        tx.execute("DELETE FROM relationships", [])?;
        tx.execute("DELETE FROM tags", [])?;
        tx.execute("DELETE FROM urls", [])?;
        tx.execute("DELETE FROM content", [])?;
        tx.commit()?;

        let items = store.list_items(&ItemFilter::default(), usize::MAX).await?;

        let mut report = RebuildReport::default();
        for item in items {
            let file_path = store.item_dir(&item);

            let search_text = match store
                .load_content(
                    &item.content_id,
                    Some(item.content_type),
                    Some(item.created_at.date_naive()),
                )
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(content_id = %item.content_id, error = %e, "Failed to read content during rebuild");
                    None
                }
            };

            match self.index_item(&item, &file_path.to_string_lossy(), search_text.as_deref()) {
                Ok(()) => report.indexed += 1,
                Err(e) => {
                    warn!(content_id = %item.content_id, error = %e, "Failed to re-index item");
                    report.failed += 1;
                }
            }
        }

        info!(
            indexed = report.indexed,
            failed = report.failed,
            "Index rebuilt from files"
        );
        Ok(report)
    }

    /// Count rows per table and per type
    pub fn get_stats(&self) -> Result<IndexStats> {
        let mut stats = IndexStats::default();

        stats.total_items = self
            .conn
            .query_row("SELECT COUNT(*) FROM content", [], |row| {
                row.get::<_, i64>(0)
            })? as usize;
        stats.total_urls = self
            .conn
            .query_row("SELECT COUNT(*) FROM urls", [], |row| row.get::<_, i64>(0))?
            as usize;
        stats.total_tags = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get::<_, i64>(0))?
            as usize;
        stats.total_relationships = self.conn.query_row(
            "SELECT COUNT(*) FROM relationships",
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;

        let mut stmt = self
            .conn
            .prepare("SELECT content_type, COUNT(*) FROM content GROUP BY content_type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (type_str, count) = row?;
            let content_type = type_str.parse().unwrap_or(ContentType::Unknown);
            stats.items_by_type.insert(content_type, count as usize);
        }

        Ok(stats)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS content (
            content_id       TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            content_type     TEXT NOT NULL,
            source_type      TEXT NOT NULL,
            status           TEXT NOT NULL,
            url              TEXT,
            author           TEXT,
            description      TEXT,
            podcast_name     TEXT,
            channel_name     TEXT,
            episode_number   INTEGER,
            duration_seconds INTEGER,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            ingested_at      TEXT,
            published_at     TEXT,
            file_path        TEXT NOT NULL,
            word_count       INTEGER
        );

        CREATE TABLE IF NOT EXISTS urls (
            url        TEXT PRIMARY KEY,
            content_id TEXT NOT NULL REFERENCES content(content_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS tags (
            content_id TEXT NOT NULL REFERENCES content(content_id) ON DELETE CASCADE,
            tag        TEXT NOT NULL,
            UNIQUE(content_id, tag)
        );

        CREATE TABLE IF NOT EXISTS relationships (
            parent_id TEXT NOT NULL,
            child_id  TEXT NOT NULL,
            UNIQUE(parent_id, child_id)
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
            title,
            description,
            body
        );

        CREATE INDEX IF NOT EXISTS idx_content_type ON content(content_type, created_at);
        CREATE INDEX IF NOT EXISTS idx_content_podcast ON content(podcast_name);
        CREATE INDEX IF NOT EXISTS idx_content_channel ON content(channel_name);
        CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag);
    ",
    )
    .context("Failed to initialize index schema")?;

    Ok(())
}

fn row_to_hit(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    Ok(SearchHit {
        content_id: row.get(0)?,
        title: row.get(1)?,
        content_type: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(ContentType::Unknown),
        status: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or(ItemStatus::Pending),
        url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        description: row.get(5)?,
        file_path: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(url: &str, title: &str) -> ContentItem {
        ContentItem::new(url, ContentType::Article).with_title(title)
    }

    #[test]
    fn test_index_and_lookup_url() {
        let mut index = IndexManager::new_in_memory().unwrap();
        let item = sample_item("https://example.com/post", "A Post");

        index.index_item(&item, "/library/x", None).unwrap();

        let found = index.lookup_url("https://example.com/post").unwrap();
        assert_eq!(found, Some(item.content_id.clone()));

        // Tracking params normalize away to the same entry
        let found = index
            .lookup_url("https://example.com/post?utm_source=tw")
            .unwrap();
        assert_eq!(found, Some(item.content_id));

        assert_eq!(index.lookup_url("https://example.com/other").unwrap(), None);
    }

    #[test]
    fn test_index_is_idempotent() {
        let mut index = IndexManager::new_in_memory().unwrap();
        let item = sample_item("https://example.com/post", "A Post")
            .with_tag("rust")
            .with_tag("async");

        index.index_item(&item, "/library/x", Some("body text")).unwrap();
        index.index_item(&item, "/library/x", Some("body text")).unwrap();

        let stats = index.get_stats().unwrap();
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.total_urls, 1);
        assert_eq!(stats.total_tags, 2);
    }

    #[test]
    fn test_reindex_replaces_fts_document() {
        let mut index = IndexManager::new_in_memory().unwrap();
        let item = sample_item("https://example.com/post", "A Post");

        index
            .index_item(&item, "/library/x", Some("original quantum text"))
            .unwrap();
        index
            .index_item(&item, "/library/x", Some("replacement plasma text"))
            .unwrap();

        assert!(index.search("quantum", None, 10).unwrap().is_empty());
        assert_eq!(index.search("plasma", None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_search_with_type_filter() {
        let mut index = IndexManager::new_in_memory().unwrap();

        let article = sample_item("https://example.com/a", "Rust ownership explained");
        index
            .index_item(&article, "/library/a", Some("borrow checker lifetimes"))
            .unwrap();

        let mut video = ContentItem::new("https://youtube.com/watch?v=x", ContentType::Video);
        video = video.with_title("Rust talk");
        index
            .index_item(&video, "/library/v", Some("conference recording"))
            .unwrap();

        let all = index.search("rust", None, 10).unwrap();
        assert_eq!(all.len(), 2);

        let videos = index.search("rust", Some(ContentType::Video), 10).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].content_type, ContentType::Video);
    }

    #[test]
    fn test_search_matches_body() {
        let mut index = IndexManager::new_in_memory().unwrap();
        let item = sample_item("https://example.com/post", "Plain title");

        index
            .index_item(&item, "/library/x", Some("the euclidean algorithm terminates"))
            .unwrap();

        let hits = index.search("euclidean", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Plain title");
    }

    #[test]
    fn test_remove_item() {
        let mut index = IndexManager::new_in_memory().unwrap();
        let item = sample_item("https://example.com/post", "A Post").with_tag("x");

        index.index_item(&item, "/library/x", Some("findable body")).unwrap();
        assert!(index.remove_item(&item.content_id).unwrap());

        assert_eq!(index.lookup_url("https://example.com/post").unwrap(), None);
        assert!(index.search("findable", None, 10).unwrap().is_empty());

        let stats = index.get_stats().unwrap();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.total_urls, 0);
        assert_eq!(stats.total_tags, 0);

        // Removing twice is not an error
        assert!(!index.remove_item(&item.content_id).unwrap());
    }

    #[test]
    fn test_list_by_podcast_and_channel() {
        let mut index = IndexManager::new_in_memory().unwrap();

        let mut ep1 = ContentItem::new("https://pod.example.com/1", ContentType::Podcast);
        ep1.podcast_name = Some("Deep Dive".to_string());
        ep1 = ep1.with_title("Episode 1");
        index.index_item(&ep1, "/library/p1", None).unwrap();

        let mut ep2 = ContentItem::new("https://pod.example.com/2", ContentType::Podcast);
        ep2.podcast_name = Some("Deep Dive".to_string());
        ep2 = ep2.with_title("Episode 2");
        index.index_item(&ep2, "/library/p2", None).unwrap();

        let mut vid = ContentItem::new("https://youtube.com/watch?v=z", ContentType::Video);
        vid.channel_name = Some("Rustacean Station".to_string());
        vid = vid.with_title("A talk");
        index.index_item(&vid, "/library/v1", None).unwrap();

        assert_eq!(index.list_by_podcast("Deep Dive", 10).unwrap().len(), 2);
        assert_eq!(index.list_by_podcast("Unknown Show", 10).unwrap().len(), 0);
        assert_eq!(
            index.list_by_channel("Rustacean Station", 10).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_list_by_type_pagination() {
        let mut index = IndexManager::new_in_memory().unwrap();

        for i in 0..5 {
            let mut item = sample_item(&format!("https://example.com/{}", i), &format!("Post {}", i));
            item.created_at = item.created_at + chrono::Duration::seconds(i);
            index.index_item(&item, "/library/x", None).unwrap();
        }

        let page1 = index.list_by_type(ContentType::Article, 2, 0).unwrap();
        let page2 = index.list_by_type(ContentType::Article, 2, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 2);
        assert_ne!(page1[0].content_id, page2[0].content_id);

        // Newest first
        assert_eq!(page1[0].title, "Post 4");
    }

    #[test]
    fn test_relationships_recorded() {
        let mut index = IndexManager::new_in_memory().unwrap();

        let parent = sample_item("https://example.com/digest", "Digest");
        let child = sample_item("https://example.com/linked", "Linked")
            .with_parent(&parent.content_id);

        index.index_item(&parent, "/library/d", None).unwrap();
        index.index_item(&child, "/library/l", None).unwrap();

        let stats = index.get_stats().unwrap();
        assert_eq!(stats.total_relationships, 1);
    }
}
