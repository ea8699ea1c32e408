//! The canonical content record.
//!
//! A `ContentItem` describes one ingested piece of content. Items with a
//! source URL are content-addressed: the id hashes the normalized URL, so
//! resubmitting the same page always lands on the same identity and the same
//! storage directory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::url::{fallback_id, generate_id};

/// Category of ingested content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Web article or blog post
    Article,

    /// Podcast episode
    Podcast,

    /// Hosted video
    Video,

    /// Newsletter issue
    Newsletter,

    /// Ingested email
    Email,

    /// Binary document (PDF, e-book)
    Document,

    /// Manually authored note
    Note,

    /// Unclassifiable content
    Unknown,
}

impl ContentType {
    /// Every variant, in storage-directory order
    pub const ALL: [ContentType; 8] = [
        ContentType::Article,
        ContentType::Podcast,
        ContentType::Video,
        ContentType::Newsletter,
        ContentType::Email,
        ContentType::Document,
        ContentType::Note,
        ContentType::Unknown,
    ];
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContentType::Article => "article",
            ContentType::Podcast => "podcast",
            ContentType::Video => "video",
            ContentType::Newsletter => "newsletter",
            ContentType::Email => "email",
            ContentType::Document => "document",
            ContentType::Note => "note",
            ContentType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "article" | "articles" | "web" => Ok(ContentType::Article),
            "podcast" | "podcasts" => Ok(ContentType::Podcast),
            "video" | "videos" | "youtube" => Ok(ContentType::Video),
            "newsletter" | "newsletters" => Ok(ContentType::Newsletter),
            "email" | "mail" => Ok(ContentType::Email),
            "document" | "doc" | "pdf" => Ok(ContentType::Document),
            "note" | "notes" => Ok(ContentType::Note),
            "unknown" | "other" => Ok(ContentType::Unknown),
            _ => anyhow::bail!("Unknown content type: {}", s),
        }
    }
}

/// How an item entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Submitted by hand (CLI, bookmarklet)
    Manual,

    /// Submitted through the programmatic API
    Api,

    /// Discovered by a feed poller
    Feed,

    /// Extracted from an ingested email
    Email,

    /// Imported from a previous system
    Migration,

    /// Origin not recorded
    Unknown,
}

impl Default for SourceType {
    fn default() -> Self {
        Self::Manual
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceType::Manual => "manual",
            SourceType::Api => "api",
            SourceType::Feed => "feed",
            SourceType::Email => "email",
            SourceType::Migration => "migration",
            SourceType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(SourceType::Manual),
            "api" => Ok(SourceType::Api),
            "feed" | "rss" => Ok(SourceType::Feed),
            "email" | "mail" => Ok(SourceType::Email),
            "migration" | "import" => Ok(SourceType::Migration),
            "unknown" => Ok(SourceType::Unknown),
            _ => anyhow::bail!("Unknown source type: {}", s),
        }
    }
}

/// Processing state of an item.
///
/// pending -> processing -> completed | failed. Duplicate is a terminal
/// short-circuit set by the caller; completed and failed never transition
/// into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Duplicate,
}

impl Default for ItemStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Duplicate => "duplicate",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "completed" | "complete" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            "duplicate" => Ok(ItemStatus::Duplicate),
            _ => anyhow::bail!("Unknown item status: {}", s),
        }
    }
}

/// One ingested unit of content, serialized as `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Deterministic 16-hex-char identity (see `domain::url`)
    pub content_id: String,

    /// Category of this content
    pub content_type: ContentType,

    /// How the item entered the system
    #[serde(default)]
    pub source_type: SourceType,

    /// Processing state
    #[serde(default)]
    pub status: ItemStatus,

    /// Human-readable title. For URL submissions this starts as the URL
    /// itself and is replaced when extraction finds a real title.
    pub title: String,

    /// Original source URL, absent for manually authored notes
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// User tags. Set semantics: deduplicated on insert, order preserved.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Podcast show name, for podcast episodes
    #[serde(default)]
    pub podcast_name: Option<String>,

    #[serde(default)]
    pub episode_number: Option<u32>,

    /// Channel name, for hosted video
    #[serde(default)]
    pub channel_name: Option<String>,

    #[serde(default)]
    pub video_id: Option<String>,

    /// Media duration, for audio and video
    #[serde(default)]
    pub duration_seconds: Option<u32>,

    /// The content's own date when known, else ingestion time. Drives the
    /// storage date partition, so it never changes after the first save.
    pub created_at: DateTime<Utc>,

    /// Bumped on every save
    pub updated_at: DateTime<Utc>,

    /// When the item entered the system. Immutable.
    pub ingested_at: DateTime<Utc>,

    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Why processing failed, for failed items
    #[serde(default)]
    pub error_message: Option<String>,

    /// Fetch attempts consumed so far
    #[serde(default)]
    pub processing_attempts: u32,

    /// Item this one was extracted from (e.g. the email containing this URL)
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Items extracted from this one
    #[serde(default)]
    pub child_ids: Vec<String>,

    /// Unstructured provenance only (fetch_method, from_archive, word_count).
    /// Structured data belongs in typed fields above.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ContentItem {
    /// Create an item for a URL submission
    pub fn new(url: impl Into<String>, content_type: ContentType) -> Self {
        let url = url.into();
        let now = Utc::now();
        Self {
            content_id: generate_id(&url),
            content_type,
            source_type: SourceType::Manual,
            status: ItemStatus::Pending,
            title: url.clone(),
            url: Some(url),
            author: None,
            description: None,
            tags: Vec::new(),
            podcast_name: None,
            episode_number: None,
            channel_name: None,
            video_id: None,
            duration_seconds: None,
            created_at: now,
            updated_at: now,
            ingested_at: now,
            published_at: None,
            error_message: None,
            processing_attempts: 0,
            parent_id: None,
            child_ids: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Create a manually authored item with no source URL. The id is salted
    /// with the creation time and is not reproducible.
    pub fn manual(title: impl Into<String>, content: &str, content_type: ContentType) -> Self {
        let title = title.into();
        let content_id = fallback_id(&title, content);
        let now = Utc::now();
        Self {
            content_id,
            content_type,
            source_type: SourceType::Manual,
            status: ItemStatus::Pending,
            title,
            url: None,
            author: None,
            description: None,
            tags: Vec::new(),
            podcast_name: None,
            episode_number: None,
            channel_name: None,
            video_id: None,
            duration_seconds: None,
            created_at: now,
            updated_at: now,
            ingested_at: now,
            published_at: None,
            error_message: None,
            processing_attempts: 0,
            parent_id: None,
            child_ids: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Set the title (builder style)
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the author (builder style)
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the description (builder style)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the source type (builder style)
    pub fn with_source(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Add a tag (builder style, deduplicated)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    /// Set the parent reference (builder style)
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach a provenance value (builder style)
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Add a tag, preserving set semantics
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Transition to processing
    pub fn mark_processing(&mut self) {
        self.status = ItemStatus::Processing;
        self.touch();
    }

    /// Transition to completed, clearing any stale error
    pub fn mark_completed(&mut self) {
        self.status = ItemStatus::Completed;
        self.error_message = None;
        self.touch();
    }

    /// Transition to failed with the reason
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ItemStatus::Failed;
        self.error_message = Some(error.into());
        self.touch();
    }

    /// Mark the item duplicate. Completed and failed are terminal for this
    /// transition; the call is ignored there.
    pub fn mark_duplicate(&mut self) {
        if matches!(self.status, ItemStatus::Completed | ItemStatus::Failed) {
            return;
        }
        self.status = ItemStatus::Duplicate;
        self.touch();
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
