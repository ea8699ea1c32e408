//! File Store Integration Tests
//!
//! Round-trip, listing, filtering, and housekeeping behavior of the
//! date-partitioned file store.

use chrono::{Datelike, TimeZone, Utc};
use tempfile::TempDir;

use packrat::domain::{ContentItem, ContentType, ItemStatus, SourceType};
use packrat::store::{FileStore, ItemFilter};

fn sample_item(url: &str, content_type: ContentType) -> ContentItem {
    ContentItem::new(url, content_type)
        .with_title("Sample Title")
        .with_author("A. Writer")
        .with_description("A short description")
        .with_tag("testing")
        .with_source(SourceType::Api)
}

#[tokio::test]
async fn test_save_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut item = sample_item("https://example.com/posts/round-trip", ContentType::Article)
        .with_extra("fetch_method", serde_json::json!("direct"));
    item.mark_completed();

    let content = "# Heading\n\nBody text that survives the round trip.";
    let dir = store.save(&mut item, Some(content), None).await.unwrap();

    // Directory layout: {base}/{type}/{yyyy}/{mm}/{dd}/{id}
    let date = item.created_at;
    let expected = temp
        .path()
        .join("article")
        .join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
        .join(&item.content_id);
    assert_eq!(dir, expected);

    let loaded = store
        .load(&item.content_id, None, None)
        .await
        .unwrap()
        .expect("item should be on disk");

    assert_eq!(loaded.content_id, item.content_id);
    assert_eq!(loaded.title, item.title);
    assert_eq!(loaded.url, item.url);
    assert_eq!(loaded.author, item.author);
    assert_eq!(loaded.description, item.description);
    assert_eq!(loaded.tags, item.tags);
    assert_eq!(loaded.content_type, item.content_type);
    assert_eq!(loaded.source_type, item.source_type);
    assert_eq!(loaded.status, ItemStatus::Completed);
    assert_eq!(loaded.created_at, item.created_at);
    assert_eq!(loaded.ingested_at, item.ingested_at);
    assert_eq!(
        loaded.extra.get("fetch_method"),
        Some(&serde_json::json!("direct"))
    );

    let stored_content = store
        .load_content(&item.content_id, None, None)
        .await
        .unwrap();
    assert_eq!(stored_content.as_deref(), Some(content));
}

#[tokio::test]
async fn test_save_writes_raw_payload() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut item = sample_item("https://example.com/episode/42", ContentType::Podcast);
    let payload: &[u8] = b"\x00\x01binary audio bytes\xFF";

    let dir = store
        .save(&mut item, None, Some(("episode.mp3", payload)))
        .await
        .unwrap();

    let raw_path = dir.join("raw").join("episode.mp3");
    let on_disk = std::fs::read(&raw_path).unwrap();
    assert_eq!(on_disk, payload);

    // No content was given, so content.md must not exist
    assert!(!dir.join("content.md").exists());
}

#[tokio::test]
async fn test_exists_and_exists_by_url() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut item = sample_item("https://example.com/a", ContentType::Article);
    store.save(&mut item, None, None).await.unwrap();

    assert!(store.exists(&item.content_id, None).unwrap());
    assert!(store
        .exists(&item.content_id, Some(ContentType::Article))
        .unwrap());
    assert!(!store
        .exists(&item.content_id, Some(ContentType::Podcast))
        .unwrap());

    // Tracking parameters normalize away, so both spellings exist
    assert!(store.exists_by_url("https://example.com/a").unwrap());
    assert!(store
        .exists_by_url("https://example.com/a?utm_source=newsletter")
        .unwrap());

    assert!(!store.exists("0000000000000000", None).unwrap());
    assert!(!store.exists_by_url("https://example.com/other").unwrap());
}

#[tokio::test]
async fn test_list_items_newest_first_with_limit() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    for day in [10, 12, 14, 16, 18] {
        let url = format!("https://example.com/post-{}", day);
        let mut item = sample_item(&url, ContentType::Article);
        item.created_at = Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap();
        store.save(&mut item, None, None).await.unwrap();
    }

    let items = store.list_items(&ItemFilter::default(), 3).await.unwrap();

    assert_eq!(items.len(), 3);
    for pair in items.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
    assert_eq!(items[0].title, "Sample Title");
    assert_eq!(
        items[0].created_at,
        Utc.with_ymd_and_hms(2026, 3, 18, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_list_items_orders_types_sharing_a_date() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut article = sample_item("https://example.com/morning-read", ContentType::Article);
    article.created_at = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();
    store.save(&mut article, None, None).await.unwrap();

    let mut podcast = sample_item("https://pods.example.com/evening-ep", ContentType::Podcast);
    podcast.created_at = Utc.with_ymd_and_hms(2026, 4, 2, 17, 0, 0).unwrap();
    store.save(&mut podcast, None, None).await.unwrap();

    let mut video = sample_item("https://videos.example.com/midday", ContentType::Video);
    video.created_at = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();
    store.save(&mut video, None, None).await.unwrap();

    // Ordering is by created_at across types, not per-type partition
    let items = store.list_items(&ItemFilter::default(), 10).await.unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.content_id.as_str()).collect();
    assert_eq!(
        ids,
        [
            podcast.content_id.as_str(),
            video.content_id.as_str(),
            article.content_id.as_str()
        ]
    );

    // A cut within the shared date keeps the newest item, whatever its type
    let top = store.list_items(&ItemFilter::default(), 1).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].content_id, podcast.content_id);
    assert_eq!(top[0].content_type, ContentType::Podcast);
}

#[tokio::test]
async fn test_list_items_type_and_status_filters() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut done = sample_item("https://pods.example.com/done", ContentType::Podcast);
    done.mark_completed();
    store.save(&mut done, None, None).await.unwrap();

    let mut pending = sample_item("https://pods.example.com/pending", ContentType::Podcast);
    store.save(&mut pending, None, None).await.unwrap();

    let mut article = sample_item("https://example.com/article", ContentType::Article);
    article.mark_completed();
    store.save(&mut article, None, None).await.unwrap();

    let filter = ItemFilter::default()
        .with_type(ContentType::Podcast)
        .with_status(ItemStatus::Completed);
    let items = store.list_items(&filter, 10).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content_id, done.content_id);
    for item in &items {
        assert_eq!(item.content_type, ContentType::Podcast);
        assert_eq!(item.status, ItemStatus::Completed);
    }
}

#[tokio::test]
async fn test_list_items_date_range() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    for (month, day) in [(5, 1), (6, 1), (7, 1)] {
        let url = format!("https://example.com/{}-{}", month, day);
        let mut item = sample_item(&url, ContentType::Article);
        item.created_at = Utc.with_ymd_and_hms(2026, month, day, 9, 0, 0).unwrap();
        store.save(&mut item, None, None).await.unwrap();
    }

    let filter = ItemFilter::default()
        .since(chrono::NaiveDate::from_ymd_opt(2026, 5, 15).unwrap())
        .until(chrono::NaiveDate::from_ymd_opt(2026, 6, 15).unwrap());
    let items = store.list_items(&filter, 10).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].created_at,
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_delete_then_cleanup() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    let mut item = sample_item("https://example.com/here-today", ContentType::Article);
    store.save(&mut item, Some("gone tomorrow"), None).await.unwrap();

    assert!(store.delete(&item.content_id, None).await.unwrap());
    assert!(!store.exists(&item.content_id, None).unwrap());

    // Deleting an unknown id reports false, not an error
    assert!(!store.delete(&item.content_id, None).await.unwrap());

    // Day, month, and year directories are now empty and get pruned
    let removed = store.cleanup_empty_dirs().await.unwrap();
    assert_eq!(removed, 3);

    // A second pass finds nothing left to prune
    assert_eq!(store.cleanup_empty_dirs().await.unwrap(), 0);
}

#[tokio::test]
async fn test_get_stats_counts_per_type() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path());

    for n in 0..2 {
        let url = format!("https://example.com/article-{}", n);
        let mut item = sample_item(&url, ContentType::Article);
        store
            .save(&mut item, Some("some stored words"), None)
            .await
            .unwrap();
    }
    let mut podcast = sample_item("https://pods.example.com/ep1", ContentType::Podcast);
    store.save(&mut podcast, None, None).await.unwrap();

    let stats = store.get_stats().await.unwrap();

    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.items_by_type.get(&ContentType::Article), Some(&2));
    assert_eq!(stats.items_by_type.get(&ContentType::Podcast), Some(&1));
    assert_eq!(stats.items_by_type.get(&ContentType::Video), None);
    assert!(stats.total_bytes > 0);
    assert!(stats.available_bytes > 0);
}
