//! Fetch Integration Tests
//!
//! The real cascade and direct strategy against a local mock HTTP server.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use packrat::domain::{ContentType, ItemStatus, SourceType};
use packrat::fetch::{FetchCascade, FetchConfig, FetchError, FetchMethod};
use packrat::store::{FileStore, IndexManager};
use packrat::{ContentPipeline, RetryPolicy, SkipList};

/// Direct-only cascade config with politeness delays zeroed
fn direct_only_config() -> FetchConfig {
    FetchConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        request_timeout_secs: 5,
        connect_timeout_secs: 5,
        enable_browser: false,
        enable_session: false,
        enable_archive: false,
        enable_resurrect: false,
        ..FetchConfig::default()
    }
}

fn direct_only_cascade() -> FetchCascade {
    FetchCascade::new(direct_only_config()).unwrap()
}

fn article_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
  <title>Write-Ahead Logging Explained</title>
  <meta name="author" content="Priya Natarajan">
  <meta name="description" content="Why every durable store keeps a log.">
</head>
<body>
  <nav>Home | Archive | About</nav>
  <article>
    <h1>Write-Ahead Logging Explained</h1>
    <time datetime="2026-02-07T12:00:00+00:00">February 7, 2026</time>
    <p>Before any page is touched in place, the change is appended to a log.
    Recovery replays that log from the last checkpoint. Sequential appends are
    cheap while random writes can wait, so a crash always replays into a
    consistent state. The rest of this post walks a single committed write
    from the log record to the checkpointed page it eventually becomes.</p>
  </article>
  <footer>Copyright 2026 Example Press</footer>
</body>
</html>"#
        .to_string()
}

/// Long enough body, but no title, og:title, or h1 anywhere
fn untitled_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head></head>
<body>
  <article>
    <p>An orphaned page of notes with plenty of text but nothing that looks
    like a heading. It rambles on about log segments and checkpoint intervals
    for long enough to pass any length check, yet no heading ever appears.
    Page after page of notes, none of them titled and none of them short.</p>
  </article>
</body>
</html>"#
        .to_string()
}

#[tokio::test]
async fn test_direct_fetch_extracts_article() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wal"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article_html(), "text/html"))
        .mount(&server)
        .await;

    let cascade = direct_only_cascade();
    let url = format!("{}/wal", server.uri());
    let outcome = cascade.fetch(&url, ContentType::Article).await.unwrap();

    assert_eq!(outcome.method, FetchMethod::Direct);
    assert_eq!(outcome.page.title, "Write-Ahead Logging Explained");
    assert_eq!(outcome.page.author.as_deref(), Some("Priya Natarajan"));
    assert_eq!(
        outcome.page.description.as_deref(),
        Some("Why every durable store keeps a log.")
    );
    assert_eq!(
        outcome.page.published_at,
        Some(Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap())
    );

    // Content comes from the article container, not the page chrome
    assert!(outcome.page.body.contains("appended to a log"));
    assert!(!outcome.page.body.contains("Copyright"));
    assert!(outcome.page.word_count >= 25);
}

#[tokio::test]
async fn test_http_404_exhausts_cascade() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cascade = direct_only_cascade();
    let url = format!("{}/gone", server.uri());
    let err = cascade.fetch(&url, ContentType::Article).await.unwrap_err();

    match err {
        FetchError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 1);
            assert!(last_error.contains("404"), "got: {last_error}");
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_thin_page_is_rejected_by_quality_bar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/thin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Thin</title></head><body><p>Too short to keep.</p></body></html>"
                .to_string(),
            "text/html",
        ))
        .mount(&server)
        .await;

    let cascade = direct_only_cascade();
    let url = format!("{}/thin", server.uri());
    let err = cascade.fetch(&url, ContentType::Article).await.unwrap_err();

    match err {
        FetchError::Exhausted { last_error, .. } => {
            assert!(last_error.contains("quality bar"), "got: {last_error}");
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_title_requirement_depends_on_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(untitled_html(), "text/html"))
        .mount(&server)
        .await;

    let cascade = direct_only_cascade();
    let url = format!("{}/notes", server.uri());

    // Articles need a title
    let err = cascade.fetch(&url, ContentType::Article).await.unwrap_err();
    match err {
        FetchError::Exhausted { last_error, .. } => {
            assert!(last_error.contains("title"), "got: {last_error}");
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }

    // Documents do not
    let outcome = cascade.fetch(&url, ContentType::Document).await.unwrap();
    assert_eq!(outcome.page.title, "");
    assert!(outcome.page.word_count >= 25);
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let server = MockServer::start().await;
    let target = format!("{}/wal", server.uri());

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wal"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article_html(), "text/html"))
        .mount(&server)
        .await;

    let cascade = direct_only_cascade();
    let url = format!("{}/moved", server.uri());
    let outcome = cascade.fetch(&url, ContentType::Article).await.unwrap();
    assert_eq!(outcome.page.title, "Write-Ahead Logging Explained");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(article_html(), "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = FetchConfig {
        request_timeout_secs: 1,
        ..direct_only_config()
    };
    let cascade = FetchCascade::new(config).unwrap();

    let url = format!("{}/slow", server.uri());
    let err = cascade.fetch(&url, ContentType::Article).await.unwrap_err();
    match err {
        FetchError::Exhausted { last_error, .. } => {
            assert!(last_error.contains("timed out"), "got: {last_error}");
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pipeline_ingests_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wal"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article_html(), "text/html"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let mut pipeline = ContentPipeline::new(
        FileStore::new(temp.path().join("library")),
        IndexManager::new_in_memory().unwrap(),
        FetchCascade::new(direct_only_config()).unwrap(),
        SkipList::default(),
        RetryPolicy::default(),
    );

    let url = format!("{}/wal", server.uri());
    let item = pipeline
        .process_url(&url, SourceType::Manual, false, None)
        .await
        .unwrap()
        .expect("fetchable URL should produce a stored item");

    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.title, "Write-Ahead Logging Explained");

    // The extracted publication date decides the storage partition
    let dir = temp
        .path()
        .join("library/article/2026/02/07")
        .join(&item.content_id);
    assert!(dir.join("metadata.json").exists());
    assert!(dir.join("content.md").exists());

    let hits = pipeline.index_mut().search("checkpoint", None, 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content_id, item.content_id);
}
