//! URL to content-type classification.

use super::item::ContentType;

/// Hosts that serve video content
const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com", "twitch.tv"];

/// Podcast platforms, matched against host or path
const PODCAST_PATTERNS: &[&str] = &[
    "podcasts.apple.com",
    "open.spotify.com/episode",
    "open.spotify.com/show",
    "overcast.fm",
    "pocketcasts.com",
    "anchor.fm",
    "transistor.fm",
    "/podcast/",
];

/// Newsletter platforms
const NEWSLETTER_HOSTS: &[&str] = &[
    "substack.com",
    "buttondown.email",
    "ghost.io",
    "mailchi.mp",
    "tinyletter.com",
];

/// Document file extensions
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".epub"];

/// Stateless URL classifier.
///
/// Pattern tables are checked in order: video hosts, podcast platforms,
/// newsletter platforms, document extensions. Anything else is an article.
/// Deterministic and side-effect free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeDetector;

impl ContentTypeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify a URL
    pub fn detect(&self, url: &str) -> ContentType {
        let url_lower = url.to_lowercase();

        if VIDEO_HOSTS.iter().any(|host| url_lower.contains(host)) {
            return ContentType::Video;
        }

        if PODCAST_PATTERNS.iter().any(|pat| url_lower.contains(pat)) {
            return ContentType::Podcast;
        }

        if NEWSLETTER_HOSTS.iter().any(|host| url_lower.contains(host)) {
            return ContentType::Newsletter;
        }

        // Extension check ignores query string and fragment
        let path_end = url_lower.split(['?', '#']).next().unwrap_or("");
        if DOCUMENT_EXTENSIONS.iter().any(|ext| path_end.ends_with(ext)) {
            return ContentType::Document;
        }

        ContentType::Article
    }
}
