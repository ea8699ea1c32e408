//! Non-content URL filtering for the ingestion pipeline.
//!
//! Rejects URL shapes that never carry readable content:
//! - Non-http schemes (mailto:, tel:, javascript:)
//! - Ad and analytics endpoints
//! - Tracking pixels
//! - Social share redirectors
//! - Newsletter plumbing (unsubscribe, click-tracking)
//!
//! Matching is pure and runs before any network call.

use glob::Pattern;
use tracing::warn;

/// URL shapes rejected before fetching. Hosts are matched with a leading
/// `*` so subdomains are covered; matching is done on the lowercased URL.
const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    // Non-content schemes
    "mailto:*",
    "tel:*",
    "javascript:*",
    // Ad and analytics endpoints
    "*://*doubleclick.net/*",
    "*://*google-analytics.com/*",
    "*://*googletagmanager.com/*",
    "*://*googlesyndication.com/*",
    "*://*amazon-adsystem.com/*",
    "*://*facebook.com/tr*",
    // Tracking pixels
    "*/pixel.gif*",
    "*/pixel.png*",
    "*/open.gif*",
    // Social share redirectors
    "*://*facebook.com/sharer*",
    "*://*twitter.com/intent/*",
    "*://x.com/intent/*",
    "*://www.x.com/intent/*",
    "*://*linkedin.com/share*",
    "*://*pinterest.com/pin/create*",
    "*://*reddit.com/submit*",
    // Newsletter plumbing
    "*/unsubscribe*",
    "*list-manage.com/track*",
];

/// Compiled skip filter. Built once at pipeline construction; matching a
/// URL allocates nothing beyond the lowercase copy.
#[derive(Debug, Clone)]
pub struct SkipList {
    patterns: Vec<Pattern>,
}

impl SkipList {
    /// Build the filter from the built-in patterns plus user-configured
    /// extras. Invalid extra patterns are logged and dropped rather than
    /// failing construction.
    pub fn new(extra_patterns: &[String]) -> Self {
        let mut patterns = Vec::with_capacity(DEFAULT_SKIP_PATTERNS.len() + extra_patterns.len());

        for pattern_str in DEFAULT_SKIP_PATTERNS
            .iter()
            .copied()
            .chain(extra_patterns.iter().map(|s| s.as_str()))
        {
            match Pattern::new(pattern_str) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    warn!(pattern = %pattern_str, error = %e, "Ignoring invalid skip pattern");
                }
            }
        }

        Self { patterns }
    }

    /// Check whether a URL matches any skip pattern.
    pub fn should_skip(&self, url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        self.patterns.iter().any(|p| p.matches(&url))
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_non_content_schemes() {
        let skiplist = SkipList::default();

        assert!(skiplist.should_skip("mailto:editor@example.com"));
        assert!(skiplist.should_skip("tel:+15551234567"));
        assert!(skiplist.should_skip("javascript:void(0)"));
    }

    #[test]
    fn test_skips_trackers_and_pixels() {
        let skiplist = SkipList::default();

        assert!(skiplist.should_skip("https://ad.doubleclick.net/ddm/clk/123"));
        assert!(skiplist.should_skip("https://www.google-analytics.com/collect?v=1"));
        assert!(skiplist.should_skip("https://www.facebook.com/tr?id=123&ev=PageView"));
        assert!(skiplist.should_skip("https://news.example.com/email/pixel.gif?id=42"));
        assert!(skiplist.should_skip("https://example.us1.list-manage.com/track/click?u=abc"));
    }

    #[test]
    fn test_skips_share_links() {
        let skiplist = SkipList::default();

        assert!(skiplist.should_skip("https://www.facebook.com/sharer/sharer.php?u=x"));
        assert!(skiplist.should_skip("https://twitter.com/intent/tweet?text=hello"));
        assert!(skiplist.should_skip("https://x.com/intent/post?text=hello"));
        assert!(skiplist.should_skip("https://www.linkedin.com/share?url=x"));
        assert!(skiplist.should_skip("https://www.reddit.com/submit?url=x"));
    }

    #[test]
    fn test_allows_real_content() {
        let skiplist = SkipList::default();

        assert!(!skiplist.should_skip("https://example.com/blog/how-we-built-it"));
        assert!(!skiplist.should_skip("https://www.youtube.com/watch?v=abc123"));
        assert!(!skiplist.should_skip("https://podcasts.apple.com/us/podcast/id123"));
        assert!(!skiplist.should_skip("https://twitter.com/someone/status/123"));
        assert!(!skiplist.should_skip("https://newsletter.example.com/p/latest-issue"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let skiplist = SkipList::default();

        assert!(skiplist.should_skip("MAILTO:Editor@Example.com"));
        assert!(skiplist.should_skip("https://Twitter.com/intent/tweet"));
    }

    #[test]
    fn test_extra_patterns() {
        let skiplist = SkipList::new(&["*internal.corp/*".to_string()]);

        assert!(skiplist.should_skip("https://wiki.internal.corp/page"));
        assert!(!skiplist.should_skip("https://example.com/page"));
    }

    #[test]
    fn test_invalid_extra_pattern_is_dropped() {
        // A `**` inside a path component is rejected by the glob parser.
        let skiplist = SkipList::new(&["bad**pattern".to_string(), "*spam.example/*".to_string()]);

        assert!(skiplist.should_skip("https://spam.example/offer"));
        assert!(!skiplist.should_skip("https://example.com/page"));
    }
}
