//! HTML content extraction.
//!
//! Pulls a clean text body plus title/author/description/date out of raw
//! HTML, and decides whether the result clears the cascade's quality bar.
//! Boilerplate is avoided by preferring known content containers over the
//! whole body.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

/// Selectors for main content, in priority order
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "#content",
    ".post",
];

/// A page reduced to its extractable parts
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Page title, empty when nothing was found
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Clean text content, no markup
    pub body: String,
    pub word_count: usize,
}

impl ExtractedPage {
    /// Build a page directly from known text (archive header notes, tests)
    pub fn from_text(title: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let word_count = body.split_whitespace().count();
        Self {
            title: title.into(),
            author: None,
            description: None,
            published_at: None,
            body,
            word_count,
        }
    }
}

/// HTML to `ExtractedPage` converter with pre-compiled content selectors
pub struct PageExtractor {
    content_selectors: Vec<Selector>,
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageExtractor {
    pub fn new() -> Self {
        let content_selectors = CONTENT_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        Self { content_selectors }
    }

    /// Extract everything we can from an HTML document
    pub fn extract(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);

        let body = self.extract_text(&self.find_main_content(&document));
        let word_count = body.split_whitespace().count();

        ExtractedPage {
            title: self.extract_title(&document),
            author: self.extract_author(&document),
            description: self.extract_description(&document),
            published_at: self.extract_date(&document),
            body,
            word_count,
        }
    }

    /// Find the main content area's HTML, falling back to the whole body
    fn find_main_content(&self, document: &Html) -> String {
        for selector in &self.content_selectors {
            if let Some(element) = document.select(selector).next() {
                let html = element.html();
                if html.len() > 200 {
                    return html;
                }
            }
        }

        if let Ok(body_sel) = Selector::parse("body") {
            if let Some(body) = document.select(&body_sel).next() {
                return body.html();
            }
        }

        String::new()
    }

    /// Flatten HTML to clean text, keeping paragraph breaks
    fn extract_text(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);

        let mut text = String::new();
        let mut last_was_block = false;

        for node in fragment.root_element().descendants() {
            if let Some(text_node) = node.value().as_text() {
                // Text inside script/style subtrees is not content
                let in_skipped = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .map_or(false, |e| matches!(e.name(), "script" | "style" | "noscript"))
                });
                if in_skipped {
                    continue;
                }

                let t = text_node.trim();
                if !t.is_empty() {
                    if last_was_block && !text.is_empty() {
                        text.push('\n');
                    } else if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(t);
                    last_was_block = false;
                }
            } else if let Some(elem) = node.value().as_element() {
                let is_block = matches!(
                    elem.name(),
                    "p" | "div"
                        | "br"
                        | "h1"
                        | "h2"
                        | "h3"
                        | "h4"
                        | "h5"
                        | "h6"
                        | "li"
                        | "tr"
                        | "blockquote"
                );
                if is_block {
                    last_was_block = true;
                }
            }
        }

        // Collapse runs of whitespace within lines
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extract_title(&self, document: &Html) -> String {
        if let Some(og_title) = get_meta_content(document, "og:title") {
            return og_title;
        }

        if let Ok(selector) = Selector::parse("title") {
            if let Some(elem) = document.select(&selector).next() {
                let title = elem.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }

        if let Ok(selector) = Selector::parse("h1") {
            if let Some(elem) = document.select(&selector).next() {
                let title = elem.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }

        String::new()
    }

    fn extract_author(&self, document: &Html) -> Option<String> {
        if let Some(author) = get_meta_content(document, "author") {
            return Some(author);
        }

        if let Ok(selector) = Selector::parse("[itemprop='author']") {
            if let Some(elem) = document.select(&selector).next() {
                let text = elem.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }

        None
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        get_meta_content(document, "description")
            .or_else(|| get_meta_content(document, "og:description"))
    }

    fn extract_date(&self, document: &Html) -> Option<DateTime<Utc>> {
        if let Ok(selector) = Selector::parse("time[datetime]") {
            if let Some(elem) = document.select(&selector).next() {
                if let Some(datetime) = elem.value().attr("datetime") {
                    if let Some(dt) = parse_date(datetime) {
                        return Some(dt);
                    }
                }
            }
        }

        for name in &["article:published_time", "date", "datePublished"] {
            if let Some(date_str) = get_meta_content(document, name) {
                if let Some(dt) = parse_date(&date_str) {
                    return Some(dt);
                }
            }
        }

        None
    }
}

/// Quality bar for cascade output: enough body text, and a title for
/// article-like content. Returns the failure reason for the error message.
pub fn quality_failure(
    page: &ExtractedPage,
    min_chars: usize,
    min_words: usize,
    title_required: bool,
) -> Option<String> {
    if page.body.len() < min_chars {
        return Some(format!(
            "body too short ({} chars, need {})",
            page.body.len(),
            min_chars
        ));
    }
    if page.word_count < min_words {
        return Some(format!(
            "too few words ({}, need {})",
            page.word_count, min_words
        ));
    }
    if title_required && page.title.trim().is_empty() {
        return Some("no detectable title".to_string());
    }
    None
}

/// Heuristic for pages that are an empty JS-app shell: framework markers
/// with very little real text. Such a page is below the bar even when the
/// raw HTML is large, so the cascade escalates to the browser strategy.
pub fn looks_js_rendered(html: &str) -> bool {
    let js_hints = [
        "window.__NEXT_DATA__",
        "window.__NUXT__",
        "ng-app",
        "<div id=\"root\"></div>",
        "<div id=\"app\"></div>",
        "data-reactroot",
    ];

    if js_hints.iter().any(|h| html.contains(h)) {
        return true;
    }

    estimate_text_ratio(html) < 0.05
}

/// Ratio of non-tag characters to total HTML length
fn estimate_text_ratio(html: &str) -> f32 {
    let total_len = html.len();
    if total_len == 0 {
        return 0.0;
    }

    let mut in_tag = false;
    let mut text_chars = 0usize;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && !c.is_whitespace() => text_chars += 1,
            _ => {}
        }
    }

    text_chars as f32 / total_len as f32
}

fn get_meta_content(document: &Html, name: &str) -> Option<String> {
    for attr in ["name", "property"] {
        let sel = format!("meta[{}='{}']", attr, name);
        let Ok(selector) = Selector::parse(&sel) else {
            continue;
        };
        if let Some(elem) = document.select(&selector).next() {
            if let Some(content) = elem.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// Parse a date string in any of the formats sites commonly emit
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];
    for format in &formats {
        if let Ok(naive) = chrono::NaiveDate::parse_from_str(date_str, format) {
            if let Some(naive_dt) = naive.and_hms_opt(0, 0, 0) {
                return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }
    }

    None
}
