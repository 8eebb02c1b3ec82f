//! Page-text extraction for the web synthesis source.
//!
//! `scrape(url)` returns the page's main textual content, or an empty string
//! when the page yields nothing usable (non-HTML, boilerplate-only, transport
//! failure). Empty is a normal outcome, never an error — per-URL failures
//! must not be able to sink the web fetcher's scrape batch.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const SCRAPE_TIMEOUT_SECS: u64 = 15;

/// Pages with less extracted text than this are treated as contentless.
const MIN_TEXT_LEN: usize = 100;

/// Subtrees skipped entirely during text collection — scripts, chrome,
/// and non-text media.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "button", "input", "select",
    "textarea", "label", "iframe", "noscript", "img", "svg", "figure", "figcaption",
];

/// Containers tried in order when locating the main content area.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "div#main", "div#content", "body"];

// ── Fetcher enum ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PageFetcher {
    Http(HttpPageFetcher),
    /// url → page text fixture for tests. Unknown URLs scrape to "".
    Static(StaticPages),
}

impl PageFetcher {
    pub fn http() -> Result<Self, FetchError> {
        Ok(PageFetcher::Http(HttpPageFetcher::new()?))
    }

    pub fn fixed(pages: HashMap<String, String>) -> Self {
        PageFetcher::Static(StaticPages { pages })
    }

    /// Main textual content of `url`, or "" when nothing usable came back.
    pub async fn scrape(&self, url: &str) -> String {
        match self {
            PageFetcher::Http(f) => f.scrape(url).await,
            PageFetcher::Static(f) => f.pages.get(url).cloned().unwrap_or_default(),
        }
    }
}

// ── HTTP fetcher ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(SCRAPE_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Scrape(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn scrape(&self, url: &str) -> String {
        match self.fetch_page(url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%url, error = %e, "scrape failed — page contributes no text");
                String::new()
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Scrape(format!("{url}: {e}")))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.is_empty() && !content_type.contains("html") {
            debug!(%url, %content_type, "skipping non-HTML content");
            return Ok(String::new());
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Scrape(format!("{url}: read body: {e}")))?;

        // Html is not Send, so parsing stays inside the blocking closure.
        let text = tokio::task::spawn_blocking(move || extract_text(&html))
            .await
            .map_err(|e| FetchError::Scrape(format!("{url}: extraction task: {e}")))?;

        if !text.is_empty() {
            debug!(%url, chars = text.len(), "scraped page text");
        }
        Ok(text)
    }
}

// ── Static fixture ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StaticPages {
    pages: HashMap<String, String>,
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Extract readable text from an HTML document.
///
/// Locates the main content container, walks its tree skipping
/// [`EXCLUDED_TAGS`] subtrees, collapses blank lines, and discards results
/// under [`MIN_TEXT_LEN`] characters as boilerplate.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(root) = document.select(&selector).next() {
            collect_text(root, &mut raw);
            break;
        }
    }

    let cleaned = normalize_whitespace(&raw);
    if cleaned.chars().count() < MIN_TEXT_LEN {
        return String::new();
    }
    cleaned
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push('\n');
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !EXCLUDED_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    let re = BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n+").expect("static regex"));
    re.replace_all(text, "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(words: usize) -> String {
        vec!["lorem ipsum dolor sit amet consectetur"; words].join(" ")
    }

    #[test]
    fn extracts_paragraph_text() {
        let body = filler(10);
        let html = format!("<html><body><main><p>{body}</p></main></body></html>");
        let text = extract_text(&html);
        assert!(text.contains("lorem ipsum"));
    }

    #[test]
    fn skips_script_and_style() {
        let body = filler(10);
        let html = format!(
            "<html><body><script>var secret = 1;</script>\
             <style>.x {{ color: red }}</style><p>{body}</p></body></html>"
        );
        let text = extract_text(&html);
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
        assert!(text.contains("lorem ipsum"));
    }

    #[test]
    fn skips_nav_and_footer_chrome() {
        let body = filler(10);
        let html = format!(
            "<html><body><nav>Home About Contact</nav>\
             <article><p>{body}</p></article>\
             <footer>Copyright</footer></body></html>"
        );
        let text = extract_text(&html);
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("About"));
        assert!(text.contains("lorem ipsum"));
    }

    #[test]
    fn short_pages_yield_empty() {
        let html = "<html><body><p>too short</p></body></html>";
        assert_eq!(extract_text(html), "");
    }

    #[test]
    fn prefers_main_over_body() {
        let body = filler(10);
        let html = format!(
            "<html><body><div>sidebar junk sidebar junk</div>\
             <main><p>{body}</p></main></body></html>"
        );
        let text = extract_text(&html);
        assert!(!text.contains("sidebar"));
    }

    #[test]
    fn blank_lines_collapse() {
        let normalized = normalize_whitespace("a\n\n\n  \nb\n");
        assert_eq!(normalized, "a\nb");
    }

    #[tokio::test]
    async fn static_fetcher_unknown_url_is_empty() {
        let fetcher = PageFetcher::fixed(HashMap::new());
        assert_eq!(fetcher.scrape("https://nowhere.example").await, "");
    }
}
