use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{error, info, warn};

use crate::config::{SourceConfig, SourceKind};

/// Character cap on feed entry content sent to the summarizer
pub const FEED_CONTENT_LIMIT: usize = 500;
/// Character cap on scraped page text
pub const SCRAPE_CONTENT_LIMIT: usize = 800;

#[derive(Debug, Clone)]
pub struct Article {
    pub category: String,
    pub source: String,
    pub title: String,
    pub link: String,
    /// Cleaned feed summary or page extract, fed to the summarizer
    pub content: String,
    pub published: Option<DateTime<Utc>>,
    /// Filled in by the summarizer
    pub summary: Option<String>,
}

pub struct Fetcher {
    client: Client,
    permissive_client: Client,
    fetch_all: bool,
}

impl Fetcher {
    pub fn new(fetch_all: bool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("NewsBrief/1.0 (News Briefing Generator)")
            .build()
            .expect("Failed to create HTTP client");

        // Fallback client for sources with broken certificate chains
        let permissive_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("NewsBrief/1.0 (News Briefing Generator)")
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            permissive_client,
            fetch_all,
        }
    }

    /// Fetch every configured source in order. A source that fails to
    /// download or parse is logged and skipped; it never aborts the run.
    pub async fn fetch_all_sources(&self, sources: &[SourceConfig]) -> Vec<Article> {
        let mut all_articles = Vec::new();

        for source in sources {
            match self.fetch_source(source).await {
                Ok(articles) => {
                    info!("Found {} items for source '{}'", articles.len(), source.name);
                    all_articles.extend(articles);
                }
                Err(e) => {
                    error!("Failed to fetch source '{}': {}", source.name, e);
                }
            }
        }

        all_articles
    }

    pub async fn fetch_source(&self, source: &SourceConfig) -> anyhow::Result<Vec<Article>> {
        info!("Fetching source: {} ({})", source.name, source.url);

        match source.kind {
            SourceKind::Scrape => self.fetch_scrape(source).await,
            _ => self.fetch_feed(source).await,
        }
    }

    async fn fetch_feed(&self, source: &SourceConfig) -> anyhow::Result<Vec<Article>> {
        let bytes = self.download(&source.url).await?;
        let parsed = parser::parse(&bytes[..])?;

        let mut articles = Vec::new();
        for entry in parsed.entries.iter().take(source.max_items) {
            let published = entry.published.or(entry.updated);
            if !self.fetch_all && !is_today(published) {
                continue;
            }

            articles.push(entry_to_article(entry, source));
        }

        Ok(articles)
    }

    async fn fetch_scrape(&self, source: &SourceConfig) -> anyhow::Result<Vec<Article>> {
        let bytes = self.download(&source.url).await?;
        let body = String::from_utf8_lossy(&bytes);

        let text = extract_page_text(&body);
        if text.is_empty() {
            warn!("No readable text extracted from '{}'", source.name);
            return Ok(Vec::new());
        }

        // Scraped pages carry no timestamp, so treat them as current
        Ok(vec![Article {
            category: source.category.clone(),
            source: source.name.clone(),
            title: format!("{} - Latest", source.name),
            link: source.url.clone(),
            content: truncate_chars(&text, SCRAPE_CONTENT_LIMIT),
            published: Some(Utc::now()),
            summary: None,
        }])
    }

    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.error_for_status()?.bytes().await?.to_vec()),
            Err(e) if is_certificate_error(&e) => {
                warn!(
                    "Certificate verification failed for {}, retrying without verification",
                    url
                );
                let response = self.permissive_client.get(url).send().await?;
                Ok(response.error_for_status()?.bytes().await?.to_vec())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a parsed feed entry onto an article record.
pub fn entry_to_article(entry: &feed_rs::model::Entry, source: &SourceConfig) -> Article {
    let title = entry
        .title
        .as_ref()
        .map(|t| clean_html(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_else(|| source.url.clone());

    let raw = entry
        .summary
        .as_ref()
        .map(|t| t.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    let mut content = truncate_chars(&clean_html(&raw), FEED_CONTENT_LIMIT);

    // Atom entries (e.g. ArXiv) carry author lists worth keeping for context
    if source.kind == SourceKind::Atom {
        let authors = entry
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        if !authors.is_empty() {
            content = format!("Authors: {authors}. {content}");
        }
    }

    Article {
        category: source.category.clone(),
        source: source.name.clone(),
        title,
        link,
        content,
        published: entry.published.or(entry.updated),
        summary: None,
    }
}

/// Strip markup from feed-provided text and collapse whitespace runs.
pub fn clean_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(text);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Extract readable text from a web page, preferring paragraphs inside
/// article/main containers over the page at large.
pub fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let scoped = Selector::parse("article p, main p").expect("valid selector");
    let any_paragraph = Selector::parse("p").expect("valid selector");

    let mut parts = collect_text(document.select(&scoped));
    if parts.is_empty() {
        parts = collect_text(document.select(&any_paragraph));
    }

    parts.join(" ")
}

fn collect_text<'a>(elements: impl Iterator<Item = scraper::ElementRef<'a>>) -> Vec<String> {
    elements
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| !text.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Whether a publication timestamp falls on today's UTC date. Entries with no
/// timestamp are treated as not-today and dropped by the default filter.
pub fn is_today(published: Option<DateTime<Utc>>) -> bool {
    match published {
        Some(ts) => ts.date_naive() == Utc::now().date_naive(),
        None => false,
    }
}

fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if inner.to_string().to_lowercase().contains("certificate") {
            return true;
        }
        source = inner.source();
    }
    err.to_string().to_lowercase().contains("certificate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceKind};

    fn test_source(kind: SourceKind) -> SourceConfig {
        SourceConfig {
            name: "Test Source".to_string(),
            url: "https://example.com/feed".to_string(),
            category: "Tech".to_string(),
            kind,
            max_items: 50,
        }
    }

    fn parse_entries(xml: &str) -> Vec<feed_rs::model::Entry> {
        parser::parse(xml.as_bytes()).unwrap().entries
    }

    mod clean_html_tests {
        use super::*;

        #[test]
        fn test_strips_tags() {
            let result = clean_html("<p>Hello <b>World</b></p>");
            assert_eq!(result, "Hello World");
        }

        #[test]
        fn test_collapses_whitespace() {
            let result = clean_html("Hello\n\n  World\r\n again");
            assert_eq!(result, "Hello World again");
        }

        #[test]
        fn test_empty_input() {
            assert_eq!(clean_html(""), "");
        }

        #[test]
        fn test_plain_text_unchanged() {
            assert_eq!(clean_html("Just plain text"), "Just plain text");
        }

        #[test]
        fn test_decodes_entities() {
            assert_eq!(clean_html("Fish &amp; Chips"), "Fish & Chips");
        }
    }

    mod truncate_chars_tests {
        use super::*;

        #[test]
        fn test_truncates_long_text() {
            let result = truncate_chars("abcdef", 3);
            assert_eq!(result, "abc");
        }

        #[test]
        fn test_keeps_short_text() {
            let result = truncate_chars("abc", 10);
            assert_eq!(result, "abc");
        }

        #[test]
        fn test_multibyte_boundary() {
            // Truncation counts characters, not bytes
            let result = truncate_chars("héllo wörld", 5);
            assert_eq!(result, "héllo");
        }
    }

    mod is_today_tests {
        use super::*;

        #[test]
        fn test_none_is_not_today() {
            assert!(!is_today(None));
        }

        #[test]
        fn test_now_is_today() {
            assert!(is_today(Some(Utc::now())));
        }

        #[test]
        fn test_two_days_ago_is_not_today() {
            let old = Utc::now() - chrono::Duration::days(2);
            assert!(!is_today(Some(old)));
        }
    }

    mod entry_to_article_tests {
        use super::*;

        const RSS_XML: &str = r#"<?xml version="1.0"?>
            <rss version="2.0">
                <channel>
                    <title>Test Channel</title>
                    <item>
                        <guid>item-1</guid>
                        <title>First &amp; Finest</title>
                        <link>https://example.com/articles/1</link>
                        <description><![CDATA[<p>Some <b>bold</b> news</p>]]></description>
                        <pubDate>Tue, 04 Aug 2026 09:30:00 +0000</pubDate>
                    </item>
                    <item>
                        <guid>item-2</guid>
                        <description>No title or link here</description>
                    </item>
                </channel>
            </rss>
        "#;

        const ATOM_XML: &str = r#"<?xml version="1.0"?>
            <feed xmlns="http://www.w3.org/2005/Atom">
                <id>urn:feed</id>
                <title>Papers</title>
                <updated>2026-08-04T00:00:00Z</updated>
                <entry>
                    <id>urn:entry-1</id>
                    <title>A Study of Things</title>
                    <link href="https://arxiv.example.com/abs/1234"/>
                    <author><name>Ada Lovelace</name></author>
                    <author><name>Alan Turing</name></author>
                    <summary>We study things.</summary>
                    <updated>2026-08-04T10:00:00Z</updated>
                </entry>
            </feed>
        "#;

        #[test]
        fn test_rss_entry_mapping() {
            let entries = parse_entries(RSS_XML);
            let article = entry_to_article(&entries[0], &test_source(SourceKind::Rss));

            assert_eq!(article.title, "First & Finest");
            assert_eq!(article.link, "https://example.com/articles/1");
            assert_eq!(article.content, "Some bold news");
            assert_eq!(article.category, "Tech");
            assert_eq!(article.source, "Test Source");
            assert!(article.published.is_some());
            assert!(article.summary.is_none());
        }

        #[test]
        fn test_missing_title_and_link_fall_back() {
            let entries = parse_entries(RSS_XML);
            let source = test_source(SourceKind::Rss);
            let article = entry_to_article(&entries[1], &source);

            assert_eq!(article.title, "Untitled");
            // Entries without a link point back at the source URL
            assert_eq!(article.link, source.url);
            assert!(article.published.is_none());
        }

        #[test]
        fn test_atom_entry_includes_authors() {
            let entries = parse_entries(ATOM_XML);
            let article = entry_to_article(&entries[0], &test_source(SourceKind::Atom));

            assert_eq!(article.title, "A Study of Things");
            assert_eq!(
                article.content,
                "Authors: Ada Lovelace, Alan Turing. We study things."
            );
            assert!(article.published.is_some());
        }

        #[test]
        fn test_rss_entry_ignores_authors() {
            let entries = parse_entries(ATOM_XML);
            let article = entry_to_article(&entries[0], &test_source(SourceKind::Rss));

            assert_eq!(article.content, "We study things.");
        }

        #[test]
        fn test_long_description_truncated() {
            let long_body = "word ".repeat(200);
            let xml = format!(
                r#"<?xml version="1.0"?>
                <rss version="2.0">
                    <channel>
                        <title>Test</title>
                        <item>
                            <guid>long</guid>
                            <title>Long</title>
                            <link>https://example.com/long</link>
                            <description>{long_body}</description>
                        </item>
                    </channel>
                </rss>
                "#
            );

            let entries = parse_entries(&xml);
            let article = entry_to_article(&entries[0], &test_source(SourceKind::Rss));
            assert_eq!(article.content.chars().count(), FEED_CONTENT_LIMIT);
        }
    }

    mod extract_page_text_tests {
        use super::*;

        #[test]
        fn test_prefers_article_paragraphs() {
            let html = r#"
                <html><body>
                    <nav><p>Navigation junk</p></nav>
                    <article>
                        <p>Real content here.</p>
                        <p>More real content.</p>
                    </article>
                </body></html>
            "#;

            let text = extract_page_text(html);
            assert_eq!(text, "Real content here. More real content.");
        }

        #[test]
        fn test_falls_back_to_any_paragraph() {
            let html = "<html><body><div><p>Only paragraph.</p></div></body></html>";
            assert_eq!(extract_page_text(html), "Only paragraph.");
        }

        #[test]
        fn test_no_paragraphs_yields_empty() {
            let html = "<html><body><div>bare text</div></body></html>";
            assert_eq!(extract_page_text(html), "");
        }
    }
}
