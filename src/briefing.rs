use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use askama::Template;
use chrono::{DateTime, Utc};

use crate::fetcher::Article;

/// Titles longer than this are truncated in briefing tables
const TITLE_DISPLAY_LIMIT: usize = 60;

/// Escape pipe characters so cell text cannot break the markdown table.
pub fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Render a publication timestamp as `MM-DD-YYYY / HH:MM UTC`.
pub fn format_pub_date(published: Option<DateTime<Utc>>) -> String {
    match published {
        Some(ts) => ts.format("%m-%d-%Y / %H:%M UTC").to_string(),
        None => "N/A".to_string(),
    }
}

pub fn display_title(title: &str) -> String {
    if title.chars().count() > TITLE_DISPLAY_LIMIT {
        let truncated: String = title.chars().take(TITLE_DISPLAY_LIMIT).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    }
}

/// Group articles by UTC publication date (`YYYY-MM-DD`); articles with no
/// timestamp land under the `unknown` key.
pub fn group_by_date(articles: Vec<Article>) -> BTreeMap<String, Vec<Article>> {
    let mut grouped: BTreeMap<String, Vec<Article>> = BTreeMap::new();

    for article in articles {
        let key = match article.published {
            Some(ts) => ts.format("%Y-%m-%d").to_string(),
            None => "unknown".to_string(),
        };
        grouped.entry(key).or_default().push(article);
    }

    grouped
}

/// Render the briefing markdown: header lines followed by one table row per
/// article. Expects articles already sorted newest-first.
pub fn render_markdown(articles: &[Article], date: &str) -> String {
    let mut out = String::new();

    out.push_str(&format!("# 🗞️ Daily Briefing: {date}\n\n"));
    out.push_str(&format!(
        "*Generated at {} UTC*\n\n",
        Utc::now().format("%H:%M")
    ));
    out.push_str(&format!("**Total Articles:** {}\n\n", articles.len()));
    out.push_str("---\n\n");
    out.push_str("| Date/Time | Category | Source | Title | Summary | Link |\n");
    out.push_str("|-----------|----------|--------|-------|---------|------|\n");

    for article in articles {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | [Link]({}) |\n",
            format_pub_date(article.published),
            escape_markdown(&article.category),
            escape_markdown(&article.source),
            escape_markdown(&display_title(&article.title)),
            escape_markdown(article.summary.as_deref().unwrap_or("N/A")),
            article.link,
        ));
    }

    out
}

#[derive(Template)]
#[template(path = "briefing.html")]
struct BriefingTemplate<'a> {
    date: &'a str,
    generated_at: String,
    total: usize,
    rows: Vec<BriefingRow>,
}

struct BriefingRow {
    published: String,
    category: String,
    source: String,
    title: String,
    summary: String,
    link: String,
}

pub fn render_html(articles: &[Article], date: &str) -> anyhow::Result<String> {
    let rows = articles
        .iter()
        .map(|article| BriefingRow {
            published: format_pub_date(article.published),
            category: article.category.clone(),
            source: article.source.clone(),
            title: display_title(&article.title),
            summary: article.summary.clone().unwrap_or_else(|| "N/A".to_string()),
            link: article.link.clone(),
        })
        .collect();

    let template = BriefingTemplate {
        date,
        generated_at: Utc::now().format("%H:%M").to_string(),
        total: articles.len(),
        rows,
    };

    Ok(template.render()?)
}

/// Sort a day's articles newest-first and write the markdown briefing (plus
/// the HTML rendition when requested). Returns the markdown path.
pub fn write_briefing(
    mut articles: Vec<Article>,
    date: &str,
    output_dir: &Path,
    html: bool,
) -> anyhow::Result<PathBuf> {
    // Descending by timestamp; articles with no timestamp end up last
    articles.sort_by(|a, b| b.published.cmp(&a.published));

    fs::create_dir_all(output_dir)?;

    let path = output_dir.join(format!("{date}.md"));
    fs::write(&path, render_markdown(&articles, date))?;

    if html {
        let html_path = output_dir.join(format!("{date}.html"));
        fs::write(&html_path, render_html(&articles, date)?)?;
    }

    Ok(path)
}
