use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::config::SummarizerConfig;
use crate::fetcher::Article;

/// Placeholder when the reply skipped an article number
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable";
/// Placeholder when the whole batch request failed
pub const SUMMARY_FAILED: &str = "Error generating summary";

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("summarizer not configured: {0}")]
    NotConfigured(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),
}

pub struct Summarizer {
    config: SummarizerConfig,
    api_key: String,
    client: Client,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig, api_key: String) -> Result<Self, SummarizerError> {
        if api_key.is_empty() {
            return Err(SummarizerError::NotConfigured(
                "API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SummarizerError::Network(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Attach a summary to every article, one API request per batch. A failed
    /// batch degrades to placeholder summaries and the run continues.
    pub async fn summarize_all(&self, articles: &mut [Article]) {
        let batch_size = self.config.batch_size.max(1);

        for (index, batch) in articles.chunks_mut(batch_size).enumerate() {
            let start = index * batch_size;
            info!(
                "Summarizing articles {}-{}",
                start + 1,
                start + batch.len()
            );

            match self.summarize_batch(batch).await {
                Ok(summaries) => {
                    for (i, article) in batch.iter_mut().enumerate() {
                        article.summary = Some(
                            summaries
                                .get(&(i + 1))
                                .cloned()
                                .unwrap_or_else(|| SUMMARY_UNAVAILABLE.to_string()),
                        );
                    }
                }
                Err(e) => {
                    error!("Summarization request failed: {}", e);
                    for article in batch.iter_mut() {
                        article.summary = Some(SUMMARY_FAILED.to_string());
                    }
                }
            }
        }
    }

    async fn summarize_batch(
        &self,
        batch: &[Article],
    ) -> Result<HashMap<usize, String>, SummarizerError> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: build_prompt(batch),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Api(format!("{status} - {error_text}")));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::Api(e.to_string()))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| match block.content_type.as_str() {
                "text" => Some(block.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(parse_numbered_summaries(&text))
    }
}

/// Build the numbered-list prompt for one batch of articles.
pub fn build_prompt(articles: &[Article]) -> String {
    let mut articles_text = String::new();
    for (i, article) in articles.iter().enumerate() {
        articles_text.push_str(&format!(
            "\nARTICLE {}:\nTitle: {}\nSource: {}\nContent: {}\n---\n",
            i + 1,
            article.title,
            article.source,
            article.content
        ));
    }

    format!(
        "You are a news analyst. For each article below, write a 1-2 sentence \
         summary (max 30 words) capturing the key point.\n\n\
         Respond ONLY with a numbered list matching the article numbers. No other text.\n\n\
         Format:\n\
         1. [summary for article 1]\n\
         2. [summary for article 2]\n\
         ...\n\n\
         ARTICLES:\n{articles_text}\n"
    )
}

/// Parse a numbered-list reply into article-number -> summary.
/// Accepts "1. text", "2) text" and "3 text"; other lines are ignored.
pub fn parse_numbered_summaries(text: &str) -> HashMap<usize, String> {
    let line_re = Regex::new(r"^(\d+)[.)\s]+(.+)$").expect("valid regex");

    let mut summaries = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(captures) = line_re.captures(line) {
            if let Ok(num) = captures[1].parse::<usize>() {
                summaries.insert(num, captures[2].trim().to_string());
            }
        }
    }

    summaries
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
