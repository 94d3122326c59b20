//! Full-text enrichment of candidate articles.
//!
//! The extraction service is an external collaborator behind
//! [`ArticleContentExtractor`]: given a source URL it returns structured
//! text, or nothing when the page yields no usable main text. Enrichment on
//! [`RawArticle`] is memoized and degrades silently; one unreachable source
//! must not abort a whole batch.

use crate::article::{derive_provider_domain, RawArticle};
use crate::types::{DataAccessError, Result};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const SNIPPET_MAX_CHARS: usize = 300;

/// Structured text extracted from an article page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub main_text: String,
    pub description: String,
    pub snippet: String,
    /// Page-level metadata with the main text excluded.
    pub metadata: HashMap<String, String>,
}

/// External capability that turns a source URL into structured text.
#[async_trait]
pub trait ArticleContentExtractor: Send + Sync {
    /// Fetch and parse a page. `Ok(None)` means the page was reachable but
    /// held no usable main text.
    async fn extract(&self, url: &str) -> Result<Option<ExtractedContent>>;
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            user_agent: "news-data-access/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
        }
    }
}

/// HTTP implementation of the extraction collaborator.
pub struct HttpArticleExtractor {
    client: Client,
    config: ExtractorConfig,
}

impl HttpArticleExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }
}

impl Default for HttpArticleExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

#[async_trait]
impl ArticleContentExtractor for HttpArticleExtractor {
    async fn extract(&self, url: &str) -> Result<Option<ExtractedContent>> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            ..Default::default()
        };
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {attempt} failed for {url}, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    let html = response.text().await?;
                    debug!("Fetched {} bytes from {url}", html.len());
                    return Ok(extract_from_html(url, &html));
                }
                Ok(response) => {
                    last_error = Some(DataAccessError::Extraction(format!(
                        "HTTP {} fetching {url}",
                        response.status()
                    )));
                }
                Err(e) => {
                    last_error = Some(e.into());
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            DataAccessError::Extraction(format!("failed to fetch {url}"))
        }))
    }
}

/// Pull the main text, description, and page metadata out of an HTML page.
///
/// The content root is the first `<article>`, else `<main>`, else `<body>`;
/// paragraphs under it become the main text. Returns `None` when that text
/// is empty.
fn extract_from_html(url: &str, html: &str) -> Option<ExtractedContent> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article").expect("article selector");
    let main_selector = Selector::parse("main").expect("main selector");
    let body_selector = Selector::parse("body").expect("body selector");
    let root = document
        .select(&article_selector)
        .next()
        .or_else(|| document.select(&main_selector).next())
        .or_else(|| document.select(&body_selector).next())
        .unwrap_or_else(|| document.root_element());

    let paragraph_selector = Selector::parse("p").expect("p selector");
    let mut paragraphs = Vec::new();
    for element in root.select(&paragraph_selector) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    let main_text = paragraphs.join("\n\n");
    if main_text.is_empty() {
        return None;
    }

    let description = meta_content(&document, r#"meta[name="description"]"#)
        .or_else(|| meta_content(&document, r#"meta[property="og:description"]"#))
        .unwrap_or_else(|| paragraphs[0].clone());
    let snippet: String = main_text.chars().take(SNIPPET_MAX_CHARS).collect();

    let mut metadata = HashMap::new();
    metadata.insert("url".to_string(), url.to_string());
    if let Some(title) = page_title(&document) {
        metadata.insert("title".to_string(), title);
    }
    metadata.insert("paragraph_count".to_string(), paragraphs.len().to_string());

    Some(ExtractedContent {
        main_text,
        description,
        snippet,
        metadata,
    })
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

impl RawArticle {
    /// Fetch and cache the article's full text and description from its
    /// source URL.
    ///
    /// Derives `provider_domain` if not already set. Idempotent: once the
    /// processed-data blob or the full text is populated this is a no-op.
    /// Extraction failures and pages without usable main text log a warning
    /// and leave the text fields empty rather than failing.
    pub async fn process_article_data(&mut self, extractor: &dyn ArticleContentExtractor) {
        if self.provider_domain.is_empty() {
            match derive_provider_domain(&self.url) {
                Ok(domain) => self.provider_domain = domain,
                Err(e) => warn!(
                    "Could not derive provider domain for article {}: {e}",
                    self.article_id
                ),
            }
        }
        if !self.article_processed_data.is_empty() || !self.article_full_text.is_empty() {
            debug!("Article {} already processed", self.article_id);
            return;
        }
        match extractor.extract(&self.url).await {
            Ok(Some(content)) => {
                self.article_full_text = content.main_text;
                self.article_text_description = content.description;
                self.article_text_snippet = content.snippet;
                // Main text lives in article_full_text only.
                self.article_processed_data =
                    serde_json::json!(content.metadata).to_string();
            }
            Ok(None) => {
                warn!(
                    "No usable main text extracted for article {} from {}",
                    self.article_id, self.url
                );
            }
            Err(e) => {
                warn!(
                    "Extraction failed for article {} from {}: {e}",
                    self.article_id, self.url
                );
            }
        }
    }

    /// The article's full text, processing it first if needed.
    pub async fn article_text(&mut self, extractor: &dyn ArticleContentExtractor) -> String {
        if self.article_full_text.is_empty() && self.article_processed_data.is_empty() {
            self.process_article_data(extractor).await;
        }
        self.article_full_text.clone()
    }

    /// The article's text description, processing it first if needed.
    pub async fn article_text_description(
        &mut self,
        extractor: &dyn ArticleContentExtractor,
    ) -> String {
        if self.article_full_text.is_empty() && self.article_processed_data.is_empty() {
            self.process_article_data(extractor).await;
        }
        self.article_text_description.clone()
    }
}
