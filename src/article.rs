use crate::datetime::{published_date_partition, validate_published_date};
use crate::keys::{candidate_article_key, candidate_embedding_key};
use crate::types::{
    ArticleType, DataAccessError, EmbeddingType, Result, Sorting, NO_CATEGORY,
};
use serde::{Deserialize, Serialize};
use url::Url;

fn default_category() -> String {
    NO_CATEGORY.to_string()
}

/// A candidate news article discovered by an aggregator for a topic.
///
/// `dt_published` is canonical ISO-8601 UTC with second precision and is
/// validated on construction and on parse. The enrichment fields
/// (`article_full_text`, `article_text_description`, `article_text_snippet`,
/// `article_processed_data`, `provider_domain`) start empty and are filled
/// at most once by [`RawArticle::process_article_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub article_id: String,
    pub aggregator_id: String,
    pub dt_published: String,
    pub aggregation_index: u32,
    pub topic_id: String,
    /// The search query the article was aggregated for.
    pub topic: String,
    /// A topic discovered algorithmically, if any.
    #[serde(default)]
    pub discovered_topic: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_category")]
    pub requested_category: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub article_full_text: String,
    #[serde(default)]
    pub article_text_snippet: String,
    #[serde(default)]
    pub article_text_description: String,
    /// Raw serialized aggregator payload.
    pub article_data: String,
    pub sorting: Sorting,
    #[serde(default)]
    pub article_type: ArticleType,
    #[serde(default)]
    pub provider_domain: String,
    #[serde(default)]
    pub article_processed_data: String,
}

impl RawArticle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        article_id: String,
        aggregator_id: String,
        dt_published: String,
        aggregation_index: u32,
        topic_id: String,
        topic: String,
        title: String,
        url: String,
        article_data: String,
        sorting: Sorting,
    ) -> Result<Self> {
        validate_published_date(&dt_published)?;
        Ok(Self {
            article_id,
            aggregator_id,
            dt_published,
            aggregation_index,
            topic_id,
            topic,
            discovered_topic: String::new(),
            category: default_category(),
            requested_category: default_category(),
            title,
            url,
            author: String::new(),
            article_full_text: String::new(),
            article_text_snippet: String::new(),
            article_text_description: String::new(),
            article_data,
            sorting,
            article_type: ArticleType::default(),
            provider_domain: String::new(),
            article_processed_data: String::new(),
        })
    }

    /// Parse an article from its canonical JSON body.
    pub fn from_json(body: &str) -> Result<Self> {
        let article: RawArticle = serde_json::from_str(body)?;
        validate_published_date(&article.dt_published)?;
        Ok(article)
    }

    /// Canonical JSON body stored in the object store.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Date partition (`yyyy/mm/dd`) this article is stored under.
    pub fn date_partition(&self) -> Result<String> {
        published_date_partition(&self.dt_published)
    }

    /// Object-store key for this article's body.
    pub fn object_key(&self) -> Result<String> {
        Ok(candidate_article_key(
            &self.topic_id,
            &self.date_partition()?,
            &self.article_id,
        ))
    }

    /// Object-store key for this article's embedding.
    pub fn embedding_object_key(&self) -> Result<String> {
        Ok(candidate_embedding_key(
            &self.topic_id,
            &self.date_partition()?,
            &self.article_id,
        ))
    }
}

/// Provider domain of a source URL: lower-cased host with a leading `www`
/// label dropped.
pub fn derive_provider_domain(url_str: &str) -> Result<String> {
    let parsed = Url::parse(url_str)?;
    let host = parsed.host_str().ok_or_else(|| {
        DataAccessError::Validation(format!("url '{url_str}' has no host"))
    })?;
    let host = host.to_ascii_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// A vector representation of one article for one embedding type and model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticleEmbedding {
    pub article_id: String,
    pub embedding_type: EmbeddingType,
    pub embedding_model_name: String,
    pub embedding: Vec<f32>,
}

impl RawArticleEmbedding {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}
