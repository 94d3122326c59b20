//! Candidate-article repository.
//!
//! The load/store/filter/tag-update operations article producers and
//! consumers call. Keys come from the key-layout strategy, bytes go through
//! an injected [`ObjectStore`], and completeness is tracked with the
//! success-marker protocol.

use crate::article::{RawArticle, RawArticleEmbedding};
use crate::datetime::{dt_to_lexicographic_date_prefix, dt_to_lexicographic_prefix};
use crate::keys::{
    candidate_article_key, candidate_articles_prefix, candidate_embedding_key,
    candidate_embeddings_prefix, CANDIDATE_ARTICLE_EXTENSION,
};
use crate::object_store::{read_objects_from_prefix_with_suffix, ObjectStore};
use crate::success_marker::{
    append_aggregator, read_success_marker, store_success_marker, success_marker_exists,
};
use crate::types::{
    DataAccessError, ObjectMetadata, ObjectTags, Result, StorageBackend,
    AGGREGATION_RUN_ID_METADATA_KEY, AGGREGATOR_ID_METADATA_KEY, ARTICLE_NOT_SOURCED_TAG_VALUE,
    ARTICLE_SOURCED_TAG_VALUE, IS_SOURCED_ARTICLE_TAG_KEY,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// An article read back from storage, with its object metadata and tags.
#[derive(Debug, Clone)]
pub struct LoadedArticle {
    pub article: RawArticle,
    pub metadata: ObjectMetadata,
    pub tags: ObjectTags,
}

/// Repository of candidate articles for one topic.
///
/// The store client is injected into every operation; the repository owns no
/// connection. Operations dispatch on the configured [`StorageBackend`];
/// only the object-store backend is implemented.
pub struct CandidateArticles {
    backend: StorageBackend,
    topic_id: String,
    bucket: String,
    candidate_articles: Vec<RawArticle>,
}

impl CandidateArticles {
    pub fn new(
        backend: StorageBackend,
        topic_id: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            topic_id: topic_id.into(),
            bucket: bucket.into(),
            candidate_articles: Vec::new(),
        }
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Articles returned by the most recent `load_articles` call.
    pub fn last_loaded(&self) -> &[RawArticle] {
        &self.candidate_articles
    }

    fn require_object_store_backend(&self) -> Result<()> {
        match self.backend {
            StorageBackend::ObjectStore => Ok(()),
            other => Err(DataAccessError::BackendNotImplemented(other)),
        }
    }

    fn validate_topic(&self, article: &RawArticle) -> Result<()> {
        if article.topic_id != self.topic_id {
            return Err(DataAccessError::Validation(format!(
                "article {} belongs to topic {}, repository is for topic {}",
                article.article_id, article.topic_id, self.topic_id
            )));
        }
        Ok(())
    }

    /// Store a batch of candidate articles.
    ///
    /// Each article is written under its own published-date partition with
    /// metadata `{aggregation_run_id, aggregator_id}`, the not-sourced tag,
    /// and overwrite disallowed: the first write of an article id wins and a
    /// duplicate fails with `ObjectAlreadyExists`. Writes issued before a
    /// mid-batch failure stay committed.
    ///
    /// After the bodies are written, the success marker of every touched
    /// prefix is updated, accumulating the contributing aggregator ids.
    /// Returns the bucket and the distinct prefixes touched, sorted.
    pub async fn store_articles(
        &self,
        store: &dyn ObjectStore,
        articles: &[RawArticle],
        aggregation_run_id: &str,
    ) -> Result<(String, Vec<String>)> {
        self.require_object_store_backend()?;
        if aggregation_run_id.is_empty() {
            return Err(DataAccessError::Validation(
                "aggregation_run_id is required".to_string(),
            ));
        }
        // Fail fast on anything detectable before the first write.
        let mut partitions = Vec::with_capacity(articles.len());
        for article in articles {
            self.validate_topic(article)?;
            partitions.push(article.date_partition()?);
        }

        // Aggregator ids per touched prefix, in first-seen order.
        let mut prefix_aggregators: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (article, partition) in articles.iter().zip(&partitions) {
            let key = candidate_article_key(&self.topic_id, partition, &article.article_id);
            let body = article.to_json()?;
            let metadata = ObjectMetadata::from([
                (
                    AGGREGATION_RUN_ID_METADATA_KEY.to_string(),
                    aggregation_run_id.to_string(),
                ),
                (
                    AGGREGATOR_ID_METADATA_KEY.to_string(),
                    article.aggregator_id.clone(),
                ),
            ]);
            let tags = ObjectTags::from([(
                IS_SOURCED_ARTICLE_TAG_KEY.to_string(),
                ARTICLE_NOT_SOURCED_TAG_VALUE.to_string(),
            )]);
            store
                .put(&self.bucket, &key, &body, &metadata, &tags, false)
                .await?;

            let prefix = candidate_articles_prefix(&self.topic_id, partition);
            let aggregators = prefix_aggregators.entry(prefix).or_default();
            if !aggregators.contains(&article.aggregator_id) {
                aggregators.push(article.aggregator_id.clone());
            }
        }

        let aggregation_dt = dt_to_lexicographic_prefix(Utc::now());
        for (prefix, aggregator_ids) in &prefix_aggregators {
            let mut marker_metadata =
                if success_marker_exists(store, &self.bucket, prefix).await? {
                    let (marker_body, existing, _) =
                        read_success_marker(store, &self.bucket, prefix).await?;
                    info!(
                        "Existing success marker at {prefix} written at {marker_body}, \
                         appending aggregators {aggregator_ids:?}"
                    );
                    existing
                } else {
                    ObjectMetadata::new()
                };
            for aggregator_id in aggregator_ids {
                append_aggregator(&mut marker_metadata, aggregator_id, &aggregation_dt);
            }
            store_success_marker(store, &self.bucket, prefix, &marker_metadata).await?;
        }

        let prefixes = prefix_aggregators.into_keys().collect();
        Ok((self.bucket.clone(), prefixes))
    }

    /// Store a batch of article embeddings, aligned index-for-index with the
    /// articles they were computed from.
    ///
    /// Batch shape is validated in full before any write: mismatched lengths
    /// or a positional `article_id` mismatch fail without touching storage.
    /// Embedding writes always allow overwrite; re-embedding is idempotent.
    pub async fn store_embeddings(
        &self,
        store: &dyn ObjectStore,
        articles: &[RawArticle],
        embeddings: &[RawArticleEmbedding],
    ) -> Result<(String, Vec<String>)> {
        self.require_object_store_backend()?;
        if articles.len() != embeddings.len() {
            return Err(DataAccessError::Validation(format!(
                "articles and embeddings must align: {} articles, {} embeddings",
                articles.len(),
                embeddings.len()
            )));
        }
        let mut partitions = Vec::with_capacity(articles.len());
        for (article, embedding) in articles.iter().zip(embeddings) {
            if article.article_id != embedding.article_id {
                return Err(DataAccessError::Validation(format!(
                    "embedding article id {} does not match article id {}",
                    embedding.article_id, article.article_id
                )));
            }
            self.validate_topic(article)?;
            partitions.push(article.date_partition()?);
        }

        let mut prefixes: Vec<String> = Vec::new();
        for ((article, embedding), partition) in
            articles.iter().zip(embeddings).zip(&partitions)
        {
            let key = candidate_embedding_key(&self.topic_id, partition, &article.article_id);
            let body = embedding.to_json()?;
            store
                .put(
                    &self.bucket,
                    &key,
                    &body,
                    &ObjectMetadata::new(),
                    &ObjectTags::new(),
                    true,
                )
                .await?;
            let prefix = candidate_embeddings_prefix(&self.topic_id, partition);
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        prefixes.sort();
        Ok((self.bucket.clone(), prefixes))
    }

    /// Load all candidate articles published on a given date.
    ///
    /// With `require_complete` the prefix must carry a success marker or the
    /// load fails with `SuccessMarkerMissing`. An optional tag filter keeps
    /// only articles whose tag under the given key equals the given value;
    /// after filtering, duplicate URLs are dropped keeping the first
    /// occurrence in key order. The result replaces the cached last-loaded
    /// set.
    pub async fn load_articles(
        &mut self,
        store: &dyn ObjectStore,
        publishing_date: DateTime<Utc>,
        tag_filter: Option<(&str, &str)>,
        require_complete: bool,
    ) -> Result<Vec<LoadedArticle>> {
        self.require_object_store_backend()?;
        let date_partition = dt_to_lexicographic_date_prefix(publishing_date);
        let prefix = candidate_articles_prefix(&self.topic_id, &date_partition);
        let objects = read_objects_from_prefix_with_suffix(
            store,
            &self.bucket,
            &prefix,
            CANDIDATE_ARTICLE_EXTENSION,
            require_complete,
        )
        .await?;

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut loaded = Vec::with_capacity(objects.len());
        for object in objects {
            let article = RawArticle::from_json(&object.body)?;
            if let Some((filter_key, filter_value)) = tag_filter {
                if object.tags.get(filter_key).map(String::as_str) != Some(filter_value) {
                    continue;
                }
            }
            if !seen_urls.insert(article.url.clone()) {
                debug!(
                    "Dropping article {} with duplicate url {}",
                    article.article_id, article.url
                );
                continue;
            }
            loaded.push(LoadedArticle {
                article,
                metadata: object.metadata,
                tags: object.tags,
            });
        }
        info!(
            "Loaded {} candidate articles from prefix {prefix}",
            loaded.len()
        );
        self.candidate_articles = loaded.iter().map(|l| l.article.clone()).collect();
        Ok(loaded)
    }

    /// Update the is-sourced tag on a batch of stored articles.
    ///
    /// `updated_tag_value` must be one of the two sourced-flag sentinels;
    /// anything else fails before any I/O. For each article the current tag
    /// set is read, the is-sourced tag overlaid, and the full set written
    /// back, preserving unrelated tags.
    pub async fn update_articles_is_sourced_tag(
        &self,
        store: &dyn ObjectStore,
        articles: &[RawArticle],
        updated_tag_value: &str,
    ) -> Result<()> {
        self.require_object_store_backend()?;
        if updated_tag_value != ARTICLE_SOURCED_TAG_VALUE
            && updated_tag_value != ARTICLE_NOT_SOURCED_TAG_VALUE
        {
            return Err(DataAccessError::Validation(format!(
                "updated_tag_value must be '{ARTICLE_SOURCED_TAG_VALUE}' or \
                 '{ARTICLE_NOT_SOURCED_TAG_VALUE}', got '{updated_tag_value}'"
            )));
        }
        let mut keys = Vec::with_capacity(articles.len());
        for article in articles {
            self.validate_topic(article)?;
            keys.push(article.object_key()?);
        }
        for key in &keys {
            let mut tags = store.get_tags(&self.bucket, key).await?;
            tags.insert(
                IS_SOURCED_ARTICLE_TAG_KEY.to_string(),
                updated_tag_value.to_string(),
            );
            store.replace_tags(&self.bucket, key, &tags).await?;
            debug!("Updated is-sourced tag on {key} to {updated_tag_value}");
        }
        Ok(())
    }
}
