//! Key layout for candidate-article storage.
//!
//! Pure functions from logical identity (topic id, published-date partition,
//! article id) to object-store keys. Keys embed zero-padded date components,
//! so a lexicographic listing of a prefix is also chronological.

/// Namespace for raw candidate article bodies.
pub const CANDIDATE_ARTICLES_NAMESPACE: &str = "raw_candidate_articles";

/// Namespace for raw candidate article embeddings.
pub const CANDIDATE_EMBEDDINGS_NAMESPACE: &str = "raw_candidate_article_embeddings";

/// Extension shared by article and embedding objects.
pub const CANDIDATE_ARTICLE_EXTENSION: &str = ".json";

pub fn candidate_articles_prefix(topic_id: &str, date_partition: &str) -> String {
    format!("{CANDIDATE_ARTICLES_NAMESPACE}/{topic_id}/{date_partition}")
}

pub fn candidate_article_key(topic_id: &str, date_partition: &str, article_id: &str) -> String {
    format!(
        "{}/{article_id}{CANDIDATE_ARTICLE_EXTENSION}",
        candidate_articles_prefix(topic_id, date_partition)
    )
}

pub fn candidate_embeddings_prefix(topic_id: &str, date_partition: &str) -> String {
    format!("{CANDIDATE_EMBEDDINGS_NAMESPACE}/{topic_id}/{date_partition}")
}

pub fn candidate_embedding_key(topic_id: &str, date_partition: &str, article_id: &str) -> String {
    format!(
        "{}/{article_id}{CANDIDATE_ARTICLE_EXTENSION}",
        candidate_embeddings_prefix(topic_id, date_partition)
    )
}
