use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Object metadata as stored alongside an object body.
pub type ObjectMetadata = HashMap<String, String>;

/// Object tags, a separate mutable key/value set on an object.
pub type ObjectTags = HashMap<String, String>;

/// Sentinel category for articles with no category mapping.
pub const NO_CATEGORY: &str = "no-category";

/// Sentinel meaning a topic subscription spans every category.
pub const ALL_CATEGORIES: &str = "all-categories";

/// Tag key marking whether a candidate article has been promoted to sourced.
pub const IS_SOURCED_ARTICLE_TAG_KEY: &str = "is_sourced_article";

/// Tag value for a candidate article that has been sourced.
pub const ARTICLE_SOURCED_TAG_VALUE: &str = "True";

/// Tag value for a candidate article that has not been sourced.
pub const ARTICLE_NOT_SOURCED_TAG_VALUE: &str = "False";

/// Metadata key carrying the aggregation run id on stored articles.
pub const AGGREGATION_RUN_ID_METADATA_KEY: &str = "aggregation_run_id";

/// Metadata key carrying the aggregator id on stored articles.
pub const AGGREGATOR_ID_METADATA_KEY: &str = "aggregator_id";

/// Backend a repository operation is addressed to.
///
/// A closed set so new backends can be added without touching call sites.
/// Only the object-store backend is implemented today; selecting any other
/// variant fails with [`DataAccessError::BackendNotImplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    ObjectStore,
    DocumentStore,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::ObjectStore => write!(f, "object_store"),
            StorageBackend::DocumentStore => write!(f, "document_store"),
        }
    }
}

/// Result ordering requested from an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sorting {
    Relevance,
    Date,
}

impl fmt::Display for Sorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sorting::Relevance => write!(f, "relevance"),
            Sorting::Date => write!(f, "date"),
        }
    }
}

/// Kind of article an aggregator returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleType {
    #[default]
    News,
    Opinion,
}

/// Which parts of an article an embedding was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingType {
    Title,
    Description,
    Content,
    TitleAndDescription,
    TitleAndContent,
}

/// Status of one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatorRunStatus {
    InProgress,
    Complete,
    Failed,
}

impl AggregatorRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregatorRunStatus::InProgress => "InProgress",
            AggregatorRunStatus::Complete => "Complete",
            AggregatorRunStatus::Failed => "Failed",
        }
    }
}

impl FromStr for AggregatorRunStatus {
    type Err = DataAccessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "InProgress" => Ok(AggregatorRunStatus::InProgress),
            "Complete" => Ok(AggregatorRunStatus::Complete),
            "Failed" => Ok(AggregatorRunStatus::Failed),
            other => Err(DataAccessError::Validation(format!(
                "unknown aggregator run status: {other}"
            ))),
        }
    }
}

/// Approval status of a sourced article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ArticleApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleApprovalStatus::Pending => "Pending",
            ArticleApprovalStatus::Approved => "Approved",
            ArticleApprovalStatus::Rejected => "Rejected",
        }
    }
}

impl FromStr for ArticleApprovalStatus {
    type Err = DataAccessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(ArticleApprovalStatus::Pending),
            "Approved" => Ok(ArticleApprovalStatus::Approved),
            "Rejected" => Ok(ArticleApprovalStatus::Rejected),
            other => Err(DataAccessError::Validation(format!(
                "unknown article approval status: {other}"
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    #[error("object {key} already exists in bucket {bucket}")]
    ObjectAlreadyExists { bucket: String, key: String },

    #[error("object {key} does not exist in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("success marker does not exist in bucket {bucket} at prefix {prefix}")]
    SuccessMarkerMissing { bucket: String, prefix: String },

    #[error("published date '{dt_str}' does not match expected pattern {pattern}")]
    InvalidPublishedDate { dt_str: String, pattern: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage backend {0} not implemented")]
    BackendNotImplemented(StorageBackend),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("article extraction error: {0}")]
    Extraction(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, DataAccessError>;
