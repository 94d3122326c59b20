pub mod article;
pub mod candidate_articles;
pub mod config;
pub mod datetime;
pub mod document_store;
pub mod extractor;
pub mod keys;
pub mod object_store;
pub mod success_marker;
pub mod topics;
pub mod types;

pub use article::{derive_provider_domain, RawArticle, RawArticleEmbedding};
pub use candidate_articles::{CandidateArticles, LoadedArticle};
pub use config::Config;
pub use document_store::{
    AggregatorRun, DocumentStore, ResultRef, SourcedArticle, TopicSubscription,
    TrustedNewsProvider,
};
pub use extractor::{
    ArticleContentExtractor, ExtractedContent, ExtractorConfig, HttpArticleExtractor,
};
pub use object_store::{
    read_objects_from_prefix_with_suffix, ListedObject, MemoryObjectStore, ObjectStore,
    S3ObjectStore,
};
pub use topics::AggregatorCategoryMapper;
pub use types::*;
