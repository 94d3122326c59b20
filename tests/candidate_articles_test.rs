use chrono::{TimeZone, Utc};
use news_data_access::success_marker::{
    read_success_marker, success_marker_exists, AGGREGATORS_METADATA_KEY,
};
use news_data_access::{
    CandidateArticles, DataAccessError, EmbeddingType, MemoryObjectStore, ObjectStore,
    RawArticle, RawArticleEmbedding, Sorting, StorageBackend, AGGREGATION_RUN_ID_METADATA_KEY,
    AGGREGATOR_ID_METADATA_KEY, ARTICLE_NOT_SOURCED_TAG_VALUE, ARTICLE_SOURCED_TAG_VALUE,
    IS_SOURCED_ARTICLE_TAG_KEY, NO_CATEGORY,
};

const TEST_BUCKET: &str = "news-aggregator-candidate-articles-test";
const TEST_TOPIC_ID: &str = "test_topic_id";
const TEST_RUN_ID: &str = "23a0b9db-7a43-48d2-98e7-819a8f885c2e";
const PUBLISHED_APRIL: &str = "2023-04-11T21:02:39+00:00";
const PUBLISHED_MAY: &str = "2023-05-11T21:02:39+00:00";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

fn article(article_id: &str, aggregator_id: &str, url: &str, dt_published: &str) -> RawArticle {
    RawArticle::new(
        article_id.to_string(),
        aggregator_id.to_string(),
        dt_published.to_string(),
        0,
        TEST_TOPIC_ID.to_string(),
        "topic".to_string(),
        "the article title".to_string(),
        url.to_string(),
        "article_data".to_string(),
        Sorting::Date,
    )
    .expect("valid article")
}

fn embedding(article_id: &str) -> RawArticleEmbedding {
    RawArticleEmbedding {
        article_id: article_id.to_string(),
        embedding_type: EmbeddingType::Title,
        embedding_model_name: "ada-2".to_string(),
        embedding: vec![0.1, 0.55, 0.2],
    }
}

fn repository() -> CandidateArticles {
    CandidateArticles::new(StorageBackend::ObjectStore, TEST_TOPIC_ID, TEST_BUCKET)
}

#[test]
fn test_raw_article_defaults() {
    let raw_article = article("article_id", "aggregator_id", "url", PUBLISHED_APRIL);
    assert_eq!(raw_article.discovered_topic, "");
    assert_eq!(raw_article.category, NO_CATEGORY);
    assert_eq!(raw_article.requested_category, NO_CATEGORY);
    assert_eq!(raw_article.provider_domain, "");
    assert_eq!(raw_article.article_processed_data, "");
}

#[test]
fn test_raw_article_rejects_invalid_published_date() {
    let result = RawArticle::new(
        "article_id".to_string(),
        "aggregator_id".to_string(),
        "11 April 2023".to_string(),
        0,
        TEST_TOPIC_ID.to_string(),
        "topic".to_string(),
        "title".to_string(),
        "url".to_string(),
        "article_data".to_string(),
        Sorting::Date,
    );
    assert!(matches!(
        result,
        Err(DataAccessError::InvalidPublishedDate { .. })
    ));
}

#[test]
fn test_raw_article_json_roundtrip() {
    let original = article(
        "article_id",
        "aggregator_id",
        "https://example.com/a",
        PUBLISHED_APRIL,
    );
    let body = original.to_json().expect("to_json");
    let parsed = RawArticle::from_json(&body).expect("from_json");
    assert_eq!(parsed, original);
}

#[test]
fn test_raw_article_parse_with_optional_fields() {
    let body = serde_json::json!({
        "article_id": "article_id",
        "aggregator_id": "aggregator_id",
        "dt_published": PUBLISHED_APRIL,
        "aggregation_index": 0,
        "topic_id": TEST_TOPIC_ID,
        "topic": "topic",
        "title": "the article title",
        "url": "url",
        "article_data": "article_data",
        "sorting": "date",
        "discovered_topic": "some_discovered_topic",
        "category": "some_category"
    })
    .to_string();
    let parsed = RawArticle::from_json(&body).expect("from_json");
    assert_eq!(parsed.discovered_topic, "some_discovered_topic");
    assert_eq!(parsed.category, "some_category");
    assert_eq!(parsed.requested_category, NO_CATEGORY);
    assert_eq!(parsed.sorting, Sorting::Date);
}

#[tokio::test]
async fn test_store_articles_writes_bodies_metadata_and_tags() -> anyhow::Result<()> {
    init_tracing();
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![
        article("article_id", "bing", "url", PUBLISHED_APRIL),
        article("article_id 2", "bing", "url 2", PUBLISHED_APRIL),
    ];

    let (bucket, prefixes) = repo.store_articles(&store, &articles, TEST_RUN_ID).await?;
    assert_eq!(bucket, TEST_BUCKET);
    assert_eq!(
        prefixes,
        vec![format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11")]
    );

    let key = format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11/article_id.json");
    let (body, metadata, tags) = store.get(TEST_BUCKET, &key).await?;
    let stored = RawArticle::from_json(&body)?;
    assert_eq!(stored, articles[0]);
    assert_eq!(metadata[AGGREGATION_RUN_ID_METADATA_KEY], TEST_RUN_ID);
    assert_eq!(metadata[AGGREGATOR_ID_METADATA_KEY], "bing");
    assert_eq!(tags[IS_SOURCED_ARTICLE_TAG_KEY], ARTICLE_NOT_SOURCED_TAG_VALUE);
    Ok(())
}

#[tokio::test]
async fn test_store_articles_spanning_months_touches_two_prefixes() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![
        article("article_id", "bing", "url", PUBLISHED_APRIL),
        article("article_id 2", "bing", "url 2", PUBLISHED_MAY),
    ];

    let (_, prefixes) = repo
        .store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("store");
    assert_eq!(
        prefixes,
        vec![
            format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11"),
            format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/05/11"),
        ]
    );
    for prefix in &prefixes {
        assert!(success_marker_exists(&store, TEST_BUCKET, prefix)
            .await
            .expect("marker exists"));
    }
}

#[tokio::test]
async fn test_store_articles_duplicate_id_fails_with_already_exists() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![article("article_id", "bing", "url", PUBLISHED_APRIL)];
    repo.store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("first store");

    let result = repo.store_articles(&store, &articles, TEST_RUN_ID).await;
    assert!(matches!(
        result,
        Err(DataAccessError::ObjectAlreadyExists { .. })
    ));
}

#[tokio::test]
async fn test_store_articles_requires_run_id() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![article("article_id", "bing", "url", PUBLISHED_APRIL)];
    let result = repo.store_articles(&store, &articles, "").await;
    assert!(matches!(result, Err(DataAccessError::Validation(_))));
}

#[tokio::test]
async fn test_success_marker_metadata_accumulates_across_aggregators() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    repo.store_articles(
        &store,
        &[article("article_id", "bing", "url", PUBLISHED_APRIL)],
        TEST_RUN_ID,
    )
    .await
    .expect("store from bing");
    repo.store_articles(
        &store,
        &[article("article_id 2", "newsapi", "url 2", PUBLISHED_APRIL)],
        TEST_RUN_ID,
    )
    .await
    .expect("store from newsapi");

    let prefix = format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11");
    let (_, metadata, _) = read_success_marker(&store, TEST_BUCKET, &prefix)
        .await
        .expect("read marker");
    assert_eq!(metadata[AGGREGATORS_METADATA_KEY], "bing,newsapi");
}

#[tokio::test]
async fn test_load_articles_returns_stored_articles_in_key_order() -> anyhow::Result<()> {
    let store = MemoryObjectStore::new();
    let mut repo = repository();
    let articles = vec![
        article("article_1", "bing", "url", PUBLISHED_APRIL),
        article("article_2", "bing", "url 2", PUBLISHED_APRIL),
    ];
    repo.store_articles(&store, &articles, TEST_RUN_ID).await?;

    let publishing_date = Utc.with_ymd_and_hms(2023, 4, 11, 0, 0, 0).unwrap();
    let loaded = repo.load_articles(&store, publishing_date, None, true).await?;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].article.article_id, "article_1");
    assert_eq!(loaded[1].article.article_id, "article_2");
    assert_eq!(repo.last_loaded().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_load_articles_without_marker_fails_when_completeness_required() {
    let store = MemoryObjectStore::new();
    let mut repo = repository();
    let publishing_date = Utc.with_ymd_and_hms(2023, 4, 11, 0, 0, 0).unwrap();

    let result = repo.load_articles(&store, publishing_date, None, true).await;
    assert!(matches!(
        result,
        Err(DataAccessError::SuccessMarkerMissing { .. })
    ));

    let loaded = repo
        .load_articles(&store, publishing_date, None, false)
        .await
        .expect("load without check");
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_load_articles_drops_duplicate_urls_keeping_first() {
    let store = MemoryObjectStore::new();
    let mut repo = repository();
    let articles = vec![
        article("article_1", "bing", "same_url", PUBLISHED_APRIL),
        article("article_2", "newsapi", "same_url", PUBLISHED_APRIL),
    ];
    repo.store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("store");

    let publishing_date = Utc.with_ymd_and_hms(2023, 4, 11, 0, 0, 0).unwrap();
    let loaded = repo
        .load_articles(&store, publishing_date, None, false)
        .await
        .expect("load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].article.article_id, "article_1");
}

#[tokio::test]
async fn test_load_articles_with_tag_filter() {
    let store = MemoryObjectStore::new();
    let mut repo = repository();
    let articles = vec![
        article("article_id", "bing", "url", PUBLISHED_APRIL),
        article("article_id 2", "bing", "url 2", PUBLISHED_APRIL),
    ];
    repo.store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("store");
    repo.update_articles_is_sourced_tag(&store, &articles[1..], ARTICLE_SOURCED_TAG_VALUE)
        .await
        .expect("mark sourced");

    let publishing_date = Utc.with_ymd_and_hms(2023, 4, 11, 0, 0, 0).unwrap();
    let unsourced = repo
        .load_articles(
            &store,
            publishing_date,
            Some((IS_SOURCED_ARTICLE_TAG_KEY, ARTICLE_NOT_SOURCED_TAG_VALUE)),
            false,
        )
        .await
        .expect("load unsourced");
    assert_eq!(unsourced.len(), 1);
    assert_eq!(unsourced[0].article.article_id, "article_id");

    let no_match = repo
        .load_articles(
            &store,
            publishing_date,
            Some((IS_SOURCED_ARTICLE_TAG_KEY, "Invalid Value")),
            false,
        )
        .await
        .expect("load with unmatched filter");
    assert!(no_match.is_empty());
}

#[tokio::test]
async fn test_update_is_sourced_tag_preserves_other_tags() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![article("article_id", "bing", "url", PUBLISHED_APRIL)];
    repo.store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("store");

    let key = format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11/article_id.json");
    let mut tags = store.get_tags(TEST_BUCKET, &key).await.expect("get tags");
    tags.insert("other".to_string(), "x".to_string());
    store
        .replace_tags(TEST_BUCKET, &key, &tags)
        .await
        .expect("seed extra tag");

    repo.update_articles_is_sourced_tag(&store, &articles, ARTICLE_SOURCED_TAG_VALUE)
        .await
        .expect("update tag");

    let updated = store.get_tags(TEST_BUCKET, &key).await.expect("get tags");
    assert_eq!(updated[IS_SOURCED_ARTICLE_TAG_KEY], ARTICLE_SOURCED_TAG_VALUE);
    assert_eq!(updated["other"], "x");
}

#[tokio::test]
async fn test_update_is_sourced_tag_rejects_invalid_value_before_io() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![article("article_id", "bing", "url", PUBLISHED_APRIL)];
    repo.store_articles(&store, &articles, TEST_RUN_ID)
        .await
        .expect("store");

    let result = repo
        .update_articles_is_sourced_tag(&store, &articles, "Sourced")
        .await;
    assert!(matches!(result, Err(DataAccessError::Validation(_))));

    let key = format!("raw_candidate_articles/{TEST_TOPIC_ID}/2023/04/11/article_id.json");
    let tags = store.get_tags(TEST_BUCKET, &key).await.expect("get tags");
    assert_eq!(tags[IS_SOURCED_ARTICLE_TAG_KEY], ARTICLE_NOT_SOURCED_TAG_VALUE);
}

#[tokio::test]
async fn test_store_embeddings_writes_under_embedding_prefixes() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![
        article("article_id", "bing", "url", PUBLISHED_APRIL),
        article("article_id 2", "bing", "url 2", PUBLISHED_MAY),
    ];
    let embeddings = vec![embedding("article_id"), embedding("article_id 2")];

    let (bucket, prefixes) = repo
        .store_embeddings(&store, &articles, &embeddings)
        .await
        .expect("store embeddings");
    assert_eq!(bucket, TEST_BUCKET);
    assert_eq!(
        prefixes,
        vec![
            format!("raw_candidate_article_embeddings/{TEST_TOPIC_ID}/2023/04/11"),
            format!("raw_candidate_article_embeddings/{TEST_TOPIC_ID}/2023/05/11"),
        ]
    );

    let key =
        format!("raw_candidate_article_embeddings/{TEST_TOPIC_ID}/2023/04/11/article_id.json");
    let (body, _, _) = store.get(TEST_BUCKET, &key).await.expect("get");
    let stored = RawArticleEmbedding::from_json(&body).expect("parse");
    assert_eq!(stored, embeddings[0]);

    // Re-embedding is idempotent: a second store of the same batch succeeds.
    repo.store_embeddings(&store, &articles, &embeddings)
        .await
        .expect("store embeddings again");
}

#[tokio::test]
async fn test_store_embeddings_rejects_unaligned_batches_before_writing() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let articles = vec![
        article("article_id", "bing", "url", PUBLISHED_APRIL),
        article("article_id 2", "bing", "url 2", PUBLISHED_APRIL),
    ];

    let too_short = vec![embedding("article_id")];
    let result = repo.store_embeddings(&store, &articles, &too_short).await;
    assert!(matches!(result, Err(DataAccessError::Validation(_))));

    let mismatched = vec![embedding("article_id"), embedding("wrong_id")];
    let result = repo.store_embeddings(&store, &articles, &mismatched).await;
    assert!(matches!(result, Err(DataAccessError::Validation(_))));

    let key =
        format!("raw_candidate_article_embeddings/{TEST_TOPIC_ID}/2023/04/11/article_id.json");
    assert!(!store.exists(TEST_BUCKET, &key).await.expect("exists"));
}

#[tokio::test]
async fn test_unimplemented_backend_is_rejected() {
    let store = MemoryObjectStore::new();
    let mut repo =
        CandidateArticles::new(StorageBackend::DocumentStore, TEST_TOPIC_ID, TEST_BUCKET);
    let articles = vec![article("article_id", "bing", "url", PUBLISHED_APRIL)];

    let result = repo.store_articles(&store, &articles, TEST_RUN_ID).await;
    assert!(matches!(
        result,
        Err(DataAccessError::BackendNotImplemented(
            StorageBackend::DocumentStore
        ))
    ));

    let publishing_date = Utc.with_ymd_and_hms(2023, 4, 11, 0, 0, 0).unwrap();
    let result = repo.load_articles(&store, publishing_date, None, false).await;
    assert!(matches!(
        result,
        Err(DataAccessError::BackendNotImplemented(_))
    ));
}

#[tokio::test]
async fn test_store_articles_rejects_article_from_other_topic() {
    let store = MemoryObjectStore::new();
    let repo = repository();
    let mut foreign = article("article_id", "bing", "url", PUBLISHED_APRIL);
    foreign.topic_id = "other_topic".to_string();

    let result = repo.store_articles(&store, &[foreign], TEST_RUN_ID).await;
    assert!(matches!(result, Err(DataAccessError::Validation(_))));
}
