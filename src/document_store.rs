//! Pipeline bookkeeping records: aggregation runs, topic subscriptions,
//! provider trust scores, and sourced articles.
//!
//! This is a thin schema layer around the candidate-article core. The pool
//! is injected or connected explicitly; no global connection state.

use crate::types::{
    AggregatorRunStatus, ArticleApprovalStatus, DataAccessError, Result, StorageBackend,
    ALL_CATEGORIES,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Where an aggregation run left its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRef {
    pub backend: StorageBackend,
    pub bucket: String,
    pub prefixes: Vec<String>,
}

/// One execution of one aggregator against one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorRun {
    pub aggregator_id: String,
    pub run_id: Uuid,
    pub run_datetime: DateTime<Utc>,
    pub run_status: AggregatorRunStatus,
    pub run_end_time: Option<DateTime<Utc>>,
    pub result_ref: Option<ResultRef>,
}

/// A user's subscription to a news topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSubscription {
    pub user_id: String,
    pub topic_id: String,
    pub topic: String,
    pub categories: Vec<String>,
    pub is_active: bool,
    pub date_created: DateTime<Utc>,
    pub max_aggregator_results: Option<i32>,
}

impl TopicSubscription {
    pub fn new(user_id: String, topic_id: String, topic: String) -> Self {
        Self {
            user_id,
            topic_id,
            topic,
            categories: vec![ALL_CATEGORIES.to_string()],
            is_active: true,
            date_created: Utc::now(),
            max_aggregator_results: None,
        }
    }
}

/// A news provider and its trust score, keyed by provider domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustedNewsProvider {
    pub provider_domain: String,
    pub provider_name: String,
    pub provider_url: String,
    pub trust_score: i32,
    pub provider_aliases: Vec<String>,
}

pub const DEFAULT_TRUST_SCORE: i32 = 50;

impl TrustedNewsProvider {
    pub fn new(provider_domain: String, provider_name: String, provider_url: String) -> Self {
        Self {
            provider_domain,
            provider_name,
            provider_url,
            trust_score: DEFAULT_TRUST_SCORE,
            provider_aliases: Vec::new(),
        }
    }
}

/// A candidate article promoted for publication.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedArticle {
    pub article_id: String,
    pub topic_id: String,
    pub topic: String,
    pub requested_category: String,
    pub category: String,
    pub dt_published: DateTime<Utc>,
    pub dt_sourced: DateTime<Utc>,
    pub title: String,
    pub original_article_id: String,
    pub providers: Vec<String>,
    pub article_approval_status: ArticleApprovalStatus,
    pub short_summary_ref: Option<String>,
    pub medium_summary_ref: Option<String>,
    pub long_summary_ref: Option<String>,
    pub thumbs_up: i64,
    pub thumbs_down: i64,
}

/// Postgres-backed store for the pipeline records above.
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS aggregator_runs (
                run_id UUID PRIMARY KEY,
                aggregator_id VARCHAR(255) NOT NULL,
                run_datetime TIMESTAMP WITH TIME ZONE NOT NULL,
                run_status VARCHAR(32) NOT NULL,
                run_end_time TIMESTAMP WITH TIME ZONE,
                result_ref TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topic_subscriptions (
                user_id VARCHAR(255) NOT NULL,
                topic_id VARCHAR(255) NOT NULL,
                topic TEXT NOT NULL,
                categories TEXT NOT NULL,
                is_active BOOLEAN NOT NULL,
                date_created TIMESTAMP WITH TIME ZONE NOT NULL,
                max_aggregator_results INTEGER,
                PRIMARY KEY (user_id, topic_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trusted_news_providers (
                provider_domain VARCHAR(255) PRIMARY KEY,
                provider_name VARCHAR(255) NOT NULL,
                provider_url TEXT NOT NULL,
                trust_score INTEGER NOT NULL,
                provider_aliases TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sourced_articles (
                article_id VARCHAR(255) PRIMARY KEY,
                topic_id VARCHAR(255) NOT NULL,
                topic TEXT NOT NULL,
                requested_category VARCHAR(255) NOT NULL,
                category VARCHAR(255) NOT NULL,
                dt_published TIMESTAMP WITH TIME ZONE NOT NULL,
                dt_sourced TIMESTAMP WITH TIME ZONE NOT NULL,
                title TEXT NOT NULL,
                original_article_id VARCHAR(255) NOT NULL,
                providers TEXT NOT NULL,
                article_approval_status VARCHAR(32) NOT NULL,
                short_summary_ref TEXT,
                medium_summary_ref TEXT,
                long_summary_ref TEXT,
                thumbs_up BIGINT NOT NULL DEFAULT 0,
                thumbs_down BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the start of an aggregation run.
    pub async fn start_aggregator_run(&self, aggregator_id: &str) -> Result<AggregatorRun> {
        let run = AggregatorRun {
            aggregator_id: aggregator_id.to_string(),
            run_id: Uuid::new_v4(),
            run_datetime: Utc::now(),
            run_status: AggregatorRunStatus::InProgress,
            run_end_time: None,
            result_ref: None,
        };
        sqlx::query(
            r#"
            INSERT INTO aggregator_runs (run_id, aggregator_id, run_datetime, run_status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(run.run_id)
        .bind(&run.aggregator_id)
        .bind(run.run_datetime)
        .bind(run.run_status.as_str())
        .execute(&self.pool)
        .await?;
        info!("Started aggregator run {} for {}", run.run_id, aggregator_id);
        Ok(run)
    }

    /// Close an aggregation run with its final status and result location.
    pub async fn finish_aggregator_run(
        &self,
        run_id: Uuid,
        run_status: AggregatorRunStatus,
        result_ref: Option<&ResultRef>,
    ) -> Result<()> {
        let result_ref_json = match result_ref {
            Some(reference) => Some(serde_json::to_string(reference)?),
            None => None,
        };
        sqlx::query(
            r#"
            UPDATE aggregator_runs
            SET run_status = $1, run_end_time = $2, result_ref = $3
            WHERE run_id = $4
            "#,
        )
        .bind(run_status.as_str())
        .bind(Utc::now())
        .bind(result_ref_json)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn runs_for_aggregator(&self, aggregator_id: &str) -> Result<Vec<AggregatorRun>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, aggregator_id, run_datetime, run_status, run_end_time, result_ref
            FROM aggregator_runs
            WHERE aggregator_id = $1
            ORDER BY run_datetime
            "#,
        )
        .bind(aggregator_id)
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let run_status = AggregatorRunStatus::from_str(row.try_get("run_status")?)?;
            let result_ref = match row.try_get::<Option<String>, _>("result_ref")? {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };
            runs.push(AggregatorRun {
                aggregator_id: row.try_get("aggregator_id")?,
                run_id: row.try_get("run_id")?,
                run_datetime: row.try_get("run_datetime")?,
                run_status,
                run_end_time: row.try_get("run_end_time")?,
                result_ref,
            });
        }
        Ok(runs)
    }

    pub async fn upsert_topic_subscription(&self, subscription: &TopicSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topic_subscriptions
                (user_id, topic_id, topic, categories, is_active, date_created, max_aggregator_results)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, topic_id) DO UPDATE SET
                topic = EXCLUDED.topic,
                categories = EXCLUDED.categories,
                is_active = EXCLUDED.is_active,
                max_aggregator_results = EXCLUDED.max_aggregator_results
            "#,
        )
        .bind(&subscription.user_id)
        .bind(&subscription.topic_id)
        .bind(&subscription.topic)
        .bind(subscription.categories.join(","))
        .bind(subscription.is_active)
        .bind(subscription.date_created)
        .bind(subscription.max_aggregator_results)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_active_subscriptions(&self, user_id: &str) -> Result<Vec<TopicSubscription>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, topic_id, topic, categories, is_active, date_created, max_aggregator_results
            FROM topic_subscriptions
            WHERE user_id = $1 AND is_active = true
            ORDER BY date_created
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            let categories: String = row.try_get("categories")?;
            subscriptions.push(TopicSubscription {
                user_id: row.try_get("user_id")?,
                topic_id: row.try_get("topic_id")?,
                topic: row.try_get("topic")?,
                categories: categories.split(',').map(str::to_string).collect(),
                is_active: row.try_get("is_active")?,
                date_created: row.try_get("date_created")?,
                max_aggregator_results: row.try_get("max_aggregator_results")?,
            });
        }
        Ok(subscriptions)
    }

    pub async fn upsert_trusted_provider(&self, provider: &TrustedNewsProvider) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trusted_news_providers
                (provider_domain, provider_name, provider_url, trust_score, provider_aliases)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider_domain) DO UPDATE SET
                provider_name = EXCLUDED.provider_name,
                provider_url = EXCLUDED.provider_url,
                trust_score = EXCLUDED.trust_score,
                provider_aliases = EXCLUDED.provider_aliases
            "#,
        )
        .bind(&provider.provider_domain)
        .bind(&provider.provider_name)
        .bind(&provider.provider_url)
        .bind(provider.trust_score)
        .bind(provider.provider_aliases.join(","))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Trust score for a provider domain; `None` when the provider is not
    /// tracked.
    pub async fn trust_score(&self, provider_domain: &str) -> Result<Option<i32>> {
        let row = sqlx::query(
            "SELECT trust_score FROM trusted_news_providers WHERE provider_domain = $1",
        )
        .bind(provider_domain)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("trust_score")?)),
            None => Ok(None),
        }
    }

    pub async fn insert_sourced_article(&self, article: &SourcedArticle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sourced_articles
                (article_id, topic_id, topic, requested_category, category, dt_published,
                 dt_sourced, title, original_article_id, providers, article_approval_status,
                 short_summary_ref, medium_summary_ref, long_summary_ref, thumbs_up, thumbs_down)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&article.article_id)
        .bind(&article.topic_id)
        .bind(&article.topic)
        .bind(&article.requested_category)
        .bind(&article.category)
        .bind(article.dt_published)
        .bind(article.dt_sourced)
        .bind(&article.title)
        .bind(&article.original_article_id)
        .bind(article.providers.join(","))
        .bind(article.article_approval_status.as_str())
        .bind(&article.short_summary_ref)
        .bind(&article.medium_summary_ref)
        .bind(&article.long_summary_ref)
        .bind(article.thumbs_up)
        .bind(article.thumbs_down)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_sourced_by_approval_status(
        &self,
        status: ArticleApprovalStatus,
    ) -> Result<Vec<SourcedArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT article_id, topic_id, topic, requested_category, category, dt_published,
                   dt_sourced, title, original_article_id, providers, article_approval_status,
                   short_summary_ref, medium_summary_ref, long_summary_ref, thumbs_up, thumbs_down
            FROM sourced_articles
            WHERE article_approval_status = $1
            ORDER BY article_id
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            let providers: String = row.try_get("providers")?;
            let approval =
                ArticleApprovalStatus::from_str(row.try_get("article_approval_status")?)?;
            articles.push(SourcedArticle {
                article_id: row.try_get("article_id")?,
                topic_id: row.try_get("topic_id")?,
                topic: row.try_get("topic")?,
                requested_category: row.try_get("requested_category")?,
                category: row.try_get("category")?,
                dt_published: row.try_get("dt_published")?,
                dt_sourced: row.try_get("dt_sourced")?,
                title: row.try_get("title")?,
                original_article_id: row.try_get("original_article_id")?,
                providers: providers
                    .split(',')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                article_approval_status: approval,
                short_summary_ref: row.try_get("short_summary_ref")?,
                medium_summary_ref: row.try_get("medium_summary_ref")?,
                long_summary_ref: row.try_get("long_summary_ref")?,
                thumbs_up: row.try_get("thumbs_up")?,
                thumbs_down: row.try_get("thumbs_down")?,
            });
        }
        Ok(articles)
    }

    pub async fn update_article_approval_status(
        &self,
        article_id: &str,
        status: ArticleApprovalStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sourced_articles SET article_approval_status = $1 WHERE article_id = $2",
        )
        .bind(status.as_str())
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DataAccessError::Validation(format!(
                "sourced article {article_id} not found"
            )));
        }
        Ok(())
    }

    /// Record a thumbs-up or thumbs-down on a sourced article.
    pub async fn record_article_feedback(&self, article_id: &str, thumbs_up: bool) -> Result<()> {
        let query = if thumbs_up {
            "UPDATE sourced_articles SET thumbs_up = thumbs_up + 1 WHERE article_id = $1"
        } else {
            "UPDATE sourced_articles SET thumbs_down = thumbs_down + 1 WHERE article_id = $1"
        };
        let result = sqlx::query(query).bind(article_id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DataAccessError::Validation(format!(
                "sourced article {article_id} not found"
            )));
        }
        Ok(())
    }
}
