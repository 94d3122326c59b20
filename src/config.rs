use std::env;

/// Runtime configuration, resolved once from the environment.
///
/// Clients (object store, database pool) are constructed from this and
/// injected into operations explicitly; nothing here builds a hidden
/// process-wide default.
#[derive(Debug, Clone)]
pub struct Config {
    pub deployment_stage: String,
    pub region_name: String,
    pub s3_endpoint_url: Option<String>,
    pub candidate_articles_bucket: String,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let deployment_stage =
            env::var("DEPLOYMENT_STAGE").unwrap_or_else(|_| "dev".to_string());
        let candidate_articles_bucket = env::var("CANDIDATE_ARTICLES_S3_BUCKET")
            .unwrap_or_else(|_| {
                format!("news-aggregator-candidate-articles-{deployment_stage}")
            });
        Self {
            region_name: env::var("REGION_NAME").unwrap_or_else(|_| "us-west-1".to_string()),
            s3_endpoint_url: env::var("S3_ENDPOINT_URL").ok(),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                "postgresql://localhost:5432/news_aggregator".to_string()
            }),
            deployment_stage,
            candidate_articles_bucket,
        }
    }
}
