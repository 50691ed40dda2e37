use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::analysis_client::ResumeAnalyzer;
use crate::auth::identity::IdentityClient;
use crate::config::Config;
use crate::credits::ledger::CreditLedger;
use crate::payments::razorpay::RazorpayClient;
use crate::session::AnalysisCache;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub config: Config,
    /// External analysis API. Default: AnalysisClient over HTTP.
    pub analyzer: Arc<dyn ResumeAnalyzer>,
    /// Every balance mutation goes through here.
    pub ledger: Arc<dyn CreditLedger>,
    /// Session analysis: Redis when REDIS_URL is set, in-process otherwise.
    pub cache: Arc<dyn AnalysisCache>,
    pub identity: IdentityClient,
    pub razorpay: RazorpayClient,
}

#[cfg(test)]
impl AppState {
    /// State whose database and object store are never reached by the code
    /// paths under test.
    pub fn for_tests(analyzer: Arc<dyn ResumeAnalyzer>, ledger: Arc<dyn CreditLedger>) -> Self {
        Self::for_tests_with_cache(
            analyzer,
            ledger,
            Arc::new(crate::session::MemoryAnalysisCache::default()),
        )
    }

    /// Same as `for_tests`, with a cache the test can inspect afterwards.
    /// Database calls fail fast instead of waiting for a connection.
    pub fn for_tests_with_cache(
        analyzer: Arc<dyn ResumeAnalyzer>,
        ledger: Arc<dyn CreditLedger>,
        cache: Arc<dyn AnalysisCache>,
    ) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Region};

        let config = Config::for_tests();
        let db = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(250))
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3 = S3Client::from_conf(
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .build(),
        );
        let identity = IdentityClient::new(
            config.auth_url.clone(),
            config.auth_anon_key.clone(),
            None,
        )
        .unwrap();
        let razorpay = RazorpayClient::new(
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
        )
        .unwrap();

        AppState {
            db,
            s3,
            config,
            analyzer,
            ledger,
            cache,
            identity,
            razorpay,
        }
    }
}
