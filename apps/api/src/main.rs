mod analysis;
mod analysis_client;
mod auth;
mod config;
mod credits;
mod db;
mod errors;
mod models;
mod payments;
mod profiles;
mod routes;
mod session;
mod state;
mod storage;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis_client::AnalysisClient;
use crate::auth::identity::IdentityClient;
use crate::config::Config;
use crate::credits::ledger::PgCreditLedger;
use crate::db::create_pool;
use crate::payments::razorpay::RazorpayClient;
use crate::routes::build_router;
use crate::session::{AnalysisCache, MemoryAnalysisCache, RedisAnalysisCache};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerLeap API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Session analysis cache
    let cache: Arc<dyn AnalysisCache> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("invalid REDIS_URL")?;
            info!("Session analysis cache: Redis");
            Arc::new(RedisAnalysisCache::new(client))
        }
        None => {
            info!("Session analysis cache: in-process (REDIS_URL not set)");
            Arc::new(MemoryAnalysisCache::default())
        }
    };

    // Outbound clients
    let analyzer = AnalysisClient::new(
        config.analysis_api_url.clone(),
        config.analysis_timeout_secs,
    )
    .context("failed to build analysis client")?;
    info!("Analysis client initialized ({})", config.analysis_api_url);

    let identity = IdentityClient::new(
        config.auth_url.clone(),
        config.auth_anon_key.clone(),
        config.oauth_redirect_url.clone(),
    )
    .context("failed to build identity client")?;

    let razorpay = RazorpayClient::new(
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
    )
    .context("failed to build Razorpay client")?;

    // Build app state
    let state = AppState {
        ledger: Arc::new(PgCreditLedger::new(db.clone())),
        db,
        s3,
        config: config.clone(),
        analyzer: Arc::new(analyzer),
        cache,
        identity,
        razorpay,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the frontend host once it has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "careerleap-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets under the path, not as subdomains.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
