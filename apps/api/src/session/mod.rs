//! Per-user "current analysis" cache: the most recent fresh result a user
//! produced, kept until signout, resume deletion or replacement, or expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::analysis::record::AnalysisRecord;
use crate::errors::AppError;

pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// A fresh analysis and the resume it was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub resume_id: Uuid,
    pub record: AnalysisRecord,
}

#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<SessionAnalysis>, AppError>;
    async fn put(&self, user_id: Uuid, entry: &SessionAnalysis) -> Result<(), AppError>;
    async fn clear(&self, user_id: Uuid) -> Result<(), AppError>;
}

fn cache_key(user_id: Uuid) -> String {
    format!("careerleap:analysis:{user_id}")
}

/// Shared across instances; entries expire after a day.
pub struct RedisAnalysisCache {
    client: redis::Client,
}

impl RedisAnalysisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache(e.to_string()))
    }
}

#[async_trait]
impl AnalysisCache for RedisAnalysisCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<SessionAnalysis>, AppError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(cache_key(user_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry = serde_json::from_str(&raw)
            .map_err(|e| AppError::Cache(format!("corrupt session entry: {e}")))?;
        Ok(Some(entry))
    }

    async fn put(&self, user_id: Uuid, entry: &SessionAnalysis) -> Result<(), AppError> {
        let json = serde_json::to_string(entry)
            .map_err(|e| AppError::Cache(format!("could not encode analysis: {e}")))?;
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(cache_key(user_id))
            .arg(json)
            .arg("EX")
            .arg(SESSION_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        debug!("Cached analysis of resume {} for user {user_id}", entry.resume_id);
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(cache_key(user_id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        Ok(())
    }
}

/// Single-instance fallback when no Redis is configured. Entries live until
/// cleared or the process restarts.
#[derive(Default)]
pub struct MemoryAnalysisCache {
    entries: RwLock<HashMap<Uuid, SessionAnalysis>>,
}

#[async_trait]
impl AnalysisCache for MemoryAnalysisCache {
    async fn get(&self, user_id: Uuid) -> Result<Option<SessionAnalysis>, AppError> {
        Ok(self.entries.read().await.get(&user_id).cloned())
    }

    async fn put(&self, user_id: Uuid, entry: &SessionAnalysis) -> Result<(), AppError> {
        self.entries.write().await.insert(user_id, entry.clone());
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), AppError> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}
