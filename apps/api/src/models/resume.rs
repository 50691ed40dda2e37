use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    /// Text extracted from the uploaded PDF, when extraction succeeded.
    #[serde(skip_serializing)]
    pub original_content: Option<String>,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `resume_analysis` row. Converted into `StoredAnalysis` before use.
#[derive(Debug, Clone, FromRow)]
pub struct StoredAnalysisRow {
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub ats_score: i32,
    pub overall_rating: String,
    pub strengths: Option<Vec<String>>,
    pub weaknesses: Option<Vec<String>>,
    pub suggestions: Option<Vec<String>>,
    pub skills_found: Option<Value>,
    pub missing_skills: Option<Vec<String>>,
    pub skill_categories: Option<Value>,
    pub sections_analysis: Option<Value>,
    pub formatting_score: Option<f64>,
    pub keyword_density: Option<f64>,
    pub analysis_type: Option<String>,
    pub job_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDescriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub requirements: Vec<String>,
    pub skills_required: Vec<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
