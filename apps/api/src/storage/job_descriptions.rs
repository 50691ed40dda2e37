use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::JobDescriptionRow;

#[derive(Debug, Clone, Deserialize)]
pub struct NewJobDescription {
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl NewJobDescription {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(AppError::Validation("description cannot be empty".to_string()));
        }
        Ok(())
    }
}

pub async fn save_job_description(
    pool: &PgPool,
    user_id: Uuid,
    jd: &NewJobDescription,
) -> Result<JobDescriptionRow, AppError> {
    jd.validate()?;

    let row = sqlx::query_as::<_, JobDescriptionRow>(
        r#"
        INSERT INTO job_descriptions
            (user_id, title, company, description, requirements, skills_required,
             location, salary_range, is_favorite)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(jd.title.trim())
    .bind(&jd.company)
    .bind(jd.description.trim())
    .bind(&jd.requirements)
    .bind(&jd.skills_required)
    .bind(&jd.location)
    .bind(&jd.salary_range)
    .bind(jd.is_favorite)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list_job_descriptions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<JobDescriptionRow>, AppError> {
    let rows = sqlx::query_as::<_, JobDescriptionRow>(
        "SELECT * FROM job_descriptions WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_title_and_description() {
        let jd: NewJobDescription = serde_json::from_value(serde_json::json!({
            "title": "  ",
            "description": "Build things"
        }))
        .unwrap();
        assert!(jd.validate().is_err());

        let jd: NewJobDescription = serde_json::from_value(serde_json::json!({
            "title": "Backend Engineer",
            "description": "Build things"
        }))
        .unwrap();
        assert!(jd.validate().is_ok());
        assert!(jd.requirements.is_empty());
        assert!(!jd.is_favorite);
    }
}
