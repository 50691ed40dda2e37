//! Resume files in object storage plus their metadata and analysis rows.
//! A user has a single current resume: saving a new one replaces the old rows.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::stored::StoredAnalysis;
use crate::errors::AppError;
use crate::models::resume::{ResumeRow, StoredAnalysisRow};
use crate::storage::validation::ResumeFile;

pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// `{user_id}/{unix_millis}.pdf`
pub fn object_key(user_id: Uuid, unix_millis: i64) -> String {
    format!("{user_id}/{unix_millis}.pdf")
}

/// Uploads the file, then swaps the user's resume row for a new one.
pub async fn save_resume(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    user_id: Uuid,
    file: &ResumeFile,
) -> Result<ResumeRow, AppError> {
    let key = object_key(user_id, Utc::now().timestamp_millis());

    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(file.bytes.clone()))
        .content_type(&file.content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Uploaded resume to s3://{bucket}/{key}");

    let original_content = extract_text(file).await;

    let mut tx = pool.begin().await?;

    let previous_paths: Vec<String> =
        sqlx::query_scalar("DELETE FROM resumes WHERE user_id = $1 RETURNING file_path")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

    let resume = sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes
            (user_id, title, file_name, file_path, file_size, file_type, original_content, is_primary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(file.title())
    .bind(&file.file_name)
    .bind(&key)
    .bind(file.size())
    .bind(&file.content_type)
    .bind(original_content)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    for path in previous_paths.iter().filter(|p| **p != key) {
        remove_object(s3, bucket, path).await;
    }

    info!("Saved resume {} for user {user_id}", resume.id);
    Ok(resume)
}

/// Best-effort text extraction; failures only cost the stored text.
async fn extract_text(file: &ResumeFile) -> Option<String> {
    let bytes = file.bytes.clone();
    let name = file.file_name.clone();
    match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
        Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            warn!("Could not extract text from {name}: {e}");
            None
        }
        Err(e) => {
            warn!("Text extraction task for {name} aborted: {e}");
            None
        }
    }
}

pub async fn list_resumes(pool: &PgPool, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
    let rows = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_resume(pool: &PgPool, user_id: Uuid, resume_id: Uuid) -> Result<ResumeRow, AppError> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
}

pub async fn latest_resume(pool: &PgPool, user_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
    let row = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn load_analysis(
    pool: &PgPool,
    user_id: Uuid,
    resume_id: Uuid,
) -> Result<Option<StoredAnalysis>, AppError> {
    let row = sqlx::query_as::<_, StoredAnalysisRow>(
        "SELECT * FROM resume_analysis WHERE resume_id = $1 AND user_id = $2",
    )
    .bind(resume_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(StoredAnalysis::try_from).transpose()
}

pub async fn latest_resume_with_analysis(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<(ResumeRow, Option<StoredAnalysis>)>, AppError> {
    let Some(resume) = latest_resume(pool, user_id).await? else {
        return Ok(None);
    };
    let analysis = load_analysis(pool, user_id, resume.id).await?;
    Ok(Some((resume, analysis)))
}

/// Creates or overwrites the analysis for a resume in one statement.
pub async fn save_analysis(
    pool: &PgPool,
    user_id: Uuid,
    analysis: &StoredAnalysis,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO resume_analysis
            (resume_id, user_id, ats_score, overall_rating, strengths, weaknesses, suggestions,
             skills_found, missing_skills, skill_categories, sections_analysis,
             formatting_score, keyword_density, analysis_type, job_description)
        SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
        WHERE EXISTS (SELECT 1 FROM resumes WHERE id = $1 AND user_id = $2)
        ON CONFLICT (resume_id) DO UPDATE SET
            ats_score = EXCLUDED.ats_score,
            overall_rating = EXCLUDED.overall_rating,
            strengths = EXCLUDED.strengths,
            weaknesses = EXCLUDED.weaknesses,
            suggestions = EXCLUDED.suggestions,
            skills_found = EXCLUDED.skills_found,
            missing_skills = EXCLUDED.missing_skills,
            skill_categories = EXCLUDED.skill_categories,
            sections_analysis = EXCLUDED.sections_analysis,
            formatting_score = EXCLUDED.formatting_score,
            keyword_density = EXCLUDED.keyword_density,
            analysis_type = EXCLUDED.analysis_type,
            job_description = EXCLUDED.job_description,
            updated_at = now()
        "#,
    )
    .bind(analysis.resume_id)
    .bind(user_id)
    .bind(analysis.ats_score)
    .bind(analysis.overall_rating.as_str())
    .bind(&analysis.strengths)
    .bind(&analysis.weaknesses)
    .bind(&analysis.suggestions)
    .bind(analysis.skills_found_json())
    .bind(&analysis.missing_skills)
    .bind(&analysis.skill_categories)
    .bind(&analysis.sections_analysis)
    .bind(analysis.formatting_score)
    .bind(analysis.keyword_density)
    .bind(analysis.analysis_type.as_str())
    .bind(&analysis.job_description)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Resume {} not found",
            analysis.resume_id
        )));
    }

    info!(
        "Saved analysis for resume {} (score {}, {})",
        analysis.resume_id, analysis.ats_score, analysis.overall_rating
    );
    Ok(())
}

/// Pre-signed GET URL valid for one hour.
pub async fn signed_url(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<String, AppError> {
    let config = PresigningConfig::expires_in(SIGNED_URL_TTL)
        .map_err(|e| AppError::S3(format!("invalid presigning config: {e}")))?;

    let request = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(config)
        .await
        .map_err(|e| AppError::S3(format!("presigning {key} failed: {e}")))?;

    Ok(request.uri().to_string())
}

/// Removes the object (best-effort) and the row; the analysis row cascades.
pub async fn delete_resume(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    user_id: Uuid,
    resume_id: Uuid,
) -> Result<(), AppError> {
    let resume = get_resume(pool, user_id, resume_id).await?;

    remove_object(s3, bucket, &resume.file_path).await;

    sqlx::query("DELETE FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(resume_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    info!("Deleted resume {resume_id} for user {user_id}");
    Ok(())
}

async fn remove_object(s3: &aws_sdk_s3::Client, bucket: &str, key: &str) {
    if let Err(e) = s3.delete_object().bucket(bucket).key(key).send().await {
        warn!("Failed to delete s3://{bucket}/{key}: {e}");
    }
}
