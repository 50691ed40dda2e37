use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::analysis::record::AnalysisRecord;
use crate::analysis::current_analysis;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{JobDescriptionRow, ResumeRow};
use crate::storage::job_descriptions::{
    list_job_descriptions, save_job_description, NewJobDescription,
};
use crate::storage::resumes::{
    delete_resume, get_resume, list_resumes, save_resume, signed_url, SIGNED_URL_TTL,
};
use crate::storage::validation::{validate_job_description, validate_resume_upload, ResumeFile};
use crate::state::AppState;

/// A validated multipart resume submission.
#[derive(Debug)]
pub struct ResumeForm {
    pub file: ResumeFile,
    pub job_description: Option<String>,
}

/// Reads the `resume` (or `file`) part and the optional `job_description`
/// field. Unknown fields are ignored.
pub async fn read_resume_form(mut multipart: Multipart) -> Result<ResumeForm, AppError> {
    let mut file = None;
    let mut job_description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("resume") | Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                file = Some(validate_resume_upload(
                    file_name.as_deref(),
                    content_type.as_deref(),
                    bytes,
                )?);
            }
            Some("job_description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read field: {e}")))?;
                job_description = validate_job_description(Some(&text))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    Ok(ResumeForm {
        file,
        job_description,
    })
}

#[derive(Serialize)]
pub struct LatestResumeResponse {
    pub resume: Option<ResumeRow>,
    pub analysis: Option<AnalysisRecord>,
}

#[derive(Serialize)]
pub struct DownloadUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

/// POST /api/v1/resumes
/// Stores the file without analysing it.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    let form = read_resume_form(multipart).await?;
    let resume = save_resume(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        user.user_id,
        &form.file,
    )
    .await?;

    // The previous resume and its analysis are gone.
    if let Err(e) = state.cache.clear(user.user_id).await {
        warn!("Could not clear session analysis for {}: {e}", user.user_id);
    }
    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    let rows = list_resumes(&state.db, user.user_id).await?;
    Ok(Json(rows))
}

/// GET /api/v1/resumes/latest
pub async fn handle_latest_resume(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<LatestResumeResponse>, AppError> {
    let (resume, analysis) = current_analysis(&state, user.user_id).await?;
    Ok(Json(LatestResumeResponse { resume, analysis }))
}

/// GET /api/v1/resumes/:id/download-url
pub async fn handle_download_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let resume = get_resume(&state.db, user.user_id, id).await?;
    let url = signed_url(&state.s3, &state.config.s3_bucket, &resume.file_path).await?;
    Ok(Json(DownloadUrlResponse {
        url,
        expires_in: SIGNED_URL_TTL.as_secs(),
    }))
}

/// DELETE /api/v1/resumes/:id
/// Drops the session analysis first, even if the delete then fails.
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if let Err(e) = state.cache.clear(user.user_id).await {
        warn!("Could not clear session analysis for {}: {e}", user.user_id);
    }
    delete_resume(&state.db, &state.s3, &state.config.s3_bucket, user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/job-descriptions
pub async fn handle_create_job_description(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<NewJobDescription>,
) -> Result<(StatusCode, Json<JobDescriptionRow>), AppError> {
    let row = save_job_description(&state.db, user.user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/job-descriptions
pub async fn handle_list_job_descriptions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<JobDescriptionRow>>, AppError> {
    let rows = list_job_descriptions(&state.db, user.user_id).await?;
    Ok(Json(rows))
}
