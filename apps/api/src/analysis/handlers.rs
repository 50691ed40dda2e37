use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::current_analysis;
use crate::analysis::record::{AnalysisRecord, AtsScore, KeywordAnalysis, Suggestions};
use crate::analysis::stored::StoredAnalysis;
use crate::analysis_client::{AnalysisError, TextAnalysisRequest};
use crate::auth::AuthUser;
use crate::credits::gate::charge_on_success;
use crate::credits::ledger::{Charge, CreditLedger};
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::session::SessionAnalysis;
use crate::state::AppState;
use crate::storage::handlers::{read_resume_form, ResumeForm};
use crate::storage::resumes::{save_analysis, save_resume};

pub const ANALYSIS_COST: i32 = 1;
pub const ANALYSIS_SERVICE: &str = "resume_analysis";

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub analysis: AnalysisRecord,
    pub resume: ResumeRow,
    /// `None` when the balance could not be read after the charge.
    pub credits_remaining: Option<i32>,
}

#[derive(Serialize)]
pub struct CurrentAnalysisResponse {
    pub analysis: Option<AnalysisRecord>,
}

/// POST /api/v1/analyses
/// Uploads the resume, runs the paid analysis and persists the result.
/// Credits are taken only once the analysis has succeeded.
pub async fn handle_run_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AppError> {
    let form = read_resume_form(multipart).await?;

    let charge = Charge {
        credits: ANALYSIS_COST,
        description: format!("Resume analysis: {}", form.file.file_name),
        service_used: Some(ANALYSIS_SERVICE.to_string()),
        reference_id: None,
    };

    let (resume, mut record) = charge_on_success(state.ledger.as_ref(), user.user_id, &charge, || {
        analyze_upload(&state, user.user_id, &form)
    })
    .await?;

    if record.analysis_timestamp.is_none() {
        record.analysis_timestamp = Some(Utc::now().to_rfc3339());
    }

    let entry = SessionAnalysis {
        resume_id: resume.id,
        record: record.clone(),
    };
    if let Err(e) = state.cache.put(user.user_id, &entry).await {
        warn!("Could not cache analysis for {}: {e}", user.user_id);
    }

    let stored = StoredAnalysis::from_record(&record, resume.id, form.job_description.clone());
    if let Err(e) = save_analysis(&state.db, user.user_id, &stored).await {
        warn!("Analysis for resume {} was not persisted: {e}", resume.id);
    }

    let credits_remaining = balance_after_charge(state.ledger.as_ref(), user.user_id).await;
    info!(
        "Analysis for user {} complete: score {:?}, {credits_remaining:?} credit(s) left",
        user.user_id,
        record.overall_score()
    );

    Ok(Json(AnalysisResponse {
        analysis: record,
        resume,
        credits_remaining,
    }))
}

/// Balance once charged. A failed read is logged and reported as `None`.
async fn balance_after_charge(ledger: &dyn CreditLedger, user_id: Uuid) -> Option<i32> {
    match ledger.balance(user_id).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!("Could not read balance for {user_id} after charge: {e}");
            None
        }
    }
}

/// The gated part of an analysis run. Nothing here is charged if it fails.
async fn analyze_upload(
    state: &AppState,
    user_id: Uuid,
    form: &ResumeForm,
) -> Result<(ResumeRow, AnalysisRecord), AppError> {
    state.analyzer.health().await?;

    let resume = save_resume(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        user_id,
        &form.file,
    )
    .await?;

    // The previous resume and its analysis are gone.
    if let Err(e) = state.cache.clear(user_id).await {
        warn!("Could not clear session analysis for {user_id}: {e}");
    }

    let record = state
        .analyzer
        .analyze(&form.file, form.job_description.as_deref())
        .await?;

    if !record.is_normalized() {
        return Err(AnalysisError::Rejected("response carried no ATS score".to_string()).into());
    }

    Ok((resume, record))
}

/// GET /api/v1/analyses/current
pub async fn handle_current_analysis(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CurrentAnalysisResponse>, AppError> {
    let (_, analysis) = current_analysis(&state, user.user_id).await?;
    Ok(Json(CurrentAnalysisResponse { analysis }))
}

fn require_resume_text(req: &TextAnalysisRequest) -> Result<(), AppError> {
    if req.resume_text.trim().is_empty() {
        return Err(AppError::Validation("Resume text is required".to_string()));
    }
    Ok(())
}

fn require_job_description(req: &TextAnalysisRequest) -> Result<(), AppError> {
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "Job description is required".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/tools/score
pub async fn handle_score(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<TextAnalysisRequest>,
) -> Result<Json<AtsScore>, AppError> {
    require_resume_text(&req)?;
    Ok(Json(state.analyzer.score(&req).await?))
}

/// POST /api/v1/tools/suggestions
pub async fn handle_suggestions(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<TextAnalysisRequest>,
) -> Result<Json<Suggestions>, AppError> {
    require_resume_text(&req)?;
    Ok(Json(state.analyzer.suggestions(&req).await?))
}

/// POST /api/v1/tools/keywords
/// Resume text is optional here; without it only the job's keywords come back.
pub async fn handle_keywords(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<TextAnalysisRequest>,
) -> Result<Json<KeywordAnalysis>, AppError> {
    require_job_description(&req)?;
    Ok(Json(state.analyzer.keywords(&req).await?))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::credits::ledger::testing::MemoryLedger;
    use crate::credits::ledger::Grant;

    struct UnreadableLedger;

    #[async_trait]
    impl CreditLedger for UnreadableLedger {
        async fn balance(&self, _user_id: Uuid) -> Result<i32, AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn deduct(&self, _user_id: Uuid, _charge: &Charge) -> Result<bool, AppError> {
            Ok(true)
        }

        async fn add(&self, _user_id: Uuid, _grant: &Grant) -> Result<i32, AppError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_balance_after_charge_reports_remaining_credits() {
        let user = Uuid::new_v4();
        let ledger = MemoryLedger::with_balance(user, 4);
        assert_eq!(balance_after_charge(&ledger, user).await, Some(4));
    }

    #[tokio::test]
    async fn test_unreadable_balance_after_charge_is_not_an_error() {
        assert_eq!(balance_after_charge(&UnreadableLedger, Uuid::new_v4()).await, None);
    }

    #[test]
    fn test_keywords_validation_ignores_resume_text() {
        let req = TextAnalysisRequest {
            resume_text: String::new(),
            job_description: "Rust, Kubernetes".to_string(),
        };
        assert!(require_job_description(&req).is_ok());
        assert!(require_resume_text(&req).is_err());
    }
}
