pub mod handlers;
pub mod reconcile;
pub mod record;
pub mod stored;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::reconcile::reconcile;
use crate::analysis::record::AnalysisRecord;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::session::SessionAnalysis;
use crate::state::AppState;
use crate::storage::resumes::latest_resume_with_analysis;

/// The user's latest resume and the one analysis to show for it: the session
/// record if it is usable, otherwise the persisted one.
pub async fn current_analysis(
    state: &AppState,
    user_id: Uuid,
) -> Result<(Option<ResumeRow>, Option<AnalysisRecord>), AppError> {
    let cached = match state.cache.get(user_id).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Session analysis unavailable for {user_id}: {e}");
            None
        }
    };

    let (resume, stored) = match latest_resume_with_analysis(&state.db, user_id).await? {
        Some((resume, stored)) => (Some(resume), stored),
        None => (None, None),
    };

    let fresh = session_record_for(cached, resume.as_ref().map(|r| r.id));
    Ok((resume, reconcile(fresh, stored.as_ref())))
}

/// The session record, if it was produced for `latest_resume_id`.
fn session_record_for(
    cached: Option<SessionAnalysis>,
    latest_resume_id: Option<Uuid>,
) -> Option<AnalysisRecord> {
    let entry = cached?;
    if Some(entry.resume_id) != latest_resume_id {
        debug!(
            "Ignoring session analysis of resume {}; latest is {:?}",
            entry.resume_id, latest_resume_id
        );
        return None;
    }
    Some(entry.record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::record::AtsScore;
    use crate::session::{AnalysisCache, MemoryAnalysisCache};

    fn scored(score: u32) -> AnalysisRecord {
        AnalysisRecord {
            ats_score: Some(AtsScore {
                overall_score: score,
                max_score: 100,
                grade: "B+".to_string(),
                interpretation: String::new(),
                detailed_scores: None,
                recommendations: vec![],
                strengths: vec![],
                areas_for_improvement: vec![],
            }),
            ..AnalysisRecord::default()
        }
    }

    #[test]
    fn test_session_record_for_latest_resume_is_kept() {
        let resume_id = Uuid::new_v4();
        let entry = SessionAnalysis {
            resume_id,
            record: scored(85),
        };
        let record = session_record_for(Some(entry), Some(resume_id)).unwrap();
        assert_eq!(record.overall_score(), Some(85));
    }

    #[test]
    fn test_session_record_without_resume_is_dropped() {
        let entry = SessionAnalysis {
            resume_id: Uuid::new_v4(),
            record: scored(85),
        };
        assert!(session_record_for(Some(entry), None).is_none());
    }

    #[tokio::test]
    async fn test_replaced_resume_does_not_show_previous_analysis() {
        let cache = MemoryAnalysisCache::default();
        let user = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        cache
            .put(
                user,
                &SessionAnalysis {
                    resume_id: first,
                    record: scored(85),
                },
            )
            .await
            .unwrap();

        // The second upload replaced the first resume and its stored analysis.
        let cached = cache.get(user).await.unwrap();
        let fresh = session_record_for(cached, Some(second));
        assert!(fresh.is_none());
        assert!(reconcile(fresh, None).is_none());
    }
}
