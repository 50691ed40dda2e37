//! Analysis reconciliation. Picks the one "current" analysis for a user out of
//! a fresh (or session-held) record and the persisted `StoredAnalysis`, and
//! brings it into display shape.
//!
//! Pure: no I/O, no clock reads beyond formatting the stored timestamp.

use serde_json::Value;

use crate::analysis::record::{
    AnalysisRecord, AtsScore, DetailedScores, KeywordAnalysis, SkillsAnalysis, SkillsSummary,
    Suggestions,
};
use crate::analysis::stored::StoredAnalysis;

pub const STORED_ANALYSIS_METHOD: &str = "Database Loaded";

/// Fresh wins whenever it is already normalized. Otherwise the stored analysis
/// is rebuilt into display shape. `None` when neither is usable.
pub fn reconcile(
    fresh: Option<AnalysisRecord>,
    stored: Option<&StoredAnalysis>,
) -> Option<AnalysisRecord> {
    if let Some(fresh) = fresh {
        if fresh.is_normalized() {
            return Some(fresh);
        }
    }
    stored.map(from_stored)
}

/// Interpretation thresholds: 90 / 80 / 70 / 60.
pub fn interpret_score(score: u32) -> &'static str {
    match score {
        s if s >= 90 => "Excellent resume with high ATS compatibility",
        s if s >= 80 => "Very good resume with good ATS compatibility",
        s if s >= 70 => "Good resume with decent ATS compatibility",
        s if s >= 60 => "Fair resume with some ATS issues to address",
        _ => "Poor ATS compatibility, significant improvements needed",
    }
}

pub fn from_stored(stored: &StoredAnalysis) -> AnalysisRecord {
    let score = stored.ats_score.clamp(0, 100) as u32;

    let ats_score = AtsScore {
        overall_score: score,
        max_score: 100,
        grade: stored.overall_rating.letter_grade().to_string(),
        interpretation: interpret_score(score).to_string(),
        detailed_scores: stored_detailed_scores(stored.sections_analysis.as_ref()),
        recommendations: stored.suggestions.clone(),
        strengths: stored.strengths.clone(),
        areas_for_improvement: stored.weaknesses.clone(),
    };

    let suggestions = Suggestions {
        priority_improvements: stored.weaknesses.clone(),
        content_suggestions: stored.suggestions.clone(),
        formatting_tips: Vec::new(),
        keyword_recommendations: stored.missing_skills.clone(),
        strengths: stored.strengths.clone(),
        missing_elements: stored.weaknesses.clone(),
    };

    let skill_names: Vec<String> = stored
        .skills_found
        .iter()
        .map(|s| s.name().to_string())
        .collect();

    let keywords_analysis = KeywordAnalysis {
        job_description_keywords: Vec::new(),
        resume_keywords: skill_names.clone(),
        matching_keywords: skill_names,
        missing_keywords: stored.missing_skills.clone(),
        keyword_density: stored.keyword_density.unwrap_or(0.0),
        match_percentage: 0.0,
        critical_missing_keywords: stored.missing_skills.clone(),
        keyword_suggestions: stored.missing_skills.clone(),
        industry_keywords: Vec::new(),
    };

    AnalysisRecord {
        ats_score: Some(ats_score),
        analysis_details: None,
        suggestions,
        keywords_analysis,
        skills_analysis: stored_skills_analysis(stored),
        analysis_timestamp: stored.analyzed_at.map(|t| t.to_rfc3339()),
        analysis_method: Some(STORED_ANALYSIS_METHOD.to_string()),
        error: None,
    }
}

fn stored_detailed_scores(sections_analysis: Option<&Value>) -> Option<DetailedScores> {
    sections_analysis
        .and_then(|v| v.get("detailed_scores"))
        .filter(|v| v.as_object().is_some_and(|m| !m.is_empty()))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// The AI's own skills analysis when it was persisted; otherwise only what was
/// actually stored, with counts derived from it.
fn stored_skills_analysis(stored: &StoredAnalysis) -> SkillsAnalysis {
    let from_blob = stored
        .skill_categories
        .as_ref()
        .and_then(|v| v.get("skills_analysis"))
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value::<SkillsAnalysis>(v.clone()).ok());

    if let Some(analysis) = from_blob {
        return analysis;
    }

    let all_skills: Vec<_> = stored.skills_found.iter().map(|s| s.to_skill()).collect();

    SkillsAnalysis {
        skills_summary: SkillsSummary {
            total_skills: all_skills.len() as u32,
            ..SkillsSummary::default()
        },
        all_skills,
        ..SkillsAnalysis::default()
    }
}
