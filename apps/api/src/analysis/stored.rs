//! Persisted, denormalized analysis and its conversion from a fresh record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::record::{AnalysisRecord, Skill};
use crate::errors::AppError;
use crate::models::resume::StoredAnalysisRow;

/// Descriptive rating kept in the database in place of a letter grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Poor,
    Fair,
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
    Excellent,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Poor => "Poor",
            Rating::Fair => "Fair",
            Rating::Good => "Good",
            Rating::VeryGood => "Very Good",
            Rating::Excellent => "Excellent",
        }
    }

    /// Fixed rating → letter grade table.
    pub fn letter_grade(&self) -> &'static str {
        match self {
            Rating::Excellent => "A",
            Rating::VeryGood => "B",
            Rating::Good => "C",
            Rating::Fair => "D",
            Rating::Poor => "F",
        }
    }

    /// Collapses a letter grade (with optional +/-) onto a rating.
    /// Anything unrecognized is `Poor`.
    pub fn from_grade(grade: &str) -> Self {
        match grade.trim().to_ascii_uppercase().as_str() {
            "A+" | "A" => Rating::Excellent,
            "A-" | "B+" | "B" => Rating::VeryGood,
            "B-" | "C+" | "C" => Rating::Good,
            "C-" | "D+" | "D" => Rating::Fair,
            _ => Rating::Poor,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Poor" => Ok(Rating::Poor),
            "Fair" => Ok(Rating::Fair),
            "Good" => Ok(Rating::Good),
            "Very Good" => Ok(Rating::VeryGood),
            "Excellent" => Ok(Rating::Excellent),
            other => Err(format!("unknown rating '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    Quick,
    #[default]
    Comprehensive,
    AtsFocused,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Quick => "quick",
            AnalysisType::Comprehensive => "comprehensive",
            AnalysisType::AtsFocused => "ats-focused",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(AnalysisType::Quick),
            "comprehensive" => Ok(AnalysisType::Comprehensive),
            "ats-focused" => Ok(AnalysisType::AtsFocused),
            other => Err(format!("unknown analysis type '{other}'")),
        }
    }
}

/// Older rows hold bare skill names; newer ones hold the AI's full skill objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillEntry {
    Name(String),
    Detailed(Skill),
}

impl SkillEntry {
    pub fn name(&self) -> &str {
        match self {
            SkillEntry::Name(name) => name,
            SkillEntry::Detailed(skill) => &skill.name,
        }
    }

    /// Carries over exactly what was stored; bare names stay bare.
    pub fn to_skill(&self) -> Skill {
        match self {
            SkillEntry::Name(name) => Skill::named(name.clone()),
            SkillEntry::Detailed(skill) => skill.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub resume_id: Uuid,
    pub ats_score: i32,
    pub overall_rating: Rating,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub skills_found: Vec<SkillEntry>,
    pub missing_skills: Vec<String>,
    /// `{"skills_analysis": <full AI skills analysis>}` when available.
    pub skill_categories: Option<Value>,
    /// The full AI `ats_score` structure, including `detailed_scores`.
    pub sections_analysis: Option<Value>,
    pub formatting_score: Option<f64>,
    pub keyword_density: Option<f64>,
    pub analysis_type: AnalysisType,
    pub job_description: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl StoredAnalysis {
    /// Denormalizes a fresh analysis for persistence.
    pub fn from_record(
        record: &AnalysisRecord,
        resume_id: Uuid,
        job_description: Option<String>,
    ) -> Self {
        let ats = record.ats_score.as_ref();
        let grade = ats.map(|a| a.grade.as_str()).unwrap_or("F");
        let skills_analysis = &record.skills_analysis;
        let priority = record.suggestions.priority_improvements.clone();

        Self {
            resume_id,
            ats_score: ats.map(|a| a.overall_score as i32).unwrap_or(0),
            overall_rating: Rating::from_grade(grade),
            strengths: record.suggestions.strengths.clone(),
            weaknesses: priority.clone(),
            suggestions: priority,
            skills_found: skills_analysis
                .all_skills
                .iter()
                .cloned()
                .map(SkillEntry::Detailed)
                .collect(),
            missing_skills: record.keywords_analysis.missing_keywords.clone(),
            skill_categories: Some(json!({ "skills_analysis": skills_analysis })),
            sections_analysis: ats.and_then(|a| serde_json::to_value(a).ok()),
            formatting_score: Some(
                ats.and_then(|a| a.detailed_scores.as_ref())
                    .map(|d| d.format_score)
                    .unwrap_or(0.0),
            ),
            keyword_density: Some(record.keywords_analysis.keyword_density),
            analysis_type: AnalysisType::Comprehensive,
            job_description,
            analyzed_at: Some(Utc::now()),
        }
    }

    pub fn skills_found_json(&self) -> Value {
        serde_json::to_value(&self.skills_found).unwrap_or_else(|_| Value::Array(vec![]))
    }
}

impl TryFrom<StoredAnalysisRow> for StoredAnalysis {
    type Error = AppError;

    fn try_from(row: StoredAnalysisRow) -> Result<Self, Self::Error> {
        let overall_rating = row
            .overall_rating
            .parse::<Rating>()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("resume_analysis {}: {e}", row.resume_id)))?;
        let analysis_type = row
            .analysis_type
            .as_deref()
            .map(|t| t.parse::<AnalysisType>().unwrap_or_default())
            .unwrap_or_default();
        let skills_found = row
            .skills_found
            .and_then(|v| serde_json::from_value::<Vec<SkillEntry>>(v).ok())
            .unwrap_or_default();

        Ok(Self {
            resume_id: row.resume_id,
            ats_score: row.ats_score,
            overall_rating,
            strengths: row.strengths.unwrap_or_default(),
            weaknesses: row.weaknesses.unwrap_or_default(),
            suggestions: row.suggestions.unwrap_or_default(),
            skills_found,
            missing_skills: row.missing_skills.unwrap_or_default(),
            skill_categories: row.skill_categories,
            sections_analysis: row.sections_analysis,
            formatting_score: row.formatting_score,
            keyword_density: row.keyword_density,
            analysis_type,
            job_description: row.job_description,
            analyzed_at: Some(row.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::record::{AtsScore, DetailedScores, SkillLevel};

    #[test]
    fn test_grade_to_rating_collapses_modifiers() {
        assert_eq!(Rating::from_grade("A+"), Rating::Excellent);
        assert_eq!(Rating::from_grade("a-"), Rating::VeryGood);
        assert_eq!(Rating::from_grade("B+"), Rating::VeryGood);
        assert_eq!(Rating::from_grade("C+"), Rating::Good);
        assert_eq!(Rating::from_grade("D"), Rating::Fair);
        assert_eq!(Rating::from_grade("F"), Rating::Poor);
        assert_eq!(Rating::from_grade(""), Rating::Poor);
    }

    #[test]
    fn test_rating_serializes_with_space() {
        assert_eq!(
            serde_json::to_string(&Rating::VeryGood).unwrap(),
            "\"Very Good\""
        );
        assert_eq!("Very Good".parse::<Rating>(), Ok(Rating::VeryGood));
    }

    #[test]
    fn test_skill_entry_accepts_names_and_objects() {
        let entries: Vec<SkillEntry> = serde_json::from_value(serde_json::json!([
            "Rust",
            { "name": "SQL", "level": "Advanced", "years": 4, "category": "Data" }
        ]))
        .unwrap();
        assert_eq!(entries[0], SkillEntry::Name("Rust".to_string()));
        assert_eq!(entries[1].name(), "SQL");
        assert_eq!(entries[1].to_skill().level, Some(SkillLevel::Advanced));
    }

    #[test]
    fn test_from_record_keeps_ai_blobs() {
        let mut record = AnalysisRecord::default();
        record.ats_score = Some(AtsScore {
            overall_score: 88,
            max_score: 100,
            grade: "B+".to_string(),
            interpretation: "Very good".to_string(),
            detailed_scores: Some(DetailedScores {
                format_score: 27.0,
                keywords_score: 20.0,
                content_score: 23.0,
                sections_score: 18.0,
            }),
            recommendations: vec![],
            strengths: vec![],
            areas_for_improvement: vec![],
        });
        record.suggestions.priority_improvements = vec!["Quantify impact".to_string()];
        record.keywords_analysis.missing_keywords = vec!["Kubernetes".to_string()];
        record.skills_analysis.all_skills = vec![Skill::named("Rust")];

        let resume_id = Uuid::new_v4();
        let stored = StoredAnalysis::from_record(&record, resume_id, None);

        assert_eq!(stored.resume_id, resume_id);
        assert_eq!(stored.ats_score, 88);
        assert_eq!(stored.overall_rating, Rating::VeryGood);
        assert_eq!(stored.weaknesses, vec!["Quantify impact"]);
        assert_eq!(stored.suggestions, vec!["Quantify impact"]);
        assert_eq!(stored.missing_skills, vec!["Kubernetes"]);
        assert_eq!(stored.formatting_score, Some(27.0));
        assert!(stored.sections_analysis.as_ref().unwrap()["detailed_scores"].is_object());
        assert!(stored.skill_categories.as_ref().unwrap()["skills_analysis"].is_object());
    }
}
