//! Display-ready analysis shape. This is exactly what the external analysis API
//! returns, so a fresh response deserializes straight into an `AnalysisRecord`.
//!
//! The analysis API is LLM-backed and not strict about its output: numbers may
//! arrive as floats, string lists occasionally contain skill objects, and whole
//! sections go missing when one of its agents fails. Deserialization is lenient
//! for all of that; every list defaults to empty.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Presence of this nested structure marks a record as normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ats_score: Option<AtsScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_details: Option<AnalysisDetails>,
    #[serde(default)]
    pub suggestions: Suggestions,
    #[serde(default)]
    pub keywords_analysis: KeywordAnalysis,
    #[serde(default)]
    pub skills_analysis: SkillsAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_method: Option<String>,
    /// Set by the analysis API when one of its stages failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisRecord {
    pub fn is_normalized(&self) -> bool {
        self.ats_score.is_some()
    }

    pub fn overall_score(&self) -> Option<u32> {
        self.ats_score.as_ref().map(|s| s.overall_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsScore {
    #[serde(deserialize_with = "lenient::score")]
    pub overall_score: u32,
    #[serde(default = "default_max_score", deserialize_with = "lenient::score")]
    pub max_score: u32,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub interpretation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_scores: Option<DetailedScores>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub areas_for_improvement: Vec<String>,
}

fn default_max_score() -> u32 {
    100
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedScores {
    #[serde(default)]
    pub format_score: f64,
    #[serde(default)]
    pub keywords_score: f64,
    #[serde(default)]
    pub content_score: f64,
    #[serde(default)]
    pub sections_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub sentence_count: u64,
    #[serde(default)]
    pub character_count: u64,
    #[serde(default)]
    pub average_words_per_sentence: f64,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub sections_identified: Vec<String>,
    #[serde(default)]
    pub readability_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub priority_improvements: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub content_suggestions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub formatting_tips: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub keyword_recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub missing_elements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub job_description_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub resume_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub matching_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub keyword_density: f64,
    #[serde(default)]
    pub match_percentage: f64,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub critical_missing_keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub keyword_suggestions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub industry_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Certified,
}

impl FromStr for SkillLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            "expert" => Ok(SkillLevel::Expert),
            "certified" => Ok(SkillLevel::Certified),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::Expert => "Expert",
            SkillLevel::Certified => "Certified",
        };
        f.write_str(s)
    }
}

/// A skill as computed by the analysis API. Level, years and category are only
/// ever present when the API produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient::skill_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<SkillLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Skill {
    /// A skill known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            years: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsAnalysis {
    #[serde(default)]
    pub technical_skills: Vec<Skill>,
    #[serde(default)]
    pub professional_skills: Vec<Skill>,
    #[serde(default)]
    pub soft_skills: Vec<Skill>,
    #[serde(default)]
    pub certifications: Vec<Skill>,
    #[serde(default)]
    pub all_skills: Vec<Skill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_gaps: Option<Vec<String>>,
    #[serde(default)]
    pub skills_summary: SkillsSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsSummary {
    #[serde(default)]
    pub total_skills: u32,
    #[serde(default)]
    pub technical_count: u32,
    #[serde(default)]
    pub professional_count: u32,
    #[serde(default)]
    pub soft_skills_count: u32,
    #[serde(default)]
    pub certifications_count: u32,
    #[serde(default)]
    pub average_experience_years: f64,
    #[serde(default)]
    pub skill_level_distribution: BTreeMap<String, u32>,
}

/// Tolerant deserializers for LLM-produced fields.
pub(crate) mod lenient {
    use super::*;

    /// Accepts integer or float scores, rounds, and clamps into 0..=100.
    pub fn score<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
        Ok(clamp_score(raw))
    }

    pub fn clamp_score(raw: f64) -> u32 {
        if raw.is_nan() {
            return 0;
        }
        raw.round().clamp(0.0, 100.0) as u32
    }

    /// Accepts a list whose items are strings or skill-like objects; objects
    /// contribute their `name`. `null` becomes an empty list.
    pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(values.iter().filter_map(value_to_label).collect())
    }

    pub fn skill_level<'de, D>(deserializer: D) -> Result<Option<SkillLevel>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()))
    }

    pub fn value_to_label(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(String::from),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_float_score_is_rounded_and_clamped() {
        let ats: AtsScore = serde_json::from_value(json!({
            "overall_score": 84.6,
            "max_score": 100,
            "grade": "B+"
        }))
        .unwrap();
        assert_eq!(ats.overall_score, 85);

        let ats: AtsScore = serde_json::from_value(json!({ "overall_score": 140 })).unwrap();
        assert_eq!(ats.overall_score, 100);
        assert_eq!(ats.max_score, 100);
    }

    #[test]
    fn test_mixed_keyword_list_keeps_names() {
        let suggestions: Suggestions = serde_json::from_value(json!({
            "keyword_recommendations": [
                "Add industry terms",
                { "name": "PMP Certification", "level": "Certified", "years": 2 }
            ]
        }))
        .unwrap();
        assert_eq!(
            suggestions.keyword_recommendations,
            vec!["Add industry terms", "PMP Certification"]
        );
    }

    #[test]
    fn test_unknown_skill_level_becomes_none() {
        let skill: Skill =
            serde_json::from_value(json!({ "name": "Rust", "level": "Wizard", "years": 3 }))
                .unwrap();
        assert_eq!(skill.level, None);
        assert_eq!(skill.years, Some(3.0));
    }

    #[test]
    fn test_failed_stage_response_still_parses() {
        // Shape returned when the analysis API's scoring stage fails.
        let record: AnalysisRecord = serde_json::from_value(json!({
            "ats_score": { "overall_score": 0, "details": {} },
            "error": "Analysis failed: timeout",
            "analysis_timestamp": "2024-05-01T10:00:00"
        }))
        .unwrap();
        assert!(record.is_normalized());
        assert_eq!(record.overall_score(), Some(0));
        assert_eq!(record.error.as_deref(), Some("Analysis failed: timeout"));
        assert!(record.skills_analysis.all_skills.is_empty());
    }

    #[test]
    fn test_missing_ats_score_is_not_normalized() {
        let record: AnalysisRecord = serde_json::from_value(json!({
            "suggestions": { "strengths": ["Clear layout"] }
        }))
        .unwrap();
        assert!(!record.is_normalized());
    }
}
