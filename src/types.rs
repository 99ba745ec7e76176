//! Core types for the synthetic session pipeline
//!
//! Catalog entities (funds, programs, milestones, surveys, questions) are
//! read-only during a run. Generated entities (profiles, responses,
//! reflections, reviews) live only as long as one session bundle.

use crate::outcome::OutcomeType;
use serde::{Deserialize, Deserializer, Serialize};

/// A fund that finances one or more programs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub total_amount: f64,
}

/// A support program beneficiaries participate in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: i64,
    pub fund_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A named checkpoint within a program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: i64,
    pub program_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Prompt shown to the beneficiary when reflecting on this milestone
    pub reflection_prompt: Option<String>,
    #[serde(default)]
    pub payment_amount: f64,
    pub order: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SurveyKind {
    /// Taken before the program starts
    Pre,
    /// Taken after the program completes
    Post,
}

impl SurveyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyKind::Pre => "PRE",
            SurveyKind::Post => "POST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRE" => Some(SurveyKind::Pre),
            "POST" => Some(SurveyKind::Post),
            _ => None,
        }
    }
}

/// Where a question lives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionContext {
    Survey,
    Application,
}

impl QuestionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionContext::Survey => "SURVEY",
            QuestionContext::Application => "APPLICATION",
        }
    }
}

/// A canonical survey or application question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    /// 1-based position within its survey or application template
    pub order: u32,
    pub text: String,
    /// LIKERT, MULTIPLE_CHOICE, CHECKBOX, TEXT, ...
    #[serde(rename = "type")]
    pub kind: String,
}

impl Question {
    /// Whether the question expects a 1-5 numeric answer
    pub fn is_rating(&self) -> bool {
        if self.kind.eq_ignore_ascii_case("LIKERT") || self.kind.eq_ignore_ascii_case("RATING") {
            return true;
        }
        let text = self.text.to_lowercase();
        text.contains("rate") || text.contains("rating") || text.contains("scale")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Survey {
    pub id: i64,
    pub title: String,
    pub kind: SurveyKind,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
    #[serde(other)]
    Other,
}

impl MaritalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
            MaritalStatus::Divorced => "Divorced",
            MaritalStatus::Widowed => "Widowed",
            MaritalStatus::Other => "Other",
        }
    }
}

/// A synthetic program participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryProfile {
    pub name: String,
    pub age: u32,
    pub job_title: String,
    pub years_in_job: u32,
    pub income: u64,
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub number_of_children: u32,
    #[serde(default)]
    pub current_challenges: Vec<String>,
    #[serde(default)]
    pub hopeful_outcomes: Vec<String>,
}

/// One generated answer, before it is tied to a canonical question
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResponse {
    /// Either a question id or, when the model numbered questions itself, an order
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub question_id: Option<i64>,
    #[serde(
        default,
        alias = "order",
        deserialize_with = "lenient_order",
        skip_serializing_if = "Option::is_none"
    )]
    pub question_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(alias = "answer")]
    pub response: serde_json::Value,
}

impl GeneratedResponse {
    pub fn answer(question_id: i64, response: impl Into<serde_json::Value>) -> Self {
        Self {
            question_id: Some(question_id),
            response: response.into(),
            ..Default::default()
        }
    }

    /// Answer as stored text; numbers and booleans are rendered without quotes
    pub fn answer_text(&self) -> String {
        match &self.response {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// A generated reflection on one milestone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReflection {
    #[serde(deserialize_with = "required_id")]
    pub milestone_id: i64,
    #[serde(alias = "content", alias = "response")]
    pub reflection: String,
}

/// The beneficiary's closing review of a program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub rating: u8,
    /// Short summary (1-2 sentences)
    pub text: String,
    pub full_review: String,
    pub impact: String,
}

/// Everything generated for one synthetic program participation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionBundle {
    pub beneficiary_profile: BeneficiaryProfile,
    pub program_id: i64,
    pub fund_id: i64,
    pub outcome_type: OutcomeType,
    #[serde(default)]
    pub pre_survey_id: Option<i64>,
    #[serde(default)]
    pub post_survey_id: Option<i64>,
    #[serde(default)]
    pub application_responses: Vec<GeneratedResponse>,
    #[serde(default)]
    pub pre_survey_responses: Vec<GeneratedResponse>,
    #[serde(default)]
    pub milestone_reflections: Vec<GeneratedReflection>,
    #[serde(default)]
    pub post_survey_responses: Vec<GeneratedResponse>,
    #[serde(default)]
    pub review: Option<Review>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Str(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Int(n) => Some(*n),
            NumberOrString::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            NumberOrString::Float(_) => None,
            NumberOrString::Str(s) => s.trim().parse().ok(),
        }
    }
}

// Models sometimes quote ids ("3") or emit labels ("q3"); only numeric values count.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrString> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.as_i64()))
}

fn lenient_order<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrString> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.as_i64())
        .and_then(|n| u32::try_from(n).ok()))
}

fn required_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = NumberOrString::deserialize(deserializer)?;
    raw.as_i64()
        .ok_or_else(|| serde::de::Error::custom("expected a numeric id"))
}
