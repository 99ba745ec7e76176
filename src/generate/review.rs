//! Closing review
//!
//! The model proposes a rating along with the text. The rating is kept only
//! when it falls in the outcome's band; otherwise the text's sentiment
//! keywords are tried, and failing that a rating is drawn from the band.

use super::{fallback, to_prompt_json, ContentGenerator, JSON_FOOTER};
use crate::config::FallbackPolicy;
use crate::error::SynthError;
use crate::outcome::{keyword_rating, OutcomeType};
use crate::types::{BeneficiaryProfile, Program, Review};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates realistic program reviews. You always respond with valid JSON that strictly follows the requested structure.";

/// Review as the model returned it, rating not yet trusted
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    #[serde(default)]
    pub rating: Value,
    #[serde(default, alias = "summary")]
    pub text: String,
    #[serde(default)]
    pub full_review: String,
    #[serde(default)]
    pub impact: String,
}

impl ReviewDraft {
    fn proposed_rating(&self) -> Option<i64> {
        match &self.rating {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Settle the rating against `outcome` and produce the final review
    pub fn finalize<R: Rng>(self, outcome: OutcomeType, rng: &mut R) -> Review {
        let proposed = self.proposed_rating();
        let rating = match proposed {
            Some(r) if outcome.accepts_rating(r) => r as u8,
            _ => {
                let body = if self.full_review.is_empty() { &self.text } else { &self.full_review };
                match keyword_rating(body).filter(|r| outcome.accepts_rating(i64::from(*r))) {
                    Some(r) => {
                        tracing::debug!("Rating {:?} outside {} band, using keyword rating {}", proposed, outcome, r);
                        r
                    }
                    None => {
                        let r = outcome.sample_rating(rng);
                        tracing::debug!("Rating {:?} outside {} band, sampled {}", proposed, outcome, r);
                        r
                    }
                }
            }
        };

        Review {
            rating,
            text: self.text,
            full_review: self.full_review,
            impact: self.impact,
        }
    }
}

/// Generate the beneficiary's review of the program.
///
/// Returns `None` when generation fails under [`FallbackPolicy::Empty`].
pub async fn generate_review(
    gen: &ContentGenerator<'_>,
    profile: &BeneficiaryProfile,
    program: &Program,
    outcome: OutcomeType,
) -> Option<Review> {
    tracing::info!("Generating review for {} ({})", profile.name, outcome);

    let prompt = build_prompt(profile, program, outcome);
    let draft = gen
        .request_object(SYSTEM_PROMPT, &prompt, "review")
        .await
        .and_then(|payload| serde_json::from_value::<ReviewDraft>(payload).map_err(SynthError::from))
        .and_then(|draft| {
            if draft.text.is_empty() && draft.full_review.is_empty() {
                Err(SynthError::parse("review had no text"))
            } else {
                Ok(draft)
            }
        });

    match draft {
        Ok(draft) => {
            let review = draft.finalize(outcome, &mut rand::thread_rng());
            tracing::info!("Generated review with rating {}", review.rating);
            Some(review)
        }
        Err(e) => match gen.fallback() {
            FallbackPolicy::Empty => {
                tracing::warn!("Error generating review: {}; no review will be written", e);
                None
            }
            FallbackPolicy::Canned => {
                tracing::warn!("Error generating review: {}; using canned review", e);
                Some(fallback::review(outcome, &mut rand::thread_rng()))
            }
        },
    }
}

fn build_prompt(profile: &BeneficiaryProfile, program: &Program, outcome: OutcomeType) -> String {
    format!(
        r#"Generate a realistic review written by a participant who has completed a program called "{name}".

Program Description: {description}

Participant Profile:
{profile}

The review should be {tone}. The rating must be {band} on a scale of 1 to 5.

Return a JSON object of the form:
{{
  "rating": <integer 1-5>,
  "text": "1-2 sentence summary",
  "fullReview": "a detailed review of 4-6 sentences",
  "impact": "one sentence on the program's impact on the participant"
}}

The review should mention the participant's specific challenges and whether the program helped with them.
{footer}"#,
        name = program.name,
        description = program.description,
        profile = to_prompt_json(profile),
        tone = outcome.survey_tone(),
        band = outcome.rating_instruction(),
        footer = JSON_FOOTER,
    )
}
