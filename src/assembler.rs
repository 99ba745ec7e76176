//! Session bundle assembly
//!
//! One outcome is drawn per session and handed to every generator, so the
//! application, surveys, reflections and review all tell the same story.
//! Sections whose catalog prerequisite is missing (no application template,
//! no milestones, no PRE/POST survey) are skipped without a model call.

use crate::error::{Result, SynthError};
use crate::generate::application::generate_application_responses;
use crate::generate::milestone::generate_milestone_reflections;
use crate::generate::review::generate_review;
use crate::generate::survey::{generate_post_survey_responses, generate_pre_survey_responses};
use crate::generate::ContentGenerator;
use crate::outcome::{sample_outcome, OutcomeType};
use crate::repository::ProgramRepository;
use crate::types::{BeneficiaryProfile, SessionBundle, SurveyKind};

/// Assemble a bundle with a freshly sampled outcome
pub async fn assemble_session<R: ProgramRepository + ?Sized>(
    repo: &R,
    gen: &ContentGenerator<'_>,
    profile: BeneficiaryProfile,
    program_id: i64,
    fund_id: i64,
) -> Result<SessionBundle> {
    let outcome = sample_outcome(&mut rand::thread_rng());
    assemble_with_outcome(repo, gen, profile, program_id, fund_id, outcome).await
}

pub async fn assemble_with_outcome<R: ProgramRepository + ?Sized>(
    repo: &R,
    gen: &ContentGenerator<'_>,
    profile: BeneficiaryProfile,
    program_id: i64,
    fund_id: i64,
    outcome: OutcomeType,
) -> Result<SessionBundle> {
    let program = repo
        .program(program_id)?
        .ok_or_else(|| SynthError::not_found("Program", program_id))?;
    let milestones = repo.milestones(program_id)?;
    let application_questions = repo.application_questions(program_id)?;
    let pre_survey = repo.survey_for_program(program_id, SurveyKind::Pre)?;
    let post_survey = repo.survey_for_program(program_id, SurveyKind::Post)?;

    tracing::info!(
        "Assembling {} session for {} in program {} ({} milestones, {} application questions, pre survey: {}, post survey: {})",
        outcome,
        profile.name,
        program.name,
        milestones.len(),
        application_questions.len(),
        pre_survey.is_some(),
        post_survey.is_some()
    );

    let application_responses =
        generate_application_responses(gen, &profile, &program, &application_questions).await;

    let pre_survey_responses = match &pre_survey {
        Some(survey) => generate_pre_survey_responses(gen, &profile, &program, survey).await,
        None => Vec::new(),
    };

    let milestone_reflections =
        generate_milestone_reflections(gen, &profile, &program, &milestones, outcome).await;

    let post_survey_responses = match &post_survey {
        Some(survey) => generate_post_survey_responses(gen, &profile, &program, survey, outcome).await,
        None => Vec::new(),
    };

    let review = generate_review(gen, &profile, &program, outcome).await;

    Ok(SessionBundle {
        beneficiary_profile: profile,
        program_id,
        fund_id,
        outcome_type: outcome,
        pre_survey_id: pre_survey.map(|s| s.id),
        post_survey_id: post_survey.map(|s| s.id),
        application_responses,
        pre_survey_responses,
        milestone_reflections,
        post_survey_responses,
        review,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::llm::testing::ScriptedGenerator;

    /// Replies for every section of program 1 in the seeded store
    pub fn scripted_happy_path() -> ScriptedGenerator {
        ScriptedGenerator::new()
            .reply(
                "application responses",
                r#"{"responses": [{"questionId": 10, "response": "Tired."}, {"questionId": 11, "response": "Isolation."}]}"#,
            )
            .reply(
                "pre-survey",
                r#"{"responses": [{"questionId": 20, "response": 2}, {"questionId": 21, "response": "Everything."}]}"#,
            )
            .reply(
                "completing each milestone",
                r#"{"reflections": [{"milestoneId": 1, "reflection": "Good start."}, {"milestoneId": 2, "reflection": "Growing."}]}"#,
            )
            .reply(
                "post-survey",
                r#"{"responses": [{"questionId": 30, "response": 5}, {"questionId": 31, "response": "A lot."}]}"#,
            )
            .reply(
                "realistic review",
                r#"{"rating": 5, "text": "Great.", "fullReview": "Excellent coaching.", "impact": "Rested."}"#,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::scripted_happy_path;
    use super::*;
    use crate::config::FallbackPolicy;
    use crate::llm::testing::ScriptedGenerator;
    use crate::profile::fallback_profile;
    use crate::repository::testing::seeded_store;

    #[tokio::test]
    async fn test_full_bundle_for_complete_program() {
        let store = seeded_store();
        let llm = scripted_happy_path();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);

        let bundle = assemble_with_outcome(&store, &gen, fallback_profile(), 1, 1, OutcomeType::Positive)
            .await
            .unwrap();

        assert_eq!(bundle.outcome_type, OutcomeType::Positive);
        assert_eq!(bundle.pre_survey_id, Some(1));
        assert_eq!(bundle.post_survey_id, Some(2));
        assert_eq!(bundle.application_responses.len(), 2);
        assert_eq!(bundle.pre_survey_responses.len(), 2);
        assert_eq!(bundle.milestone_reflections.len(), 2);
        assert_eq!(bundle.post_survey_responses.len(), 2);
        assert_eq!(bundle.review.unwrap().rating, 5);
        assert_eq!(llm.calls(), 5);
    }

    #[tokio::test]
    async fn test_bare_program_only_reviews() {
        let store = seeded_store();
        let llm = scripted_happy_path();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);

        let bundle = assemble_with_outcome(&store, &gen, fallback_profile(), 2, 1, OutcomeType::Neutral)
            .await
            .unwrap();

        assert!(bundle.application_responses.is_empty());
        assert!(bundle.milestone_reflections.is_empty());
        assert_eq!(bundle.pre_survey_id, None);
        assert_eq!(bundle.review.unwrap().rating, 3);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_generators_leave_sections_empty() {
        let store = seeded_store();
        let llm = ScriptedGenerator::new();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);

        let bundle = assemble_session(&store, &gen, fallback_profile(), 1, 1).await.unwrap();
        assert!(bundle.application_responses.is_empty());
        assert!(bundle.post_survey_responses.is_empty());
        assert!(bundle.review.is_none());
        // Survey ids are still recorded for the persisted session
        assert_eq!(bundle.post_survey_id, Some(2));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let store = seeded_store();
        let llm = ScriptedGenerator::new();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);

        let err = assemble_session(&store, &gen, fallback_profile(), 42, 1).await.unwrap_err();
        assert!(matches!(err, SynthError::NotFound { entity: "Program", id: 42 }));
        assert_eq!(llm.calls(), 0);
    }
}
