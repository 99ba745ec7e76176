//! Pre- and post-survey answers
//!
//! The pre-survey describes the beneficiary before the program, so it is
//! not steered by the outcome. The post-survey takes the outcome's tone, and
//! its rating questions are told which band to answer in.

use super::{fallback, to_prompt_json, ContentGenerator, JSON_FOOTER};
use crate::llm::parse_items;
use crate::outcome::OutcomeType;
use crate::types::{BeneficiaryProfile, GeneratedResponse, Program, Question, Survey};
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates realistic survey responses. You always respond with valid JSON that strictly follows the requested structure.";

fn list_questions(questions: &[Question]) -> Vec<Value> {
    questions
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "order": q.order,
                "text": q.text,
                "type": q.kind,
                "rating": q.is_rating(),
            })
        })
        .collect()
}

const RESPONSE_SHAPE: &str = r#"Return a JSON object of the form:
{
  "responses": [
    { "questionId": <question id>, "response": <answer> }
  ]
}

Answer every question in order and use the exact question id given. Questions marked "rating": true take a number from 1 to 5; every other question takes text."#;

/// Baseline answers from before the program starts
pub async fn generate_pre_survey_responses(
    gen: &ContentGenerator<'_>,
    profile: &BeneficiaryProfile,
    program: &Program,
    survey: &Survey,
) -> Vec<GeneratedResponse> {
    if survey.questions.is_empty() {
        return Vec::new();
    }
    tracing::info!("Generating pre-survey responses for {}", profile.name);

    let prompt = format!(
        r#"Generate realistic pre-survey responses for a person about to begin a program called "{name}".

Program Description: {description}

Participant Profile:
{profile}

Survey: {title}
Questions:
{questions}

These answers describe how the participant is doing BEFORE the program starts. They should reflect the participant's current challenges honestly; ratings should generally sit at the low to middle end of the scale.

{shape}
{footer}"#,
        name = program.name,
        description = program.description,
        profile = to_prompt_json(profile),
        title = survey.title,
        questions = to_prompt_json(&list_questions(&survey.questions)),
        shape = RESPONSE_SHAPE,
        footer = JSON_FOOTER,
    );

    match gen.request_list(SYSTEM_PROMPT, &prompt, "responses", "pre-survey responses").await {
        Ok(items) => {
            let responses: Vec<GeneratedResponse> = parse_items(items, "pre-survey response");
            tracing::info!("Generated {} pre-survey responses", responses.len());
            responses
        }
        Err(e) => gen.degrade("pre-survey responses", &e, || {
            fallback::pre_survey_responses(profile, survey)
        }),
    }
}

/// Answers after completing the program, in the outcome's tone
pub async fn generate_post_survey_responses(
    gen: &ContentGenerator<'_>,
    profile: &BeneficiaryProfile,
    program: &Program,
    survey: &Survey,
    outcome: OutcomeType,
) -> Vec<GeneratedResponse> {
    if survey.questions.is_empty() {
        return Vec::new();
    }
    tracing::info!("Generating post-survey responses for {} ({})", profile.name, outcome);

    let prompt = format!(
        r#"Generate realistic post-survey responses for a person who has just completed a program called "{name}".

Program Description: {description}

Participant Profile:
{profile}

Survey: {title}
Questions:
{questions}

The overall tone of the responses should be {tone}. For rating questions, answer with a number {band}.

{shape}
{footer}"#,
        name = program.name,
        description = program.description,
        profile = to_prompt_json(profile),
        title = survey.title,
        questions = to_prompt_json(&list_questions(&survey.questions)),
        tone = outcome.survey_tone(),
        band = outcome.rating_instruction(),
        shape = RESPONSE_SHAPE,
        footer = JSON_FOOTER,
    );

    match gen.request_list(SYSTEM_PROMPT, &prompt, "responses", "post-survey responses").await {
        Ok(items) => {
            let responses: Vec<GeneratedResponse> = parse_items(items, "post-survey response");
            tracing::info!("Generated {} post-survey responses", responses.len());
            responses
        }
        Err(e) => gen.degrade("post-survey responses", &e, || {
            fallback::post_survey_responses(survey, outcome, &mut rand::thread_rng())
        }),
    }
}
