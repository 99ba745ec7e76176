//! Application answers

use super::{fallback, to_prompt_json, ContentGenerator, JSON_FOOTER};
use crate::llm::parse_items;
use crate::types::{BeneficiaryProfile, GeneratedResponse, Program, Question};
use serde_json::json;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates realistic program application responses. You always respond with valid JSON that strictly follows the requested structure.";

/// Answer every application question in the beneficiary's voice.
///
/// An empty template yields an empty list without calling the model.
pub async fn generate_application_responses(
    gen: &ContentGenerator<'_>,
    profile: &BeneficiaryProfile,
    program: &Program,
    questions: &[Question],
) -> Vec<GeneratedResponse> {
    if questions.is_empty() {
        return Vec::new();
    }
    tracing::info!("Generating application responses for {}", profile.name);

    let prompt = build_prompt(profile, program, questions);
    match gen.request_list(SYSTEM_PROMPT, &prompt, "responses", "application responses").await {
        Ok(items) => {
            let responses: Vec<GeneratedResponse> = parse_items(items, "application response");
            tracing::info!("Generated {} application responses", responses.len());
            responses
        }
        Err(e) => gen.degrade("application responses", &e, || {
            fallback::application_responses(profile, questions)
        }),
    }
}

fn build_prompt(profile: &BeneficiaryProfile, program: &Program, questions: &[Question]) -> String {
    let listed: Vec<_> = questions
        .iter()
        .map(|q| json!({"id": q.id, "order": q.order, "text": q.text, "type": q.kind}))
        .collect();

    format!(
        r#"Generate realistic application responses for a person applying to a program called "{name}".

Program Description: {description}

Applicant Profile:
{profile}

Application Questions:
{questions}

Return a JSON object of the form:
{{
  "responses": [
    {{ "questionId": <question id>, "response": "answer text" }}
  ]
}}

Write one response per question, in the same order, in the applicant's own first-person voice. Use the exact question id given for each question. Each answer should be 2-4 sentences, specific to the applicant's challenges and hopes.
{footer}"#,
        name = program.name,
        description = program.description,
        profile = to_prompt_json(profile),
        questions = to_prompt_json(&listed),
        footer = JSON_FOOTER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackPolicy;
    use crate::llm::testing::ScriptedGenerator;
    use crate::profile::fallback_profile;

    fn program() -> Program {
        Program { id: 1, fund_id: Some(1), name: "Care & Coaching".into(), description: "Coaching".into() }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question { id: 10, order: 1, text: "Why now?".into(), kind: "long_text".into() },
            Question { id: 11, order: 2, text: "Biggest challenge?".into(), kind: "long_text".into() },
        ]
    }

    #[tokio::test]
    async fn test_parses_wrapped_responses_and_drops_malformed() {
        let llm = ScriptedGenerator::new().reply(
            "application responses",
            r#"{"responses": [
                {"questionId": 10, "response": "I am worn out."},
                {"questionId": "11", "answer": "Isolation."},
                {"questionId": 12}
            ]}"#,
        );
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let responses = generate_application_responses(&gen, &fallback_profile(), &program(), &questions()).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].question_id, Some(11));
        assert_eq!(responses[1].answer_text(), "Isolation.");
    }

    #[tokio::test]
    async fn test_empty_template_skips_model() {
        let llm = ScriptedGenerator::new();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Canned);
        let responses = generate_application_responses(&gen, &fallback_profile(), &program(), &[]).await;
        assert!(responses.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_follows_fallback_policy() {
        let llm = ScriptedGenerator::new().fail("application responses", "timeout");

        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        assert!(generate_application_responses(&gen, &fallback_profile(), &program(), &questions())
            .await
            .is_empty());

        let gen = ContentGenerator::new(&llm, FallbackPolicy::Canned);
        let canned = generate_application_responses(&gen, &fallback_profile(), &program(), &questions()).await;
        assert_eq!(canned.len(), 2);
    }
}
