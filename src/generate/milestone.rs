//! Milestone reflections

use super::{fallback, to_prompt_json, ContentGenerator, JSON_FOOTER};
use crate::llm::parse_items;
use crate::outcome::OutcomeType;
use crate::types::{BeneficiaryProfile, GeneratedReflection, Milestone, Program};
use serde_json::json;
use std::collections::HashSet;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates realistic milestone reflections. You always respond with valid JSON that strictly follows the requested structure.";

/// One reflection per milestone, toned by the outcome.
///
/// Reflections naming a milestone outside `milestones` are dropped.
pub async fn generate_milestone_reflections(
    gen: &ContentGenerator<'_>,
    profile: &BeneficiaryProfile,
    program: &Program,
    milestones: &[Milestone],
    outcome: OutcomeType,
) -> Vec<GeneratedReflection> {
    if milestones.is_empty() {
        return Vec::new();
    }
    tracing::info!(
        "Generating {} milestone reflections for {} ({})",
        milestones.len(),
        profile.name,
        outcome
    );

    let prompt = build_prompt(profile, program, milestones, outcome);
    let items = match gen.request_list(SYSTEM_PROMPT, &prompt, "reflections", "milestone reflections").await {
        Ok(items) => items,
        Err(e) => {
            return gen.degrade("milestone reflections", &e, || {
                fallback::milestone_reflections(milestones, outcome, &mut rand::thread_rng())
            })
        }
    };

    let known: HashSet<i64> = milestones.iter().map(|m| m.id).collect();
    let reflections: Vec<GeneratedReflection> = parse_items::<GeneratedReflection>(items, "milestone reflection")
        .into_iter()
        .filter(|r| {
            let keep = known.contains(&r.milestone_id);
            if !keep {
                tracing::warn!("Dropping reflection for unknown milestone {}", r.milestone_id);
            }
            keep
        })
        .collect();
    tracing::info!("Generated {} milestone reflections", reflections.len());
    reflections
}

fn build_prompt(
    profile: &BeneficiaryProfile,
    program: &Program,
    milestones: &[Milestone],
    outcome: OutcomeType,
) -> String {
    let listed: Vec<_> = milestones
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "title": m.title,
                "description": m.description,
                "reflectionPrompt": m.reflection_prompt,
            })
        })
        .collect();

    format!(
        r#"Generate realistic reflections written by a participant after completing each milestone of a program called "{name}".

Program Description: {description}

Participant Profile:
{profile}

Milestones:
{milestones}

The overall tone of the reflections should be {tone}.

VARIABLE LENGTH: vary the length of the reflections. Some should be short (1-2 sentences), some medium (3-4 sentences) and some long (5-7 sentences). Each reflection should answer the milestone's reflection prompt where one is given.

Return a JSON object of the form:
{{
  "reflections": [
    {{ "milestoneId": <milestone id>, "reflection": "reflection text" }}
  ]
}}

Write exactly one reflection per milestone and use the exact milestone id given.
{footer}"#,
        name = program.name,
        description = program.description,
        profile = to_prompt_json(profile),
        milestones = to_prompt_json(&listed),
        tone = outcome.reflection_tone(),
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

    fn milestones() -> Vec<Milestone> {
        (1..=2)
            .map(|i| Milestone {
                id: i,
                program_id: 1,
                title: format!("Session {}", i),
                description: String::new(),
                reflection_prompt: Some("How was it?".into()),
                payment_amount: 150.0,
                order: i as u32,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_milestones_are_dropped() {
        let llm = ScriptedGenerator::new().reply(
            "completing each milestone",
            r#"{"reflections": [
                {"milestoneId": 1, "reflection": "Helpful."},
                {"milestoneId": "2", "content": "Harder than expected."},
                {"milestoneId": 9, "reflection": "Hallucinated."}
            ]}"#,
        );
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let reflections =
            generate_milestone_reflections(&gen, &fallback_profile(), &program(), &milestones(), OutcomeType::Neutral)
                .await;

        assert_eq!(reflections.iter().map(|r| r.milestone_id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(reflections[1].reflection, "Harder than expected.");
        assert_eq!(llm.calls_matching("VARIABLE LENGTH"), 1);
        assert_eq!(llm.calls_matching("ongoing challenges"), 1);
    }

    #[tokio::test]
    async fn test_no_milestones_no_call() {
        let llm = ScriptedGenerator::new();
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let reflections =
            generate_milestone_reflections(&gen, &fallback_profile(), &program(), &[], OutcomeType::Positive).await;
        assert!(reflections.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_service_error_is_empty_by_default() {
        let llm = ScriptedGenerator::new().fail("completing each milestone", "HTTP 500");
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let reflections =
            generate_milestone_reflections(&gen, &fallback_profile(), &program(), &milestones(), OutcomeType::Positive)
                .await;
        assert!(reflections.is_empty());
    }
}
