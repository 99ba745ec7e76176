//! Beneficiary profile synthesis
//!
//! One model call produces a fictitious participant for a program. Any
//! failure falls back to a fixed profile so a batch never stalls here.

use crate::llm::{parse_json_payload, TextGenerator};
use crate::types::{BeneficiaryProfile, MaritalStatus, Program};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates realistic profiles of people seeking support. You always respond with valid JSON that strictly follows the requested structure.";

/// Generate a profile for someone seeking support from `program`
pub async fn synthesize_profile(llm: &dyn TextGenerator, program: &Program) -> BeneficiaryProfile {
    tracing::info!("Generating beneficiary profile for program: {}", program.name);

    let prompt = build_profile_prompt(program);
    let raw = match llm.complete(SYSTEM_PROMPT, &prompt, true).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Profile generation failed, using fallback profile: {}", e);
            return fallback_profile();
        }
    };
    tracing::debug!("Raw profile response: {}", raw);

    match parse_json_payload::<BeneficiaryProfile>(&raw) {
        Ok(profile) => {
            tracing::info!("Generated beneficiary profile for {}", profile.name);
            profile
        }
        Err(e) => {
            tracing::warn!("Profile response did not parse, using fallback profile: {}", e);
            fallback_profile()
        }
    }
}

fn build_profile_prompt(program: &Program) -> String {
    format!(
        r#"Generate a detailed profile of a person who is seeking support from a program called "{name}".
Program Description: {description}

The profile should be returned as a JSON object with the following structure:
{{
  "name": "Full Name",
  "age": 35,
  "jobTitle": "Job Title",
  "yearsInJob": 5,
  "income": 75000,
  "maritalStatus": "Single|Married|Divorced|Widowed",
  "numberOfChildren": 2,
  "currentChallenges": ["Challenge 1", "Challenge 2", "Challenge 3"],
  "hopefulOutcomes": ["Outcome 1", "Outcome 2", "Outcome 3"]
}}

Guidelines:
1. Name: Make up a unique and uncommon full name (don't include "beneficiary" or "pastor" in the name)
2. Age: Between 30-70
3. Job Title: Should sound like a real job title
4. Years in current job: Between 1-10
5. Income: Between 50,000-200,000 (just the number, no currency symbol)
6. Marital Status: One of "Single", "Married", "Divorced", or "Widowed"
7. Number of Children: Integer between 0-5
8. Current Challenges: List 2-3 specific challenges they're facing related to the program description
9. Hopeful Outcomes: List 2-3 specific goals that align with what the program offers

Make the profile realistic, detailed, and specific. Include personal struggles that would be common for people seeking this specific type of program.
Ensure your response is a valid JSON object."#,
        name = program.name,
        description = program.description,
    )
}

/// The fixed profile used whenever synthesis fails
pub fn fallback_profile() -> BeneficiaryProfile {
    BeneficiaryProfile {
        name: "John Smith".to_string(),
        age: 45,
        job_title: "Marketing Manager".to_string(),
        years_in_job: 5,
        income: 85_000,
        marital_status: MaritalStatus::Married,
        number_of_children: 2,
        current_challenges: vec![
            "Experiencing burnout from high work demands".to_string(),
            "Struggling to balance career and family responsibilities".to_string(),
            "Difficulty delegating tasks to team members".to_string(),
        ],
        hopeful_outcomes: vec![
            "Achieve better work-life balance".to_string(),
            "Develop effective delegation techniques".to_string(),
            "Improve communication with colleagues and family".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedGenerator;

    fn program() -> Program {
        Program {
            id: 1,
            fund_id: Some(1),
            name: "Strengthening Our Souls".to_string(),
            description: "A self-paced soul care journey".to_string(),
        }
    }

    #[tokio::test]
    async fn test_service_error_yields_fallback() {
        let llm = ScriptedGenerator::new().fail("Generate a detailed profile", "connection reset");
        let profile = synthesize_profile(&llm, &program()).await;
        assert_eq!(profile, fallback_profile());
        assert_eq!(profile.name, "John Smith");
        assert_eq!(profile.age, 45);
    }

    #[tokio::test]
    async fn test_unparseable_reply_yields_fallback() {
        let llm = ScriptedGenerator::new().reply("Generate a detailed profile", "I cannot do that.");
        let profile = synthesize_profile(&llm, &program()).await;
        assert_eq!(profile, fallback_profile());
    }

    #[tokio::test]
    async fn test_fenced_profile_is_parsed() {
        let body = r#"```json
{
  "name": "Marisol Okonkwo-Hale",
  "age": 38,
  "jobTitle": "Youth Pastor",
  "yearsInJob": 6,
  "income": 58000,
  "maritalStatus": "Married",
  "numberOfChildren": 3,
  "currentChallenges": ["Sleep deprivation", "Volunteer turnover"],
  "hopefulOutcomes": ["Sustainable rhythms", "A healthier team"]
}
```"#;
        let llm = ScriptedGenerator::new().reply("Strengthening Our Souls", body);
        let profile = synthesize_profile(&llm, &program()).await;
        assert_eq!(profile.name, "Marisol Okonkwo-Hale");
        assert_eq!(profile.number_of_children, 3);
        assert_eq!(llm.calls(), 1);
    }
}
