//! Canned content for [`FallbackPolicy::Canned`](crate::config::FallbackPolicy)
//!
//! Fixed, outcome-keyed text. Ratings still come from the outcome's band so
//! canned sessions keep tone and numbers consistent.

use crate::outcome::OutcomeType;
use crate::types::*;
use rand::Rng;

fn first_or<'a>(items: &'a [String], default: &'a str) -> &'a str {
    items.first().map(String::as_str).unwrap_or(default)
}

pub fn application_responses(profile: &BeneficiaryProfile, questions: &[Question]) -> Vec<GeneratedResponse> {
    let challenge = first_or(&profile.current_challenges, "the pressure of my current role").to_lowercase();
    let hope = first_or(&profile.hopeful_outcomes, "find a healthier rhythm").to_lowercase();

    questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let answer = match i % 3 {
                0 => format!(
                    "I'm seeking support because I'm struggling with {}. I hope this program can give me the tools I need to keep going well.",
                    challenge
                ),
                1 => format!(
                    "My biggest challenge right now is {}. It has become more pronounced over the last few years as a {}.",
                    challenge, profile.job_title
                ),
                _ => format!("My primary goal is to {}.", hope),
            };
            GeneratedResponse::answer(q.id, answer)
        })
        .collect()
}

pub fn pre_survey_responses(profile: &BeneficiaryProfile, survey: &Survey) -> Vec<GeneratedResponse> {
    let challenge = first_or(&profile.current_challenges, "my workload").to_lowercase();
    let hope = first_or(&profile.hopeful_outcomes, "finding balance").to_lowercase();

    survey
        .questions
        .iter()
        .map(|q| {
            if q.is_rating() {
                GeneratedResponse::answer(q.id, 2)
            } else {
                GeneratedResponse::answer(
                    q.id,
                    format!("Right now I'm struggling with {} and need help with {}.", challenge, hope),
                )
            }
        })
        .collect()
}

/// Short, medium or long reflection text for an outcome
fn reflection_text(outcome: OutcomeType, length: u8) -> &'static str {
    match (outcome, length) {
        (OutcomeType::Positive, 1) => "This milestone was very helpful for my growth.",
        (OutcomeType::Positive, 2) => "I found this milestone to be transformative. The insights I gained have already improved my work and family life.",
        (OutcomeType::Positive, _) => "Completing this milestone was a significant turning point in my journey. I've gained valuable tools that have helped me address my challenges effectively. I feel more confident and equipped to lead now.",
        (OutcomeType::Neutral, 1) => "This milestone had some helpful elements, but also some challenges.",
        (OutcomeType::Neutral, 2) => "I found parts of this milestone useful, though I'm still working through some of the same issues. There's been some improvement but not as much as I'd hoped.",
        (OutcomeType::Neutral, _) => "This milestone provided some insights, but I'm still struggling with implementing the concepts consistently. While I've seen small improvements in some areas, other challenges remain largely the same. I'm cautiously optimistic about continued progress.",
        (OutcomeType::Negative, 1) => "I didn't find this milestone particularly helpful for my situation.",
        (OutcomeType::Negative, 2) => "This milestone didn't address my specific challenges. I'm still facing the same issues with little improvement.",
        (OutcomeType::Negative, _) => "I found this milestone to be disconnected from my actual needs. The concepts presented were too general and didn't provide practical solutions to my specific challenges. I'm still struggling with the same issues I had before.",
    }
}

pub fn milestone_reflections<R: Rng>(
    milestones: &[Milestone],
    outcome: OutcomeType,
    rng: &mut R,
) -> Vec<GeneratedReflection> {
    milestones
        .iter()
        .map(|m| GeneratedReflection {
            milestone_id: m.id,
            reflection: reflection_text(outcome, rng.gen_range(1..=3)).to_string(),
        })
        .collect()
}

pub fn post_survey_responses<R: Rng>(
    survey: &Survey,
    outcome: OutcomeType,
    rng: &mut R,
) -> Vec<GeneratedResponse> {
    let open_answer = match outcome {
        OutcomeType::Positive => "The program has been transformative for both my work and personal life. I've gained valuable tools and insights that have helped me address my challenges effectively.",
        OutcomeType::Neutral => "The program had some helpful elements, though I'm still working through some of the same issues. There's been some improvement but not as much as I'd hoped.",
        OutcomeType::Negative => "I didn't find the program particularly helpful for my situation. I'm still facing the same challenges with little improvement.",
    };

    survey
        .questions
        .iter()
        .map(|q| {
            if q.is_rating() {
                GeneratedResponse::answer(q.id, outcome.sample_rating(rng))
            } else {
                GeneratedResponse::answer(q.id, open_answer)
            }
        })
        .collect()
}

pub fn review<R: Rng>(outcome: OutcomeType, rng: &mut R) -> Review {
    let (text, full_review, impact) = match outcome {
        OutcomeType::Positive => (
            "This program transformed my work and helped me overcome burnout.",
            "When I started this program, I was struggling with burnout and feeling isolated in my role. The coaching gave me practical tools to address these challenges and to reach my goals of better work-life balance and stronger leadership. I'm more effective now and have better relationships at work and at home. I highly recommend this program to anyone facing similar challenges.",
            "Transformed my approach to my work and restored my passion for serving.",
        ),
        OutcomeType::Neutral => (
            "The program had some helpful elements, but didn't fully address my challenges.",
            "I entered this program hoping to find solutions for burnout and leadership challenges. Some aspects were helpful, but many of the strategies weren't tailored to my situation. I've made progress in certain areas and still struggle with the same issues in others. The program might suit people in different circumstances better.",
            "Provided some useful tools but didn't fully resolve my challenges.",
        ),
        OutcomeType::Negative => (
            "This program didn't address my needs and left me feeling more frustrated.",
            "I was hopeful this program would help me navigate the challenges I was facing, particularly burnout and conflict. Unfortunately it seemed disconnected from the real-world issues I deal with. The strategies were too theoretical and didn't translate to my context. I'm still struggling with the same issues and now feel even more isolated. I would not recommend this program to others facing similar challenges.",
            "Added to my stress rather than alleviating it.",
        ),
    };

    Review {
        rating: outcome.sample_rating(rng),
        text: text.to_string(),
        full_review: full_review.to_string(),
        impact: impact.to_string(),
    }
}
