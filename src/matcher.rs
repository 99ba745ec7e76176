//! Question matching
//!
//! Generated answers refer to questions loosely: by wording, by id, by the
//! number the model gave the question, or not at all. Resolution tries
//! strategies in a fixed order and the first hit wins:
//!
//! 1. text similarity (case-insensitive containment either way)
//! 2. direct id
//! 3. order (the same numeric value, or an explicit order)
//! 4. position within the batch, modulo the number of questions
//!
//! Position always succeeds for a non-empty question list.

use crate::types::{GeneratedResponse, Question};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    TextSimilarity,
    DirectId,
    Order,
    Position,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStrategy::TextSimilarity => "text similarity",
            MatchStrategy::DirectId => "direct id",
            MatchStrategy::Order => "order",
            MatchStrategy::Position => "position",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution<'q> {
    pub question: &'q Question,
    pub strategy: MatchStrategy,
}

pub fn match_by_text<'q>(questions: &'q [Question], text: &str) -> Option<&'q Question> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    questions.iter().find(|q| {
        let hay = q.text.trim().to_lowercase();
        !hay.is_empty() && (hay.contains(&needle) || needle.contains(&hay))
    })
}

pub fn match_by_id(questions: &[Question], id: i64) -> Option<&Question> {
    questions.iter().find(|q| q.id == id)
}

pub fn match_by_order(questions: &[Question], order: i64) -> Option<&Question> {
    questions.iter().find(|q| i64::from(q.order) == order)
}

pub fn match_by_position(questions: &[Question], position: usize) -> Option<&Question> {
    if questions.is_empty() {
        return None;
    }
    questions.get(position % questions.len())
}

/// Resolve one response against `questions`; `position` is its index in the batch
pub fn resolve<'q>(
    questions: &'q [Question],
    response: &GeneratedResponse,
    position: usize,
) -> Option<Resolution<'q>> {
    resolve_by_reference(questions, response).or_else(|| {
        match_by_position(questions, position).map(|question| Resolution {
            question,
            strategy: MatchStrategy::Position,
        })
    })
}

/// Strategies 1-3 only
fn resolve_by_reference<'q>(questions: &'q [Question], response: &GeneratedResponse) -> Option<Resolution<'q>> {
    let hit = |question: Option<&'q Question>, strategy| question.map(|question| Resolution { question, strategy });

    if let Some(text) = response.question_text.as_deref() {
        if let Some(r) = hit(match_by_text(questions, text), MatchStrategy::TextSimilarity) {
            return Some(r);
        }
    }

    if let Some(id) = response.question_id {
        if let Some(r) = hit(match_by_id(questions, id), MatchStrategy::DirectId) {
            return Some(r);
        }
        if let Some(r) = hit(match_by_order(questions, id), MatchStrategy::Order) {
            return Some(r);
        }
    }

    if let Some(order) = response.question_order {
        if let Some(r) = hit(match_by_order(questions, i64::from(order)), MatchStrategy::Order) {
            return Some(r);
        }
    }

    None
}

/// Resolves a whole batch, remembering which questions earlier responses took.
///
/// With `skip_claimed`, the positional fallback moves forward to the next
/// question nobody has claimed yet (wrapping around). Reference-based matches
/// are never redirected. Once every question is claimed the plain modulo
/// position is used again.
pub struct QuestionMatcher<'q> {
    questions: &'q [Question],
    skip_claimed: bool,
    claimed: HashSet<i64>,
}

impl<'q> QuestionMatcher<'q> {
    pub fn new(questions: &'q [Question], skip_claimed: bool) -> Self {
        Self {
            questions,
            skip_claimed,
            claimed: HashSet::new(),
        }
    }

    pub fn resolve_next(&mut self, response: &GeneratedResponse, position: usize) -> Option<Resolution<'q>> {
        let resolution = match resolve_by_reference(self.questions, response) {
            Some(r) => Some(r),
            None if self.skip_claimed => self.first_unclaimed_from(position).map(|question| Resolution {
                question,
                strategy: MatchStrategy::Position,
            }),
            None => resolve(self.questions, response, position),
        }?;

        if !self.claimed.insert(resolution.question.id) {
            tracing::debug!(
                "Question {} matched more than once (via {})",
                resolution.question.id,
                resolution.strategy
            );
        }
        Some(resolution)
    }

    fn first_unclaimed_from(&self, position: usize) -> Option<&'q Question> {
        let questions = self.questions;
        let n = questions.len();
        if n == 0 {
            return None;
        }
        let start = position % n;
        (0..n)
            .map(|k| &questions[(start + k) % n])
            .find(|q| !self.claimed.contains(&q.id))
            .or(Some(&questions[start]))
    }
}

/// Resolve every response of a batch, in order
pub fn match_batch<'q>(
    questions: &'q [Question],
    responses: &[GeneratedResponse],
    skip_claimed: bool,
) -> Vec<Option<Resolution<'q>>> {
    let mut matcher = QuestionMatcher::new(questions, skip_claimed);
    responses
        .iter()
        .enumerate()
        .map(|(i, r)| matcher.resolve_next(r, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question { id: 10, order: 1, text: "Why now?".into(), kind: "TEXT".into() },
            Question { id: 11, order: 2, text: "Biggest challenge?".into(), kind: "TEXT".into() },
        ]
    }

    fn by_text(text: &str) -> GeneratedResponse {
        GeneratedResponse {
            question_text: Some(text.into()),
            response: "z".into(),
            ..Default::default()
        }
    }

    fn bare() -> GeneratedResponse {
        GeneratedResponse { response: "w".into(), ..Default::default() }
    }

    #[test]
    fn test_direct_id_match() {
        let q = questions();
        let r = resolve(&q, &GeneratedResponse::answer(10, "x"), 0).unwrap();
        assert_eq!(r.question.id, 10);
        assert_eq!(r.strategy, MatchStrategy::DirectId);
    }

    #[test]
    fn test_order_match_when_no_id_matches() {
        let q = questions();
        let r = resolve(&q, &GeneratedResponse::answer(2, "y"), 0).unwrap();
        assert_eq!(r.question.id, 11);
        assert_eq!(r.strategy, MatchStrategy::Order);
    }

    #[test]
    fn test_text_match_is_case_insensitive_substring() {
        let q = questions();
        let r = resolve(&q, &by_text("biggest challenge"), 0).unwrap();
        assert_eq!(r.question.id, 11);
        assert_eq!(r.strategy, MatchStrategy::TextSimilarity);

        // Containment works the other way round too
        let r = resolve(&q, &by_text("Q1: Why now? (explain)"), 1).unwrap();
        assert_eq!(r.question.id, 10);
    }

    #[test]
    fn test_positional_fallback_wraps() {
        let q = questions();
        let r = resolve(&q, &bare(), 5).unwrap();
        assert_eq!(r.question.id, 11);
        assert_eq!(r.strategy, MatchStrategy::Position);
    }

    #[test]
    fn test_text_wins_over_id() {
        let q = questions();
        let r = GeneratedResponse {
            question_id: Some(10),
            question_text: Some("Biggest challenge?".into()),
            response: "z".into(),
            ..Default::default()
        };
        assert_eq!(resolve(&q, &r, 0).unwrap().question.id, 11);
    }

    #[test]
    fn test_unmatched_text_falls_through_to_id() {
        let q = questions();
        let r = GeneratedResponse {
            question_id: Some(10),
            question_text: Some("Something unrelated".into()),
            response: "z".into(),
            ..Default::default()
        };
        let res = resolve(&q, &r, 1).unwrap();
        assert_eq!(res.question.id, 10);
        assert_eq!(res.strategy, MatchStrategy::DirectId);
    }

    #[test]
    fn test_empty_text_never_matches() {
        assert!(match_by_text(&questions(), "   ").is_none());
    }

    #[test]
    fn test_empty_questions_resolve_to_none() {
        assert!(resolve(&[], &bare(), 3).is_none());
        assert!(match_batch(&[], &[bare()], true)[0].is_none());
    }

    #[test]
    fn test_batch_without_claim_tracking_can_collide() {
        let q = questions();
        // Response 0 takes question 11 by id; response 1 falls back to position 1 -> 11 again
        let responses = vec![GeneratedResponse::answer(11, "a"), bare()];
        let matched = match_batch(&q, &responses, false);
        assert_eq!(matched[0].unwrap().question.id, 11);
        assert_eq!(matched[1].unwrap().question.id, 11);
    }

    #[test]
    fn test_batch_with_claim_tracking_skips_taken_questions() {
        let q = questions();
        let responses = vec![GeneratedResponse::answer(11, "a"), bare()];
        let matched = match_batch(&q, &responses, true);
        assert_eq!(matched[0].unwrap().question.id, 11);
        let second = matched[1].unwrap();
        assert_eq!(second.question.id, 10);
        assert_eq!(second.strategy, MatchStrategy::Position);
    }

    #[test]
    fn test_claim_tracking_reuses_when_exhausted() {
        let q = questions();
        let responses = vec![bare(), bare(), bare()];
        let ids: Vec<i64> = match_batch(&q, &responses, true)
            .into_iter()
            .map(|m| m.unwrap().question.id)
            .collect();
        assert_eq!(ids, vec![10, 11, 10]);
    }
}
