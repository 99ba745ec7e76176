//! Persistence of session bundles
//!
//! Writes are sequential and not wrapped in a transaction: a section that
//! fails leaves whatever was written before it in place. The user and the
//! session row are required; everything after them is best effort.

use crate::error::{Result, SynthError};
use crate::matcher::{MatchStrategy, QuestionMatcher};
use crate::outcome::keyword_rating;
use crate::repository::{NewSession, ProgramRepository, ResponseParent, SessionStore};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Status every synthetic session is written with
pub const SESSION_STATUS: &str = "COMPLETED";

const DEFAULT_RATING: u8 = 4;

/// What one `write_session` call actually wrote
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    pub session_id: i64,
    pub user_id: i64,
    pub application_id: Option<i64>,
    pub survey_response_ids: Vec<i64>,
    pub question_responses: usize,
    pub unmatched_responses: usize,
    pub reflections: usize,
    pub duplicate_reflections: usize,
    pub rating: Option<u8>,
    pub review_id: Option<i64>,
    /// How each question response was matched
    pub strategies: BTreeMap<MatchStrategy, usize>,
    /// Sections that failed, with the error
    pub warnings: Vec<String>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct PersistenceWriter<'a, S> {
    store: &'a S,
    skip_claimed: bool,
}

impl<'a, S> PersistenceWriter<'a, S>
where
    S: SessionStore + ProgramRepository,
{
    pub fn new(store: &'a S, skip_claimed: bool) -> Self {
        Self { store, skip_claimed }
    }

    pub fn create_user(&self, profile: &BeneficiaryProfile) -> Result<i64> {
        let user_id = self.store.create_user(profile)?;
        tracing::info!("Created user {} ({})", user_id, profile.name);
        Ok(user_id)
    }

    /// Create the user, then write the session
    pub fn persist(&self, bundle: &SessionBundle, batch_id: &str) -> Result<WriteReport> {
        let user_id = self.create_user(&bundle.beneficiary_profile)?;
        self.write_session(user_id, bundle, batch_id)
    }

    /// Write the session row and every section of `bundle` for `user_id`
    pub fn write_session(&self, user_id: i64, bundle: &SessionBundle, batch_id: &str) -> Result<WriteReport> {
        let now = Utc::now();
        let profile = &bundle.beneficiary_profile;

        let outcome_data = serde_json::json!({
            "completedAt": (now - Duration::days(1)).to_rfc3339(),
            "beneficiaryProfile": profile,
            "beneficiaryName": profile.name,
            "outcomeType": bundle.outcome_type,
            "batchId": batch_id,
        });

        let session_id = self.store.create_session(&NewSession {
            status: SESSION_STATUS.to_string(),
            program_id: bundle.program_id,
            fund_id: bundle.fund_id,
            user_id,
            outcome_data,
        })?;
        tracing::info!(
            "Created session {} for user {} (program {}, fund {}, {})",
            session_id,
            user_id,
            bundle.program_id,
            bundle.fund_id,
            bundle.outcome_type
        );

        let mut report = WriteReport {
            session_id,
            user_id,
            ..Default::default()
        };

        let result = self.write_application(bundle, &mut report);
        note_section(&mut report, "application", result);
        let result = self.write_pre_survey(bundle, &mut report, now);
        note_section(&mut report, "pre-survey", result);
        let result = self.write_reflections(bundle, &mut report, now);
        note_section(&mut report, "milestone reflections", result);
        let result = self.write_post_survey(bundle, &mut report, now);
        note_section(&mut report, "post-survey", result);
        let result = self.write_review(bundle, &mut report);
        note_section(&mut report, "review", result);

        tracing::info!(
            "Session {} written: {} question responses, {} reflections, rating {:?}, {} warnings",
            session_id,
            report.question_responses,
            report.reflections,
            report.rating,
            report.warnings.len()
        );
        Ok(report)
    }

    fn write_application(&self, bundle: &SessionBundle, report: &mut WriteReport) -> Result<()> {
        if bundle.application_responses.is_empty() {
            return Ok(());
        }
        let raw = serde_json::to_value(&bundle.application_responses)?;
        let application_id = self.store.create_application(report.session_id, report.user_id, &raw)?;
        report.application_id = Some(application_id);

        let questions = self.store.application_questions(bundle.program_id)?;
        self.write_answers(
            ResponseParent::Application(application_id),
            &questions,
            &bundle.application_responses,
            report,
        )
    }

    fn write_pre_survey(&self, bundle: &SessionBundle, report: &mut WriteReport, now: DateTime<Utc>) -> Result<()> {
        self.write_survey(
            bundle,
            SurveyKind::Pre,
            bundle.pre_survey_id,
            &bundle.pre_survey_responses,
            now - Duration::days(30),
            report,
        )
    }

    fn write_post_survey(&self, bundle: &SessionBundle, report: &mut WriteReport, now: DateTime<Utc>) -> Result<()> {
        self.write_survey(
            bundle,
            SurveyKind::Post,
            bundle.post_survey_id,
            &bundle.post_survey_responses,
            now - Duration::days(1),
            report,
        )
    }

    fn write_survey(
        &self,
        bundle: &SessionBundle,
        kind: SurveyKind,
        survey_id: Option<i64>,
        responses: &[GeneratedResponse],
        completed_at: DateTime<Utc>,
        report: &mut WriteReport,
    ) -> Result<()> {
        if responses.is_empty() {
            return Ok(());
        }
        let survey = self
            .store
            .survey_for_program(bundle.program_id, kind)?
            .ok_or_else(|| SynthError::persistence(format!("program {} has no {} survey", bundle.program_id, kind.as_str())))?;
        if let Some(id) = survey_id {
            if id != survey.id {
                return Err(SynthError::persistence(format!(
                    "bundle names {} survey {}, program {} uses survey {}",
                    kind.as_str(),
                    id,
                    bundle.program_id,
                    survey.id
                )));
            }
        }

        let response_id = self
            .store
            .create_survey_response(survey.id, report.session_id, report.user_id, completed_at)?;
        report.survey_response_ids.push(response_id);

        self.write_answers(ResponseParent::SurveyResponse(response_id), &survey.questions, responses, report)
    }

    fn write_answers(
        &self,
        parent: ResponseParent,
        questions: &[Question],
        responses: &[GeneratedResponse],
        report: &mut WriteReport,
    ) -> Result<()> {
        let mut matcher = QuestionMatcher::new(questions, self.skip_claimed);
        for (position, response) in responses.iter().enumerate() {
            let Some(resolution) = matcher.resolve_next(response, position) else {
                tracing::warn!("No question to attach response {} to ({:?})", position, parent);
                report.unmatched_responses += 1;
                continue;
            };
            self.store
                .create_question_response(parent, resolution.question.id, &response.answer_text())?;
            report.question_responses += 1;
            *report.strategies.entry(resolution.strategy).or_default() += 1;
        }
        Ok(())
    }

    fn write_reflections(&self, bundle: &SessionBundle, report: &mut WriteReport, now: DateTime<Utc>) -> Result<()> {
        let completed_at = now - Duration::days(15);
        let mut seen = HashSet::new();
        for reflection in &bundle.milestone_reflections {
            if !seen.insert(reflection.milestone_id) {
                tracing::warn!(
                    "Skipping duplicate reflection for milestone {} in session {}",
                    reflection.milestone_id,
                    report.session_id
                );
                report.duplicate_reflections += 1;
                continue;
            }
            self.store.create_milestone_reflection(
                reflection.milestone_id,
                report.session_id,
                report.user_id,
                &reflection.reflection,
                completed_at,
            )?;
            report.reflections += 1;
        }
        Ok(())
    }

    fn write_review(&self, bundle: &SessionBundle, report: &mut WriteReport) -> Result<()> {
        let Some(review) = &bundle.review else {
            return Ok(());
        };
        let content = if review.full_review.is_empty() { &review.text } else { &review.full_review };

        let score = if (1..=5).contains(&review.rating) {
            review.rating
        } else {
            let score = keyword_rating(content).unwrap_or(DEFAULT_RATING);
            tracing::warn!("Review rating {} out of range, scored {} from its text", review.rating, score);
            score
        };

        self.store.create_rating(report.session_id, report.user_id, score)?;
        report.rating = Some(score);
        report.review_id = Some(self.store.create_review(report.session_id, report.user_id, content)?);
        Ok(())
    }
}

fn note_section(report: &mut WriteReport, name: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("Failed to write {} for session {}: {}", name, report.session_id, e);
        report.warnings.push(format!("{}: {}", name, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeType;
    use crate::profile::fallback_profile;
    use crate::repository::testing::seeded_store;
    use crate::repository::SqliteStore;

    fn bundle() -> SessionBundle {
        SessionBundle {
            beneficiary_profile: fallback_profile(),
            program_id: 1,
            fund_id: 1,
            outcome_type: OutcomeType::Positive,
            pre_survey_id: Some(1),
            post_survey_id: Some(2),
            application_responses: vec![
                GeneratedResponse::answer(10, "Tired."),
                GeneratedResponse::answer(2, "Isolation."),
            ],
            pre_survey_responses: vec![GeneratedResponse::answer(20, 2), GeneratedResponse::answer(21, "All of it.")],
            milestone_reflections: vec![
                GeneratedReflection { milestone_id: 1, reflection: "first".into() },
                GeneratedReflection { milestone_id: 1, reflection: "second".into() },
                GeneratedReflection { milestone_id: 2, reflection: "growing".into() },
            ],
            post_survey_responses: vec![GeneratedResponse::answer(30, 5), GeneratedResponse::answer(31, "A lot.")],
            review: Some(Review {
                rating: 5,
                text: "Great.".into(),
                full_review: "Excellent coaching.".into(),
                impact: "Rested.".into(),
            }),
        }
    }

    fn count(store: &SqliteStore, table: &str) -> i64 {
        store
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_full_bundle_is_written() {
        let store = seeded_store();
        let writer = PersistenceWriter::new(&store, true);
        let report = writer.persist(&bundle(), "batch-1").unwrap();

        assert!(report.is_clean(), "{:?}", report.warnings);
        assert_eq!(report.question_responses, 6);
        assert_eq!(report.survey_response_ids.len(), 2);
        assert_eq!(report.rating, Some(5));
        assert_eq!(report.strategies.get(&MatchStrategy::Order), Some(&1));
        assert_eq!(count(&store, "sessions"), 1);
        assert_eq!(count(&store, "question_responses"), 6);
        assert_eq!(count(&store, "reviews"), 1);

        let (status, blob): (String, String) = store
            .conn()
            .query_row("SELECT status, outcome_data FROM sessions", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(status, "COMPLETED");
        let blob: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(blob["outcomeType"], "positive");
        assert_eq!(blob["beneficiaryName"], "John Smith");
        assert_eq!(blob["batchId"], "batch-1");
    }

    #[test]
    fn test_duplicate_reflections_keep_first() {
        let store = seeded_store();
        let writer = PersistenceWriter::new(&store, true);
        let report = writer.persist(&bundle(), "batch-1").unwrap();

        assert_eq!(report.reflections, 2);
        assert_eq!(report.duplicate_reflections, 1);
        let content: String = store
            .conn()
            .query_row(
                "SELECT content FROM milestone_reflections WHERE milestone_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(content, "first");
    }

    #[test]
    fn test_out_of_range_rating_scored_from_text() {
        let store = seeded_store();
        let writer = PersistenceWriter::new(&store, true);
        let mut b = bundle();
        b.review = Some(Review {
            rating: 0,
            text: "Short".into(),
            full_review: String::new(),
            impact: String::new(),
        });
        let report = writer.persist(&b, "batch-1").unwrap();
        assert_eq!(report.rating, Some(DEFAULT_RATING));

        let content: String = store
            .conn()
            .query_row("SELECT content FROM reviews", [], |row| row.get(0))
            .unwrap();
        assert_eq!(content, "Short");
    }

    #[test]
    fn test_failed_section_does_not_stop_later_ones() {
        let store = seeded_store();
        let writer = PersistenceWriter::new(&store, true);
        let mut b = bundle();
        // Program 1's pre survey is 1; naming another survey fails that section only
        b.pre_survey_id = Some(2);
        let report = writer.persist(&b, "batch-1").unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("pre-survey"));
        assert_eq!(report.survey_response_ids.len(), 1);
        assert_eq!(report.reflections, 2);
        assert!(report.review_id.is_some());
    }

    #[tokio::test]
    async fn test_generated_survey_answers_keep_their_ids_when_wording_overlaps() {
        use crate::config::FallbackPolicy;
        use crate::generate::{survey::generate_post_survey_responses, ContentGenerator};
        use crate::llm::testing::ScriptedGenerator;
        use crate::repository::ProgramRepository;

        let store = seeded_store();
        store
            .conn()
            .execute_batch(
                "UPDATE questions SET text = 'I feel rested' WHERE id = 30;
                 UPDATE questions SET text = 'I feel rested at work' WHERE id = 31;",
            )
            .unwrap();
        let program = store.program(1).unwrap().unwrap();
        let survey = store.survey_for_program(1, SurveyKind::Post).unwrap().unwrap();

        let llm = ScriptedGenerator::new().reply(
            "post-survey",
            r#"{"responses": [{"questionId": 30, "response": 4}, {"questionId": 31, "response": 2}]}"#,
        );
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let mut b = bundle();
        b.post_survey_responses =
            generate_post_survey_responses(&gen, &b.beneficiary_profile, &program, &survey, OutcomeType::Positive)
                .await;

        let writer = PersistenceWriter::new(&store, true);
        let report = writer.persist(&b, "batch-1").unwrap();
        assert!(report.is_clean(), "{:?}", report.warnings);

        let post_id = report.survey_response_ids[1];
        let mut stmt = store
            .conn()
            .prepare("SELECT question_id, answer FROM question_responses WHERE survey_response_id = ?1 ORDER BY id")
            .unwrap();
        let rows: Vec<(i64, String)> = stmt
            .query_map([post_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![(30, "4".to_string()), (31, "2".to_string())]);
    }

    #[test]
    fn test_missing_fund_fails_session() {
        let store = seeded_store();
        let writer = PersistenceWriter::new(&store, true);
        let mut b = bundle();
        b.fund_id = 99;
        let err = writer.persist(&b, "batch-1").unwrap_err();
        assert!(matches!(err, SynthError::Persistence { .. }));
        assert_eq!(count(&store, "sessions"), 0);
        // The user was already created; nothing is rolled back
        assert_eq!(count(&store, "users"), 1);
    }
}
