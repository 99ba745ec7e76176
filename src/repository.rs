//! Storage seams: catalog lookups and participation writes
//!
//! [`ProgramRepository`] is read-only, [`SessionStore`] is create-only.
//! [`SqliteStore`] implements both over one connection.

use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Read-only catalog lookups
pub trait ProgramRepository {
    fn program(&self, id: i64) -> Result<Option<Program>>;
    fn list_programs(&self) -> Result<Vec<Program>>;
    fn fund(&self, id: i64) -> Result<Option<Fund>>;
    fn list_funds(&self) -> Result<Vec<Fund>>;
    /// Milestones ordered by position
    fn milestones(&self, program_id: i64) -> Result<Vec<Milestone>>;
    /// The program's application template, ordered by position
    fn application_questions(&self, program_id: i64) -> Result<Vec<Question>>;
    /// First survey of `kind` linked to the program, with its questions
    fn survey_for_program(&self, program_id: i64, kind: SurveyKind) -> Result<Option<Survey>>;
}

/// Session row to insert
#[derive(Debug, Clone)]
pub struct NewSession {
    pub status: String,
    pub program_id: i64,
    pub fund_id: i64,
    pub user_id: i64,
    pub outcome_data: serde_json::Value,
}

/// Which record a question response belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParent {
    Application(i64),
    SurveyResponse(i64),
}

/// Create-only participation writes
pub trait SessionStore {
    fn create_user(&self, profile: &BeneficiaryProfile) -> Result<i64>;
    fn create_session(&self, session: &NewSession) -> Result<i64>;
    fn create_application(&self, session_id: i64, user_id: i64, responses: &serde_json::Value) -> Result<i64>;
    fn create_survey_response(
        &self,
        survey_id: i64,
        session_id: i64,
        user_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<i64>;
    fn create_question_response(&self, parent: ResponseParent, question_id: i64, answer: &str) -> Result<i64>;
    fn create_milestone_reflection(
        &self,
        milestone_id: i64,
        session_id: i64,
        user_id: i64,
        content: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<i64>;
    fn create_rating(&self, session_id: i64, user_id: i64, score: u8) -> Result<i64>;
    fn create_review(&self, session_id: i64, user_id: i64, content: &str) -> Result<i64>;
    fn count_sessions(&self) -> Result<usize>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn questions_where(&self, sql: &str, id: i64) -> Result<Vec<Question>> {
        let mut stmt = self.conn.prepare(sql)?;
        let questions = stmt
            .query_map([id], |row| {
                Ok(Question {
                    id: row.get(0)?,
                    order: row.get(1)?,
                    text: row.get(2)?,
                    kind: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(questions)
    }
}

fn program_from_row(row: &rusqlite::Row) -> rusqlite::Result<Program> {
    Ok(Program {
        id: row.get(0)?,
        fund_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

fn fund_from_row(row: &rusqlite::Row) -> rusqlite::Result<Fund> {
    Ok(Fund {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        total_amount: row.get(3)?,
    })
}

impl ProgramRepository for SqliteStore {
    fn program(&self, id: i64) -> Result<Option<Program>> {
        let program = self
            .conn
            .query_row(
                "SELECT id, fund_id, name, description FROM programs WHERE id = ?1",
                [id],
                program_from_row,
            )
            .optional()?;
        Ok(program)
    }

    fn list_programs(&self) -> Result<Vec<Program>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fund_id, name, description FROM programs ORDER BY id")?;
        let programs = stmt
            .query_map([], program_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(programs)
    }

    fn fund(&self, id: i64) -> Result<Option<Fund>> {
        let fund = self
            .conn
            .query_row(
                "SELECT id, name, description, total_amount FROM funds WHERE id = ?1",
                [id],
                fund_from_row,
            )
            .optional()?;
        Ok(fund)
    }

    fn list_funds(&self) -> Result<Vec<Fund>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, total_amount FROM funds ORDER BY id")?;
        let funds = stmt
            .query_map([], fund_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(funds)
    }

    fn milestones(&self, program_id: i64) -> Result<Vec<Milestone>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, program_id, title, description, reflection_prompt, payment_amount, position
            FROM milestones
            WHERE program_id = ?1
            ORDER BY position, id
            "#,
        )?;
        let milestones = stmt
            .query_map([program_id], |row| {
                Ok(Milestone {
                    id: row.get(0)?,
                    program_id: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    reflection_prompt: row.get(4)?,
                    payment_amount: row.get(5)?,
                    order: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(milestones)
    }

    fn application_questions(&self, program_id: i64) -> Result<Vec<Question>> {
        self.questions_where(
            r#"
            SELECT id, position, text, kind
            FROM questions
            WHERE program_id = ?1 AND context = 'APPLICATION'
            ORDER BY position, id
            "#,
            program_id,
        )
    }

    fn survey_for_program(&self, program_id: i64, kind: SurveyKind) -> Result<Option<Survey>> {
        let header = self
            .conn
            .query_row(
                r#"
                SELECT s.id, s.title
                FROM surveys s
                JOIN program_surveys ps ON ps.survey_id = s.id
                WHERE ps.program_id = ?1 AND s.kind = ?2
                ORDER BY s.id
                LIMIT 1
                "#,
                params![program_id, kind.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((id, title)) = header else {
            return Ok(None);
        };

        let questions = self.questions_where(
            r#"
            SELECT id, position, text, kind
            FROM questions
            WHERE survey_id = ?1 AND context = 'SURVEY'
            ORDER BY position, id
            "#,
            id,
        )?;

        Ok(Some(Survey {
            id,
            title,
            kind,
            questions,
        }))
    }
}

impl SessionStore for SqliteStore {
    fn create_user(&self, profile: &BeneficiaryProfile) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO users (name, age, job_title, years_in_job, income, marital_status,
                               number_of_children, current_challenges, hopeful_outcomes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                profile.name,
                profile.age,
                profile.job_title,
                profile.years_in_job,
                profile.income as i64,
                profile.marital_status.as_str(),
                profile.number_of_children,
                serde_json::to_string(&profile.current_challenges)?,
                serde_json::to_string(&profile.hopeful_outcomes)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_session(&self, session: &NewSession) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (status, program_id, fund_id, user_id, outcome_data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.status,
                session.program_id,
                session.fund_id,
                session.user_id,
                session.outcome_data.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_application(&self, session_id: i64, user_id: i64, responses: &serde_json::Value) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO applications (session_id, user_id, responses, status)
             VALUES (?1, ?2, ?3, 'approved')",
            params![session_id, user_id, responses.to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_survey_response(
        &self,
        survey_id: i64,
        session_id: i64,
        user_id: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO survey_responses (survey_id, session_id, user_id, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![survey_id, session_id, user_id, completed_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_question_response(&self, parent: ResponseParent, question_id: i64, answer: &str) -> Result<i64> {
        let (application_id, survey_response_id) = match parent {
            ResponseParent::Application(id) => (Some(id), None),
            ResponseParent::SurveyResponse(id) => (None, Some(id)),
        };
        self.conn.execute(
            "INSERT INTO question_responses (question_id, application_id, survey_response_id, answer)
             VALUES (?1, ?2, ?3, ?4)",
            params![question_id, application_id, survey_response_id, answer],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_milestone_reflection(
        &self,
        milestone_id: i64,
        session_id: i64,
        user_id: i64,
        content: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO milestone_reflections (milestone_id, session_id, user_id, content, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![milestone_id, session_id, user_id, content, completed_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_rating(&self, session_id: i64, user_id: i64, score: u8) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ratings (session_id, user_id, score) VALUES (?1, ?2, ?3)",
            params![session_id, user_id, score],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_review(&self, session_id: i64, user_id: i64, content: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO reviews (session_id, user_id, content) VALUES (?1, ?2, ?3)",
            params![session_id, user_id, content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn count_sessions(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::db::init_memory_db;

    /// Two-program catalog used across pipeline tests.
    ///
    /// Program 1 (fund 1) has milestones 1-2, application questions 10-11,
    /// pre survey 1 (questions 20-21) and post survey 2 (questions 30-31).
    /// Program 2 (no fund) has nothing attached.
    pub fn seeded_store() -> SqliteStore {
        let conn = init_memory_db().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO funds (id, name, description, total_amount) VALUES (1, 'LeaderCare', 'Care for leaders', 2500000);
            INSERT INTO programs (id, fund_id, name, description)
                VALUES (1, 1, 'Care & Coaching', 'Coaching for pastors and church leaders');
            INSERT INTO programs (id, fund_id, name, description) VALUES (2, NULL, 'Empty Program', '');
            INSERT INTO milestones (id, program_id, title, reflection_prompt, payment_amount, position)
                VALUES (1, 1, 'First Session', 'How was it?', 150, 1),
                       (2, 1, 'Second Session', 'Progress?', 150, 2);
            INSERT INTO questions (id, program_id, context, position, text, kind)
                VALUES (10, 1, 'APPLICATION', 1, 'Why now?', 'long_text'),
                       (11, 1, 'APPLICATION', 2, 'Biggest challenge?', 'long_text');
            INSERT INTO surveys (id, title, kind) VALUES (1, 'Flourishing Pre', 'PRE'), (2, 'Flourishing Post', 'POST');
            INSERT INTO program_surveys (program_id, survey_id) VALUES (1, 1), (1, 2);
            INSERT INTO questions (id, survey_id, context, position, text, kind)
                VALUES (20, 1, 'SURVEY', 1, 'I feel rested', 'LIKERT'),
                       (21, 1, 'SURVEY', 2, 'What worries you most?', 'TEXT'),
                       (30, 2, 'SURVEY', 1, 'Rate your overall wellbeing', 'LIKERT'),
                       (31, 2, 'SURVEY', 2, 'What changed for you?', 'TEXT');
            "#,
        )
        .unwrap();
        SqliteStore::new(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::seeded_store;
    use super::*;

    #[test]
    fn test_catalog_lookups() {
        let store = seeded_store();

        let program = store.program(1).unwrap().unwrap();
        assert_eq!(program.fund_id, Some(1));
        assert!(store.program(99).unwrap().is_none());

        let milestones = store.milestones(1).unwrap();
        assert_eq!(milestones.iter().map(|m| m.order).collect::<Vec<_>>(), vec![1, 2]);

        let questions = store.application_questions(1).unwrap();
        assert_eq!(questions[1].text, "Biggest challenge?");

        let post = store.survey_for_program(1, SurveyKind::Post).unwrap().unwrap();
        assert_eq!(post.id, 2);
        assert_eq!(post.questions.len(), 2);
        assert!(store.survey_for_program(2, SurveyKind::Pre).unwrap().is_none());
    }

    #[test]
    fn test_user_round_trips_profile_fields() {
        let store = seeded_store();
        let profile = crate::profile::fallback_profile();
        let user_id = store.create_user(&profile).unwrap();

        let (name, challenges): (String, String) = store
            .conn()
            .query_row(
                "SELECT name, current_challenges FROM users WHERE id = ?1",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "John Smith");
        let challenges: Vec<String> = serde_json::from_str(&challenges).unwrap();
        assert_eq!(challenges.len(), 3);
    }
}
