//! Program catalog import
//!
//! A catalog file describes funds and the programs they finance, with each
//! program's milestones, application template and PRE/POST surveys:
//!
//! ```json
//! {
//!   "funds": [{
//!     "name": "LeaderCare",
//!     "totalAmount": 2500000,
//!     "programs": [{
//!       "name": "Care & Coaching",
//!       "description": "...",
//!       "milestones": [{ "title": "First Session", "reflectionPrompt": "...", "paymentAmount": 150 }],
//!       "applicationQuestions": ["Why now?", { "text": "Monthly income", "type": "NUMBER" }],
//!       "surveys": [{ "title": "Flourishing Pre", "kind": "PRE", "questions": [...] }]
//!     }]
//!   }]
//! }
//! ```
//!
//! Ids are assigned by the database; order comes from position in the file.

use crate::types::{QuestionContext, SurveyKind};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub funds: Vec<CatalogFund>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFund {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub programs: Vec<CatalogProgram>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProgram {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub milestones: Vec<CatalogMilestone>,
    #[serde(default)]
    pub application_questions: Vec<CatalogQuestion>,
    #[serde(default)]
    pub surveys: Vec<CatalogSurvey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMilestone {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub reflection_prompt: Option<String>,
    #[serde(default)]
    pub payment_amount: f64,
}

/// A question is either bare text or an object with a type
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogQuestion {
    Text(String),
    Typed {
        text: String,
        #[serde(rename = "type", default = "default_question_type")]
        kind: String,
    },
}

fn default_question_type() -> String {
    "TEXT".to_string()
}

impl CatalogQuestion {
    fn parts(&self) -> (&str, &str) {
        match self {
            CatalogQuestion::Text(text) => (text, "TEXT"),
            CatalogQuestion::Typed { text, kind } => (text, kind),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogSurvey {
    pub title: String,
    pub kind: SurveyKind,
    #[serde(default)]
    pub questions: Vec<CatalogQuestion>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportCounts {
    pub funds: usize,
    pub programs: usize,
    pub milestones: usize,
    pub surveys: usize,
    pub questions: usize,
}

impl ImportCounts {
    pub fn add(&mut self, other: ImportCounts) {
        self.funds += other.funds;
        self.programs += other.programs;
        self.milestones += other.milestones;
        self.surveys += other.surveys;
        self.questions += other.questions;
    }
}

/// Import one catalog inside a single transaction
pub fn import_catalog(conn: &mut Connection, catalog: &CatalogFile) -> Result<ImportCounts> {
    let tx = conn.transaction()?;
    let mut counts = ImportCounts::default();

    for fund in &catalog.funds {
        tx.execute(
            "INSERT INTO funds (name, description, total_amount) VALUES (?1, ?2, ?3)",
            params![fund.name, fund.description, fund.total_amount],
        )?;
        let fund_id = tx.last_insert_rowid();
        counts.funds += 1;

        for program in &fund.programs {
            tx.execute(
                "INSERT INTO programs (fund_id, name, description) VALUES (?1, ?2, ?3)",
                params![fund_id, program.name, program.description],
            )?;
            let program_id = tx.last_insert_rowid();
            counts.programs += 1;

            for (i, m) in program.milestones.iter().enumerate() {
                tx.execute(
                    "INSERT INTO milestones (program_id, title, description, reflection_prompt, payment_amount, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![program_id, m.title, m.description, m.reflection_prompt, m.payment_amount, i as i64 + 1],
                )?;
                counts.milestones += 1;
            }

            for (i, q) in program.application_questions.iter().enumerate() {
                let (text, kind) = q.parts();
                tx.execute(
                    "INSERT INTO questions (program_id, context, position, text, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![program_id, QuestionContext::Application.as_str(), i as i64 + 1, text, kind],
                )?;
                counts.questions += 1;
            }

            for survey in &program.surveys {
                tx.execute(
                    "INSERT INTO surveys (title, kind) VALUES (?1, ?2)",
                    params![survey.title, survey.kind.as_str()],
                )?;
                let survey_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO program_surveys (program_id, survey_id) VALUES (?1, ?2)",
                    params![program_id, survey_id],
                )?;
                counts.surveys += 1;

                for (i, q) in survey.questions.iter().enumerate() {
                    let (text, kind) = q.parts();
                    tx.execute(
                        "INSERT INTO questions (survey_id, context, position, text, kind) VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![survey_id, QuestionContext::Survey.as_str(), i as i64 + 1, text, kind],
                    )?;
                    counts.questions += 1;
                }
            }
        }
    }

    tx.commit()?;
    Ok(counts)
}

pub fn import_file(conn: &mut Connection, path: &Path) -> Result<ImportCounts> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let catalog: CatalogFile =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse catalog {:?}", path))?;
    import_catalog(conn, &catalog)
}

/// Import a catalog file, or every `*.json` under a directory.
///
/// A file that fails to import is reported and skipped; the others still land.
pub fn import_path(conn: &mut Connection, path: &Path) -> Result<ImportCounts> {
    if path.is_file() {
        return import_file(conn, path);
    }

    let mut total = ImportCounts::default();
    for entry in walkdir::WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "json"))
    {
        match import_file(conn, entry.path()) {
            Ok(counts) => {
                tracing::info!("Imported {:?}: {} programs", entry.path(), counts.programs);
                total.add(counts);
            }
            Err(e) => tracing::warn!("Skipping {:?}: {:#}", entry.path(), e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;
    use crate::repository::{ProgramRepository, SqliteStore};

    const CATALOG: &str = r#"{
      "funds": [{
        "name": "LeaderCare",
        "totalAmount": 2500000,
        "programs": [{
          "name": "Care & Coaching",
          "description": "Coaching for leaders",
          "milestones": [
            { "title": "First Session", "reflectionPrompt": "How was it?", "paymentAmount": 150 },
            { "title": "Second Session", "paymentAmount": 150 }
          ],
          "applicationQuestions": ["Why now?", { "text": "Household income", "type": "NUMBER" }],
          "surveys": [
            { "title": "Flourishing Pre", "kind": "PRE", "questions": [{ "text": "I feel rested", "type": "LIKERT" }] },
            { "title": "Flourishing Post", "kind": "POST", "questions": ["What changed for you?"] }
          ]
        }]
      }]
    }"#;

    #[test]
    fn test_import_catalog_is_readable_through_repository() {
        let mut conn = init_memory_db().unwrap();
        let catalog: CatalogFile = serde_json::from_str(CATALOG).unwrap();
        let counts = import_catalog(&mut conn, &catalog).unwrap();
        assert_eq!(
            counts,
            ImportCounts { funds: 1, programs: 1, milestones: 2, surveys: 2, questions: 4 }
        );

        let store = SqliteStore::new(conn);
        let program = &store.list_programs().unwrap()[0];
        assert_eq!(program.fund_id, Some(1));

        let questions = store.application_questions(program.id).unwrap();
        assert_eq!(questions[1].kind, "NUMBER");
        assert_eq!(questions[1].order, 2);

        let pre = store.survey_for_program(program.id, SurveyKind::Pre).unwrap().unwrap();
        assert!(pre.questions[0].is_rating());
        let milestones = store.milestones(program.id).unwrap();
        assert_eq!(milestones[1].reflection_prompt, None);
    }

    #[test]
    fn test_bundled_catalog_imports() {
        let mut conn = init_memory_db().unwrap();
        let catalog: CatalogFile = serde_json::from_str(include_str!("../data/catalog.json")).unwrap();
        let counts = import_catalog(&mut conn, &catalog).unwrap();
        assert_eq!(counts.programs, 2);
        assert_eq!(counts.surveys, 2);
    }

    #[test]
    fn test_import_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), CATALOG).unwrap();
        std::fs::write(dir.path().join("b.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut conn = init_memory_db().unwrap();
        let counts = import_path(&mut conn, dir.path()).unwrap();
        assert_eq!(counts.programs, 1);
    }
}
