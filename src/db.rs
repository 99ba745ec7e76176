//! Database layer for the impact dashboard schema
//!
//! SQLite, single file. The program catalog (funds, programs, milestones,
//! surveys, questions) and generated participation data (users, sessions and
//! everything hanging off a session) share one database.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (creating if needed) the database and apply the schema
pub fn init_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;

    apply_schema(&conn)?;

    Ok(conn)
}

/// In-memory database with the schema applied
pub fn init_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    apply_schema(&conn)?;
    Ok(conn)
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA).context("Failed to apply schema")?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Catalog
CREATE TABLE IF NOT EXISTS funds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    total_amount REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS programs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fund_id INTEGER REFERENCES funds(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS milestones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id INTEGER NOT NULL REFERENCES programs(id),
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    reflection_prompt TEXT,
    payment_amount REAL NOT NULL DEFAULT 0,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_milestones_program ON milestones(program_id);

CREATE TABLE IF NOT EXISTS surveys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('PRE', 'POST'))
);

-- Surveys are shared between programs
CREATE TABLE IF NOT EXISTS program_surveys (
    program_id INTEGER NOT NULL REFERENCES programs(id),
    survey_id INTEGER NOT NULL REFERENCES surveys(id),
    PRIMARY KEY (program_id, survey_id)
);

-- Survey questions have survey_id set; application questions have program_id set
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_id INTEGER REFERENCES surveys(id),
    program_id INTEGER REFERENCES programs(id),
    context TEXT NOT NULL CHECK (context IN ('SURVEY', 'APPLICATION')),
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'TEXT'
);

CREATE INDEX IF NOT EXISTS idx_questions_survey ON questions(survey_id);
CREATE INDEX IF NOT EXISTS idx_questions_program ON questions(program_id, context);

-- Participation
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER,
    job_title TEXT,
    years_in_job INTEGER,
    income INTEGER,
    marital_status TEXT,
    number_of_children INTEGER,
    current_challenges TEXT NOT NULL DEFAULT '[]',  -- JSON array
    hopeful_outcomes TEXT NOT NULL DEFAULT '[]',    -- JSON array
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL,
    program_id INTEGER NOT NULL REFERENCES programs(id),
    fund_id INTEGER NOT NULL REFERENCES funds(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    outcome_data TEXT,          -- JSON blob
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_sessions_program ON sessions(program_id);

CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    responses TEXT NOT NULL,    -- raw generated responses, JSON
    status TEXT NOT NULL DEFAULT 'approved',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS survey_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_id INTEGER NOT NULL REFERENCES surveys(id),
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    completed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS question_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL REFERENCES questions(id),
    application_id INTEGER REFERENCES applications(id),
    survey_response_id INTEGER REFERENCES survey_responses(id),
    answer TEXT NOT NULL,
    CHECK ((application_id IS NULL) <> (survey_response_id IS NULL))
);

CREATE TABLE IF NOT EXISTS milestone_reflections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    milestone_id INTEGER NOT NULL REFERENCES milestones(id),
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    content TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    UNIQUE(session_id, milestone_id)
);

CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5)
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    content TEXT NOT NULL
);
"#;
