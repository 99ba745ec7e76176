//! Batch orchestration
//!
//! Runs N generate-and-persist iterations in sequence. Explicit program and
//! fund ids are checked before anything is generated; after that, a failed
//! iteration is logged and counted and the loop moves on.

use crate::assembler::assemble_session;
use crate::config::FallbackPolicy;
use crate::error::{Result, SynthError};
use crate::generate::ContentGenerator;
use crate::llm::TextGenerator;
use crate::outcome::{OutcomeTally, OutcomeType};
use crate::persist::{PersistenceWriter, WriteReport};
use crate::profile::synthesize_profile;
use crate::repository::{ProgramRepository, SessionStore};
use crate::types::{Fund, Program, SessionBundle};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub count: u32,
    pub program_id: Option<i64>,
    pub fund_id: Option<i64>,
    /// Write each bundle to `synthetic-session-user-<id>.json`
    pub save_json: bool,
    pub output_dir: PathBuf,
    pub fallback: FallbackPolicy,
    pub skip_claimed_questions: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            count: 1,
            program_id: None,
            fund_id: None,
            save_json: false,
            output_dir: PathBuf::from("."),
            fallback: FallbackPolicy::default(),
            skip_claimed_questions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IterationResult {
    Written {
        index: u32,
        program_id: i64,
        fund_id: i64,
        user_id: i64,
        session_id: i64,
        outcome: OutcomeType,
        warnings: Vec<String>,
        dump_file: Option<PathBuf>,
    },
    Failed {
        index: u32,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: String,
    pub requested: u32,
    pub iterations: Vec<IterationResult>,
    pub outcomes: OutcomeTally,
    /// The loop stopped early on a cancel request
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.iterations
            .iter()
            .filter(|r| matches!(r, IterationResult::Written { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.iterations.len() - self.succeeded()
    }
}

/// Catalog snapshot the iterations pick from
struct Selection {
    program: Option<Program>,
    fund: Option<Fund>,
    programs: Vec<Program>,
    funds: Vec<Fund>,
}

impl Selection {
    fn load<S: ProgramRepository>(store: &S, options: &BatchOptions) -> Result<Self> {
        let program = match options.program_id {
            Some(id) => Some(store.program(id)?.ok_or_else(|| SynthError::not_found("Program", id))?),
            None => None,
        };
        let fund = match options.fund_id {
            Some(id) => Some(store.fund(id)?.ok_or_else(|| SynthError::not_found("Fund", id))?),
            None => None,
        };

        let programs = if program.is_some() { Vec::new() } else { store.list_programs()? };
        if program.is_none() && programs.is_empty() {
            return Err(SynthError::config("the catalog has no programs; seed one first"));
        }
        let funds = if fund.is_some() { Vec::new() } else { store.list_funds()? };

        Ok(Self {
            program,
            fund,
            programs,
            funds,
        })
    }

    fn pick_program(&self) -> Result<Program> {
        if let Some(program) = &self.program {
            return Ok(program.clone());
        }
        self.programs
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| SynthError::config("no programs to choose from"))
    }

    /// Explicit fund, else the program's own fund, else a random one
    fn pick_fund(&self, program: &Program) -> Result<i64> {
        if let Some(fund) = &self.fund {
            return Ok(fund.id);
        }
        if let Some(id) = program.fund_id {
            return Ok(id);
        }
        self.funds
            .choose(&mut rand::thread_rng())
            .map(|f| f.id)
            .ok_or_else(|| SynthError::config(format!("program {} has no fund and the catalog has none", program.id)))
    }
}

/// Generate and persist `options.count` synthetic sessions.
///
/// Fails before generating anything if an explicit program or fund does not
/// exist. `cancel` is checked between iterations.
pub async fn run_batch<S>(
    store: &S,
    llm: &dyn TextGenerator,
    options: &BatchOptions,
    cancel: &AtomicBool,
) -> Result<BatchSummary>
where
    S: ProgramRepository + SessionStore,
{
    let selection = Selection::load(store, options)?;
    let batch_id = uuid::Uuid::new_v4().to_string();
    let gen = ContentGenerator::new(llm, options.fallback);
    let writer = PersistenceWriter::new(store, options.skip_claimed_questions);

    if options.save_json {
        std::fs::create_dir_all(&options.output_dir)?;
    }

    tracing::info!("Starting batch {}: generating {} synthetic sessions", batch_id, options.count);

    let mut summary = BatchSummary {
        batch_id: batch_id.clone(),
        requested: options.count,
        iterations: Vec::new(),
        outcomes: OutcomeTally::default(),
        cancelled: false,
    };

    for index in 1..=options.count {
        if cancel.load(Ordering::SeqCst) {
            tracing::warn!("Batch {} cancelled after {} iterations", batch_id, index - 1);
            summary.cancelled = true;
            break;
        }
        tracing::info!("Generating session {}/{}", index, options.count);

        match run_iteration(store, llm, &gen, &writer, &selection, options, &batch_id, index).await {
            Ok(result) => {
                if let IterationResult::Written { outcome, .. } = &result {
                    summary.outcomes.record(*outcome);
                }
                summary.iterations.push(result);
            }
            Err(e) => {
                tracing::error!("Error generating session {}: {}", index, e);
                summary.iterations.push(IterationResult::Failed {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    let (pos, neu, neg) = summary.outcomes.shares();
    tracing::info!(
        "Batch {} finished: {} written, {} failed (positive {:.0}%, neutral {:.0}%, negative {:.0}%)",
        batch_id,
        summary.succeeded(),
        summary.failed(),
        pos * 100.0,
        neu * 100.0,
        neg * 100.0
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn run_iteration<S>(
    store: &S,
    llm: &dyn TextGenerator,
    gen: &ContentGenerator<'_>,
    writer: &PersistenceWriter<'_, S>,
    selection: &Selection,
    options: &BatchOptions,
    batch_id: &str,
    index: u32,
) -> Result<IterationResult>
where
    S: ProgramRepository + SessionStore,
{
    let program = selection.pick_program()?;
    let fund_id = selection.pick_fund(&program)?;

    let profile = synthesize_profile(llm, &program).await;
    let bundle = assemble_session(store, gen, profile, program.id, fund_id).await?;

    let user_id = writer.create_user(&bundle.beneficiary_profile)?;

    let dump_file = if options.save_json {
        match save_bundle(&options.output_dir, user_id, &bundle) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Could not save session JSON for user {}: {}", user_id, e);
                None
            }
        }
    } else {
        None
    };

    let report = writer.write_session(user_id, &bundle, batch_id)?;

    Ok(IterationResult::Written {
        index,
        program_id: program.id,
        fund_id,
        user_id,
        session_id: report.session_id,
        outcome: bundle.outcome_type,
        warnings: report.warnings,
        dump_file,
    })
}

pub fn dump_file_name(user_id: i64) -> String {
    format!("synthetic-session-user-{}.json", user_id)
}

/// Write `bundle` as pretty JSON into `dir`
pub fn save_bundle(dir: &Path, user_id: i64, bundle: &SessionBundle) -> Result<PathBuf> {
    let path = dir.join(dump_file_name(user_id));
    std::fs::write(&path, serde_json::to_string_pretty(bundle)?)?;
    tracing::info!("Saved session data to {}", path.display());
    Ok(path)
}

pub fn load_bundle(path: &Path) -> Result<SessionBundle> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persist a saved bundle again, optionally under another fund
pub fn replay_bundle<S>(
    store: &S,
    mut bundle: SessionBundle,
    fund_override: Option<i64>,
    skip_claimed_questions: bool,
) -> Result<WriteReport>
where
    S: ProgramRepository + SessionStore,
{
    if store.program(bundle.program_id)?.is_none() {
        return Err(SynthError::not_found("Program", bundle.program_id));
    }
    if let Some(fund_id) = fund_override {
        bundle.fund_id = fund_id;
    }
    if store.fund(bundle.fund_id)?.is_none() {
        return Err(SynthError::not_found("Fund", bundle.fund_id));
    }

    let batch_id = format!("replay-{}", uuid::Uuid::new_v4());
    PersistenceWriter::new(store, skip_claimed_questions).persist(&bundle, &batch_id)
}
