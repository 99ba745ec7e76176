//! impact-synth CLI
//!
//! Run with: cargo run -- generate 10
//! Seed a catalog first: cargo run --bin seed -- data/catalog.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use impact_synth::{
    batch::{self, BatchOptions, IterationResult},
    config::SynthConfig,
    db,
    llm::OpenAiClient,
    repository::{ProgramRepository, SqliteStore},
    types::SurveyKind,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "impact-synth", version, about = "Synthetic beneficiary sessions for the Impact Fund Dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and persist synthetic sessions
    Generate {
        /// Number of sessions
        #[arg(default_value_t = 1)]
        count: u32,
        /// Program to generate for (random per session when omitted)
        program_id: Option<i64>,
        /// Fund to attribute sessions to (defaults to the program's fund)
        fund_id: Option<i64>,
        /// "true" to save each bundle as synthetic-session-user-<id>.json
        save_json: Option<String>,
    },
    /// Persist a saved session bundle again
    Replay {
        file: PathBuf,
        /// Attribute the session to this fund instead
        fund_id: Option<i64>,
    },
    /// List programs and what each has for generation
    Programs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SynthConfig::from_env()?;

    match cli.command {
        Command::Generate {
            count,
            program_id,
            fund_id,
            save_json,
        } => {
            let options = BatchOptions {
                count,
                program_id,
                fund_id,
                save_json: save_json.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("true")),
                output_dir: config.output_dir.clone(),
                fallback: config.fallback,
                skip_claimed_questions: config.skip_claimed_questions,
            };
            run_generate(&config, &options).await
        }
        Command::Replay { file, fund_id } => run_replay(&config, &file, fund_id),
        Command::Programs => run_programs(&config),
    }
}

fn open_store(config: &SynthConfig) -> Result<SqliteStore> {
    let conn = db::init_db(&config.db_path)?;
    Ok(SqliteStore::new(conn))
}

async fn run_generate(config: &SynthConfig, options: &BatchOptions) -> Result<()> {
    let llm = OpenAiClient::new(config)?;
    let store = open_store(config)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; stopping after the current session");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let summary = batch::run_batch(&store, &llm, options, &cancel)
        .await
        .context("Batch could not start")?;

    println!("\n========================================");
    println!("Batch {}", summary.batch_id);
    for result in &summary.iterations {
        match result {
            IterationResult::Written {
                index,
                program_id,
                user_id,
                session_id,
                outcome,
                warnings,
                ..
            } => {
                println!(
                    "  ✓ #{:<3} session {} (user {}, program {}, {})",
                    index, session_id, user_id, program_id, outcome
                );
                for warning in warnings {
                    println!("        ! {}", warning);
                }
            }
            IterationResult::Failed { index, error } => println!("  ✗ #{:<3} {}", index, error),
        }
    }
    println!(
        "Written: {}  Failed: {}  (positive {}, neutral {}, negative {})",
        summary.succeeded(),
        summary.failed(),
        summary.outcomes.positive,
        summary.outcomes.neutral,
        summary.outcomes.negative
    );
    if summary.cancelled {
        println!("Cancelled before all {} sessions were generated", summary.requested);
    }
    println!("========================================");

    Ok(())
}

fn run_replay(config: &SynthConfig, file: &Path, fund_id: Option<i64>) -> Result<()> {
    let store = open_store(config)?;
    let bundle = batch::load_bundle(file).with_context(|| format!("Failed to load {:?}", file))?;
    let report = batch::replay_bundle(&store, bundle, fund_id, config.skip_claimed_questions)?;

    println!("Replayed {:?} as session {} (user {})", file, report.session_id, report.user_id);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_programs(config: &SynthConfig) -> Result<()> {
    let store = open_store(config)?;
    let programs = store.list_programs()?;
    if programs.is_empty() {
        println!("No programs found. Import a catalog with the seed binary.");
        return Ok(());
    }

    println!("{:<5} {:<36} {:>5} {:>10} {:>11} {:>4} {:>5}", "ID", "PROGRAM", "FUND", "MILESTONES", "APPLICATION", "PRE", "POST");
    for program in programs {
        let milestones = store.milestones(program.id)?.len();
        let questions = store.application_questions(program.id)?.len();
        let pre = store.survey_for_program(program.id, SurveyKind::Pre)?.is_some();
        let post = store.survey_for_program(program.id, SurveyKind::Post)?.is_some();
        let fund = program.fund_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());

        println!(
            "{:<5} {:<36} {:>5} {:>10} {:>11} {:>4} {:>5}",
            program.id,
            truncate(&program.name, 36),
            fund,
            milestones,
            questions,
            if pre { "yes" } else { "no" },
            if post { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{}...", cut)
    }
}
