//! Import program catalogs into the impact database
//!
//! Usage: cargo run --bin seed -- data/catalog.json [more.json | dir ...]

use anyhow::{Context, Result};
use clap::Parser;
use impact_synth::catalog::{import_path, ImportCounts};
use impact_synth::config::SynthConfig;
use impact_synth::db::init_db;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seed", about = "Import fund/program catalogs (JSON files or directories of them)")]
struct Args {
    /// Catalog files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Database file (defaults to SYNTH_DB_PATH or the data directory)
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SynthConfig::from_env()?;
    let db_path = args.db.unwrap_or(config.db_path);
    println!("Opening database at {:?}", db_path);

    let mut conn = init_db(&db_path)?;
    let mut total = ImportCounts::default();

    for path in &args.paths {
        if !path.exists() {
            eprintln!("Warning: {:?} does not exist, skipping", path);
            continue;
        }
        println!("\nProcessing: {:?}", path);
        let counts = import_path(&mut conn, path).with_context(|| format!("Failed to import {:?}", path))?;
        println!("  ✓ {} funds, {} programs", counts.funds, counts.programs);
        total.add(counts);
    }

    println!("\n========================================");
    println!("Import complete!");
    println!("  Funds: {}", total.funds);
    println!("  Programs: {}", total.programs);
    println!("  Milestones: {}", total.milestones);
    println!("  Surveys: {}", total.surveys);
    println!("  Questions: {}", total.questions);
    println!("========================================");

    Ok(())
}
