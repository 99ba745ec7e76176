//! impact-synth - synthetic participation data for the Impact Fund Dashboard
//!
//! Generates believable beneficiary journeys through funded programs: a
//! profile, an application, pre- and post-surveys, milestone reflections and
//! a closing review, all steered by one outcome label per session, and writes
//! them into the dashboard's schema.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use impact_synth::{batch, config::SynthConfig, db, llm::OpenAiClient, repository::SqliteStore};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = SynthConfig::from_env()?;
//! let store = SqliteStore::new(db::init_db(&config.db_path)?);
//! let llm = OpenAiClient::new(&config)?;
//!
//! let options = batch::BatchOptions { count: 10, ..Default::default() };
//! let summary = batch::run_batch(&store, &llm, &options, &AtomicBool::new(false)).await?;
//! println!("{} sessions written", summary.succeeded());
//! ```
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────────────┐   ┌────────────────┐
//! │ Outcome      │──▶│ Profile      │──▶│ Assembler           │──▶│ Persistence    │
//! │ 70/20/10     │   │ (or fallback)│   │  application        │   │  user, session │
//! └──────────────┘   └──────────────┘   │  pre-survey         │   │  matched       │
//!                                       │  reflections        │   │  answers,      │
//!                                       │  post-survey        │   │  rating/review │
//!                                       │  review             │   └────────────────┘
//!                                       └─────────────────────┘
//! ```

pub mod assembler;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod generate;
pub mod llm;
pub mod matcher;
pub mod outcome;
pub mod persist;
pub mod profile;
pub mod repository;
pub mod types;

pub use batch::{run_batch, BatchOptions, BatchSummary};
pub use config::{FallbackPolicy, SynthConfig};
pub use db::init_db;
pub use error::{Result, SynthError};
pub use outcome::OutcomeType;
pub use repository::SqliteStore;
pub use types::*;
