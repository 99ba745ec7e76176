//! Runtime configuration, read from the environment (and `.env`)

use crate::error::{Result, SynthError};
use std::path::PathBuf;
use std::str::FromStr;

/// What a content generator returns when the model call or parse fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Empty section (or no review); callers can tell "no data" apart
    #[default]
    Empty,
    /// Fixed outcome-keyed content
    Canned,
}

impl FromStr for FallbackPolicy {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" | "none" => Ok(FallbackPolicy::Empty),
            "canned" | "fixed" => Ok(FallbackPolicy::Canned),
            other => Err(SynthError::config(format!(
                "unknown fallback policy '{}', expected 'empty' or 'canned'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// OpenAI API key
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Model to use (default: gpt-4o-mini)
    pub model: String,

    pub temperature: f32,

    pub timeout_ms: u64,

    pub fallback: FallbackPolicy,

    /// Positional matches skip questions already claimed in the same batch
    pub skip_claimed_questions: bool,

    pub db_path: PathBuf,

    /// Where `synthetic-session-user-<id>.json` files go
    pub output_dir: PathBuf,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_ms: 120_000,
            fallback: FallbackPolicy::Empty,
            skip_claimed_questions: true,
            db_path: default_db_path(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl SynthConfig {
    /// Load `.env` (if present) and overlay environment variables on the defaults
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine; variables may come from the shell
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api_key = key;
        }
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("SYNTH_MODEL") {
            config.model = model;
        }
        if let Some(t) = parse_var::<f32>("SYNTH_TEMPERATURE")? {
            config.temperature = t;
        }
        if let Some(ms) = parse_var::<u64>("SYNTH_TIMEOUT_MS")? {
            config.timeout_ms = ms;
        }
        if let Ok(policy) = std::env::var("SYNTH_FALLBACK") {
            config.fallback = policy.parse()?;
        }
        if let Some(skip) = parse_var::<bool>("SYNTH_MATCH_SKIP_CLAIMED")? {
            config.skip_claimed_questions = skip;
        }
        if let Ok(path) = std::env::var("SYNTH_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("SYNTH_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Generation needs an API key; replay and listing do not
    pub fn require_api_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(SynthError::config(
                "OPENAI_API_KEY not set. Session generation requires API access.",
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SynthError::config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

fn default_db_path() -> PathBuf {
    // XDG data dir on Linux, ~/Library/Application Support on macOS
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("impact-synth")
        .join("impact.db")
}
