//! Content generators
//!
//! Each generator embeds the profile and program context in a prompt, sets
//! the tone from the session's outcome, and parses the JSON it gets back.
//! Model and parse failures never escape: the [`FallbackPolicy`] decides
//! between an empty section and canned outcome-keyed content.
//!
//! - [`application`] - answers to the program's application questions
//! - [`survey`] - pre- and post-survey answers
//! - [`milestone`] - one reflection per milestone
//! - [`review`] - the closing review and its rating
//! - [`fallback`] - canned content

pub mod application;
pub mod fallback;
pub mod milestone;
pub mod review;
pub mod survey;

use crate::config::FallbackPolicy;
use crate::error::Result;
use crate::llm::{extract_array, parse_json_payload, TextGenerator};
use serde::Serialize;
use serde_json::Value;

/// Shared handle the generators run through
pub struct ContentGenerator<'a> {
    llm: &'a dyn TextGenerator,
    fallback: FallbackPolicy,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(llm: &'a dyn TextGenerator, fallback: FallbackPolicy) -> Self {
        Self { llm, fallback }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// One JSON-mode call returning the list found under `key` (or the first list)
    async fn request_list(&self, system: &str, prompt: &str, key: &str, label: &str) -> Result<Vec<Value>> {
        let raw = self.llm.complete(system, prompt, true).await?;
        tracing::debug!("Raw {}: {}", label, raw);
        let payload: Value = parse_json_payload(&raw)?;
        Ok(extract_array(payload, key))
    }

    async fn request_object(&self, system: &str, prompt: &str, label: &str) -> Result<Value> {
        let raw = self.llm.complete(system, prompt, true).await?;
        tracing::debug!("Raw {}: {}", label, raw);
        parse_json_payload(&raw)
    }

    /// Apply the fallback policy to a failed section
    fn degrade<T>(&self, label: &str, error: &crate::error::SynthError, canned: impl FnOnce() -> Vec<T>) -> Vec<T> {
        match self.fallback {
            FallbackPolicy::Empty => {
                tracing::warn!("Error generating {}: {}; leaving section empty", label, error);
                Vec::new()
            }
            FallbackPolicy::Canned => {
                tracing::warn!("Error generating {}: {}; using canned content", label, error);
                canned()
            }
        }
    }
}

/// Pretty JSON for embedding in a prompt
pub(crate) fn to_prompt_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

const JSON_FOOTER: &str = "The response should be valid JSON. Do not include any markdown formatting or backticks in your response.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedGenerator;

    #[tokio::test]
    async fn test_request_list_unwraps_object() {
        let llm = ScriptedGenerator::new().reply("list please", r#"{"responses": [{"a": 1}, {"a": 2}]}"#);
        let gen = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        let items = gen.request_list("sys", "list please", "responses", "test").await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_degrade_honours_policy() {
        let llm = ScriptedGenerator::new();
        let err = crate::error::SynthError::service("boom");

        let empty = ContentGenerator::new(&llm, FallbackPolicy::Empty);
        assert!(empty.degrade("things", &err, || vec![1, 2]).is_empty());

        let canned = ContentGenerator::new(&llm, FallbackPolicy::Canned);
        assert_eq!(canned.degrade("things", &err, || vec![1, 2]), vec![1, 2]);
    }
}
