//! Text generation client
//!
//! The pipeline only needs "system + prompt in, JSON text out". The
//! [`TextGenerator`] trait is that seam; [`OpenAiClient`] talks to an
//! OpenAI-compatible chat completions endpoint.

use crate::config::SynthConfig;
use crate::error::{Result, SynthError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion. With `json_mode` the service is asked to return a JSON object.
    async fn complete(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &SynthConfig) -> Result<Self> {
        config.require_api_key()?;

        let endpoint = if config.api_base.ends_with("/chat/completions") {
            config.api_base.clone()
        } else {
            format!("{}/chat/completions", config.api_base.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        let mut request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
        });
        if json_mode {
            request_body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let api_response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !api_response.status().is_success() {
            let status = api_response.status();
            let error_text = api_response.text().await.unwrap_or_default();
            return Err(SynthError::service(format!("API error {}: {}", status, error_text)));
        }

        let response_json: Value = api_response.json().await?;
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SynthError::service("response had no message content"))?;

        Ok(content.to_string())
    }
}

/// Remove a surrounding ```json ... ``` (or bare ```) fence, if any
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Strip fences and parse as JSON
pub fn parse_json_payload<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        SynthError::parse(format!("{} (payload starts with: {:.80})", e, cleaned))
    })
}

/// Pull the list out of a payload that is either a bare array or an object
/// wrapping one (`{"responses": [...]}`). JSON mode forces the latter.
pub fn extract_array(payload: Value, preferred_key: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(preferred_key) {
                return items;
            }
            map.into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Parse each element, dropping the ones that don't fit `T`
pub fn parse_items<T: DeserializeOwned>(items: Vec<Value>, label: &str) -> Vec<T> {
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Dropping malformed {} item: {}", label, e);
                None
            }
        })
        .collect();
    if parsed.len() < total {
        tracing::warn!("Kept {}/{} {} items", parsed.len(), total, label);
    }
    parsed
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_payload_reports_parse_error() {
        let err = parse_json_payload::<Value>("Sure! Here you go").unwrap_err();
        assert!(matches!(err, SynthError::Parse { .. }));

        let ok: Value = parse_json_payload("```json\n{\"rating\": 4}\n```").unwrap();
        assert_eq!(ok["rating"], 4);
    }

    #[test]
    fn test_extract_array_shapes() {
        assert_eq!(extract_array(json!([1, 2]), "responses").len(), 2);
        assert_eq!(extract_array(json!({"responses": [1, 2, 3]}), "responses").len(), 3);
        assert_eq!(extract_array(json!({"answers": [1]}), "responses").len(), 1);
        assert!(extract_array(json!({"note": "none"}), "responses").is_empty());
        assert!(extract_array(json!("text"), "responses").is_empty());
    }

    #[test]
    fn test_client_requires_key() {
        let config = SynthConfig::default();
        assert!(matches!(OpenAiClient::new(&config), Err(SynthError::Config { .. })));
    }
}
