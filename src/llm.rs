//! Language-model provider abstraction.
//!
//! A [`LanguageModel`] accepts a fully rendered prompt and returns the
//! generated text. Providers:
//! - **[`GeminiModel`]**: `models/{model}:generateContent` (default `gemini-2.5-flash`).
//! - **[`OpenAIModel`]**: `POST /v1/chat/completions`.
//! - **[`OllamaModel`]**: `POST /api/generate` on a local Ollama instance.
//!
//! Retries are off by default (`llm.max_retries = 0`); a failed call
//! surfaces to the caller as-is.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http;

/// Text-in, text-out generation service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Create the [`LanguageModel`] named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Gemini ============

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Requires `GOOGLE_API_KEY` (or `GEMINI_API_KEY`).
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            api_key: http::api_key(&["GOOGLE_API_KEY", "GEMINI_API_KEY"])?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = serde_json::json!({ "temperature": t });
        }
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);

        let json = http::send_json("Gemini", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        parse_gemini_response(&json)
    }
}

/// Concatenates the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let Some(candidate) = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        let reason = json
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
            .unwrap_or("no candidates returned");
        bail!("Gemini returned no answer: {}", reason);
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing content parts"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect())
}

// ============ OpenAI ============

/// Requires `OPENAI_API_KEY`.
pub struct OpenAIModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OpenAIModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            api_key: http::api_key(&["OPENAI_API_KEY"])?,
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        let json = http::send_json("OpenAI", self.max_retries, || {
            self.client
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

// ============ Ollama ============

pub struct OllamaModel {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        let url = format!("{}/api/generate", self.url.trim_end_matches('/'));

        let json = http::send_json("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_parts_are_concatenated() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "LOC" }, { "text": "AL\n" }] }
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "LOCAL\n");
    }

    #[test]
    fn gemini_block_reason_reported() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn ollama_requires_model() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ..LlmConfig::default()
        };
        let err = create_model(&config).err().unwrap();
        assert!(err.to_string().contains("llm.model"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "nope".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_model(&config).is_err());
    }
}
