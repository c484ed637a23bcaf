//! Text-generation providers.
//!
//! Implements [`TextGenerator`] from `lorekeeper-core`:
//! - **[`DisabledGenerator`]**: returns errors; used when no model is configured.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions`, one user message.
//! - **[`OllamaGenerator`]**: `POST /api/chat` with `stream: false`.
//!
//! Both remote providers share the retry policy in [`crate::http`]. Token
//! usage reported by the API is ignored; accounting uses [`crate::tokens`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use lorekeeper_core::generation::TextGenerator;

use crate::config::GenerationConfig;
use crate::http;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled; set [generation].provider in the config")
    }
}

pub struct OpenAIGenerator {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: String,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            endpoint: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(max) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &self.request_body(prompt),
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_completion(&json)
    }
}

fn parse_openai_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

pub struct OllamaGenerator {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let url = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            endpoint: format!("{}/api/chat", url.trim_end_matches('/')),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut options = serde_json::json!({ "temperature": self.temperature });
        if let Some(max) = self.max_tokens {
            options["num_predict"] = serde_json::json!(max);
        }
        serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [{"role": "user", "content": prompt}],
            "options": options,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            None,
            &self.request_body(prompt),
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_chat(&json)
    }
}

fn parse_ollama_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

/// Create the [`TextGenerator`] selected by `[generation].provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Elfos vivem 700 anos."}}],
            "usage": {"prompt_tokens": 10}
        });
        assert_eq!(parse_openai_completion(&json).unwrap(), "Elfos vivem 700 anos.");
        assert!(parse_openai_completion(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn parses_ollama_chat() {
        let json = serde_json::json!({"message": {"role": "assistant", "content": "ok"}, "done": true});
        assert_eq!(parse_ollama_chat(&json).unwrap(), "ok");
        assert!(parse_ollama_chat(&serde_json::json!({"done": true})).is_err());
    }

    #[test]
    fn ollama_body_is_not_streamed() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            max_tokens: Some(256),
            ..GenerationConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let body = generator.request_body("oi");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "oi");
        assert_eq!(body["options"]["num_predict"], 256);
    }

    #[tokio::test]
    async fn disabled_generator_refuses() {
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.model_name(), "disabled");
        assert!(generator.generate("oi").await.is_err());
    }
}
