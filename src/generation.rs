//! Answer generation service.
//!
//! [`Generator`] is the black-box `generate(prompt, max_tokens)` boundary.
//! Providers are plain HTTP clients; a failed call is returned as an error
//! and converted into a user-facing answer by the pipeline.
//!
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate`, non-streaming.
//! - **[`OpenAIGenerator`]**: chat completions; requires `OPENAI_API_KEY`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::retry;

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Renders the grounding prompt handed to the generator.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an intelligent enterprise assistant. Use the context below to answer the question concisely.\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n\n\
         Answer:\n",
        context, question
    )
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "num_predict": max_tokens },
        });
        let json = retry::post_json(
            &self.client,
            &format!("{}/api/generate", self.url),
            None,
            &body,
            0,
            "Ollama",
        )
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
        });
        let json = retry::post_json(
            &self.client,
            "https://api.openai.com/v1/chat/completions",
            Some(&self.api_key),
            &body,
            0,
            "OpenAI",
        )
        .await?;
        parse_chat_completion(&json)
    }
}

fn parse_chat_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Builds the configured generator. `disabled` is an error here; callers
/// that never answer questions simply do not build one.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "disabled" => bail!("Generation is disabled; set [generation] provider to answer queries"),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_places_context_and_question() {
        let prompt = build_prompt("Leave is 25 days.", "How much leave?");
        assert!(prompt.starts_with("You are an intelligent enterprise assistant."));
        assert!(prompt.contains("Context:\nLeave is 25 days.\n\n"));
        assert!(prompt.contains("Question:\nHow much leave?\n\n"));
        assert!(prompt.ends_with("Answer:\n"));
    }

    #[test]
    fn parses_chat_completion_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": " 25 days. " } }]
        });
        assert_eq!(parse_chat_completion(&json).unwrap(), "25 days.");
        assert!(parse_chat_completion(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn disabled_provider_cannot_build_generator() {
        let config = GenerationConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }

    #[test]
    fn ollama_requires_model() {
        let config = GenerationConfig::default();
        assert!(OllamaGenerator::new(&config).is_err());
    }
}
