use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::prompt;

/// Text-generation capability consumed by the LLM extraction strategy.
/// Any error from an implementation means "use the fallback", never a
/// pipeline failure.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub max_retries: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            max_retries: 3,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn generate_once(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                num_predict: max_tokens,
                temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let body: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(body.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    /// Generate with a JSON-repair retry loop: syntactically invalid output
    /// is fed back to the model with a correction prompt, a bounded number
    /// of times.
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            let response = self.generate_once(prompt, max_tokens, temperature).await?;

            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(response);
            }

            if attempt < attempts - 1 {
                let repair = prompt::build_repair_prompt(&response);
                let corrected = self.generate_once(&repair, max_tokens, temperature).await?;
                if serde_json::from_str::<serde_json::Value>(&corrected).is_ok() {
                    return Ok(corrected);
                }
            }
        }

        anyhow::bail!("Failed to get valid JSON after {} attempts", attempts)
    }
}
