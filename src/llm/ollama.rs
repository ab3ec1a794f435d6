use super::LlmBackend;
use crate::error::{AllerGuardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Ollamaサーバー（HTTP, 非ストリーミング）
pub struct OllamaHttp {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaHttp {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[async_trait]
impl LlmBackend for OllamaHttp {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.1 },
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Ollamaへ送信");

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| AllerGuardError::ApiCall(format!("Ollama HTTPエラー: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AllerGuardError::ApiCall(format!(
                "Ollama returned {}: {}",
                status, error_body
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AllerGuardError::ApiParse(format!("Ollama応答の解析に失敗: {}", e)))?;

        debug!(
            model = %self.model,
            tokens = generated.eval_count.unwrap_or(0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ollama応答"
        );

        Ok(generated.response)
    }
}
