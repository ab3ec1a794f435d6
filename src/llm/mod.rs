//! LLM呼び出しの抽象化
//!
//! - OllamaHttp: Ollamaサーバーの /api/generate を直接呼ぶ
//! - CliBackend: ollama / claude / codex / gemini のCLIにプロンプトを渡す

mod cli;
mod ollama;

pub use cli::CliBackend;
pub use ollama::OllamaHttp;

use crate::ai_provider::AiProvider;
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// プロンプトを渡してテキスト応答を得るバックエンド
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// 設定に従ってバックエンドを構築
pub fn backend_from_config(config: &Config) -> Arc<dyn LlmBackend> {
    match config.provider {
        AiProvider::Ollama => Arc::new(
            OllamaHttp::new(config.model.clone()).with_base_url(config.ollama_url.clone()),
        ),
        provider => Arc::new(CliBackend::new(provider, config.model.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_config() {
        let config = Config::default();
        assert_eq!(backend_from_config(&config).name(), "ollama");

        let config = Config {
            provider: AiProvider::Gemini,
            ..Default::default()
        };
        assert_eq!(backend_from_config(&config).name(), "gemini");
    }
}
