//! 外部AIサービス（正規化・詳細解析）の契約と、LLMによる実装

use crate::error::{AllerGuardError, Result};
use crate::llm::LlmBackend;
use allerguard_common::{
    build_analysis_prompt, build_normalize_prompt, parse_normalize_response, passthrough_entries,
    AllergenQuery, NormalizedEntry,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// 成分名の補正サービス
///
/// 応答の件数は入力と一致しなければならない。
#[async_trait]
pub trait IngredientNormalizer: Send + Sync {
    async fn normalize(&self, names: &[String]) -> Result<Vec<NormalizedEntry>>;
}

/// 照合済み成分の詳細解析サービス（自由記述の応答）
#[async_trait]
pub trait AllergenAnalyst: Send + Sync {
    async fn analyze(&self, ingredients: &[String], matches: &[AllergenQuery]) -> Result<String>;
}

/// LLMによる正規化
pub struct LlmNormalizer {
    backend: Arc<dyn LlmBackend>,
    max_items: usize,
}

impl LlmNormalizer {
    pub fn new(backend: Arc<dyn LlmBackend>, max_items: usize) -> Self {
        Self { backend, max_items }
    }
}

#[async_trait]
impl IngredientNormalizer for LlmNormalizer {
    async fn normalize(&self, names: &[String]) -> Result<Vec<NormalizedEntry>> {
        if names.len() > self.max_items {
            info!(count = names.len(), max = self.max_items, "成分数が多いため正規化をスキップ");
            return Ok(passthrough_entries(names));
        }

        let prompt = build_normalize_prompt(names);
        let response = self.backend.complete(&prompt).await?;
        debug!(backend = self.backend.name(), response_chars = response.chars().count(), "正規化応答");

        parse_normalize_response(&response, names.len())
            .map_err(|e| AllerGuardError::ApiParse(e.to_string()))
    }
}

/// LLMによる詳細解析
pub struct LlmAnalyst {
    backend: Arc<dyn LlmBackend>,
}

impl LlmAnalyst {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AllergenAnalyst for LlmAnalyst {
    async fn analyze(&self, ingredients: &[String], matches: &[AllergenQuery]) -> Result<String> {
        let prompt = build_analysis_prompt(ingredients, matches);
        let response = self.backend.complete(&prompt).await?;
        if response.trim().is_empty() {
            return Err(AllerGuardError::ApiParse("解析の応答が空です".into()));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 固定応答を返し、受け取ったプロンプトを記録する
    struct ScriptedBackend {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_normalizer_parses_reply() {
        let backend = ScriptedBackend::new(
            r#"```json
[{"original": "Salicylic 0id", "corrected": "Salicylic Acid", "confidence": "สูง"}]
```"#,
        );
        let normalizer = LlmNormalizer::new(backend.clone(), 50);
        let entries = normalizer.normalize(&names(&["Salicylic 0id"])).await.unwrap();
        assert_eq!(entries[0].resolved_name(), "Salicylic Acid");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_normalizer_rejects_short_reply() {
        let backend = ScriptedBackend::new(r#"[{"original": "Aqua", "corrected": "Aqua", "confidence": "สูง"}]"#);
        let normalizer = LlmNormalizer::new(backend, 50);
        let err = normalizer.normalize(&names(&["Aqua", "Glycerin"])).await.unwrap_err();
        assert!(matches!(err, AllerGuardError::ApiParse(_)));
    }

    #[tokio::test]
    async fn test_normalizer_skips_long_lists() {
        let backend = ScriptedBackend::new("not called");
        let normalizer = LlmNormalizer::new(backend.clone(), 2);
        let entries = normalizer.normalize(&names(&["Aqua", "Glycerin", "Niacinamide"])).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].corrected, "Niacinamide");
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyst_rejects_empty_reply() {
        let backend = ScriptedBackend::new("  \n");
        let analyst = LlmAnalyst::new(backend);
        let queries = vec![AllergenQuery {
            ingredient: "SALICYLIC ACID".into(),
            user_term: "salicylic acid".into(),
        }];
        assert!(analyst.analyze(&names(&["SALICYLIC ACID"]), &queries).await.is_err());
    }
}
