use crate::ai_provider::AiProvider;
use crate::error::{AllerGuardError, Result};
use allerguard_common::{CorrectionTable, FuzzyMatcher, TextCleaner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_MODEL: &str = "ALLERGUARD_MODEL";
pub const ENV_PROVIDER: &str = "ALLERGUARD_PROVIDER";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: AiProvider,
    pub model: String,
    pub ollama_url: String,
    pub tesseract_cmd: String,
    pub ocr_languages: String,
    pub ocr_timeout_seconds: u64,
    pub normalize_timeout_seconds: u64,
    pub analysis_timeout_seconds: u64,
    pub match_threshold: f64,
    /// これを超える成分数では正規化を呼ばない
    pub max_normalize_items: usize,
    /// 追加の誤読補正テーブル（JSON）
    pub correction_table: Option<PathBuf>,
    /// 保存済みのアレルゲン
    pub allergens: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: AiProvider::Ollama,
            model: "scb10x/llama3.1-typhoon2-8b-instruct".into(),
            ollama_url: "http://localhost:11434".into(),
            tesseract_cmd: "tesseract".into(),
            ocr_languages: "eng+tha".into(),
            ocr_timeout_seconds: 120,
            normalize_timeout_seconds: 300,
            analysis_timeout_seconds: 600,
            match_threshold: allerguard_common::DEFAULT_THRESHOLD,
            max_normalize_items: 50,
            correction_table: None,
            allergens: Vec::new(),
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書き
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 指定パスから読み込み（ファイルがなければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AllerGuardError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("allerguard").join("config.json"))
    }

    /// 環境変数による上書き（lookup はテスト用に差し替え可能）
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }

        if let Some(name) = lookup(ENV_PROVIDER) {
            match AiProvider::parse(&name) {
                Some(provider) => self.provider = provider,
                None => tracing::warn!(value = %name, "{} が不正です。無視します", ENV_PROVIDER),
            }
        }

        if let Some(host) = lookup(ENV_OLLAMA_HOST).filter(|h| !h.trim().is_empty()) {
            let host = host.trim().trim_end_matches('/');
            self.ollama_url = if host.starts_with("http://") || host.starts_with("https://") {
                host.to_string()
            } else {
                format!("http://{}", host)
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(AllerGuardError::Config(format!(
                "match_threshold は 0 より大きく 1 以下: {}",
                self.match_threshold
            )));
        }

        let timeouts = [
            ("ocr_timeout_seconds", self.ocr_timeout_seconds),
            ("normalize_timeout_seconds", self.normalize_timeout_seconds),
            ("analysis_timeout_seconds", self.analysis_timeout_seconds),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(AllerGuardError::Config(format!("{} が 0 です", name)));
        }

        if self.model.trim().is_empty() {
            return Err(AllerGuardError::Config("model が空です".into()));
        }
        Ok(())
    }

    /// 組み込みテーブル + 設定された追加テーブル
    pub fn correction_table(&self) -> Result<CorrectionTable> {
        let mut table = CorrectionTable::builtin();
        if let Some(path) = &self.correction_table {
            table.extend(CorrectionTable::from_file(path)?);
        }
        Ok(table)
    }

    pub fn text_cleaner(&self) -> Result<TextCleaner> {
        Ok(TextCleaner::new(self.correction_table()?))
    }

    pub fn matcher(&self) -> FuzzyMatcher {
        FuzzyMatcher::new(self.match_threshold)
    }

    /// アレルゲンを追加（大文字小文字を無視して重複は追加しない）
    pub fn add_allergen(&mut self, allergen: &str) -> bool {
        let allergen = allergen.trim();
        if allergen.is_empty() || self.has_allergen(allergen) {
            return false;
        }
        self.allergens.push(allergen.to_string());
        true
    }

    pub fn remove_allergen(&mut self, allergen: &str) -> bool {
        let before = self.allergens.len();
        let target = allergen.trim().to_lowercase();
        self.allergens.retain(|a| a.to_lowercase() != target);
        self.allergens.len() != before
    }

    pub fn clear_allergens(&mut self) {
        self.allergens.clear();
    }

    fn has_allergen(&self, allergen: &str) -> bool {
        let target = allergen.to_lowercase();
        self.allergens.iter().any(|a| a.to_lowercase() == target)
    }
}
