//! パイプライン
//!
//! OCR → 抽出 → 正規化 → 照合 → 詳細解析 → 集計 を順に実行する。
//! 各段階の失敗は打ち切りレポートか代替データでの続行に変換され、
//! 呼び出し側には必ず PipelineReport が返る。

use crate::analyzer::{AllergenAnalyst, IngredientNormalizer, LlmAnalyst, LlmNormalizer};
use crate::config::Config;
use crate::error::{AllerGuardError, Result};
use crate::llm::backend_from_config;
use crate::ocr::{CachedRecognizer, TesseractOcr, TextRecognizer};
use allerguard_common::{
    fallback_records, parse_analysis_response, AllergenQuery, FuzzyMatcher, IngredientExtractor,
    NormalizedEntry, PipelineReport, TextCleaner,
};
use futures::FutureExt;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 解析サービスが使えなかったときの ai_analysis
pub const ANALYSIS_UNAVAILABLE: &str = "AI analysis unavailable; standard guidance is shown instead.";

/// 外部呼び出しのタイムアウト
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTimeouts {
    pub ocr: Duration,
    pub normalize: Duration,
    pub analysis: Duration,
}

impl StageTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ocr: Duration::from_secs(config.ocr_timeout_seconds),
            normalize: Duration::from_secs(config.normalize_timeout_seconds),
            analysis: Duration::from_secs(config.analysis_timeout_seconds),
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Pipeline {
    recognizer: Arc<dyn TextRecognizer>,
    normalizer: Arc<dyn IngredientNormalizer>,
    analyst: Arc<dyn AllergenAnalyst>,
    cleaner: TextCleaner,
    extractor: IngredientExtractor,
    matcher: FuzzyMatcher,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        normalizer: Arc<dyn IngredientNormalizer>,
        analyst: Arc<dyn AllergenAnalyst>,
    ) -> Self {
        Self {
            recognizer,
            normalizer,
            analyst,
            cleaner: TextCleaner::default(),
            extractor: IngredientExtractor::default(),
            matcher: FuzzyMatcher::default(),
            timeouts: StageTimeouts::default(),
        }
    }

    /// 設定から tesseract + LLM のパイプラインを構築
    pub fn from_config(config: &Config, use_cache: bool) -> Result<Self> {
        config.validate()?;

        let backend = backend_from_config(config);
        let tesseract: Arc<dyn TextRecognizer> = Arc::new(TesseractOcr::from_config(config));
        let recognizer: Arc<dyn TextRecognizer> = if use_cache {
            Arc::new(CachedRecognizer::new(tesseract))
        } else {
            tesseract
        };

        Ok(Self::new(
            recognizer,
            Arc::new(LlmNormalizer::new(backend.clone(), config.max_normalize_items)),
            Arc::new(LlmAnalyst::new(backend)),
        )
        .with_cleaner(config.text_cleaner()?)
        .with_matcher(config.matcher())
        .with_timeouts(StageTimeouts::from_config(config)))
    }

    pub fn with_cleaner(mut self, cleaner: TextCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_extractor(mut self, extractor: IngredientExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_matcher(mut self, matcher: FuzzyMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// クリーニング + 抽出のみ（外部呼び出しなし）
    pub fn extract(&self, raw_text: &str) -> Vec<String> {
        self.extractor.extract(&self.cleaner.clean(raw_text))
    }

    /// ラベル画像を解析する
    pub async fn run(&self, image: &Path, allergens: &[String]) -> PipelineReport {
        contain_panic(self.run_stages(image, allergens)).await
    }

    /// OCR済みテキストから解析する
    pub async fn run_text(&self, raw_text: &str, allergens: &[String]) -> PipelineReport {
        contain_panic(self.process_text(raw_text, allergens)).await
    }

    async fn run_stages(&self, image: &Path, allergens: &[String]) -> PipelineReport {
        let start = Instant::now();
        let text = match with_timeout("ocr", self.timeouts.ocr, self.recognizer.recognize(image)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(stage = "ocr", image = %image.display(), error = %e, "OCR失敗");
                return PipelineReport::ocr_failed(&e.to_string());
            }
        };
        info!(
            stage = "ocr",
            chars = text.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR完了"
        );

        self.process_text(&text, allergens).await
    }

    async fn process_text(&self, raw_text: &str, allergens: &[String]) -> PipelineReport {
        // 抽出
        let extracted = self.extract(raw_text);
        if extracted.is_empty() {
            info!(stage = "extract", "成分が見つかりません");
            return PipelineReport::no_ingredients();
        }
        info!(stage = "extract", count = extracted.len(), "成分抽出完了");

        // 正規化（失敗時は抽出結果をそのまま使う）
        let start = Instant::now();
        let ingredients = match with_timeout(
            "normalize",
            self.timeouts.normalize,
            self.normalizer.normalize(&extracted),
        )
        .await
        {
            Ok(entries) => resolve_names(&extracted, &entries),
            Err(e) => {
                warn!(stage = "normalize", error = %e, "正規化失敗、抽出結果を使用");
                canonical_names(extracted.iter().map(String::as_str))
            }
        };
        info!(
            stage = "normalize",
            count = ingredients.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "正規化完了"
        );

        // 照合
        let terms: Vec<String> = allergens
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if terms.is_empty() {
            info!(stage = "resolve", "アレルゲン未入力");
            return PipelineReport::no_allergen_data(ingredients);
        }

        let matches = self.matcher.find_matches(&terms, &ingredients);
        info!(stage = "resolve", count = matches.len(), "照合完了");
        if matches.is_empty() {
            return PipelineReport::safe(ingredients);
        }

        // 詳細解析（失敗・読めない応答は定型レコード）
        let start = Instant::now();
        let queries: Vec<AllergenQuery> = matches.iter().map(AllergenQuery::from).collect();
        let (records, ai_analysis) = match with_timeout(
            "analysis",
            self.timeouts.analysis,
            self.analyst.analyze(&ingredients, &queries),
        )
        .await
        {
            Ok(reply) => match parse_analysis_response(&reply) {
                Ok(records) => (records, reply),
                Err(e) => {
                    warn!(stage = "analysis", error = %e, "解析応答を読めません、定型レコードを使用");
                    (fallback_records(&queries), ANALYSIS_UNAVAILABLE.to_string())
                }
            },
            Err(e) => {
                warn!(stage = "analysis", error = %e, "解析失敗、定型レコードを使用");
                (fallback_records(&queries), ANALYSIS_UNAVAILABLE.to_string())
            }
        };
        info!(
            stage = "analysis",
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "解析完了"
        );

        // 集計
        PipelineReport::with_detections(
            ingredients,
            &matches,
            &records,
            self.matcher.threshold(),
            ai_analysis,
        )
    }
}

/// パニックを汎用エラーレポートに変換
async fn contain_panic<F>(run: F) -> PipelineReport
where
    F: Future<Output = PipelineReport>,
{
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(report) => report,
        Err(_) => {
            error!("パイプライン内部でパニックが発生");
            PipelineReport::internal_error()
        }
    }
}

/// タイムアウトを失敗として扱う
async fn with_timeout<T, F>(stage: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AllerGuardError::Timeout {
            stage,
            seconds: limit.as_secs(),
        }),
    }
}

/// 正規化結果を抽出結果と順に対応付ける
///
/// 補正名が空・"uncertain" なら抽出した名前を使う。
fn resolve_names(extracted: &[String], entries: &[NormalizedEntry]) -> Vec<String> {
    let resolved: Vec<String> = extracted
        .iter()
        .zip(entries)
        .map(|(raw, entry)| {
            NormalizedEntry {
                original: raw.clone(),
                ..entry.clone()
            }
            .resolved_name()
            .to_string()
        })
        .collect();

    let names = canonical_names(resolved.iter().map(String::as_str));
    if names.is_empty() {
        canonical_names(extracted.iter().map(String::as_str))
    } else {
        names
    }
}

/// 大文字化・空白圧縮・重複除去（最初の出現を残す）
fn canonical_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}
