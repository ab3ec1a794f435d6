//! 解析結果の型定義
//!
//! CLI・パイプラインで共有される型:
//! - NormalizedEntry: 正規化サービスの出力（1成分ごと）
//! - MatchResult: アレルゲン × 成分の照合結果
//! - AnalysisRecord: 詳細解析（症状・推奨・代替品）
//! - PipelineReport: 最終出力

use serde::{Deserialize, Serialize};
use std::fmt;

/// 正規化サービスの出力: 1成分分の補正結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedEntry {
    pub original: String,
    pub corrected: String,
    pub confidence: String,
}

impl NormalizedEntry {
    /// 補正後の名前（"uncertain"・空欄なら元の名前）
    pub fn resolved_name(&self) -> &str {
        let corrected = self.corrected.trim();
        if corrected.is_empty() || corrected.eq_ignore_ascii_case("uncertain") {
            self.original.trim()
        } else {
            corrected
        }
    }
}

/// 照合理由（カテゴリ + 表示用テキスト）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchReason {
    /// 完全一致
    Exact,
    /// 入力途中（アレルゲンが成分名の一部）
    PartialInput { typed: usize, total: usize },
    /// 成分名がアレルゲン入力に含まれる
    ContainedInAllergen,
    /// 複合語の中にアレルゲンが埋め込まれている
    EmbeddedWord { fragment: String, word: String },
    /// 全体の類似度が閾値以上（タイプミス）
    Similar { percent: u32 },
    /// 単語単位の類似
    WordSimilar { word: String, percent: u32 },
    /// 複数語のうち一定数が一致
    WordOverlap { matched: usize, total: usize },
    /// 一般的すぎる語（ACID等）
    GenericTerm,
    /// 不一致
    NoMatch,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::Exact => write!(f, "exact match"),
            MatchReason::PartialInput { typed, total } => {
                write!(f, "partial name ({}/{} characters typed)", typed, total)
            }
            MatchReason::ContainedInAllergen => write!(f, "ingredient name appears in your entry"),
            MatchReason::EmbeddedWord { fragment, word } => {
                write!(f, "found '{}' inside '{}'", fragment, word)
            }
            MatchReason::Similar { percent } => {
                write!(f, "{}% similar (possible typo)", percent)
            }
            MatchReason::WordSimilar { word, percent } => {
                write!(f, "matches word '{}' in the ingredient name ({}%)", word, percent)
            }
            MatchReason::WordOverlap { matched, total } => {
                write!(f, "{}/{} words match", matched, total)
            }
            MatchReason::GenericTerm => {
                write!(f, "term too generic (name the specific substance)")
            }
            MatchReason::NoMatch => write!(f, "no match"),
        }
    }
}

/// 照合結果（生成後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// ユーザー入力のアレルゲン（入力のまま）
    pub allergen: String,
    /// 製品の成分名
    pub ingredient: String,
    #[serde(rename = "match")]
    pub is_match: bool,
    /// 0.0〜1.0
    pub score: f64,
    pub reason: MatchReason,
}

/// リスクレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// AI応答のラベル（タイ語/英語）からリスクレベルを判定
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("high") || lower.contains("สูง") {
            Some(RiskLevel::High)
        } else if lower.contains("medium")
            || lower.contains("moderate")
            || lower.contains("ปานกลาง")
            || lower.contains("กลาง")
        {
            Some(RiskLevel::Medium)
        } else if lower.contains("low") || lower.contains("ต่ำ") {
            Some(RiskLevel::Low)
        } else {
            None
        }
    }

    /// 照合スコアからリスクレベルを推定
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= 0.999 {
            RiskLevel::High
        } else if score >= threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::Low => write!(f, "low"),
        }
    }
}

/// 解析レコードの出所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Ai,
    Fallback,
}

/// 照合された成分ごとの詳細解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub ingredient: String,
    pub symptoms: String,
    pub risk_level: Option<RiskLevel>,
    pub recommendation: String,
    pub alternatives: Vec<String>,
    pub source: AnalysisSource,
}

/// 解析サービスに渡す照合ペア
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenQuery {
    pub ingredient: String,
    pub user_term: String,
}

impl From<&MatchResult> for AllergenQuery {
    fn from(m: &MatchResult) -> Self {
        Self {
            ingredient: m.ingredient.clone(),
            user_term: m.allergen.clone(),
        }
    }
}

/// レポート内の検出アレルゲン
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedAllergen {
    pub ingredient: String,
    pub matched_allergen: String,
    pub match_reason: String,
    pub match_score: f64,
    pub risk_level: RiskLevel,
    pub symptoms: String,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    pub source: AnalysisSource,
}

/// レポートのステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// 総合推奨の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationTier {
    #[serde(rename = "avoid")]
    Avoid,
    #[serde(rename = "use with caution")]
    Caution,
    #[serde(rename = "safe")]
    Safe,
}

impl fmt::Display for RecommendationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationTier::Avoid => write!(f, "avoid"),
            RecommendationTier::Caution => write!(f, "use with caution"),
            RecommendationTier::Safe => write!(f, "safe"),
        }
    }
}

/// パイプラインの最終出力（1実行につき1つ、返却後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub status: ReportStatus,
    pub message: String,
    pub cleaned_ingredients: Vec<String>,
    pub detected_allergens: Vec<DetectedAllergen>,
    pub recommendation: String,
    pub ai_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<RecommendationTier>,
}
