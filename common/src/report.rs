//! レポート集計
//!
//! 照合結果と解析レコードを成分名で結合し、総合推奨を決める。
//! 各段階の打ち切りレポート（OCR失敗・成分なし・アレルゲン未入力・安全）もここで生成する。

use crate::parser::fallback_record;
use crate::types::{
    AllergenQuery, AnalysisRecord, DetectedAllergen, MatchResult, PipelineReport,
    RecommendationTier, ReportStatus, RiskLevel,
};
use std::collections::HashMap;

pub const MSG_NO_INGREDIENTS: &str = "No ingredients detected";
pub const MSG_NO_ALLERGEN_DATA: &str = "No allergen data supplied; nothing to check";
pub const MSG_NO_ALLERGENS_FOUND: &str = "No matching allergens found";
pub const MSG_INTERNAL_ERROR: &str = "Internal error while analyzing the label";

impl PipelineReport {
    /// 打ち切り用のエラーレポート
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Error,
            message: message.into(),
            cleaned_ingredients: Vec::new(),
            detected_allergens: Vec::new(),
            recommendation: String::new(),
            ai_analysis: String::new(),
            tier: None,
        }
    }

    pub fn ocr_failed(detail: &str) -> Self {
        Self::error(format!("OCR failed: {}", detail))
    }

    pub fn no_ingredients() -> Self {
        Self::error(MSG_NO_INGREDIENTS)
    }

    pub fn internal_error() -> Self {
        Self::error(MSG_INTERNAL_ERROR)
    }

    /// アレルゲンが未入力（照合対象なし）
    pub fn no_allergen_data(ingredients: Vec<String>) -> Self {
        Self {
            status: ReportStatus::Success,
            message: MSG_NO_ALLERGEN_DATA.to_string(),
            cleaned_ingredients: ingredients,
            detected_allergens: Vec::new(),
            recommendation: "Add the substances you react to and scan again.".to_string(),
            ai_analysis: String::new(),
            tier: None,
        }
    }

    /// 一致なし
    pub fn safe(ingredients: Vec<String>) -> Self {
        Self {
            status: ReportStatus::Success,
            message: MSG_NO_ALLERGENS_FOUND.to_string(),
            cleaned_ingredients: ingredients,
            detected_allergens: Vec::new(),
            recommendation: recommendation_text(RecommendationTier::Safe, 0),
            ai_analysis: String::new(),
            tier: Some(RecommendationTier::Safe),
        }
    }

    /// 一致あり: 解析レコードと結合して総合推奨を付ける
    pub fn with_detections(
        ingredients: Vec<String>,
        matches: &[MatchResult],
        records: &[AnalysisRecord],
        threshold: f64,
        ai_analysis: String,
    ) -> Self {
        let detected = merge_analysis(matches, records, threshold);
        let (tier, count) = recommendation_tier(&detected);
        Self {
            status: ReportStatus::Success,
            message: format!("Found {} ingredient(s) matching your allergens", detected.len()),
            cleaned_ingredients: ingredients,
            recommendation: recommendation_text(tier, count),
            detected_allergens: detected,
            ai_analysis,
            tier: Some(tier),
        }
    }

    /// 一覧表示用の一文（推奨がなければメッセージ）
    pub fn recommendation_or_message(&self) -> &str {
        if self.recommendation.is_empty() {
            &self.message
        } else {
            &self.recommendation
        }
    }
}

/// 照合結果ごとに解析レコードを結合する
///
/// レコードは成分名（大文字）で引く。見つからない成分には定型レコードを使う。
pub fn merge_analysis(
    matches: &[MatchResult],
    records: &[AnalysisRecord],
    threshold: f64,
) -> Vec<DetectedAllergen> {
    let by_name: HashMap<String, &AnalysisRecord> = records
        .iter()
        .map(|r| (key(&r.ingredient), r))
        .collect();

    matches
        .iter()
        .map(|m| {
            let wanted = key(&m.ingredient);
            let found = by_name.get(&wanted).copied().or_else(|| {
                // "SALICYLIC ACID (BHA)" のような表記違い
                records.iter().find(|r| {
                    let name = key(&r.ingredient);
                    !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
                })
            });

            let record = match found {
                Some(record) => record.clone(),
                None => {
                    tracing::debug!(ingredient = %m.ingredient, "解析レコードなし、定型レコードを使用");
                    fallback_record(&AllergenQuery::from(m))
                }
            };

            DetectedAllergen {
                ingredient: m.ingredient.clone(),
                matched_allergen: m.allergen.clone(),
                match_reason: m.reason.to_string(),
                match_score: m.score,
                risk_level: record
                    .risk_level
                    .unwrap_or_else(|| RiskLevel::from_score(m.score, threshold)),
                symptoms: record.symptoms,
                recommendation: record.recommendation,
                alternatives: record.alternatives,
                source: record.source,
            }
        })
        .collect()
}

/// 高リスクの件数から推奨段階を決める
///
/// 戻り値の件数は、avoid なら高リスク件数、それ以外は検出件数。
pub fn recommendation_tier(detected: &[DetectedAllergen]) -> (RecommendationTier, usize) {
    let high = detected
        .iter()
        .filter(|d| d.risk_level == RiskLevel::High)
        .count();

    if high > 0 {
        (RecommendationTier::Avoid, high)
    } else if !detected.is_empty() {
        (RecommendationTier::Caution, detected.len())
    } else {
        (RecommendationTier::Safe, 0)
    }
}

/// 推奨段階の定型文
pub fn recommendation_text(tier: RecommendationTier, count: usize) -> String {
    match tier {
        RecommendationTier::Avoid => format!(
            "Avoid this product: {} ingredient(s) carry a high risk for you.",
            count
        ),
        RecommendationTier::Caution => format!(
            "Use with caution: {} ingredient(s) may cause a reaction. Patch test before use.",
            count
        ),
        RecommendationTier::Safe => {
            "Safe: none of your listed allergens were found in this product.".to_string()
        }
    }
}

fn key(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}
