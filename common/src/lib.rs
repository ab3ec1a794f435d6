//! AllerGuard Common Library
//!
//! OCRテキストからの成分抽出、アレルゲンのあいまい照合、AI応答のパース、
//! レポート集計。I/Oを持たず、CLI側のパイプラインから呼ばれる。

pub mod cleaner;
pub mod error;
pub mod extractor;
pub mod matcher;
pub mod parser;
pub mod prompts;
pub mod report;
pub mod types;

pub use cleaner::{CorrectionRule, CorrectionTable, TextCleaner};
pub use error::{Error, Result};
pub use extractor::{extract_ingredients, CandidateIngredient, ExtractorVocabulary, IngredientExtractor};
pub use matcher::{fuzzy_match, similarity, FuzzyMatcher, DEFAULT_THRESHOLD};
pub use parser::{
    extract_json, fallback_record, fallback_records, parse_analysis_response,
    parse_normalize_response, passthrough_entries,
};
pub use prompts::{build_analysis_prompt, build_normalize_prompt};
pub use report::{merge_analysis, recommendation_tier};
pub use types::{
    AllergenQuery, AnalysisRecord, AnalysisSource, DetectedAllergen, MatchReason, MatchResult,
    NormalizedEntry, PipelineReport, RecommendationTier, ReportStatus, RiskLevel,
};
