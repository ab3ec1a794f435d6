//! 成分抽出テスト
//!
//! 設定（追加の誤読補正テーブル）を通したクリーニング + 抽出を検証

use allerguard::config::Config;
use allerguard_common::{FuzzyMatcher, IngredientExtractor};
use tempfile::tempdir;

/// 実際のOCR出力に近いラベル（誤読・折り返し・タイ語混在）
const OCR_TRANSCRIPT: &str = "\
ACNE CLEAR SERUM 30 ml
ส่วนประกอบ: Aqua, Salicylic pid, Niacin-
amide, Butylene
Glycol, Centelia Asiatica wer, Tocopherol (Vitamin E, 0.5%),
Phenoxyethanol
วิธีใช้ ทาบริเวณที่เป็นสิว";

fn extract_with(config: &Config, text: &str) -> Vec<String> {
    let cleaner = config.text_cleaner().expect("クリーナー生成失敗");
    IngredientExtractor::default().extract(&cleaner.clean(text))
}

/// 組み込みテーブルのみ
#[test]
fn test_extract_transcript_with_builtin_table() {
    let result = extract_with(&Config::default(), OCR_TRANSCRIPT);
    assert_eq!(
        result,
        vec![
            "Aqua",
            "Salicylic ACID",
            "Niacinamide",
            "Butylene Glycol",
            "CENTELLA Asiatica EXTRACT",
            "Tocopherol (Vitamin E, 0.5%)",
            "Phenoxyethanol",
        ]
    );
}

/// 設定した補正テーブルは組み込みの後に適用される
#[test]
fn test_extract_with_user_correction_table() {
    let dir = tempdir().expect("Failed to create temp dir");
    let table = dir.path().join("corrections.json");
    std::fs::write(
        &table,
        r#"[{"pattern": "\\bPhenoxyethano1\\b", "replacement": "PHENOXYETHANOL"}]"#,
    )
    .unwrap();

    let config = Config {
        correction_table: Some(table),
        ..Default::default()
    };
    let result = extract_with(&config, "INGREDIENTS: Water, Phenoxyethano1");
    assert_eq!(result, vec!["Water", "PHENOXYETHANOL"]);

    let builtin_only = extract_with(&Config::default(), "INGREDIENTS: Water, Phenoxyethano1");
    assert_eq!(builtin_only, vec!["Water", "Phenoxyethano1"]);
}

/// 抽出結果をそのまま照合に使える
#[test]
fn test_extracted_names_match_allergens() {
    let ingredients = extract_with(&Config::default(), OCR_TRANSCRIPT);
    let matcher = FuzzyMatcher::new(Config::default().match_threshold);

    let allergens = ["salicylic acid", "centella"];
    let matches = matcher.find_matches(&allergens[..], &ingredients[..]);
    let found: Vec<&str> = matches.iter().map(|m| m.ingredient.as_str()).collect();
    assert_eq!(found, vec!["Salicylic ACID", "CENTELLA Asiatica EXTRACT"]);
}
