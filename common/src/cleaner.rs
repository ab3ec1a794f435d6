//! OCRテキストのクリーニング
//!
//! 適用順序は固定（後段は前段で結合済みのトークンを前提にする）:
//! 1. 行末ハイフンの折り返し修復
//! 2. 誤読補正テーブル（大文字小文字を無視）
//! 3. 分割された複合成分名の再結合
//! 4. タイ文字の1文字ずつの空白を除去

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 組み込みの誤読補正ルール（上から順に適用。具体的なものを先に置く）
const BUILTIN_CORRECTIONS: &[(&str, &str)] = &[
    // ACID
    (r"\b0\s*ได\s*acid\b", "SALICYLIC ACID"),
    (r"\b0\s*ได\b", "SALICYLIC"),
    (r"\bpid\b", "ACID"),
    (r"'Acid\b", "ACID"),
    // GLYCOL
    (r"\bCapryly\s+wool\b", "CAPRYLYL GLYCOL"),
    (r"\bwool\b", "GLYCOL"),
    (r"\bCapryly\b", "CAPRYLYL"),
    // LEAF
    (r"\bLeaf\s+leal\b", "LEAF"),
    (r"\bleal\b", "LEAF"),
    // EXTRACT
    (r"\bwer\s+Extract\b", "EXTRACT"),
    (r"\bwer(\s*[,.])", "EXTRACT$1"),
    // 成分名
    (r"\bexyiglycerin\b", "ETHYLHEXYLGLYCERIN"),
    (r"\bbirlower\b", "SAFFLOWER"),
    (r"\bAlternifolio\b", "ALTERNIFOLIA"),
    (r"\bCentelia\b", "CENTELLA"),
    (r"\bNobili\b", "NOBILIS"),
    (r"\bCameliia\b", "CAMELLIA"),
    (r"\blsomerized\b", "ISOMERIZED"),
    (r"\bPalmitoy'", "PALMITOYL"),
    // 単独のゴミ文字
    (r"\bAi,\s+", ""),
    (r"\bM,\s+", ""),
    (r"\bq\s+", ""),
    // 成分名に混入するタイ語の誤読
    (r"สหกรดตทานทา\s+", ""),
    (r"ตร์ญ่\s+", ""),
    (r"ไผดิอน\s+\d+", ""),
];

/// OCRで分割されやすい複合成分名（前半の候補, 後半）
const COMPOUND_TERMS: &[(&str, &str)] = &[
    (
        "HYALURONIC|SALICYLIC|ASCORBIC|PALMITIC|STEARIC|CITRIC|LACTIC|GLYCOLIC|SAFFLOWER",
        "ACID",
    ),
    (
        "BUTYLENE|PROPYLENE|ETHYLENE|HEXYLENE|CAPRYLYL|DIPROPYLENE",
        "GLYCOL",
    ),
    ("MELALEUCA", "ALTERNIFOLIA"),
    ("TEA", "TREE"),
    ("SHEA", "BUTTER"),
    ("ANTHEMIS", "NOBILIS"),
    ("FUCUS", "VESICULOSUS"),
    ("CAMELLIA", "SINENSIS"),
    ("CENTELLA", "ASIATICA"),
];

/// 反復回数の下限（補正の連鎖は1回につき1段しか進まない）
///
/// 実際の上限は入力の語数と比べて大きい方。利用者のテーブルが循環した場合の歯止め。
const MIN_PASS_LIMIT: usize = 64;

lazy_static! {
    static ref BUILTIN_TABLE: CorrectionTable = CorrectionTable::from_pairs(BUILTIN_CORRECTIONS).unwrap();
    static ref COMPOUND_RES: Vec<Regex> = COMPOUND_TERMS
        .iter()
        .map(|(head, tail)| {
            RegexBuilder::new(&format!(r"\b({})\s+({})\b", head, tail))
                .case_insensitive(true)
                .build()
                .unwrap()
        })
        .collect();
    static ref LINE_WRAP_RE: Regex = Regex::new(r"(\w)-[ \t]*\r?\n[ \t]*(\w)").unwrap();
    static ref THAI_SPACED_RE: Regex = Regex::new(r"([\x{0E01}-\x{0E59}])[ \t]+([\x{0E01}-\x{0E59}])").unwrap();
    static ref JUNK_SYMBOL_RE: Regex = Regex::new(r"[|¦¬§©®™]").unwrap();
    static ref HSPACE_RE: Regex = Regex::new(r"[ \t\x{00A0}]+").unwrap();
}

/// 補正ルール（JSON定義用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

/// OCR誤読補正テーブル
///
/// (パターン, 置換) の順序付きリスト。制御フローを変えずに拡張できるよう、
/// 組み込みルールの後ろにJSONのルールを追加できる。
#[derive(Debug, Clone, Default)]
pub struct CorrectionTable {
    rules: Vec<(Regex, String)>,
}

impl CorrectionTable {
    /// 組み込みテーブル
    pub fn builtin() -> Self {
        BUILTIN_TABLE.clone()
    }

    /// (パターン, 置換) の組からテーブルを構築
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let rules = pairs
            .iter()
            .map(|(pattern, replacement)| compile_rule(pattern, replacement))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// JSON文字列から読み込み
    ///
    /// 形式: `[{"pattern": "...", "replacement": "..."}]`
    pub fn from_json(json: &str) -> Result<Self> {
        let defs: Vec<CorrectionRule> = serde_json::from_str(json)?;
        let rules = defs
            .iter()
            .map(|d| compile_rule(&d.pattern, &d.replacement))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// 末尾にルールを追加
    pub fn extend(&mut self, other: CorrectionTable) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 全ルールを順に適用
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (re, replacement) in &self.rules {
            result = re.replace_all(&result, replacement.as_str()).into_owned();
        }
        result
    }
}

fn compile_rule(pattern: &str, replacement: &str) -> Result<(Regex, String)> {
    if pattern.trim().is_empty() {
        return Err(Error::Config("補正パターンが空です".into()));
    }
    let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok((re, replacement.to_string()))
}

/// OCRテキストクリーナー（副作用なし・失敗しない）
#[derive(Debug, Clone)]
pub struct TextCleaner {
    corrections: CorrectionTable,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new(CorrectionTable::builtin())
    }
}

impl TextCleaner {
    pub fn new(corrections: CorrectionTable) -> Self {
        Self { corrections }
    }

    /// クリーニングを実行
    ///
    /// 補正後に新たなパターンが現れる場合があるため、変化がなくなるまで繰り返す。
    /// 結果に再適用しても変化しない。
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.replace("\r\n", "\n");
        let limit = MIN_PASS_LIMIT.max(text.split_whitespace().count() + 1);
        for _ in 0..limit {
            let next = self.apply_passes(&text);
            if next == text {
                break;
            }
            text = next;
        }
        text
    }

    fn apply_passes(&self, text: &str) -> String {
        // 1. 折り返し修復
        let text = LINE_WRAP_RE.replace_all(text, "${1}${2}");

        // 2. 誤読補正
        let text = self.corrections.apply(&text);

        // 3. 複合成分名の再結合
        let mut text = text;
        for re in COMPOUND_RES.iter() {
            text = re.replace_all(&text, "${1} ${2}").into_owned();
        }

        // 4. タイ文字の空白除去（重なる一致があるため収束まで）
        while THAI_SPACED_RE.is_match(&text) {
            text = THAI_SPACED_RE.replace_all(&text, "${1}${2}").into_owned();
        }

        let text = JUNK_SYMBOL_RE.replace_all(&text, " ");
        let text = HSPACE_RE.replace_all(&text, " ");

        text.lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_wrap_repair() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("PHENOXY-\nETHANOL, WATER"), "PHENOXYETHANOL, WATER");
        assert_eq!(cleaner.clean("Ethylhexyl-  \n  glycerin"), "Ethylhexylglycerin");
    }

    #[test]
    fn test_misread_corrections() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("Capryly wool"), "CAPRYLYL GLYCOL");
        assert_eq!(cleaner.clean("Salicylic pid"), "Salicylic ACID");
        assert_eq!(cleaner.clean("Melaleuca Alternifolio"), "Melaleuca ALTERNIFOLIA");
        assert_eq!(cleaner.clean("Centelia Asiatica wer, Water"), "CENTELLA Asiatica EXTRACT, Water");
    }

    #[test]
    fn test_compound_refusion_keeps_case() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("Salicylic   Acid"), "Salicylic Acid");
        assert_eq!(cleaner.clean("HYALURONIC\nACID"), "HYALURONIC ACID");
        assert_eq!(cleaner.clean("Shea \n Butter"), "Shea Butter");
    }

    #[test]
    fn test_thai_spaced_text() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("ส่ ว น ผ ส ม: น้ำ"), "ส่วนผสม: น้ำ");
    }

    #[test]
    fn test_lines_are_kept() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("WATER\n\tGLYCERIN  \nNIACINAMIDE"), "WATER\nGLYCERIN\nNIACINAMIDE");
    }

    #[test]
    fn test_junk_symbols_removed() {
        let cleaner = TextCleaner::default();
        assert_eq!(cleaner.clean("| WATER ® |"), "WATER");
    }

    #[test]
    fn test_unmatched_text_untouched() {
        let cleaner = TextCleaner::default();
        let text = "INGREDIENTS: Water, Glycerin, Niacinamide";
        assert_eq!(cleaner.clean(text), text);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let cleaner = TextCleaner::default();
        let samples = [
            "INGREDIENTS: Water, Salicylic\nAcid, Capryly wool, PHENOXY-\nETHANOL",
            "ส ่ ว น ป ร ะ ก อ บ : Aqua, Tea  Tree Leaf leal Oil",
            "q Ai, M, GLYCERIN; 0 ได acid",
            "INGREDIENTS: wer wer wer wer wer Extract, Water",
            "",
        ];
        for sample in samples {
            let once = cleaner.clean(sample);
            assert_eq!(cleaner.clean(&once), once, "not a fixed point: {:?}", sample);
        }
    }

    #[test]
    fn test_long_misread_chain_collapses() {
        let cleaner = TextCleaner::default();
        let chain = format!("INGREDIENTS: {}Extract, Water", "wer ".repeat(80));
        assert_eq!(cleaner.clean(&chain), "INGREDIENTS: EXTRACT, Water");
    }

    #[test]
    fn test_table_from_json_and_extend() {
        let extra = CorrectionTable::from_json(
            r#"[{"pattern": "\\bNiacinamlde\\b", "replacement": "NIACINAMIDE"}]"#,
        )
        .unwrap();
        assert_eq!(extra.len(), 1);

        let mut table = CorrectionTable::builtin();
        let builtin_len = table.len();
        table.extend(extra);
        assert_eq!(table.len(), builtin_len + 1);

        let cleaner = TextCleaner::new(table);
        assert_eq!(cleaner.clean("niacinamlde"), "NIACINAMIDE");
    }

    #[test]
    fn test_table_rejects_bad_pattern() {
        assert!(CorrectionTable::from_json(r#"[{"pattern": "(oops", "replacement": ""}]"#).is_err());
        assert!(CorrectionTable::from_json(r#"[{"pattern": "  ", "replacement": ""}]"#).is_err());
        assert!(CorrectionTable::from_json("not json").is_err());
    }
}
