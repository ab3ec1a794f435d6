//! AIレスポンスパーサー
//!
//! 正規化サービスのJSON応答と、詳細解析サービスの自由記述応答をパースする。
//! 解析応答は「---」区切りのブロックを1成分ずつ読む、ベストエフォートのパーサー。
//! 1件も読めなかった場合はエラーとし、呼び出し側が定型の解析結果に切り替える。

use crate::error::{Error, Result};
use crate::types::{AllergenQuery, AnalysisRecord, AnalysisSource, NormalizedEntry, RiskLevel};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BLOCK_SEPARATOR_RE: Regex = Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*$").unwrap();
    static ref NUMBERED_LINE_RE: Regex = Regex::new(r"^\s*\d+[.)]").unwrap();
    static ref SECTION_HEADER_RE: Regex = Regex::new(
        r"(?i)^\s*(?:\d+[.)]\s*)?[#*\s]*(ingredient name|ingredient|name|ชื่อสาร|ส่วนผสม|symptoms?|description|อาการที่อาจเกิด|อาการ|risk level|risk|ระดับความเสี่ยง|recommendations?|คำแนะนำ|alternatives?|ทางเลือก|สารทดแทน)[*\s]*[:：]\s*(.*)$"
    )
    .unwrap();
    static ref LEADING_NAME_RE: Regex = Regex::new(r"^[#*\s]*([A-Z][A-Za-z0-9\-,'()/ ]+?)[*:\s]*$").unwrap();
    static ref BULLET_RE: Regex = Regex::new(r"^\s*(?:[-•*]|\d+[.)])\s+(.+)$").unwrap();
}

/// 正規化しない成分の信頼度
pub const FALLBACK_CONFIDENCE: &str = "ต่ำ";

/// 定型の症状テキスト
const FALLBACK_SYMPTOMS: &str =
    "May cause irritation, redness, itching or an allergic reaction in people sensitive to";
/// 定型の推奨テキスト
const FALLBACK_RECOMMENDATION: &str =
    "Avoid this ingredient and consult a dermatologist or pharmacist before using the product.";

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の [...] 配列
/// 3. エラー
///
/// # Examples
/// ```
/// use allerguard_common::extract_json;
///
/// let response = "Result: [{\"original\": \"Aqua\"}]";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('['));
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + "```json".len();
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('[') {
        if let Some(end) = response.rfind(']') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 正規化レスポンスをパース
///
/// 件数が入力と一致しない応答（途中で切れた応答を含む）はエラー。
pub fn parse_normalize_response(response: &str, expected_len: usize) -> Result<Vec<NormalizedEntry>> {
    let json_str = extract_json(response)?;
    let entries: Vec<NormalizedEntry> = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("正規化 JSONパースエラー: {}", e)))?;

    if entries.is_empty() {
        return Err(Error::Parse("正規化の応答が空です".into()));
    }
    if entries.len() != expected_len {
        return Err(Error::Parse(format!(
            "正規化の件数が一致しません: 期待 {} 件, 応答 {} 件",
            expected_len,
            entries.len()
        )));
    }
    Ok(entries)
}

/// 正規化しない場合のエントリ（元の名前をそのまま使う）
pub fn passthrough_entries(names: &[String]) -> Vec<NormalizedEntry> {
    names
        .iter()
        .map(|name| NormalizedEntry {
            original: name.clone(),
            corrected: name.clone(),
            confidence: FALLBACK_CONFIDENCE.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Symptoms,
    Risk,
    Recommendation,
    Alternatives,
}

#[derive(Debug, Default)]
struct BlockFields {
    /// 「INGREDIENT:」等のラベル付きの成分名
    name: Option<String>,
    /// ラベルなしの先頭行から推測した成分名（ラベルがあればそちらを優先）
    guessed_name: Option<String>,
    symptoms: Vec<String>,
    risk: Vec<String>,
    recommendation: Vec<String>,
    alternatives: Vec<String>,
}

/// 詳細解析レスポンスをパース
///
/// ブロックごとに成分名・症状・リスク・推奨・代替品を読み取る。
/// 成分名が見つからないブロックは読み飛ばす。1件も読めなければエラー。
pub fn parse_analysis_response(response: &str) -> Result<Vec<AnalysisRecord>> {
    let records: Vec<AnalysisRecord> = BLOCK_SEPARATOR_RE
        .split(response)
        .filter_map(parse_block)
        .collect();

    if records.is_empty() {
        return Err(Error::Parse("解析結果のブロックが見つかりません".into()));
    }
    Ok(records)
}

fn parse_block(block: &str) -> Option<AnalysisRecord> {
    let mut fields = BlockFields::default();
    let mut current: Option<Section> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = SECTION_HEADER_RE.captures(trimmed) {
            let label = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            let rest = clean_value(caps.get(2).map_or("", |m| m.as_str()));

            current = match label.as_str() {
                "ingredient name" | "ingredient" | "name" | "ชื่อสาร" | "ส่วนผสม" => {
                    if fields.name.is_none() && !rest.is_empty() {
                        fields.name = Some(rest);
                    }
                    None
                }
                l if l.starts_with("symptom") || l == "description" || l.starts_with("อาการ") => {
                    push_value(&mut fields.symptoms, rest);
                    Some(Section::Symptoms)
                }
                "risk level" | "risk" | "ระดับความเสี่ยง" => {
                    push_value(&mut fields.risk, rest);
                    Some(Section::Risk)
                }
                l if l.starts_with("recommendation") || l == "คำแนะนำ" => {
                    push_value(&mut fields.recommendation, rest);
                    Some(Section::Recommendation)
                }
                _ => {
                    // 代替品は行内に列挙されることもある
                    fields.alternatives.extend(
                        rest.split(',')
                            .map(clean_value)
                            .filter(|s| !s.is_empty()),
                    );
                    Some(Section::Alternatives)
                }
            };
            continue;
        }

        if current == Some(Section::Alternatives) {
            if let Some(caps) = BULLET_RE.captures(trimmed) {
                push_value(&mut fields.alternatives, clean_value(&caps[1]));
                continue;
            }
        }

        // 次の番号付きセクションで区切る
        if NUMBERED_LINE_RE.is_match(trimmed) {
            current = None;
            continue;
        }

        match current {
            Some(Section::Symptoms) => push_value(&mut fields.symptoms, clean_value(trimmed)),
            Some(Section::Risk) => push_value(&mut fields.risk, clean_value(trimmed)),
            Some(Section::Recommendation) => {
                push_value(&mut fields.recommendation, clean_value(trimmed))
            }
            Some(Section::Alternatives) => current = None,
            None => {
                if fields.guessed_name.is_none() {
                    if let Some(caps) = LEADING_NAME_RE.captures(trimmed) {
                        fields.guessed_name = Some(clean_value(&caps[1]));
                    }
                }
            }
        }
    }

    let name = fields
        .name
        .or(fields.guessed_name)
        .filter(|n| !n.is_empty())?;
    Some(AnalysisRecord {
        ingredient: name,
        symptoms: fields.symptoms.join(" "),
        risk_level: RiskLevel::from_label(&fields.risk.join(" ")),
        recommendation: fields.recommendation.join(" "),
        alternatives: fields.alternatives,
        source: AnalysisSource::Ai,
    })
}

fn clean_value(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == '"')
        .trim()
        .to_string()
}

fn push_value(values: &mut Vec<String>, value: String) {
    if !value.is_empty() {
        values.push(value);
    }
}

/// 定型の解析レコード（解析サービスが使えない場合）
pub fn fallback_record(query: &AllergenQuery) -> AnalysisRecord {
    AnalysisRecord {
        ingredient: query.ingredient.clone(),
        symptoms: format!("{} {}.", FALLBACK_SYMPTOMS, query.user_term),
        risk_level: None,
        recommendation: FALLBACK_RECOMMENDATION.to_string(),
        alternatives: Vec::new(),
        source: AnalysisSource::Fallback,
    }
}

/// 照合ペアごとに定型の解析レコードを生成
pub fn fallback_records(queries: &[AllergenQuery]) -> Vec<AnalysisRecord> {
    queries.iter().map(fallback_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================
    // extract_json テスト
    // =============================================

    #[test]
    fn test_extract_json_with_block() {
        let response = r#"Here is the result:
```json
[
  {"original": "Salicylic 0id", "corrected": "Salicylic Acid", "confidence": "สูง"}
]
```
Done."#;

        let json = extract_json(response).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("Salicylic Acid"));
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = r#"ผลลัพธ์: [{"original": "Aqua"}] จบ"#;
        assert_eq!(extract_json(response).unwrap(), r#"[{"original": "Aqua"}]"#);
    }

    #[test]
    fn test_extract_json_error() {
        assert!(extract_json("no json here").is_err());
        assert!(extract_json("] backwards [").is_err());
    }

    // =============================================
    // 正規化レスポンス テスト
    // =============================================

    #[test]
    fn test_parse_normalize_response() {
        let response = r#"[
            {"original": "Salicylic 0id", "corrected": "Salicylic Acid", "confidence": "สูง"},
            {"original": "Aqua", "corrected": "uncertain", "confidence": "ต่ำ"}
        ]"#;
        let entries = parse_normalize_response(response, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].resolved_name(), "Salicylic Acid");
        assert_eq!(entries[1].resolved_name(), "Aqua");
    }

    #[test]
    fn test_parse_normalize_response_length_mismatch() {
        let response = r#"[{"original": "Aqua", "corrected": "Aqua", "confidence": "สูง"}]"#;
        let err = parse_normalize_response(response, 3).unwrap_err();
        assert!(err.to_string().contains("件数"));
    }

    #[test]
    fn test_parse_normalize_response_truncated() {
        let response = r#"[{"original": "Aqua", "corrected": "Aq"#;
        assert!(parse_normalize_response(response, 1).is_err());
        assert!(parse_normalize_response("[]", 0).is_err());
    }

    #[test]
    fn test_passthrough_entries() {
        let entries = passthrough_entries(&["Aqua".to_string()]);
        assert_eq!(entries[0].corrected, "Aqua");
        assert_eq!(entries[0].confidence, FALLBACK_CONFIDENCE);
    }

    // =============================================
    // 解析レスポンス テスト
    // =============================================

    const ANALYSIS_REPLY: &str = "\
---
INGREDIENT: Salicylic Acid
1. Symptoms: Redness and peeling
   on sensitive skin.
2. Risk Level: สูง
3. Recommendation: Avoid leave-on products.
4. Alternatives:
- Mandelic Acid
- Azelaic Acid
---
**Methylparaben**
1. อาการ: ผื่นคัน
2. ระดับความเสี่ยง: ปานกลาง
3. คำแนะนำ: ทดสอบก่อนใช้
---
Overall the product is not suitable.
---";

    #[test]
    fn test_parse_analysis_response_blocks() {
        let records = parse_analysis_response(ANALYSIS_REPLY).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.ingredient, "Salicylic Acid");
        assert_eq!(first.symptoms, "Redness and peeling on sensitive skin.");
        assert_eq!(first.risk_level, Some(RiskLevel::High));
        assert_eq!(first.recommendation, "Avoid leave-on products.");
        assert_eq!(first.alternatives, vec!["Mandelic Acid", "Azelaic Acid"]);
        assert_eq!(first.source, AnalysisSource::Ai);

        let second = &records[1];
        assert_eq!(second.ingredient, "Methylparaben");
        assert_eq!(second.symptoms, "ผื่นคัน");
        assert_eq!(second.risk_level, Some(RiskLevel::Medium));
        assert!(second.alternatives.is_empty());
    }

    #[test]
    fn test_parse_analysis_label_beats_preamble() {
        let reply = "Sure, here is the analysis:\nINGREDIENT: Salicylic Acid\n1. Symptoms: Redness\n2. Risk Level: low\n---";
        let records = parse_analysis_response(reply).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ingredient, "Salicylic Acid");
        assert_eq!(records[0].symptoms, "Redness");
        assert_eq!(records[0].risk_level, Some(RiskLevel::Low));

        // ラベルがなければ先頭行を成分名とみなす
        let records = parse_analysis_response("Methylparaben\n1. Symptoms: itching").unwrap();
        assert_eq!(records[0].ingredient, "Methylparaben");
    }

    #[test]
    fn test_parse_analysis_inline_alternatives() {
        let reply = "Name: Fragrance\nRisk: low\nAlternatives: Fragrance-free lotion, Plain petrolatum";
        let records = parse_analysis_response(reply).unwrap();
        assert_eq!(records[0].risk_level, Some(RiskLevel::Low));
        assert_eq!(records[0].alternatives, vec!["Fragrance-free lotion", "Plain petrolatum"]);
    }

    #[test]
    fn test_parse_analysis_unparseable() {
        assert!(parse_analysis_response("").is_err());
        assert!(parse_analysis_response("ขออภัย ไม่สามารถวิเคราะห์ได้").is_err());
        assert!(parse_analysis_response("---\n1. Symptoms: itching\n---").is_err());
    }

    #[test]
    fn test_fallback_records() {
        let queries = vec![AllergenQuery {
            ingredient: "SALICYLIC ACID".to_string(),
            user_term: "salicylic acid".to_string(),
        }];
        let records = fallback_records(&queries);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ingredient, "SALICYLIC ACID");
        assert_eq!(records[0].source, AnalysisSource::Fallback);
        assert!(records[0].symptoms.ends_with("salicylic acid."));
        assert!(records[0].recommendation.contains("dermatologist or pharmacist"));
        assert_eq!(records[0].risk_level, None);
    }
}
