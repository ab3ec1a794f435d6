//! プロンプト生成モジュール
//!
//! - build_normalize_prompt: OCR成分名の補正用プロンプト（JSON配列で応答）
//! - build_analysis_prompt: 照合済み成分の詳細解析用プロンプト（「---」区切りのブロックで応答）
//!
//! 応答側の形式は parser モジュールと対になっている。

use crate::types::AllergenQuery;

/// 信頼度の選択肢
pub const CONFIDENCE_LEVELS: &[&str] = &["สูง", "กลาง", "ต่ำ"];

/// 正規化プロンプト生成
///
/// # Arguments
/// * `names` - OCRから抽出した成分名（1行1成分）
///
/// # Returns
/// 正規化用のプロンプト文字列
pub fn build_normalize_prompt(names: &[String]) -> String {
    let ingredients_text = names.join("\n");
    let confidence = CONFIDENCE_LEVELS.join(" | ");
    let count = names.len();

    format!(
        r#"คุณเป็นเครื่องมือแก้ไขชื่อสารในเครื่องสำอาง

Input คือรายการชื่อสารที่อ่านจาก OCR (อาจมีความผิดพลาด)
แต่ละบรรทัดคือ 1 สาร (ทั้งหมด {count} สาร)

รายการสารจาก OCR:
{ingredients_text}

กฎการทำงาน:
- ประมวลผลทีละ 1 บรรทัด ตามลำดับเดิม
- แก้ไขชื่อสารให้ถูกต้อง (ใช้ชื่อ INCI ภาษาอังกฤษ)
- ถ้าไม่แน่ใจ ให้ corrected = "uncertain"
- ระบุความมั่นใจ: {confidence}
- Output ต้องมี {count} รายการ เท่ากับ Input
- ตอบเป็น JSON เท่านั้น ไม่ต้องมีคำอธิบาย

ตัวอย่าง:
Input: "Salicylic 0id"
Output: {{"original": "Salicylic 0id", "corrected": "Salicylic Acid", "confidence": "สูง"}}

ตอบเป็น JSON Array เท่านั้น:
[
  {{
    "original": "ชื่อเดิม",
    "corrected": "ชื่อที่แก้แล้ว",
    "confidence": "{confidence}"
  }}
]"#
    )
}

/// 詳細解析プロンプト生成
///
/// # Arguments
/// * `ingredients` - 製品の全成分（正規化済み）
/// * `matches` - 照合で一致した (成分, ユーザー入力) の組
///
/// # Returns
/// 詳細解析用のプロンプト文字列
pub fn build_analysis_prompt(ingredients: &[String], matches: &[AllergenQuery]) -> String {
    let ingredient_list = ingredients.join(", ");
    let matched_list = matches
        .iter()
        .map(|m| format!("- {} (ผู้ใช้แพ้: {})", m.ingredient, m.user_term))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"คุณเป็นผู้เชี่ยวชาญด้านส่วนผสมในเครื่องสำอางและการแพ้สารเคมี

ส่วนผสมทั้งหมดของผลิตภัณฑ์:
{ingredient_list}

ส่วนผสมที่ตรงกับสิ่งที่ผู้ใช้แพ้:
{matched_list}

งานของคุณ:
วิเคราะห์ส่วนผสมที่ตรงกับสิ่งที่ผู้ใช้แพ้ทีละรายการ

ตอบกลับตามโครงสร้างนี้เท่านั้น (1 บล็อกต่อ 1 สาร คั่นด้วย ---):
---
INGREDIENT: ชื่อสาร
1. Symptoms: อาการที่อาจเกิดขึ้น
2. Risk Level: high | medium | low
3. Recommendation: คำแนะนำ
4. Alternatives:
- สารทดแทน
---

หมายเหตุ:
- ใช้ชื่อสารตามรายการด้านบน
- ห้ามเพิ่มสารที่ไม่อยู่ในรายการ"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_normalize_prompt_lists_names() {
        let names = vec!["Salicylic 0id".to_string(), "Aqua".to_string()];
        let prompt = build_normalize_prompt(&names);
        assert!(prompt.contains("Salicylic 0id\nAqua"));
        assert!(prompt.contains("Output ต้องมี 2 รายการ"));
        assert!(prompt.contains("\"uncertain\""));
    }

    #[test]
    fn test_build_analysis_prompt_lists_matches() {
        let ingredients = vec!["WATER".to_string(), "SALICYLIC ACID".to_string()];
        let matches = vec![AllergenQuery {
            ingredient: "SALICYLIC ACID".to_string(),
            user_term: "salicylic".to_string(),
        }];
        let prompt = build_analysis_prompt(&ingredients, &matches);
        assert!(prompt.contains("WATER, SALICYLIC ACID"));
        assert!(prompt.contains("- SALICYLIC ACID (ผู้ใช้แพ้: salicylic)"));
        assert!(prompt.contains("INGREDIENT:"));
        assert!(prompt.contains("Risk Level:"));
    }
}
