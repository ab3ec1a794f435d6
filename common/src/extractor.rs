//! 成分リスト抽出
//!
//! クリーニング済みテキストから成分セクションを探し、候補に分割して
//! ゴミ・説明文を除去し、OCRで切れた「名前 + ACID」等を再結合する。
//! 出力順はラベル上の順（濃度順の目安）を保つ。

use crate::cleaner::TextCleaner;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// 成分名の最小・最大文字数
const MIN_INGREDIENT_CHARS: usize = 2;
const MAX_INGREDIENT_CHARS: usize = 120;
/// 数字の割合の上限
const MAX_DIGIT_RATIO: f64 = 0.4;

const HEADER_KEYWORDS: &[&str] = &[
    "INGREDIENTS", "INGREDIENT", "lNGREDIENTS", "INGREDlENTS", "INGREDIENTES",
    "ส่วนประกอบ", "ส่วนผสม", "สารสำคัญ", "ดนประกอบ", "สว่นประกอบ", "วนประกอบ",
];

const STOP_WORDS: &[&str] = &[
    "วิธีใช้", "วิธีการใช้", "คำเตือน", "วิธีเก็บ", "การเก็บรักษา",
    "ผลิตโดย", "จัดจำหน่าย", "เลขที่", "BATCH", "LOT", "MFG", "EXP",
    "บรรจุ", "ราคา", "ขนาด", "ข้อควรระวัง", "ประเภท",
    "MADE IN", "DISTRIBUTED", "MANUFACTURED", "IMPORTED",
    "ระวัง", "ห้าม", "หมายเหตุ", "ห้ามใช้", "หยุดใช้", "ไผดิอน",
    "DIRECTIONS", "DIRECTION", "DlRECTIONS", "DIRECTI0NS", "HOW TO USE", "USAGE",
    "CAUTION", "WARNING", "STORAGE",
];

const JUNK_TOKENS: &[&str] = &[
    "wool", "Ai", "pid", "wer", "nr", "a4", "oa", "coe",
    "rites", "oes", "แฟกซี", "Bae", "Oe", "Se", "Ay", "Yr",
];

const INSTRUCTION_WORDS: &[&str] = &["then", "wait", "rinse", "spread", "open", "leave on", "apply", "massage"];

/// 単独で現れたら前の成分に連結する語
const CONTINUATION_WORDS: &[&str] = &["EXTRACT", "ACID", "GLYCOL", "OIL", "BUTTER"];

/// 1行に複数成分が連なっているときの区切りとなる語尾
const SUFFIX_WORDS: &[&str] = &[
    "ACID", "GLYCOL", "EXTRACT", "OIL", "BUTTER", "OXIDE", "CHLORIDE", "SULFATE", "ACETATE", "HYDROXIDE",
];

lazy_static! {
    static ref DEFAULT_EXTRACTOR: IngredientExtractor =
        IngredientExtractor::new(ExtractorVocabulary::default()).unwrap();
    static ref LEADING_JUNK_RE: Regex = Regex::new(r"^[|.'@\s:,\-?#+*•]+").unwrap();
    static ref TRAILING_JUNK_RE: Regex = Regex::new(r"[.'@\s:,\-?#+*•]+$").unwrap();
    static ref SECTION_LEAD_RE: Regex = Regex::new(r"^[\s:：\-–—.]+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref EMPTY_PARENS_RE: Regex = Regex::new(r"\(\s*\)").unwrap();
    static ref NUMBER_ONLY_RE: Regex = Regex::new(r"^\d+\.?$").unwrap();
    static ref PARENTHESIZED_RE: Regex = Regex::new(r"\([^)]*\)").unwrap();
}

/// 抽出に使う語彙（設定データとして注入可能）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorVocabulary {
    /// 成分セクションの見出し（誤読を含む）
    pub header_keywords: Vec<String>,
    /// 成分セクションの終わりを示す語
    pub stop_words: Vec<String>,
    /// OCRのゴミトークン（完全一致で除外）
    pub junk_tokens: Vec<String>,
    /// 使用方法の文に含まれる動詞
    pub instruction_words: Vec<String>,
    pub continuation_words: Vec<String>,
    pub suffix_words: Vec<String>,
}

impl Default for ExtractorVocabulary {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            header_keywords: owned(HEADER_KEYWORDS),
            stop_words: owned(STOP_WORDS),
            junk_tokens: owned(JUNK_TOKENS),
            instruction_words: owned(INSTRUCTION_WORDS),
            continuation_words: owned(CONTINUATION_WORDS),
            suffix_words: owned(SUFFIX_WORDS),
        }
    }
}

/// 分割で得られた成分候補
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateIngredient {
    pub text: String,
    /// 元の分割における位置
    pub position: usize,
}

/// 成分セクションの検出と分割
#[derive(Debug, Clone)]
pub struct IngredientExtractor {
    vocabulary: ExtractorVocabulary,
    header_re: Regex,
    stop_re: Regex,
    instruction_re: Regex,
    suffix_re: Regex,
}

impl Default for IngredientExtractor {
    fn default() -> Self {
        DEFAULT_EXTRACTOR.clone()
    }
}

impl IngredientExtractor {
    pub fn new(vocabulary: ExtractorVocabulary) -> Result<Self, regex::Error> {
        let mut headers = vocabulary.header_keywords.clone();
        // 長い語を先に試す（INGREDIENTS を INGREDIENT より優先）
        headers.sort_by_key(|h| std::cmp::Reverse(h.chars().count()));
        let header_re = alternation(&headers, false)?;
        let stop_re = alternation(&vocabulary.stop_words, true)?;
        let instruction_re = alternation(&vocabulary.instruction_words, true)?;
        let suffix_re = RegexBuilder::new(&format!(
            r"\b({})\s+",
            vocabulary
                .suffix_words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join("|")
        ))
        .case_insensitive(true)
        .build()?;

        Ok(Self {
            vocabulary,
            header_re,
            stop_re,
            instruction_re,
            suffix_re,
        })
    }

    /// 成分セクションを探す
    ///
    /// 見出しが複数ある場合は最後の見出しの直後から。見つからなければ空文字。
    pub fn locate_section<'a>(&self, cleaned: &'a str) -> &'a str {
        let Some(last) = self.header_re.find_iter(cleaned).last() else {
            return "";
        };
        let content = &cleaned[last.end()..];
        match SECTION_LEAD_RE.find(content) {
            Some(m) => &content[m.end()..],
            None => content,
        }
    }

    /// クリーニング済みテキストから成分名のリストを抽出
    pub fn extract(&self, cleaned: &str) -> Vec<String> {
        let section = self.locate_section(cleaned);
        if section.is_empty() {
            return Vec::new();
        }
        self.split_candidates(section)
            .into_iter()
            .map(|c| c.text)
            .collect()
    }

    /// セクションを成分候補に分割
    pub fn split_candidates(&self, section: &str) -> Vec<CandidateIngredient> {
        let mut accepted = Vec::new();

        for (position, fragment) in split_fragments(section).into_iter().enumerate() {
            let fragment = clean_fragment(fragment);
            if fragment.is_empty() {
                continue;
            }

            // 終了語があればその手前だけ残して以降を捨てる
            if let Some(stop) = self.stop_re.find(&fragment) {
                let head = clean_fragment(&fragment[..stop.start()]);
                self.accept(&head, position, &mut accepted);
                break;
            }

            self.accept(&fragment, position, &mut accepted);
        }

        self.merge_continuations(accepted)
    }

    fn accept(&self, fragment: &str, position: usize, accepted: &mut Vec<CandidateIngredient>) {
        if !self.is_valid_ingredient(fragment) {
            return;
        }
        for part in self.split_merged(fragment) {
            let part = clean_fragment(&part);
            if self.is_valid_ingredient(&part) {
                accepted.push(CandidateIngredient { text: part, position });
            }
        }
    }

    /// 成分名として妥当か
    pub fn is_valid_ingredient(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        if !text.chars().any(is_letter) {
            return false;
        }

        let len = text.chars().count();
        if !(MIN_INGREDIENT_CHARS..=MAX_INGREDIENT_CHARS).contains(&len) {
            return false;
        }

        // タイ数字（๐-๙）も数字として数える
        let digits = text.chars().filter(|c| c.is_numeric()).count();
        if digits as f64 > len as f64 * MAX_DIGIT_RATIO {
            return false;
        }

        if self
            .vocabulary
            .junk_tokens
            .iter()
            .any(|junk| junk.to_lowercase() == text.to_lowercase())
        {
            return false;
        }

        if self.stop_re.is_match(text) {
            return false;
        }

        // 括弧の外でタイ文字と英字が同じ語に混在していないか
        let outside = PARENTHESIZED_RE.replace_all(text, " ");
        let mixed = outside.split_whitespace().any(|token| {
            token.chars().any(|c| c.is_ascii_alphabetic()) && token.chars().any(is_thai)
        });
        if mixed {
            return false;
        }

        !self.instruction_re.is_match(text)
    }

    /// 区切りなしで連なった成分を語尾（ACID, OIL 等）の後ろで分ける
    fn split_merged(&self, text: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut last = 0;

        for caps in self.suffix_re.captures_iter(text) {
            let (Some(whole), Some(suffix)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // 括弧書きの注記は前の成分に属する
            if text[whole.end()..].starts_with('(') {
                continue;
            }
            parts.push(text[last..suffix.end()].trim().to_string());
            last = whole.end();
        }

        if parts.is_empty() {
            return vec![text.to_string()];
        }
        let rest = text[last..].trim();
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }
        parts
    }

    /// 単独の ACID/EXTRACT 等を隣の成分と結合する
    fn merge_continuations(&self, items: Vec<CandidateIngredient>) -> Vec<CandidateIngredient> {
        let mut merged: Vec<CandidateIngredient> = Vec::with_capacity(items.len());
        let mut i = 0;

        while i < items.len() {
            let current = &items[i];

            if self.is_continuation(&current.text) {
                if let Some(prev) = merged.last_mut() {
                    let joined = format!("{} {}", prev.text, current.text);
                    if self.is_valid_ingredient(&joined) {
                        prev.text = joined;
                        i += 1;
                        continue;
                    }
                }
            }

            if let Some(next) = items.get(i + 1) {
                if self.is_continuation(&next.text) {
                    let joined = format!("{} {}", current.text, next.text);
                    if self.is_valid_ingredient(&joined) {
                        merged.push(CandidateIngredient {
                            text: joined,
                            position: current.position,
                        });
                        i += 2;
                        continue;
                    }
                }
            }

            merged.push(current.clone());
            i += 1;
        }

        merged
    }

    fn is_continuation(&self, text: &str) -> bool {
        self.vocabulary
            .continuation_words
            .iter()
            .any(|w| w.eq_ignore_ascii_case(text.trim()))
    }
}

/// OCRテキストをクリーニングして成分を抽出（既定の語彙を使用）
pub fn extract_ingredients(raw_text: &str) -> Vec<String> {
    let cleaned = TextCleaner::default().clean(raw_text);
    IngredientExtractor::default().extract(&cleaned)
}

/// 前後の記号・空白を除去し、ゴミ断片なら空文字を返す
pub fn clean_fragment(text: &str) -> String {
    let text = LEADING_JUNK_RE.replace(text, "");
    let text = TRAILING_JUNK_RE.replace(&text, "");
    let text = WHITESPACE_RE.replace_all(&text, " ");

    // 同じ文字の繰り返し（"lllll", "....."）
    let mut chars = text.chars();
    if let Some(first) = chars.next() {
        if text.chars().count() > 1 && chars.all(|c| c == first) {
            return String::new();
        }
    }

    let text = EMPTY_PARENS_RE.replace_all(&text, "");
    let text = text.trim();
    if NUMBER_ONLY_RE.is_match(text) {
        return String::new();
    }
    text.to_string()
}

/// カンマ・セミコロン・改行で分割する
///
/// カンマの後ろで `(` より先に `)` が現れる場合は括弧内とみなして分割しない。
fn split_fragments(section: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;

    for (idx, ch) in section.char_indices() {
        let split = match ch {
            ';' | '\n' => true,
            ',' => !inside_parentheses(&section[idx + 1..]),
            _ => false,
        };
        if split {
            fragments.push(&section[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    fragments.push(&section[start..]);
    fragments
}

fn inside_parentheses(rest: &str) -> bool {
    rest.chars()
        .find(|c| *c == '(' || *c == ')')
        .is_some_and(|c| c == ')')
}

/// 語彙を1つの正規表現にまとめる（大文字小文字を無視）
///
/// word_bounded なら英字の語は単語境界でのみ一致させる（LOT は LOTION を切らない）。
/// 終了語の「部分文字列を含まない」規則はタイ語にだけ文字どおり適用される。
fn alternation(words: &[String], word_bounded: bool) -> Result<Regex, regex::Error> {
    let pattern = words
        .iter()
        .filter(|w| !w.trim().is_empty())
        .map(|w| {
            let escaped = w
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            // 英字の語は単語境界で、タイ語は部分一致で判定する
            if word_bounded && w.is_ascii() {
                format!(r"\b{}\b", escaped)
            } else {
                escaped
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    // 空の語彙は何にも一致しない
    let pattern = if pattern.is_empty() { r"[^\s\S]".to_string() } else { pattern };
    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

fn is_thai(c: char) -> bool {
    ('\u{0E01}'..='\u{0E5B}').contains(&c)
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{0E01}'..='\u{0E4E}').contains(&c)
}
