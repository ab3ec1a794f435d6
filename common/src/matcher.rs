//! アレルゲン名と成分名のあいまい照合
//!
//! ユーザー入力（タイプミス・入力途中・複数形）と製品の成分名を比較し、
//! 判定ラダーの最初に該当した規則で一致とする。

use crate::types::{MatchReason, MatchResult};
use std::collections::HashSet;

/// 既定の類似度しきい値
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// 部分一致として認める最小の被覆率
const MIN_COVERAGE: f64 = 0.5;

/// 複合語への埋め込み判定に必要なアレルゲンの最小文字数
const MIN_EMBEDDED_CHARS: usize = 5;

/// 単数化の後に残す最小文字数
const MIN_STEM_CHARS: usize = 3;

/// 化学物質の分類語（単独では物質を特定できない）
const GENERIC_WORDS: &[&str] = &[
    "ACID", "GLYCOL", "EXTRACT", "OIL", "WATER", "AQUA", "BUTTER",
    "OXIDE", "CHLORIDE", "SULFATE", "ACETATE", "ALCOHOL",
];

/// あいまい照合器
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    threshold: f64,
    generic_words: HashSet<String>,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            generic_words: GENERIC_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// 分類語を差し替える
    pub fn with_generic_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generic_words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_uppercase())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// アレルゲン1件と成分1件を照合
    pub fn match_pair(&self, allergen: &str, ingredient: &str) -> MatchResult {
        let (is_match, score, reason) = self.decide(allergen, ingredient);
        MatchResult {
            allergen: allergen.to_string(),
            ingredient: ingredient.to_string(),
            is_match,
            score,
            reason,
        }
    }

    /// 全組み合わせを照合し、一致したものだけを返す
    pub fn find_matches<A, I>(&self, allergens: &[A], ingredients: &[I]) -> Vec<MatchResult>
    where
        A: AsRef<str>,
        I: AsRef<str>,
    {
        let mut matches = Vec::new();
        for allergen in allergens {
            for ingredient in ingredients {
                let result = self.match_pair(allergen.as_ref(), ingredient.as_ref());
                if result.is_match {
                    tracing::debug!(
                        allergen = %result.allergen,
                        ingredient = %result.ingredient,
                        score = result.score,
                        reason = %result.reason,
                        "アレルゲン一致"
                    );
                    matches.push(result);
                }
            }
        }
        matches
    }

    fn is_generic(&self, word: &str) -> bool {
        self.generic_words.contains(word)
    }

    fn decide(&self, allergen: &str, ingredient: &str) -> (bool, f64, MatchReason) {
        let allergen = normalize(allergen);
        let ingredient = normalize(ingredient);
        let allergen_singular = singularize(&allergen);

        let allergen_words: Vec<&str> = allergen.split(' ').filter(|w| !w.is_empty()).collect();
        let ingredient_words: Vec<&str> = ingredient.split(' ').filter(|w| !w.is_empty()).collect();

        // 分類語1語だけの入力は何とも一致させない
        if allergen_words.len() == 1
            && (self.is_generic(&allergen) || self.is_generic(&allergen_singular))
        {
            return (false, 0.0, MatchReason::GenericTerm);
        }

        // 1. 完全一致（複数形の違いは 2〜4 で拾う）
        if allergen == ingredient {
            return (true, 1.0, MatchReason::Exact);
        }

        let allergen_len = allergen.chars().count();
        let ingredient_len = ingredient.chars().count();

        // 2. 入力途中（アレルゲンが成分名に含まれる）
        if ingredient_len > 0 && ingredient.contains(&allergen) {
            let score = allergen_len as f64 / ingredient_len as f64;
            if score >= MIN_COVERAGE {
                return (
                    true,
                    score,
                    MatchReason::PartialInput {
                        typed: allergen_len,
                        total: ingredient_len,
                    },
                );
            }
        }

        // 3. 成分名がアレルゲン入力に含まれる
        if allergen_len > 0 && allergen.contains(&ingredient) {
            let score = ingredient_len as f64 / allergen_len as f64;
            if score >= MIN_COVERAGE {
                return (true, score, MatchReason::ContainedInAllergen);
            }
        }

        // 4. 複合語の中に埋め込まれたアレルゲン（METHYLPARABEN の PARABEN）
        if allergen_len >= MIN_EMBEDDED_CHARS {
            for word in &ingredient_words {
                let word_singular = singularize(word);
                for allergen_form in [allergen.as_str(), allergen_singular.as_str()] {
                    for word_form in [*word, word_singular.as_str()] {
                        if word_form.is_empty() || !word_form.contains(allergen_form) {
                            continue;
                        }
                        let score =
                            allergen_form.chars().count() as f64 / word_form.chars().count() as f64;
                        if score >= MIN_COVERAGE {
                            return (
                                true,
                                score,
                                MatchReason::EmbeddedWord {
                                    fragment: allergen_form.to_string(),
                                    word: word.to_string(),
                                },
                            );
                        }
                    }
                }
            }
        }

        // 5. 全体の類似度（タイプミス）
        let overall = similarity(&allergen, &ingredient);
        if overall >= self.threshold {
            return (
                true,
                overall,
                MatchReason::Similar {
                    percent: percent(overall),
                },
            );
        }
        let mut best = overall;

        // 6. 1語のアレルゲンを成分名の各単語と比較
        if allergen_words.len() == 1 {
            for word in &ingredient_words {
                let score = similarity(&allergen, word);
                if score >= self.threshold {
                    return (
                        true,
                        score,
                        MatchReason::WordSimilar {
                            word: word.to_string(),
                            percent: percent(score),
                        },
                    );
                }
                best = best.max(score);
            }
        }

        // 7. 複数語: 分類語以外の語が少なくとも1つ一致し、半数以上の語が一致
        if allergen_words.len() > 1 && allergen_words.iter().any(|w| !self.is_generic(w)) {
            let mut matched = 0usize;
            let mut matched_specific = 0usize;

            for allergen_word in &allergen_words {
                let word_best = ingredient_words
                    .iter()
                    .map(|w| similarity(allergen_word, w))
                    .fold(0.0_f64, f64::max);
                if word_best >= self.threshold {
                    matched += 1;
                    if !self.is_generic(allergen_word) {
                        matched_specific += 1;
                    }
                }
            }

            let total = allergen_words.len();
            let ratio = matched as f64 / total as f64;
            if matched_specific > 0 && ratio >= MIN_COVERAGE {
                return (true, ratio, MatchReason::WordOverlap { matched, total });
            }
        }

        // 8. 不一致（診断用に最良のスコアを残す）
        (false, best, MatchReason::NoMatch)
    }
}

/// 既定設定でアレルゲン1件と成分1件を照合
pub fn fuzzy_match(allergen: &str, ingredient: &str) -> MatchResult {
    FuzzyMatcher::default().match_pair(allergen, ingredient)
}

/// 類似度を計算（編集距離ベース、0.0〜1.0）
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// 大文字化・前後空白除去・連続空白の圧縮
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// 末尾の ES / S を取り除く単純な単数化
fn singularize(word: &str) -> String {
    let len = word.chars().count();
    for suffix in ["ES", "S"] {
        if word.ends_with(suffix) && len - suffix.len() >= MIN_STEM_CHARS {
            return word[..word.len() - suffix.len()].to_string();
        }
    }
    word.to_string()
}

fn percent(score: f64) -> u32 {
    (score * 100.0).floor() as u32
}
