//! 対話式のアレルゲン登録
//!
//! 1行ずつアレルゲンを入力し、設定ファイルのプロフィールに保存する。

use crate::config::Config;
use crate::error::{AllerGuardError, Result};
use dialoguer::Input;

/// 入力1行に対する操作
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAction {
    /// アレルゲンを追加（カンマ区切りで複数可）
    Add(Vec<String>),
    /// 先頭に "-" を付けた名前を削除
    Remove(String),
    /// 現在の一覧を表示
    List,
    /// 保存して終了
    Quit,
}

/// 入力行を操作に変換
pub fn parse_action(input: &str) -> ProfileAction {
    let trimmed = input.trim();
    match trimmed {
        "" | "q" | "Q" => ProfileAction::Quit,
        "l" | "L" => ProfileAction::List,
        _ => {
            if let Some(name) = trimmed.strip_prefix('-') {
                return ProfileAction::Remove(name.trim().to_string());
            }
            ProfileAction::Add(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        }
    }
}

/// 操作を設定に反映し、表示用メッセージを返す
pub fn apply_action(config: &mut Config, action: &ProfileAction) -> Vec<String> {
    match action {
        ProfileAction::Add(names) => names
            .iter()
            .map(|name| {
                if config.add_allergen(name) {
                    format!("  + {}", name)
                } else {
                    format!("  = {} (登録済み)", name)
                }
            })
            .collect(),
        ProfileAction::Remove(name) => {
            if config.remove_allergen(name) {
                vec![format!("  - {}", name)]
            } else {
                vec![format!("  {} は登録されていません", name)]
            }
        }
        ProfileAction::List => describe(config),
        ProfileAction::Quit => Vec::new(),
    }
}

/// 登録済みアレルゲンの一覧表示
pub fn describe(config: &Config) -> Vec<String> {
    if config.allergens.is_empty() {
        return vec!["  (アレルゲン未登録)".to_string()];
    }
    config
        .allergens
        .iter()
        .enumerate()
        .map(|(i, a)| format!("  {}. {}", i + 1, a))
        .collect()
}

/// 対話式でプロフィールを編集して保存
pub fn run_interactive_profile(config: &mut Config) -> Result<()> {
    println!("🧴 アレルゲン登録");
    println!("---");
    println!("操作: 名前で追加（カンマ区切り可） [-名前]削除 [l]一覧 [Enter/q]保存して終了");
    println!("---\n");

    for line in describe(config) {
        println!("{}", line);
    }
    println!();

    loop {
        let input: String = Input::new()
            .with_prompt("アレルゲン")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| AllerGuardError::Config(e.to_string()))?;

        let action = parse_action(&input);
        if action == ProfileAction::Quit {
            break;
        }
        for line in apply_action(config, &action) {
            println!("{}", line);
        }
    }

    config.save()?;
    println!("\n✓ 保存しました ({}件)", config.allergens.len());
    Ok(())
}
