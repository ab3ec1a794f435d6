use clap::{Parser, Subcommand};
use crate::ai_provider::AiProvider;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "allerguard")]
#[command(about = "化粧品ラベルの成分抽出・アレルゲン照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AIプロバイダ (ollama/claude/codex/gemini)。省略時は設定ファイルの値
    #[arg(long, global = true)]
    pub ai_provider: Option<AiProvider>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ラベル画像1枚を解析
    Scan {
        /// ラベル画像のパス
        #[arg(required = true)]
        image: PathBuf,

        /// 照合するアレルゲン（複数指定可）
        #[arg(short, long = "allergen")]
        allergens: Vec<String>,

        /// 保存済みのアレルゲンも使う
        #[arg(short, long)]
        profile: bool,

        /// 出力JSONファイル（デフォルト: 画像名.allerguard.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// OCRキャッシュを使用
        #[arg(long)]
        use_cache: bool,
    },

    /// フォルダ内のラベル画像をまとめて解析
    Batch {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 照合するアレルゲン（複数指定可）
        #[arg(short, long = "allergen")]
        allergens: Vec<String>,

        /// 保存済みのアレルゲンも使う
        #[arg(short, long)]
        profile: bool,

        /// 出力ディレクトリ（デフォルト: 入力フォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// OCRキャッシュを使用
        #[arg(long)]
        use_cache: bool,

        /// 同時に処理する画像数
        #[arg(short, long, default_value = "2")]
        jobs: usize,
    },

    /// OCR済みテキストから成分を抽出（"-" で標準入力）
    Extract {
        #[arg(required = true)]
        input: PathBuf,
    },

    /// アレルゲンと成分名を照合
    Match {
        allergen: String,
        ingredient: String,
    },

    /// 保存済みアレルゲンの管理
    Profile {
        /// 追加
        #[arg(long)]
        add: Vec<String>,

        /// 削除
        #[arg(long)]
        remove: Vec<String>,

        /// すべて削除
        #[arg(long)]
        clear: bool,

        /// 一覧を表示
        #[arg(long)]
        show: bool,

        /// 対話式で編集
        #[arg(short, long)]
        interactive: bool,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// モデルを設定
        #[arg(long)]
        set_model: Option<String>,

        /// AIプロバイダを設定
        #[arg(long)]
        set_provider: Option<AiProvider>,
    },

    /// OCRキャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

/// コマンドラインと保存済みプロフィールのアレルゲンを合わせる（大文字小文字を無視して重複除去）
pub fn collect_allergens(explicit: &[String], profile: Option<&[String]>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    explicit
        .iter()
        .chain(profile.unwrap_or_default())
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// 画像ごとのレポートファイル名
pub fn report_file_name(image: &std::path::Path) -> String {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "label".to_string());
    format!("{}.allerguard.json", stem)
}
