//! AllerGuard
//!
//! 化粧品ラベル画像から成分表を読み取り、登録したアレルゲンと照合する。
//! 純粋な処理は allerguard-common、外部コマンド・HTTP・ファイルはこのクレート。

pub mod ai_provider;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod profile;
pub mod scanner;

pub use error::{AllerGuardError, Result};
pub use pipeline::{Pipeline, StageTimeouts, ANALYSIS_UNAVAILABLE};
