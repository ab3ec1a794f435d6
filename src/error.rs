use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllerGuardError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("画像読み込みエラー: {0}")]
    ImageRead(String),

    #[error("OCRエラー: {0}")]
    Ocr(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("タイムアウト: {stage} ({seconds}秒)")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] allerguard_common::Error),
}

pub type Result<T> = std::result::Result<T, AllerGuardError>;
