//! 画像 → テキスト（OCR）
//!
//! - preprocess: EXIFの向き補正・拡大・二値化
//! - tesseract: tesseract コマンドによる認識
//! - cache: 画像ハッシュをキーにした認識結果キャッシュ

mod cache;
mod preprocess;
mod tesseract;

pub use cache::{compute_file_hash, CachedRecognizer, OcrCache, OcrCacheEntry, CACHE_FILE_NAME};
pub use preprocess::{load_oriented, otsu_threshold, preprocess};
pub use tesseract::TesseractOcr;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// OCRエンジン
///
/// パスが不正・読めない画像なら `ImageRead` エラー。それ以外は空文字を含む認識結果を返す。
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String>;
}
