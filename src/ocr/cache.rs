//! OCR結果キャッシュモジュール
//!
//! 画像のSHA-256をキーにして認識テキストをキャッシュし、
//! 同じ画像の再OCRをスキップする。キャッシュは画像と同じフォルダに置く。

use super::TextRecognizer;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const CACHE_FILE_NAME: &str = ".ocr-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → 認識結果のマップ
    entries: HashMap<String, OcrCacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrCacheEntry {
    pub file_name: String,
    pub file_size: u64,
    /// 認識テキスト（未加工）
    pub text: String,
}

impl OcrCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（読めなければ空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, OcrCache>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                warn!(path = %cache_path.display(), "キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::path(folder))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.entries.get(hash).map(|e| e.text.as_str())
    }

    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, text: String) {
        self.entries.insert(hash, OcrCacheEntry { file_name, file_size, text });
    }

    pub fn entries(&self) -> impl Iterator<Item = &OcrCacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OcrCache {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 画像ファイルのハッシュ（SHA-256, 16進）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let buffer = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&buffer)))
}

/// キャッシュを先に引くOCR
pub struct CachedRecognizer {
    inner: Arc<dyn TextRecognizer>,
    /// フォルダ → 読み込み済みキャッシュ
    caches: Mutex<HashMap<PathBuf, OcrCache>>,
}

impl CachedRecognizer {
    pub fn new(inner: Arc<dyn TextRecognizer>) -> Self {
        Self {
            inner,
            caches: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, folder: &Path, hash: &str) -> Option<String> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches
            .entry(folder.to_path_buf())
            .or_insert_with(|| OcrCache::load(folder))
            .get(hash)
            .map(str::to_string)
    }

    fn store(&self, folder: &Path, image: &Path, hash: String, text: &str) -> Result<()> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        let cache = caches
            .entry(folder.to_path_buf())
            .or_insert_with(|| OcrCache::load(folder));

        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_size = std::fs::metadata(image).map(|m| m.len()).unwrap_or(0);
        cache.insert(hash, file_name, file_size, text.to_string());
        cache.save(folder)
    }
}

#[async_trait]
impl TextRecognizer for CachedRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String> {
        let folder = image.parent().map(Path::to_path_buf).unwrap_or_default();

        // ハッシュ計算失敗時はキャッシュを使わない
        let hash = match compute_file_hash(image) {
            Ok(h) => h,
            Err(_) => return self.inner.recognize(image).await,
        };

        if let Some(text) = self.lookup(&folder, &hash) {
            debug!(image = %image.display(), "OCRキャッシュヒット");
            return Ok(text);
        }

        let text = self.inner.recognize(image).await?;
        if let Err(e) = self.store(&folder, image, hash, &text) {
            warn!(error = %e, "OCRキャッシュの保存に失敗");
        }
        Ok(text)
    }
}
