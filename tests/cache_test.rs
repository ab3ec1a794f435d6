//! OCRキャッシュテスト
//!
//! 認識結果キャッシュの保存・読み込みと、CachedRecognizer の再OCRスキップを検証

use allerguard::error::{AllerGuardError, Result};
use allerguard::ocr::{compute_file_hash, CachedRecognizer, OcrCache, TextRecognizer, CACHE_FILE_NAME};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// 呼び出し回数を数えるOCR
struct CountingOcr {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingOcr {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl TextRecognizer for CountingOcr {
    async fn recognize(&self, image: &Path) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(AllerGuardError::Ocr("engine crashed".into()));
        }
        let name = image.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Ok(format!("INGREDIENTS: Water ({} #{})", name, n))
    }
}

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = OcrCache::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// キャッシュの保存と読み込み
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = OcrCache::load(dir.path());
    cache.insert(
        "abc123".to_string(),
        "serum.jpg".to_string(),
        1024,
        "INGREDIENTS: Water, Glycerin".to_string(),
    );
    cache.save(dir.path()).expect("キャッシュ保存失敗");
    assert!(dir.path().join(CACHE_FILE_NAME).exists());

    let loaded = OcrCache::load(dir.path());
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get("abc123"), Some("INGREDIENTS: Water, Glycerin"));
    assert!(loaded.get("nonexistent_hash").is_none());

    let entry = loaded.entries().next().expect("エントリがない");
    assert_eq!(entry.file_name, "serum.jpg");
    assert_eq!(entry.file_size, 1024);
}

/// キャッシュの上書き
#[test]
fn test_cache_overwrite() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut cache = OcrCache::load(dir.path());

    cache.insert("same".into(), "a.jpg".into(), 10, "old".into());
    cache.insert("same".into(), "a.jpg".into(), 10, "new".into());

    assert_eq!(cache.get("same"), Some("new"));
    assert_eq!(cache.len(), 1);
}

/// 破損・バージョン違いのキャッシュは空として扱う
#[test]
fn test_cache_corrupted_or_outdated() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache_path = dir.path().join(CACHE_FILE_NAME);

    std::fs::write(&cache_path, "{ invalid json }").unwrap();
    assert!(OcrCache::load(dir.path()).is_empty());

    std::fs::write(
        &cache_path,
        r#"{"version": 99, "entries": {"h": {"file_name": "a.jpg", "file_size": 1, "text": "x"}}}"#,
    )
    .unwrap();
    assert!(OcrCache::load(dir.path()).is_empty());
}

/// キャッシュ削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    assert!(!OcrCache::clear(dir.path()).unwrap());

    OcrCache::default().save(dir.path()).unwrap();
    assert!(OcrCache::clear(dir.path()).unwrap());
    assert!(!dir.path().join(CACHE_FILE_NAME).exists());
}

/// ハッシュは内容で決まる
#[test]
fn test_compute_file_hash() {
    let dir = tempdir().expect("Failed to create temp dir");
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    std::fs::write(&a, b"same bytes").unwrap();
    std::fs::write(&b, b"same bytes").unwrap();

    let hash = compute_file_hash(&a).unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, compute_file_hash(&b).unwrap());

    std::fs::write(&b, b"other bytes").unwrap();
    assert_ne!(hash, compute_file_hash(&b).unwrap());
    assert!(compute_file_hash(&dir.path().join("missing.jpg")).is_err());
}

/// 同じ画像は2回目からキャッシュを返す
#[tokio::test]
async fn test_cached_recognizer_skips_second_ocr() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("serum.jpg");
    std::fs::write(&image, b"fake image").unwrap();

    let inner = CountingOcr::new(false);
    let recognizer = CachedRecognizer::new(inner.clone());

    let first = recognizer.recognize(&image).await.unwrap();
    let second = recognizer.recognize(&image).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

    // ファイルに保存され、別インスタンスからも使える
    let cache = OcrCache::load(dir.path());
    assert_eq!(cache.len(), 1);

    let other = CachedRecognizer::new(inner.clone());
    assert_eq!(other.recognize(&image).await.unwrap(), first);
    assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
}

/// 内容が変わればOCRし直す
#[tokio::test]
async fn test_cached_recognizer_detects_changed_image() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("serum.jpg");
    std::fs::write(&image, b"version 1").unwrap();

    let inner = CountingOcr::new(false);
    let recognizer = CachedRecognizer::new(inner.clone());
    recognizer.recognize(&image).await.unwrap();

    std::fs::write(&image, b"version 2").unwrap();
    recognizer.recognize(&image).await.unwrap();

    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(OcrCache::load(dir.path()).len(), 2);
}

/// OCR失敗はキャッシュしない
#[tokio::test]
async fn test_cached_recognizer_does_not_store_failures() {
    let dir = tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("serum.jpg");
    std::fs::write(&image, b"fake image").unwrap();

    let inner = CountingOcr::new(true);
    let recognizer = CachedRecognizer::new(inner.clone());

    assert!(recognizer.recognize(&image).await.is_err());
    assert!(recognizer.recognize(&image).await.is_err());
    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert!(!dir.path().join(CACHE_FILE_NAME).exists());
}
