use super::preprocess::{load_oriented, preprocess};
use super::TextRecognizer;
use crate::config::Config;
use crate::error::{AllerGuardError, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

/// tesseract コマンドによるOCR
///
/// 前処理した画像を一時PNGに書き出し、`--oem 3 --psm 4` で認識する。
pub struct TesseractOcr {
    command: String,
    languages: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.ocr_languages.clone())
    }

    fn args(&self, image: &Path) -> Vec<String> {
        vec![
            image.display().to_string(),
            "stdout".into(),
            "-l".into(),
            self.languages.clone(),
            "--oem".into(),
            "3".into(),
            "--psm".into(),
            "4".into(),
        ]
    }
}

/// 前処理済み画像を一時ファイルに書き出す（ファイルは戻り値の破棄で削除）
fn write_preprocessed(path: PathBuf) -> Result<NamedTempFile> {
    let img = load_oriented(&path)?;
    let binary = preprocess(&img);

    let temp = tempfile::Builder::new()
        .prefix("allerguard-ocr-")
        .suffix(".png")
        .tempfile()?;
    DynamicImage::ImageLuma8(binary)
        .save_with_format(temp.path(), ImageFormat::Png)
        .map_err(|e| AllerGuardError::Ocr(format!("前処理画像の保存に失敗: {}", e)))?;
    Ok(temp)
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String> {
        if !image.is_file() {
            return Err(AllerGuardError::ImageRead(format!(
                "画像が見つかりません: {}",
                image.display()
            )));
        }

        let start = Instant::now();
        let path = image.to_path_buf();
        let temp = tokio::task::spawn_blocking(move || write_preprocessed(path))
            .await
            .map_err(|e| AllerGuardError::Ocr(format!("前処理タスクが失敗: {}", e)))??;

        let output = Command::new(&self.command)
            .args(self.args(temp.path()))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AllerGuardError::Ocr(format!("{} を起動できません: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AllerGuardError::Ocr(format!(
                "{} failed (code {:?}): {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(
            image = %image.display(),
            chars = text.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR完了"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_arguments() {
        let ocr = TesseractOcr::new("tesseract", "eng+tha");
        let args = ocr.args(Path::new("/tmp/label.png"));
        assert_eq!(
            args,
            vec!["/tmp/label.png", "stdout", "-l", "eng+tha", "--oem", "3", "--psm", "4"]
        );
    }

    #[tokio::test]
    async fn test_missing_image_is_image_read_error() {
        let ocr = TesseractOcr::new("tesseract", "eng");
        let err = ocr.recognize(Path::new("/nonexistent/label.jpg")).await.unwrap_err();
        assert!(matches!(err, AllerGuardError::ImageRead(_)));
    }

    #[tokio::test]
    async fn test_unreadable_image_is_image_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        std::fs::write(&path, b"garbage").unwrap();

        let ocr = TesseractOcr::new("tesseract", "eng");
        let err = ocr.recognize(&path).await.unwrap_err();
        assert!(matches!(err, AllerGuardError::ImageRead(_)));
    }

    #[tokio::test]
    async fn test_missing_engine_is_ocr_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.png");
        image::GrayImage::new(8, 8).save(&path).unwrap();

        let ocr = TesseractOcr::new("allerguard-no-such-tesseract", "eng");
        let err = ocr.recognize(&path).await.unwrap_err();
        assert!(matches!(err, AllerGuardError::Ocr(_)));
    }
}
