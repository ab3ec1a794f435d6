use crate::error::{AllerGuardError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// ラベル画像
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// フォルダ直下のラベル画像を列挙（ファイル名順）
pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(AllerGuardError::FolderNotFound(folder.display().to_string()));
    }

    let mut images: Vec<ImageInfo> = WalkDir::new(folder)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image_path(e.path()))
        .map(|e| ImageInfo {
            path: e.path().to_path_buf(),
            file_name: e.file_name().to_string_lossy().to_string(),
        })
        .collect();

    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(images)
}

/// 拡張子が対応画像形式か（大文字小文字を無視）
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("label.jpg")));
        assert!(is_image_path(Path::new("label.JPG")));
        assert!(is_image_path(Path::new("label.jpeg")));
        assert!(is_image_path(Path::new("label.png")));
        assert!(!is_image_path(Path::new("label.txt")));
        assert!(!is_image_path(Path::new("label.gif")));
        assert!(!is_image_path(Path::new("label")));
    }

    #[test]
    fn test_scan_folder_with_images() {
        let dir = tempfile::tempdir().unwrap();

        File::create(dir.path().join("serum.jpg")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("cream.JPG")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("toner.png")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("notes.txt")).unwrap().write_all(b"text").unwrap();
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        let names: Vec<&str> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["cream.JPG", "serum.jpg", "toner.png"]);
    }

    #[test]
    fn test_scan_folder_does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        File::create(sub.join("inner.jpg")).unwrap();
        File::create(dir.path().join("outer.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].file_name, "outer.jpg");
    }
}
