use crate::error::{AllerGuardError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 拡大率
const UPSCALE: u32 = 2;
/// 拡大後の長辺の上限
const MAX_DIMENSION: u32 = 6000;
const BLUR_SIGMA: f32 = 0.8;

/// 画像を読み込み、EXIFの向きを反映する
pub fn load_oriented(path: &Path) -> Result<DynamicImage> {
    let img = image::open(path)
        .map_err(|e| AllerGuardError::ImageRead(format!("{}: {}", path.display(), e)))?;
    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn read_orientation(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let mut bufreader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// OCR向けの前処理: 拡大 → グレースケール → ぼかし → 大津の二値化
pub fn preprocess(img: &DynamicImage) -> GrayImage {
    let (width, height) = (img.width().max(1), img.height().max(1));
    let longest = width.max(height);
    let scale = (UPSCALE as f64).min(MAX_DIMENSION as f64 / longest as f64).max(1.0);
    let (new_w, new_h) = (
        (width as f64 * scale).round() as u32,
        (height as f64 * scale).round() as u32,
    );

    let resized = if (new_w, new_h) == (width, height) {
        img.clone()
    } else {
        img.resize_exact(new_w, new_h, FilterType::CatmullRom)
    };

    let gray = image::imageops::blur(&resized.to_luma8(), BLUR_SIGMA);
    let threshold = otsu_threshold(&gray);

    let mut binary = gray;
    for pixel in binary.pixels_mut() {
        *pixel = if pixel[0] > threshold { Luma([255]) } else { Luma([0]) };
    }
    binary
}

/// 大津の方法で二値化しきい値を求める
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 127;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut background = 0u64;
    let mut background_sum = 0.0;
    let mut best_variance = -1.0;
    let mut best = 0u8;

    for (level, &count) in histogram.iter().enumerate() {
        background += count;
        if background == 0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0 {
            break;
        }
        background_sum += level as f64 * count as f64;

        let mean_b = background_sum / background as f64;
        let mean_f = (weighted_total - background_sum) / foreground as f64;
        let variance = background as f64 * foreground as f64 * (mean_b - mean_f).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best = level as u8;
        }
    }
    best
}
