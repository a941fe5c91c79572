use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Longest edge after down-scaling, in pixels.
    pub max_edge: u32,
    /// Threshold to pure black/white after the contrast stretch.
    pub binarize: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self { max_edge: 2800, binarize: false }
    }
}

/// Decode a rendered page (PNG / JPEG / …), normalize it, and return PNG bytes for OCR.
pub fn prepare_for_ocr_from_bytes(
    data: &[u8],
    options: &PreprocessOptions,
) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img, options))
}

/// Down-scale, grayscale, contrast stretch, and optionally binarize.
fn normalize(img: DynamicImage, options: &PreprocessOptions) -> DynamicImage {
    let img = if img.width() > options.max_edge || img.height() > options.max_edge {
        img.resize(options.max_edge, options.max_edge, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    if !options.binarize {
        return DynamicImage::ImageLuma8(stretched);
    }

    let threshold = otsu_threshold(&stretched);
    let binary: GrayImage = ImageBuffer::from_fn(stretched.width(), stretched.height(), |x, y| {
        Luma([if stretched.get_pixel(x, y)[0] > threshold { 255 } else { 0 }])
    });
    DynamicImage::ImageLuma8(binary)
}

/// Threshold that maximizes between-class variance of the histogram.
fn otsu_threshold(img: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in img.pixels() {
        histogram[p[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum();

    let (mut background, mut background_sum) = (0u64, 0f64);
    let (mut best, mut best_variance) = (0u8, 0f64);

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
        let mean_f = (weighted_sum - background_sum) / foreground as f64;
        let variance = background as f64 * foreground as f64 * (mean_b - mean_f).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best = level as u8;
        }
    }
    best
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |_, _| Luma([value]));
        DynamicImage::ImageLuma8(img)
    }

    fn gradient_gray(width: u32, height: u32) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width) as u8])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn uniform_page_is_left_alone() {
        let result = normalize(solid_gray(10, 10, 128), &PreprocessOptions::default());
        assert_eq!(result.width(), 10);
        assert!(result.to_luma8().pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn gradient_stretches_to_full_range() {
        let result = normalize(gradient_gray(256, 1), &PreprocessOptions::default());
        let gray = result.to_luma8();
        assert_eq!(gray.pixels().map(|p| p[0]).min().unwrap(), 0);
        assert_eq!(gray.pixels().map(|p| p[0]).max().unwrap(), 255);
    }

    #[test]
    fn binarize_leaves_two_levels() {
        let options = PreprocessOptions { binarize: true, ..Default::default() };
        let gray = normalize(gradient_gray(64, 4), &options).to_luma8();
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(gray.pixels().any(|p| p[0] == 0));
        assert!(gray.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let img: GrayImage = ImageBuffer::from_fn(10, 1, |x, _| Luma([if x < 5 { 20 } else { 220 }]));
        let t = otsu_threshold(&img);
        assert!((20..220).contains(&t));
    }

    #[test]
    fn prepare_from_bytes_produces_png_header() {
        let mut png_bytes = Vec::new();
        solid_gray(4, 4, 100)
            .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .unwrap();
        let result = prepare_for_ocr_from_bytes(&png_bytes, &PreprocessOptions::default()).unwrap();
        assert_eq!(&result[..4], b"\x89PNG");
    }

    #[test]
    fn large_page_is_resized() {
        let img: GrayImage = ImageBuffer::from_fn(1200, 600, |_, _| Luma([200u8]));
        let options = PreprocessOptions { max_edge: 800, ..Default::default() };
        let result = normalize(DynamicImage::ImageLuma8(img), &options);
        assert!(result.width() <= 800 && result.height() <= 800);
    }

    #[test]
    fn undecodable_bytes_are_a_load_error() {
        let r = prepare_for_ocr_from_bytes(b"nope", &PreprocessOptions::default());
        assert!(matches!(r, Err(PreprocessError::Load(_))));
    }
}
