//! Turns a normalized ROI into the pixels handed to the recognizer.
//!
//! Cropping is strict: the rectangle is never padded, only clamped so that it
//! is non-empty and inside the image.
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::roi_config::Roi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorOptions {
    /// Crops shorter than this are upscaled before recognition.
    pub min_height: u32,
    /// Crops narrower than this are upscaled before recognition.
    pub min_width: u32,
    pub upscale_factor: u32,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            min_height: 40,
            min_width: 80,
            upscale_factor: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl PixelRect {
    /// Maps a ROI onto an image of the given size.
    ///
    /// The result always satisfies `x < W`, `y < H`, `width >= 1`,
    /// `height >= 1`, `x + width <= W` and `y + height <= H`.
    pub fn from_roi(roi: &Roi, image_width: u32, image_height: u32) -> Self {
        let width = i64::from(image_width.max(1));
        let height = i64::from(image_height.max(1));
        let scale = |ratio: f64, extent: i64| (clamp_unit(ratio) * extent as f64).round() as i64;

        let px = scale(roi.x, width).clamp(0, width - 1);
        let py = scale(roi.y, height).clamp(0, height - 1);
        let pw = scale(roi.w, width).clamp(1, width - px);
        let ph = scale(roi.h, height).clamp(1, height - py);

        Self {
            x: px as u32,
            y: py as u32,
            width: pw as u32,
            height: ph as u32,
        }
    }
}

/// Stretches luminance to the full 0..=255 range. Flat images are left alone.
pub fn stretch_contrast(gray: &mut GrayImage) {
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if hi <= lo {
        return;
    }
    let scale = 255.0 / f32::from(hi - lo);
    let offset = -f32::from(lo) * scale;
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| (f32::from(v) * scale + offset).clamp(0.0, 255.0) as u8)
        .collect();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = lut[usize::from(pixel.0[0])];
    }
}

/// Grayscale, contrast stretch, then back to the three channels recognizers expect.
pub fn enhance_for_ocr(image: &DynamicImage) -> RgbImage {
    let mut gray = image.to_luma8();
    stretch_contrast(&mut gray);
    DynamicImage::ImageLuma8(gray).to_rgb8()
}

/// A region at both stages: the raw crop (after any upscale) and the enhanced input.
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    pub rect: PixelRect,
    pub crop: DynamicImage,
    pub enhanced: RgbImage,
}

#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    options: ExtractorOptions,
}

impl RegionExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    /// Crops exactly to the ROI's clamped pixel rectangle.
    pub fn extract(&self, image: &DynamicImage, roi: &Roi) -> (PixelRect, DynamicImage) {
        let rect = PixelRect::from_roi(roi, image.width(), image.height());
        let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        (rect, crop)
    }

    pub fn needs_upscale(&self, width: u32, height: u32) -> bool {
        self.options.upscale_factor > 1
            && (height < self.options.min_height || width < self.options.min_width)
    }

    pub fn upscale_if_small(&self, crop: DynamicImage) -> DynamicImage {
        let (width, height) = (crop.width(), crop.height());
        if !self.needs_upscale(width, height) {
            return crop;
        }
        let factor = self.options.upscale_factor;
        log::debug!(
            "[EXTRACTOR] upscaling {}x{} crop by {}",
            width,
            height,
            factor
        );
        crop.resize_exact(
            width.saturating_mul(factor),
            height.saturating_mul(factor),
            FilterType::Lanczos3,
        )
    }

    /// Crop, upscale when small, enhance.
    pub fn prepare(&self, image: &DynamicImage, roi: &Roi) -> PreparedRegion {
        let (rect, crop) = self.extract(image, roi);
        let crop = self.upscale_if_small(crop);
        let enhanced = enhance_for_ocr(&crop);
        PreparedRegion {
            rect,
            crop,
            enhanced,
        }
    }
}
