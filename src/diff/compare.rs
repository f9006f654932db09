//! Pixel-level image comparison.

use image::{GenericImageView, Rgba, RgbaImage};

use super::types::DiffResult;
use crate::config::DiffSettings;

/// Outcome of comparing a capture against its golden
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Whether the capture is accepted as matching
    pub matches: bool,
    /// Dimensions differ; no pixel comparison was performed
    pub dimension_mismatch: bool,
    /// Pixels whose colour difference exceeds the threshold
    pub pixels_diff: u64,
    pub total_pixels: u64,
    /// Size of the new capture
    pub actual_size: (u32, u32),
    /// Size of the golden
    pub golden_size: (u32, u32),
    /// Differences highlighted in red over a dimmed golden, on pixel mismatch
    pub diff_image: Option<RgbaImage>,
}

/// Compares two images with an anti-aliasing tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageComparer {
    /// Summed per-channel difference a pixel may have and still match
    pub color_threshold: u8,
    /// Differing pixels tolerated before the images mismatch
    pub max_diff_pixels: u64,
}

impl Default for ImageComparer {
    fn default() -> Self {
        Self {
            color_threshold: crate::config::DEFAULT_COLOR_THRESHOLD,
            max_diff_pixels: crate::config::DEFAULT_MAX_DIFF_PIXELS,
        }
    }
}

impl ImageComparer {
    pub fn from_settings(settings: &DiffSettings) -> Self {
        Self {
            color_threshold: settings.color_threshold,
            max_diff_pixels: settings.max_diff_pixels,
        }
    }

    /// Exact comparison: any differing pixel is a mismatch
    pub fn exact() -> Self {
        Self {
            color_threshold: 0,
            max_diff_pixels: 0,
        }
    }

    /// Compare two encoded images (any format `image` can decode)
    pub fn compare_bytes(&self, actual: &[u8], golden: &[u8]) -> DiffResult<Comparison> {
        let actual = image::load_from_memory(actual)?.to_rgba8();
        let golden = image::load_from_memory(golden)?.to_rgba8();
        Ok(self.compare(&actual, &golden))
    }

    pub fn compare(&self, actual: &RgbaImage, golden: &RgbaImage) -> Comparison {
        let actual_size = actual.dimensions();
        let golden_size = golden.dimensions();

        if actual_size != golden_size {
            return Comparison {
                matches: false,
                dimension_mismatch: true,
                pixels_diff: 0,
                total_pixels: 0,
                actual_size,
                golden_size,
                diff_image: None,
            };
        }

        let (width, height) = actual_size;
        let mut diff_image = RgbaImage::new(width, height);
        let mut pixels_diff = 0u64;

        for (x, y, actual_pixel) in actual.enumerate_pixels() {
            let golden_pixel = golden.get_pixel(x, y);
            if pixel_diff(*actual_pixel, *golden_pixel) > u32::from(self.color_threshold) {
                pixels_diff += 1;
                diff_image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let Rgba([r, g, b, _]) = *golden_pixel;
                diff_image.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128]));
            }
        }

        let matches = pixels_diff <= self.max_diff_pixels;
        Comparison {
            matches,
            dimension_mismatch: false,
            pixels_diff,
            total_pixels: u64::from(width) * u64::from(height),
            actual_size,
            golden_size,
            diff_image: if pixels_diff > 0 && !matches {
                Some(diff_image)
            } else {
                None
            },
        }
    }
}

/// Sum of absolute channel differences, alpha included
fn pixel_diff(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| u32::from(x.abs_diff(*y)))
        .sum()
}

/// Dimensions of an encoded image
pub fn image_dimensions(bytes: &[u8]) -> DiffResult<(u32, u32)> {
    Ok(image::load_from_memory(bytes)?.dimensions())
}
