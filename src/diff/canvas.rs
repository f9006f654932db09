//! In-memory page surface and the screenshot driver built on it.
//!
//! `Canvas` stands in for a rendered page: an RGB framebuffer with a small
//! drawing API. `CanvasDriver` implements [`ScreenshotDriver`] by cropping the
//! requested clip out of the canvas and writing it as PNG.

use async_trait::async_trait;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use parking_lot::{Mutex, MutexGuard};
use std::io::Cursor;
use std::path::Path;

use super::driver::ScreenshotDriver;
use super::types::{Clip, DiffError, DiffResult};

/// Glyph size used by [`Canvas::draw_text`]
pub const GLYPH_SIZE: u32 = 8;

/// A virtual page surface for drawing fixtures
///
/// - `fill()` - Fill entire buffer with a color
/// - `draw_rect()` - Draw a filled rectangle
/// - `draw_text()` - Draw text using font8x8 glyphs
/// - `get_pixel()` / `set_pixel()` - Direct pixel access
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    /// RGB pixel buffer (row-major, 3 bytes per pixel)
    buffer: Vec<u8>,
}

impl Canvas {
    /// Create a new canvas with the given dimensions, initialized to white
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_color(width, height, [255, 255, 255])
    }

    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut canvas = Self {
            width,
            height,
            buffer: vec![0u8; (width as usize) * (height as usize) * 3],
        };
        canvas.fill(color);
        canvas
    }

    /// Load a canvas from encoded image bytes
    pub fn from_png_bytes(data: &[u8]) -> DiffResult<Self> {
        let rgb = image::load_from_memory(data)?.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the canvas
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..y.saturating_add(h).min(self.height) {
            for px in x..x.saturating_add(w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text using font8x8 glyphs. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x >= self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, fg, bg);
            cursor_x += GLYPH_SIZE;
        }
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, fg: [u8; 3], bg: [u8; 3]) {
        let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            let py = y + row_idx as u32;
            for bit in 0..GLYPH_SIZE {
                // font8x8 stores LSB as leftmost pixel
                let color = if (row >> bit) & 1 == 1 { fg } else { bg };
                self.set_pixel(x + bit, py, color);
            }
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        match self.index(x, y) {
            Some(idx) => [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]],
            None => [0, 0, 0],
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if let Some(idx) = self.index(x, y) {
            self.buffer[idx..idx + 3].copy_from_slice(&color);
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + (x as usize)) * 3)
    }

    /// Copy of the region covered by `clip`, truncated to the canvas
    pub fn crop(&self, clip: Clip) -> RgbImage {
        let width = clip.width.min(self.width.saturating_sub(clip.x));
        let height = clip.height.min(self.height.saturating_sub(clip.y));
        RgbImage::from_fn(width, height, |x, y| Rgb(self.get_pixel(clip.x + x, clip.y + y)))
    }

    pub fn to_image(&self) -> RgbImage {
        self.crop(Clip {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        })
    }

    /// Encode the whole canvas as PNG bytes
    pub fn to_png(&self) -> DiffResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.to_image()
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// [`ScreenshotDriver`] that captures from an in-memory [`Canvas`]
#[derive(Debug)]
pub struct CanvasDriver {
    canvas: Mutex<Canvas>,
    fail_with: Mutex<Option<String>>,
}

impl CanvasDriver {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas: Mutex::new(canvas),
            fail_with: Mutex::new(None),
        }
    }

    /// Mutable access to the page surface between captures
    pub fn canvas(&self) -> MutexGuard<'_, Canvas> {
        self.canvas.lock()
    }

    /// Make every following capture fail with `message`
    pub fn fail_captures(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }
}

#[async_trait]
impl ScreenshotDriver for CanvasDriver {
    async fn viewport(&self) -> Option<(u32, u32)> {
        let canvas = self.canvas.lock();
        Some((canvas.width(), canvas.height()))
    }

    async fn screenshot(&self, clip: Clip, path: &Path) -> DiffResult<()> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(DiffError::Driver(message));
        }
        let image = self.canvas.lock().crop(clip);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_new_is_white() {
        let canvas = Canvas::new(10, 5);
        assert_eq!(canvas.width(), 10);
        assert_eq!(canvas.height(), 5);
        assert_eq!(canvas.get_pixel(9, 4), [255, 255, 255]);
    }

    #[test]
    fn test_draw_rect_clipped() {
        let mut canvas = Canvas::with_color(20, 20, [0, 0, 0]);
        canvas.draw_rect(15, 15, 10, 10, [255, 0, 0]);

        assert_eq!(canvas.get_pixel(14, 14), [0, 0, 0]);
        assert_eq!(canvas.get_pixel(15, 15), [255, 0, 0]);
        assert_eq!(canvas.get_pixel(19, 19), [255, 0, 0]);
    }

    #[test]
    fn test_draw_text_has_foreground() {
        let mut canvas = Canvas::with_color(80, 16, [0, 0, 0]);
        canvas.draw_text(0, 0, "Hi", [255, 255, 255], [0, 0, 0]);

        let lit = (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .any(|(x, y)| canvas.get_pixel(x, y) == [255, 255, 255]);
        assert!(lit, "Character 'H' should have some foreground pixels");
    }

    #[test]
    fn test_crop_truncates_to_canvas() {
        let mut canvas = Canvas::with_color(10, 10, [0, 0, 0]);
        canvas.set_pixel(8, 8, [1, 2, 3]);
        let crop = canvas.crop(Clip {
            x: 8,
            y: 8,
            width: 5,
            height: 5,
        });
        assert_eq!(crop.dimensions(), (2, 2));
        assert_eq!(crop.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn test_png_roundtrip() {
        let mut canvas = Canvas::with_color(16, 16, [100, 150, 200]);
        canvas.draw_rect(4, 4, 8, 8, [255, 0, 0]);

        let restored = Canvas::from_png_bytes(&canvas.to_png().unwrap()).unwrap();
        assert_eq!(restored.get_pixel(0, 0), [100, 150, 200]);
        assert_eq!(restored.get_pixel(6, 6), [255, 0, 0]);
    }

    #[tokio::test]
    async fn test_driver_writes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/shot.png");
        let driver = CanvasDriver::new(Canvas::new(50, 40));

        driver
            .screenshot(
                Clip {
                    x: 5,
                    y: 5,
                    width: 10,
                    height: 12,
                },
                &path,
            )
            .await
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(super::super::compare::image_dimensions(&bytes).unwrap(), (10, 12));
    }
}
