// Core types for the screenshot diff pipeline

use serde::{Deserialize, Serialize};

use crate::dom::Rect;

/// Command name used on the runner's command channel
pub const TAKE_AND_COMPARE: &str = "take-and-compare-screenshot";

/// Message returned when an assertion has no golden yet
pub const MSG_NO_GOLDEN: &str = "No golden exists. Use the \"golden\" mode to generate it.";

/// Message returned when the capture differs from its golden
pub const MSG_MISMATCH: &str = "Does not match golden";

/// Whether captures become the new goldens or are judged against them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Write captures straight to the golden location
    Golden,
    /// Compare captures against existing goldens
    #[default]
    Compare,
}

/// Per-assertion capture options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Padding added on every side of the element's rect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

/// Payload of the `take-and-compare-screenshot` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    /// Assertion name, conventionally the full test title
    pub name: String,
    /// Element bounding box in page coordinates
    pub rect: Rect,
    #[serde(default, alias = "options")]
    pub opts: ScreenshotOptions,
}

/// Response to the `take-and-compare-screenshot` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResponse {
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiffResponse {
    pub fn pass() -> Self {
        Self {
            pass: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            message: Some(message.into()),
        }
    }
}

/// Pixel-aligned capture region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Clip {
    /// Expand `rect` by `margin` on all sides and clamp it to the page.
    ///
    /// Negative margins count as zero. The region never starts left of or
    /// above the origin and, when the viewport is known, never extends past it.
    pub fn from_rect(rect: Rect, margin: f64, viewport: Option<(u32, u32)>) -> Self {
        let margin = if margin.is_finite() { margin.max(0.0) } else { 0.0 };

        let left = (rect.x - margin).max(0.0).floor();
        let top = (rect.y - margin).max(0.0).floor();
        let mut right = (rect.x + rect.width + margin).ceil().max(left);
        let mut bottom = (rect.y + rect.height + margin).ceil().max(top);

        if let Some((width, height)) = viewport {
            right = right.min(f64::from(width)).max(left);
            bottom = bottom.min(f64::from(height)).max(top);
        }

        Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        }
    }
}

/// Automation backend driving a browser session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Playwright,
    Other(String),
}

impl Backend {
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "playwright" => Backend::Playwright,
            other => Backend::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Backend::Playwright => "playwright",
            Backend::Other(name) => name,
        }
    }
}

/// Result type for diff operations
pub type DiffResult<T> = Result<T, DiffError>;

/// Error types for diff operations
#[derive(Debug)]
pub enum DiffError {
    /// The session is driven by a backend that cannot take clipped screenshots
    UnsupportedBackend(String),

    /// The automation driver failed to capture
    Driver(String),

    /// An image could not be decoded or encoded
    Image(image::ImageError),

    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl std::fmt::Display for DiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffError::UnsupportedBackend(name) => write!(
                f,
                "Screenshot comparison is only supported with playwright sessions (got {})",
                name
            ),
            DiffError::Driver(msg) => write!(f, "Driver error: {}", msg),
            DiffError::Image(err) => write!(f, "Image error: {}", err),
            DiffError::Io(err) => write!(f, "I/O error: {}", err),
            DiffError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for DiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiffError::UnsupportedBackend(_) | DiffError::Driver(_) => None,
            DiffError::Image(err) => Some(err),
            DiffError::Io(err) => Some(err),
            DiffError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for DiffError {
    fn from(err: std::io::Error) -> Self {
        DiffError::Io(err)
    }
}

impl From<image::ImageError> for DiffError {
    fn from(err: image::ImageError) -> Self {
        DiffError::Image(err)
    }
}

impl From<serde_json::Error> for DiffError {
    fn from(err: serde_json::Error) -> Self {
        DiffError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_adds_margin() {
        let clip = Clip::from_rect(Rect::new(50.0, 40.0, 100.0, 20.0), 10.0, None);
        assert_eq!(
            clip,
            Clip {
                x: 40,
                y: 30,
                width: 120,
                height: 40
            }
        );
    }

    #[test]
    fn test_clip_clamps_at_origin() {
        let clip = Clip::from_rect(Rect::new(4.0, 0.0, 10.0, 10.0), 10.0, None);
        assert_eq!(clip.x, 0);
        assert_eq!(clip.y, 0);
        assert_eq!(clip.width, 24);
        assert_eq!(clip.height, 20);
    }

    #[test]
    fn test_clip_clamps_at_viewport() {
        let clip = Clip::from_rect(Rect::new(90.0, 90.0, 20.0, 20.0), 10.0, Some((100, 100)));
        assert_eq!(
            clip,
            Clip {
                x: 80,
                y: 80,
                width: 20,
                height: 20
            }
        );
    }

    #[test]
    fn test_negative_margin_ignored() {
        let clip = Clip::from_rect(Rect::new(10.0, 10.0, 5.0, 5.0), -3.0, None);
        assert_eq!(
            clip,
            Clip {
                x: 10,
                y: 10,
                width: 5,
                height: 5
            }
        );
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = serde_json::json!({
            "name": "card Hover State",
            "rect": {"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0},
            "opts": {"margin": 0}
        });
        let request: ScreenshotRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.opts.margin, Some(0.0));

        let bare: ScreenshotRequest = serde_json::from_value(serde_json::json!({
            "name": "Solo",
            "rect": {"x": 0, "y": 0, "width": 1, "height": 1}
        }))
        .unwrap();
        assert_eq!(bare.opts.margin, None);
    }

    #[test]
    fn test_response_omits_empty_message() {
        let json = serde_json::to_value(DiffResponse::pass()).unwrap();
        assert_eq!(json, serde_json::json!({"pass": true}));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("Playwright"), Backend::Playwright);
        assert_eq!(Backend::parse("webdriver"), Backend::Other("webdriver".to_string()));
    }
}
