use serde::{Deserialize, Serialize};

use crate::dom::{SettleError, SettleOptions};

/// Text direction of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Emulated CSS media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Screen,
    Print,
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
        }
    }
}

/// Options for a single fixture call
#[derive(Debug, Clone)]
pub struct FixtureOptions {
    /// Colour theme applied to the document (`data-theme`)
    pub theme: String,
    pub direction: Direction,
    pub lang: String,
    pub viewport: Viewport,
    /// Visible padding around the page content
    pub page_padding: bool,
    pub media: MediaType,
    /// Enable math rendering on the page
    pub math: bool,
    /// Also wait for each element's loading phase
    pub await_loading_complete: bool,
    /// Final settle check on the mounted element
    pub settle: SettleOptions,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            direction: Direction::Ltr,
            lang: "en".to_string(),
            viewport: Viewport::default(),
            page_padding: true,
            media: MediaType::Screen,
            math: false,
            await_loading_complete: true,
            settle: SettleOptions::default(),
        }
    }
}

impl FixtureOptions {
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn rtl(mut self, rtl: bool) -> Self {
        self.direction = if rtl { Direction::Rtl } else { Direction::Ltr };
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    pub fn page_padding(mut self, padding: bool) -> Self {
        self.page_padding = padding;
        self
    }

    pub fn media(mut self, media: MediaType) -> Self {
        self.media = media;
        self
    }

    pub fn math(mut self, math: bool) -> Self {
        self.math = math;
        self
    }

    pub fn await_loading_complete(mut self, wait: bool) -> Self {
        self.await_loading_complete = wait;
        self
    }

    pub fn settle(mut self, settle: SettleOptions) -> Self {
        self.settle = settle;
        self
    }
}

/// Page-wide settings currently applied. `None` means never applied, so the
/// first fixture call always writes every setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    pub theme: Option<String>,
    pub direction: Option<Direction>,
    pub lang: Option<String>,
    pub viewport: Option<Viewport>,
    pub page_padding: Option<bool>,
    pub media: Option<MediaType>,
    pub math: Option<bool>,
    /// The mouse was moved by a test and must return to the origin
    pub mouse_reset_pending: bool,
}

/// Result type for fixture operations
pub type FixtureResult<T> = Result<T, FixtureError>;

/// Error types for fixture operations
#[derive(Debug)]
pub enum FixtureError {
    /// The page or automation driver rejected an operation
    Page(String),

    /// The mounted element did not settle
    Settle(SettleError),
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureError::Page(msg) => write!(f, "Page error: {}", msg),
            FixtureError::Settle(err) => write!(f, "Settle error: {}", err),
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureError::Page(_) => None,
            FixtureError::Settle(err) => Some(err),
        }
    }
}

impl From<SettleError> for FixtureError {
    fn from(err: SettleError) -> Self {
        FixtureError::Settle(err)
    }
}
