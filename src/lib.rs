//! vdiff - Visual regression testing for web components.
//!
//! This crate provides:
//! - A screenshot-and-compare command handler with golden/pass/fail artifacts
//! - Pixel comparison with diff images
//! - A settled-DOM waiter over the composed (shadow-inclusive) element tree
//! - A fixture that mounts elements on a deterministically reset page
//! - Per-test diff metadata and a report dataset for the results UI
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vdiff::diff::{BrowserInfo, Canvas, CanvasDriver, DiffHandler, DiffMode, LocalChannel, Session, VdiffPlugin};
//! use vdiff::dom::{MemoryElement, Rect};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = DiffHandler::new("/proj", DiffMode::Compare, vdiff::report::global());
//! let plugin = Arc::new(VdiffPlugin::new(handler));
//! let driver = Arc::new(CanvasDriver::new(Canvas::new(800, 800)));
//! let session = Arc::new(Session::new(
//!     "s1",
//!     BrowserInfo::new("chromium", "120.0"),
//!     "/proj/test/card.vdiff.js",
//!     driver,
//! ));
//! let channel = LocalChannel::new(plugin, session);
//!
//! let card = MemoryElement::new("d2l-card")
//!     .with_rect(Rect::new(0.0, 0.0, 100.0, 50.0))
//!     .into_ref();
//! vdiff::diff::screenshot_and_compare(&channel, &card, "card default", Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff;
pub mod dom;
pub mod fixture;
pub mod paths;
pub mod report;

// Re-export the command pipeline
pub use diff::{
    DiffError, DiffHandler, DiffMode, DiffResponse, DiffResult, ImageComparer, ScreenshotRequest,
    Session, VdiffPlugin, screenshot_and_compare,
};

// Re-export browser-side waiting
pub use dom::{ElementRef, SettleError, SettleOptions, wait_until_settled};

// Re-export the fixture
pub use fixture::{Fixture, FixtureError, FixtureOptions};

// Re-export path resolution
pub use paths::{VdiffPaths, resolve_paths};

// Re-export reporting
pub use report::{DiffInfo, ReportData, ReportError, TestInfoStore, build_report_data};
