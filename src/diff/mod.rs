pub mod canvas;
pub mod command;
pub mod compare;
pub mod driver;
pub mod handler;
pub mod types;

pub use canvas::{Canvas, CanvasDriver};
pub use command::{CommandChannel, CommandError, CommandResult, LocalChannel, VdiffPlugin, screenshot_and_compare};
pub use compare::{Comparison, ImageComparer, image_dimensions};
pub use driver::{BrowserInfo, ScreenshotDriver, Session};
pub use handler::DiffHandler;
pub use types::{
    Backend, Clip, DiffError, DiffMode, DiffResponse, DiffResult, MSG_MISMATCH, MSG_NO_GOLDEN,
    ScreenshotOptions, ScreenshotRequest, TAKE_AND_COMPARE,
};
