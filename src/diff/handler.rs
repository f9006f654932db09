//! Server-side handling of screenshot-and-compare requests.
//!
//! Per request: check the session's backend, capture the clipped element to
//! the fail location (or the golden location in golden mode), then compare.
//! A match promotes the capture to the pass location; a mismatch leaves it in
//! place, writes a diff image and records the diff metadata for the report.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::compare::{Comparison, ImageComparer};
use super::driver::Session;
use super::types::{
    Backend, Clip, DiffError, DiffMode, DiffResponse, DiffResult, MSG_MISMATCH, MSG_NO_GOLDEN,
    ScreenshotRequest,
};
use crate::config::{self, DiffSettings};
use crate::paths::{VdiffPaths, resolve_paths};
use crate::report::{DiffInfo, ImageInfo, TestIdentity, TestInfoStore};

/// Executes screenshot comparisons for any number of concurrent sessions
#[derive(Debug, Clone)]
pub struct DiffHandler {
    root_dir: PathBuf,
    mode: DiffMode,
    comparer: ImageComparer,
    default_margin: f64,
    info: Arc<TestInfoStore>,
}

impl DiffHandler {
    pub fn new(root_dir: impl Into<PathBuf>, mode: DiffMode, info: Arc<TestInfoStore>) -> Self {
        Self {
            root_dir: root_dir.into(),
            mode,
            comparer: ImageComparer::default(),
            default_margin: config::DEFAULT_MARGIN,
            info,
        }
    }

    pub fn from_settings(settings: &DiffSettings, info: Arc<TestInfoStore>) -> Self {
        Self {
            root_dir: settings.root_dir.clone(),
            mode: settings.mode,
            comparer: ImageComparer::from_settings(settings),
            default_margin: settings.margin,
            info,
        }
    }

    pub fn with_comparer(mut self, comparer: ImageComparer) -> Self {
        self.comparer = comparer;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.default_margin = margin;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn mode(&self) -> DiffMode {
        self.mode
    }

    pub fn info(&self) -> &Arc<TestInfoStore> {
        &self.info
    }

    /// Capture and judge one assertion.
    ///
    /// Comparison outcomes, including a missing golden, come back as a
    /// [`DiffResponse`]. An unsupported backend, a failed capture, an
    /// undecodable image or a golden that cannot be checked for are errors.
    pub async fn handle(&self, session: &Session, request: &ScreenshotRequest) -> DiffResult<DiffResponse> {
        if session.backend != Backend::Playwright {
            return Err(DiffError::UnsupportedBackend(session.backend.name().to_string()));
        }

        let paths = resolve_paths(
            &self.root_dir,
            &session.test_file,
            &session.browser.name,
            &request.name,
        );
        let margin = request.opts.margin.unwrap_or(self.default_margin);
        let clip = Clip::from_rect(request.rect, margin, session.driver.viewport().await);

        let target = match self.mode {
            DiffMode::Golden => &paths.golden,
            DiffMode::Compare => &paths.fail,
        };
        session.driver.screenshot(clip, target).await?;
        debug!(
            session = %session.id,
            name = %request.name,
            path = %target.display(),
            "captured screenshot"
        );

        if self.mode == DiffMode::Golden {
            info!(name = %request.name, browser = %session.browser.name, "golden written");
            return Ok(DiffResponse::pass());
        }

        if !tokio::fs::try_exists(&paths.golden).await? {
            warn!(name = %request.name, path = %paths.golden.display(), "no golden");
            return Ok(DiffResponse::fail(MSG_NO_GOLDEN));
        }

        let golden = tokio::fs::read(&paths.golden).await?;
        let captured = tokio::fs::read(&paths.fail).await?;
        let comparison = self.comparer.compare_bytes(&captured, &golden)?;

        let identity = TestIdentity::new(&session.browser.name, &session.test_file, &request.name);
        if comparison.matches {
            self.promote(&paths, &request.name).await
        } else {
            self.record_failure(identity, &paths, comparison).await
        }
    }

    /// Move a passing capture from the fail to the pass location
    async fn promote(&self, paths: &VdiffPaths, name: &str) -> DiffResult<DiffResponse> {
        if let Err(err) = move_file(&paths.fail, &paths.pass).await {
            error!(
                name = %name,
                from = %paths.fail.display(),
                to = %paths.pass.display(),
                error = %err,
                "could not move passing screenshot"
            );
            return Ok(DiffResponse::fail(format!(
                "Could not move passing screenshot: {}",
                err
            )));
        }
        remove_stale(&paths.diff).await;
        info!(name = %name, "screenshot matches golden");
        Ok(DiffResponse::pass())
    }

    async fn record_failure(
        &self,
        identity: TestIdentity,
        paths: &VdiffPaths,
        comparison: Comparison,
    ) -> DiffResult<DiffResponse> {
        remove_stale(&paths.pass).await;

        let diff = match &comparison.diff_image {
            Some(image) => {
                image.save(&paths.diff)?;
                Some(self.relative(&paths.diff))
            }
            None => {
                remove_stale(&paths.diff).await;
                None
            }
        };

        let (golden_w, golden_h) = comparison.golden_size;
        let (new_w, new_h) = comparison.actual_size;
        self.info.record_comparison(
            identity,
            DiffInfo {
                golden: Some(ImageInfo::new(self.relative(&paths.golden), golden_w, golden_h)),
                new: Some(ImageInfo::new(self.relative(&paths.fail), new_w, new_h)),
                diff,
                pixels_diff: (!comparison.dimension_mismatch).then_some(comparison.pixels_diff),
                ..Default::default()
            },
        );

        info!(
            pixels_diff = comparison.pixels_diff,
            dimension_mismatch = comparison.dimension_mismatch,
            path = %paths.fail.display(),
            "screenshot does not match golden"
        );
        Ok(DiffResponse::fail(MSG_MISMATCH))
    }

    /// Path relative to the root directory, as the report refers to it
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Rename `from` to `to`, creating the destination directory first.
/// `create_dir_all` tolerates a directory created concurrently by another session.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(from, to).await
}

async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove stale artifact"),
    }
}
