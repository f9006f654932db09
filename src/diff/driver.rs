use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::types::{Backend, Clip, DiffResult};

/// Capture capability of the browser automation driver
#[async_trait]
pub trait ScreenshotDriver: Send + Sync {
    /// Current page size, when known; used to clamp capture regions
    async fn viewport(&self) -> Option<(u32, u32)>;

    /// Write a PNG of `clip`, with animations disabled, to `path`
    async fn screenshot(&self, clip: Clip, path: &Path) -> DiffResult<()>;
}

/// Browser running a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub name: String,
    /// Full version string as reported by the browser
    #[serde(default)]
    pub version: String,
}

impl BrowserInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Lower-cased browser name
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Leading component of the version (`"120.0.6099"` -> `"120"`)
    pub fn major_version(&self) -> String {
        self.version
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// One browser session executing a test file
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub browser: BrowserInfo,
    pub backend: Backend,
    pub test_file: PathBuf,
    pub driver: Arc<dyn ScreenshotDriver>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        browser: BrowserInfo,
        test_file: impl Into<PathBuf>,
        driver: Arc<dyn ScreenshotDriver>,
    ) -> Self {
        Self {
            id: id.into(),
            browser,
            backend: Backend::Playwright,
            test_file: test_file.into(),
            driver,
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("browser", &self.browser)
            .field("backend", &self.backend)
            .field("test_file", &self.test_file)
            .finish_non_exhaustive()
    }
}
