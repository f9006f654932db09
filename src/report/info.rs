//! Per-assertion diff metadata shared across concurrent browser sessions.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

static GLOBAL: Lazy<Arc<TestInfoStore>> = Lazy::new(|| Arc::new(TestInfoStore::new()));

/// Process-wide store used by one test-run invocation
pub fn global() -> Arc<TestInfoStore> {
    GLOBAL.clone()
}

/// Identifies one screenshot assertion
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestIdentity {
    /// Lower-cased browser name
    pub browser: String,
    pub file: PathBuf,
    /// Full test title
    pub title: String,
    pub variant: Option<String>,
}

impl TestIdentity {
    pub fn new(browser: &str, file: impl AsRef<Path>, title: impl Into<String>) -> Self {
        Self {
            browser: browser.to_lowercase(),
            file: file.as_ref().to_path_buf(),
            title: title.into(),
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

/// Location and size of a stored image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageInfo {
    pub fn new(path: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            path: Some(path.as_ref().to_string_lossy().into_owned()),
            width: Some(width),
            height: Some(height),
        }
    }

    fn merge(self, newer: ImageInfo) -> ImageInfo {
        ImageInfo {
            path: newer.path.or(self.path),
            width: newer.width.or(self.width),
            height: newer.height.or(self.height),
        }
    }
}

/// Diff metadata for one assertion, filled in incrementally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffInfo {
    /// Test duration in milliseconds, recorded only for slow tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden: Option<ImageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<ImageInfo>,
    /// Path of the diff image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels_diff: Option<u64>,
}

impl DiffInfo {
    /// Layer `newer` on top of `self`. Fields `newer` leaves unset keep their
    /// previous value; image records merge field by field.
    pub fn merge(self, newer: DiffInfo) -> DiffInfo {
        let merge_image = |old: Option<ImageInfo>, new: Option<ImageInfo>| match (old, new) {
            (Some(old), Some(new)) => Some(old.merge(new)),
            (old, new) => new.or(old),
        };
        DiffInfo {
            slow_duration: newer.slow_duration.or(self.slow_duration),
            golden: merge_image(self.golden, newer.golden),
            new: merge_image(self.new, newer.new),
            diff: newer.diff.or(self.diff),
            pixels_diff: newer.pixels_diff.or(self.pixels_diff),
        }
    }
}

/// Concurrent map from [`TestIdentity`] to merged [`DiffInfo`]
#[derive(Debug, Default)]
pub struct TestInfoStore {
    entries: Mutex<HashMap<TestIdentity, DiffInfo>>,
}

impl TestInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `info` into the entry for `identity`
    pub fn set(&self, identity: TestIdentity, info: DiffInfo) {
        let mut entries = self.entries.lock();
        let merged = match entries.remove(&identity) {
            Some(existing) => existing.merge(info),
            None => info,
        };
        entries.insert(identity, merged);
    }

    /// Store the outcome of a fresh comparison for `identity`.
    ///
    /// Unlike [`TestInfoStore::set`], the image fields and pixel count replace
    /// the previous ones outright; only `slow_duration` carries over.
    pub fn record_comparison(&self, identity: TestIdentity, info: DiffInfo) {
        let mut entries = self.entries.lock();
        let slow_duration = info
            .slow_duration
            .or_else(|| entries.get(&identity).and_then(|e| e.slow_duration));
        entries.insert(
            identity,
            DiffInfo {
                slow_duration,
                ..info
            },
        );
    }

    pub fn get(&self, identity: &TestIdentity) -> Option<DiffInfo> {
        self.entries.lock().get(identity).cloned()
    }

    /// Record the duration of a test when it exceeds `slow_threshold`
    pub fn record_duration(&self, identity: TestIdentity, duration: Duration, slow_threshold: Duration) {
        if duration > slow_threshold {
            self.set(
                identity,
                DiffInfo {
                    slow_duration: Some(duration.as_millis() as u64),
                    ..Default::default()
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of every entry, sorted by identity
    pub fn snapshot(&self) -> Vec<(TestIdentity, DiffInfo)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
