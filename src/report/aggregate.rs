//! Report dataset built from session results and recorded diff info.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::info::{DiffInfo, TestIdentity, TestInfoStore};
use crate::diff::BrowserInfo;
use crate::paths::VDIFF_DIR;

/// Separator between suite names in displayed test names
pub const NAME_SEPARATOR: &str = " > ";

/// Outcome of one test in one browser, as reported by the test runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub error: Option<TestError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
}

/// Nested suite of test results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Empty for the implicit root suite
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub suites: Vec<SuiteResult>,
    #[serde(default)]
    pub tests: Vec<TestResult>,
}

/// Results of one browser session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub browser: BrowserInfo,
    pub test_file: PathBuf,
    #[serde(default)]
    pub test_results: Option<SuiteResult>,
}

/// Result of one test in one browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserResult {
    /// Browser name
    pub name: String,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub passed: bool,
    pub info: DiffInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEntry {
    pub name: String,
    pub num_failed: usize,
    pub results: Vec<BrowserResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub num_failed: usize,
    pub tests: Vec<TestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserEntry {
    pub name: String,
    pub num_failed: usize,
    /// Major version
    pub version: String,
}

/// Dataset consumed by the report UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub files: Vec<FileEntry>,
    pub browsers: Vec<BrowserEntry>,
}

/// Metadata written alongside the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub generated: String,
    pub host: String,
    #[serde(flatten)]
    pub data: ReportData,
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Error types for report operations
#[derive(Debug)]
pub enum ReportError {
    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(err) => write!(f, "I/O error: {}", err),
            ReportError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(err) => Some(err),
            ReportError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}

/// A leaf test with the suite path leading to it
struct FlatTest<'a> {
    suites: Vec<&'a str>,
    test: &'a TestResult,
}

impl FlatTest<'_> {
    /// Key used for diff info: suite and test names joined by spaces
    fn full_title(&self) -> String {
        self.joined(" ")
    }

    fn display_name(&self) -> String {
        self.joined(NAME_SEPARATOR)
    }

    fn joined(&self, separator: &str) -> String {
        self.suites
            .iter()
            .copied()
            .chain(std::iter::once(self.test.name.as_str()))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn flatten<'a>(suite: &'a SuiteResult, parents: &[&'a str], out: &mut Vec<FlatTest<'a>>) {
    let mut path = parents.to_vec();
    if !suite.name.is_empty() {
        path.push(&suite.name);
    }
    for test in &suite.tests {
        out.push(FlatTest {
            suites: path.clone(),
            test,
        });
    }
    for child in &suite.suites {
        flatten(child, &path, out);
    }
}

fn relative_name(root_dir: &Path, file: &Path) -> String {
    file.strip_prefix(root_dir)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}

/// Join every session's results with their diff info.
///
/// Durations above `slow_threshold` are recorded into `store` first, so the
/// resulting info carries `slowDuration`. Files and tests come out sorted by
/// name; browsers in order of first appearance.
pub fn build_report_data(
    root_dir: &Path,
    sessions: &[SessionResult],
    store: &TestInfoStore,
    slow_threshold: Duration,
) -> ReportData {
    let mut browsers: Vec<BrowserEntry> = Vec::new();
    let mut files: BTreeMap<String, BTreeMap<String, TestEntry>> = BTreeMap::new();

    for session in sessions {
        let browser_key = session.browser.key();
        let browser_idx = match browsers.iter().position(|b| b.name == browser_key) {
            Some(idx) => idx,
            None => {
                browsers.push(BrowserEntry {
                    name: browser_key.clone(),
                    num_failed: 0,
                    version: session.browser.major_version(),
                });
                browsers.len() - 1
            }
        };

        let Some(root) = &session.test_results else {
            continue;
        };
        let mut leaves = Vec::new();
        flatten(root, &[], &mut leaves);

        let file_name = relative_name(root_dir, &session.test_file);
        let tests = files.entry(file_name).or_default();

        for leaf in leaves {
            let identity = TestIdentity::new(&browser_key, &session.test_file, leaf.full_title());
            let duration = leaf.test.duration.unwrap_or(0);
            store.record_duration(identity.clone(), Duration::from_millis(duration), slow_threshold);

            let display = leaf.display_name();
            let entry = tests.entry(display.clone()).or_insert_with(|| TestEntry {
                name: display,
                num_failed: 0,
                results: Vec::new(),
            });

            if !leaf.test.passed {
                entry.num_failed += 1;
                browsers[browser_idx].num_failed += 1;
            }
            entry.results.push(BrowserResult {
                name: browser_key.clone(),
                duration,
                error: leaf.test.error.as_ref().map(|e| e.message.clone()),
                passed: leaf.test.passed,
                info: store.get(&identity).unwrap_or_default(),
            });
        }
    }

    let files = files
        .into_iter()
        .map(|(name, tests)| {
            let tests: Vec<TestEntry> = tests.into_values().collect();
            FileEntry {
                name,
                num_failed: tests.iter().map(|t| t.num_failed).sum(),
                tests,
            }
        })
        .collect();

    ReportData { files, browsers }
}

impl ReportData {
    /// Failing leaf results across all files
    pub fn num_failed(&self) -> usize {
        self.files.iter().map(|f| f.num_failed).sum()
    }

    /// Location of the dataset under `root_dir`
    pub fn path(root_dir: &Path) -> PathBuf {
        root_dir.join(VDIFF_DIR).join("report").join("data.json")
    }

    /// Write the dataset as pretty JSON and return its path
    pub fn write(&self, root_dir: &Path) -> ReportResult<PathBuf> {
        let path = Self::path(root_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = ReportFile {
            generated: Utc::now().to_rfc3339(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default(),
            data: self.clone(),
        };
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;

        info!(
            path = %path.display(),
            files = self.files.len(),
            failed = self.num_failed(),
            "report written"
        );
        Ok(path)
    }
}
