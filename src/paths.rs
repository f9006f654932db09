//! Deterministic on-disk layout for golden, pass and fail screenshots.
//!
//! Every screenshot assertion maps to three sibling files that differ only in
//! the image class segment:
//!
//! ```text
//! {root}/.vdiff/{test dir}/{golden|pass|fail}/{browser}/{category}/{name}.png
//! ```

use std::path::{Component, Path, PathBuf};

/// Directory under the root that holds every artifact.
pub const VDIFF_DIR: &str = ".vdiff";

/// Component-name prefix stripped from the category directory.
pub const COMPONENT_PREFIX: &str = "d2l-";

/// Class of a stored image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageClass {
    Golden,
    Pass,
    Fail,
}

impl ImageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageClass::Golden => "golden",
            ImageClass::Pass => "pass",
            ImageClass::Fail => "fail",
        }
    }
}

/// Category and file components derived from an assertion name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    /// Directory component (may be empty)
    pub category: String,
    /// File stem
    pub file: String,
}

/// Resolved artifact locations for one assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdiffPaths {
    pub golden: PathBuf,
    pub pass: PathBuf,
    pub fail: PathBuf,
    /// Diff image written next to a failing capture
    pub diff: PathBuf,
}

impl VdiffPaths {
    pub fn get(&self, class: ImageClass) -> &Path {
        match class {
            ImageClass::Golden => &self.golden,
            ImageClass::Pass => &self.pass,
            ImageClass::Fail => &self.fail,
        }
    }
}

/// Split an assertion name into its category directory and file stem.
///
/// The lower-cased name is split at its first space. Every remaining space
/// becomes `-`, so `"d2l-button Default State"` becomes `button` /
/// `default-state`. Repeated or trailing spaces are kept as extra dashes.
/// A name without a space has no category.
pub fn split_name(name: &str) -> NameParts {
    let lowered = name.to_lowercase();

    match lowered.split_once(' ') {
        None => NameParts {
            category: String::new(),
            file: lowered,
        },
        Some((first, rest)) => NameParts {
            category: first.strip_prefix(COMPONENT_PREFIX).unwrap_or(first).to_string(),
            file: rest.replace(' ', "-"),
        },
    }
}

/// Directory containing `test_file`, relative to `root_dir`.
///
/// Test files outside the root keep their absolute parent, minus the leading
/// separator, so they still land under `.vdiff/`.
pub fn relative_test_dir(root_dir: &Path, test_file: &Path) -> PathBuf {
    let parent = test_file.parent().unwrap_or_else(|| Path::new(""));
    match parent.strip_prefix(root_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => parent
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect(),
    }
}

/// Resolve golden/pass/fail paths for one assertion. Pure; performs no I/O.
pub fn resolve_paths(root_dir: &Path, test_file: &Path, browser: &str, name: &str) -> VdiffPaths {
    let parts = split_name(name);
    let browser = browser.to_lowercase();
    let base = root_dir.join(VDIFF_DIR).join(relative_test_dir(root_dir, test_file));

    let file_name = format!("{}.png", parts.file);
    let class_path = |class: ImageClass| {
        base.join(class.as_str())
            .join(&browser)
            .join(&parts.category)
            .join(&file_name)
    };

    let fail = class_path(ImageClass::Fail);
    let diff = fail.with_file_name(format!("{}-diff.png", parts.file));

    VdiffPaths {
        golden: class_path(ImageClass::Golden),
        pass: class_path(ImageClass::Pass),
        fail,
        diff,
    }
}
