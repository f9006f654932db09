//! Configuration management with environment variable support.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VDIFF_ROOT_DIR` | Root directory holding `.vdiff/` | `.` |
//! | `VDIFF_GOLDEN` | `1`/`true` to regenerate goldens instead of comparing | off |
//! | `VDIFF_COLOR_THRESHOLD` | Per-pixel colour tolerance (anti-aliasing slack) | `10` |
//! | `VDIFF_MAX_DIFF_PIXELS` | Differing pixels allowed before a mismatch | `0` |
//! | `VDIFF_MARGIN` | Default capture margin in pixels | `10` |
//! | `VDIFF_SLOW_MS` | Tests slower than this get a `slowDuration` | `75` |
//! | `VDIFF_SETTLE_TIMEOUT_MS` | Default settle timeout, `0` = unbounded | `0` |
//! | `VDIFF_FRAME_MS` | Frame interval used by the tokio host | `16` |
//!
//! # Example
//!
//! ```bash
//! # Accept the current rendering as the new goldens
//! VDIFF_GOLDEN=1 vdiff demo --name "card Hover State"
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::diff::DiffMode;

// ============================================================================
// Default Values
// ============================================================================

/// Default root directory
pub const DEFAULT_ROOT_DIR: &str = ".";

/// Default per-pixel colour tolerance
pub const DEFAULT_COLOR_THRESHOLD: u8 = 10;

/// Default number of differing pixels tolerated
pub const DEFAULT_MAX_DIFF_PIXELS: u64 = 0;

/// Default capture margin around the element (pixels)
pub const DEFAULT_MARGIN: f64 = 10.0;

/// Default slow-test threshold (milliseconds)
pub const DEFAULT_SLOW_MS: u64 = 75;

/// Default settle timeout (milliseconds, 0 = unbounded)
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 0;

/// Default frame interval (milliseconds)
pub const DEFAULT_FRAME_MS: u64 = 16;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_ROOT_DIR: &str = "VDIFF_ROOT_DIR";
pub const ENV_GOLDEN: &str = "VDIFF_GOLDEN";
pub const ENV_COLOR_THRESHOLD: &str = "VDIFF_COLOR_THRESHOLD";
pub const ENV_MAX_DIFF_PIXELS: &str = "VDIFF_MAX_DIFF_PIXELS";
pub const ENV_MARGIN: &str = "VDIFF_MARGIN";
pub const ENV_SLOW_MS: &str = "VDIFF_SLOW_MS";
pub const ENV_SETTLE_TIMEOUT_MS: &str = "VDIFF_SETTLE_TIMEOUT_MS";
pub const ENV_FRAME_MS: &str = "VDIFF_FRAME_MS";

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Diff pipeline settings
    pub diff: DiffSettings,
    /// Browser-side waiting settings
    pub settle: SettleSettings,
    /// Report settings
    pub report: ReportSettings,
}

/// Settings for the diff command handler
#[derive(Debug, Clone)]
pub struct DiffSettings {
    pub root_dir: PathBuf,
    pub mode: DiffMode,
    pub color_threshold: u8,
    pub max_diff_pixels: u64,
    pub margin: f64,
}

/// Settings for the settled-DOM waiter and its host
#[derive(Debug, Clone)]
pub struct SettleSettings {
    pub timeout: Duration,
    pub frame_interval: Duration,
}

/// Settings for report aggregation
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub slow_threshold: Duration,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            diff: DiffSettings::from_env(),
            settle: SettleSettings::from_env(),
            report: ReportSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            diff: DiffSettings::defaults(),
            settle: SettleSettings::defaults(),
            report: ReportSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DiffSettings {
    pub fn from_env() -> Self {
        let golden = env::var(ENV_GOLDEN).ok().is_some_and(|v| parse_flag(&v));
        Self {
            root_dir: env::var(ENV_ROOT_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROOT_DIR)),
            mode: if golden { DiffMode::Golden } else { DiffMode::Compare },
            color_threshold: parse_env(ENV_COLOR_THRESHOLD).unwrap_or(DEFAULT_COLOR_THRESHOLD),
            max_diff_pixels: parse_env(ENV_MAX_DIFF_PIXELS).unwrap_or(DEFAULT_MAX_DIFF_PIXELS),
            margin: parse_env(ENV_MARGIN).unwrap_or(DEFAULT_MARGIN),
        }
    }

    pub fn defaults() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            mode: DiffMode::Compare,
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            max_diff_pixels: DEFAULT_MAX_DIFF_PIXELS,
            margin: DEFAULT_MARGIN,
        }
    }
}

impl SettleSettings {
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_millis(
                parse_env(ENV_SETTLE_TIMEOUT_MS).unwrap_or(DEFAULT_SETTLE_TIMEOUT_MS),
            ),
            frame_interval: Duration::from_millis(
                parse_env(ENV_FRAME_MS).unwrap_or(DEFAULT_FRAME_MS),
            ),
        }
    }

    pub fn defaults() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_SETTLE_TIMEOUT_MS),
            frame_interval: Duration::from_millis(DEFAULT_FRAME_MS),
        }
    }
}

impl ReportSettings {
    pub fn from_env() -> Self {
        Self {
            slow_threshold: Duration::from_millis(
                parse_env(ENV_SLOW_MS).unwrap_or(DEFAULT_SLOW_MS),
            ),
        }
    }

    pub fn defaults() -> Self {
        Self {
            slow_threshold: Duration::from_millis(DEFAULT_SLOW_MS),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Parse a boolean-ish flag value ("1", "true", "yes", "on")
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Root directory from environment (convenience function)
pub fn root_dir() -> PathBuf {
    get().diff.root_dir.clone()
}
