use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use vdiff::config;
use vdiff::diff::{
    BrowserInfo, Canvas, CanvasDriver, DiffHandler, DiffMode, ImageComparer, LocalChannel, Session,
    VdiffPlugin, screenshot_and_compare,
};
use vdiff::dom::{MemoryElement, Rect, TokioHost};
use vdiff::fixture::{Fixture, FixtureOptions, MemoryPage};
use vdiff::paths::resolve_paths;
use vdiff::report::{SessionResult, SuiteResult, TestError, TestResult, build_report_data};

/// vdiff - Visual regression testing for web components
#[derive(Parser, Debug)]
#[command(
    name = "vdiff",
    about = "Screenshot comparison, artifact layout and reporting for component visual tests",
    after_help = "ENVIRONMENT VARIABLES:\n\
        VDIFF_ROOT_DIR             Project root holding the .vdiff directory\n\
        VDIFF_GOLDEN               Write goldens instead of comparing (1/true)\n\
        VDIFF_COLOR_THRESHOLD      Per-pixel tolerance (summed RGBA difference)\n\
        VDIFF_MAX_DIFF_PIXELS      Differing pixels allowed before failing\n\
        VDIFF_MARGIN               Default capture margin in CSS pixels\n\
        VDIFF_SLOW_MS              Duration above which a test is reported slow\n\
        VDIFF_SETTLE_TIMEOUT_MS    Settle timeout (0 waits indefinitely)\n\
        VDIFF_FRAME_MS             Frame interval of the in-process host\n\
        RUST_LOG                   Log filter (e.g. vdiff=debug)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the golden/pass/fail/diff locations of an assertion
    Paths {
        /// Test file the assertion belongs to
        #[arg(short, long)]
        file: PathBuf,

        /// Browser name
        #[arg(short, long, default_value = "chromium")]
        browser: String,

        /// Assertion name (first word is the category)
        name: String,

        /// Project root (default: VDIFF_ROOT_DIR or the current directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Build the report dataset from a JSON array of session results.
    ///
    /// Diff info (golden, new, diff, pixelsDiff) is only joined for assertions
    /// compared in the same process; a standalone run reports test outcomes
    /// and slow durations only. `demo` writes a report with full diff info.
    Report {
        /// Session results file
        sessions: PathBuf,

        /// Project root (default: VDIFF_ROOT_DIR or the current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Print the dataset instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Compare two PNG files
    Compare {
        /// Captured image
        actual: PathBuf,

        /// Golden image
        golden: PathBuf,

        /// Write the diff image here on mismatch
        #[arg(short, long)]
        diff: Option<PathBuf>,

        /// Per-pixel tolerance
        #[arg(long, env = "VDIFF_COLOR_THRESHOLD", default_value_t = config::DEFAULT_COLOR_THRESHOLD)]
        threshold: u8,

        /// Differing pixels allowed
        #[arg(long, env = "VDIFF_MAX_DIFF_PIXELS", default_value_t = config::DEFAULT_MAX_DIFF_PIXELS)]
        max_diff_pixels: u64,
    },

    /// Run a golden pass and a compare pass against an in-memory page, then
    /// write the report for the compare pass
    Demo {
        /// Project root for the generated artifacts
        #[arg(long, default_value = "./vdiff-demo")]
        root: PathBuf,

        /// Change the page between the two passes so the comparison fails
        #[arg(long)]
        mutate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Paths {
            file,
            browser,
            name,
            root,
        }) => {
            let root = root.unwrap_or_else(config::root_dir);
            let paths = resolve_paths(&root, &file, &browser, &name);
            println!("golden: {}", paths.golden.display());
            println!("pass:   {}", paths.pass.display());
            println!("fail:   {}", paths.fail.display());
            println!("diff:   {}", paths.diff.display());
        }

        Some(Commands::Report {
            sessions,
            root,
            stdout,
        }) => {
            let root = root.unwrap_or_else(config::root_dir);
            let sessions: Vec<SessionResult> = serde_json::from_str(&std::fs::read_to_string(&sessions)?)?;
            let report = build_report_data(
                &root,
                &sessions,
                &vdiff::report::global(),
                config::get().report.slow_threshold,
            );

            if stdout {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let path = report.write(&root)?;
                println!("Report written: {}", path.display());
                println!(
                    "  {} files, {} browsers, {} failed",
                    report.files.len(),
                    report.browsers.len(),
                    report.num_failed()
                );
            }
        }

        Some(Commands::Compare {
            actual,
            golden,
            diff,
            threshold,
            max_diff_pixels,
        }) => {
            let comparer = ImageComparer {
                color_threshold: threshold,
                max_diff_pixels,
            };
            let comparison = comparer.compare_bytes(&std::fs::read(&actual)?, &std::fs::read(&golden)?)?;

            if comparison.matches {
                println!("Match ({} differing pixels allowed)", max_diff_pixels);
            } else if comparison.dimension_mismatch {
                println!(
                    "Dimension mismatch: {}x{} vs golden {}x{}",
                    comparison.actual_size.0,
                    comparison.actual_size.1,
                    comparison.golden_size.0,
                    comparison.golden_size.1
                );
            } else {
                println!(
                    "Mismatch: {} of {} pixels differ",
                    comparison.pixels_diff, comparison.total_pixels
                );
            }

            if let (Some(path), Some(image)) = (diff, &comparison.diff_image) {
                image.save(&path)?;
                println!("  Diff: {}", path.display());
            }

            if !comparison.matches {
                std::process::exit(1);
            }
        }

        Some(Commands::Demo { root, mutate }) => {
            run_demo(root, mutate).await?;
        }

        None => {
            println!("vdiff - Visual regression testing for web components");
            println!();
            println!("Usage: vdiff <COMMAND>");
            println!();
            println!("Commands:");
            println!("  paths    Print the artifact locations of an assertion");
            println!("  report   Build the report dataset from session results");
            println!("  compare  Compare two PNG files");
            println!("  demo     Golden pass then compare pass against an in-memory page");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

/// Assertion name used by the demo: suite `button`, test `primary`
const DEMO_ASSERTION: &str = "button primary";

async fn run_demo(root: PathBuf, mutate: bool) -> Result<(), Box<dyn Error>> {
    let test_file = root.join("test/button.vdiff.js");
    let driver = Arc::new(CanvasDriver::new(Canvas::with_color(400, 200, [245, 245, 245])));
    draw_button(&mut driver.canvas(), [0, 111, 191]);

    let host = Arc::new(TokioHost::new(config::get().settle.frame_interval));
    let mut fixture = Fixture::new(Arc::new(MemoryPage::new()), host);
    let button = fixture
        .mount(
            MemoryElement::new("d2l-button")
                .with_text("Save")
                .with_rect(Rect::new(20.0, 20.0, 120.0, 40.0))
                .with_updates([true])
                .into_ref(),
            &FixtureOptions::default(),
        )
        .await?;

    let browser = BrowserInfo::new("chromium", "120.0");
    let mut outcome = None;

    for mode in [DiffMode::Golden, DiffMode::Compare] {
        if mode == DiffMode::Compare && mutate {
            draw_button(&mut driver.canvas(), [205, 32, 38]);
        }

        let handler = DiffHandler::new(&root, mode, vdiff::report::global());
        let session = Arc::new(Session::new(
            format!("demo-{:?}", mode).to_lowercase(),
            browser.clone(),
            &test_file,
            driver.clone(),
        ));
        let channel = LocalChannel::new(Arc::new(VdiffPlugin::new(handler)), session);

        let started = Instant::now();
        let result = screenshot_and_compare(&channel, &button, DEMO_ASSERTION, Default::default()).await;
        match &result {
            Ok(()) => println!("{:?} pass: ok", mode),
            Err(e) => println!("{:?} pass: {}", mode, e),
        }
        if mode == DiffMode::Compare {
            outcome = Some(TestResult {
                name: "primary".to_string(),
                passed: result.is_ok(),
                duration: Some(started.elapsed().as_millis() as u64),
                error: result.err().map(|e| TestError {
                    message: e.to_string(),
                }),
            });
        }
    }

    let paths = resolve_paths(&root, &test_file, &browser.name, DEMO_ASSERTION);
    println!("\nArtifacts:");
    for path in [&paths.golden, &paths.pass, &paths.fail, &paths.diff] {
        if path.exists() {
            println!("  {}", path.display());
        }
    }

    // The compare pass ran in this process, so the global store holds its diff info.
    let sessions = [SessionResult {
        browser,
        test_file,
        test_results: Some(SuiteResult {
            name: String::new(),
            suites: vec![SuiteResult {
                name: "button".to_string(),
                suites: vec![],
                tests: outcome.into_iter().collect(),
            }],
            tests: vec![],
        }),
    }];
    let report = build_report_data(
        &root,
        &sessions,
        &vdiff::report::global(),
        config::get().report.slow_threshold,
    );
    let report_path = report.write(&root)?;
    println!("\nReport written: {} ({} failed)", report_path.display(), report.num_failed());
    Ok(())
}

fn draw_button(canvas: &mut Canvas, color: [u8; 3]) {
    canvas.draw_rect(20, 20, 120, 40, color);
    canvas.draw_text(60, 36, "Save", [255, 255, 255], color);
}
