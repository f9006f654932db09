//! Integration tests for the screenshot-and-compare pipeline

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use vdiff::diff::{
    BrowserInfo, Canvas, CanvasDriver, CommandError, DiffHandler, DiffMode, LocalChannel,
    MSG_MISMATCH, MSG_NO_GOLDEN, ScreenshotRequest, Session, VdiffPlugin, screenshot_and_compare,
};
use vdiff::dom::{MemoryElement, Rect};
use vdiff::paths::resolve_paths;
use vdiff::report::{SessionResult, SuiteResult, TestIdentity, TestInfoStore, TestResult, build_report_data};

const NAME: &str = "card hover";

struct Rig {
    dir: tempfile::TempDir,
    driver: Arc<CanvasDriver>,
    info: Arc<TestInfoStore>,
}

impl Rig {
    fn new() -> Self {
        let driver = Arc::new(CanvasDriver::new(Canvas::new(100, 100)));
        driver.canvas().draw_rect(12, 12, 16, 16, [0, 111, 191]);
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
            driver,
            info: Arc::new(TestInfoStore::new()),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn test_file(&self) -> PathBuf {
        self.root().join("test/card.vdiff.js")
    }

    fn session(&self) -> Session {
        Session::new(
            "s1",
            BrowserInfo::new("Chromium", "120.0.6099"),
            self.test_file(),
            self.driver.clone(),
        )
    }

    fn handler(&self, mode: DiffMode) -> DiffHandler {
        DiffHandler::new(self.root(), mode, self.info.clone())
    }

    fn request(&self) -> ScreenshotRequest {
        request(NAME)
    }
}

fn request(name: &str) -> ScreenshotRequest {
    ScreenshotRequest {
        name: name.to_string(),
        rect: Rect::new(10.0, 10.0, 20.0, 20.0),
        opts: Default::default(),
    }
}

#[tokio::test]
async fn test_matching_capture_is_promoted_to_pass() {
    let rig = Rig::new();
    let session = rig.session();

    let golden = rig.handler(DiffMode::Golden).handle(&session, &rig.request()).await.unwrap();
    assert!(golden.pass);

    let response = rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();
    assert!(response.pass, "Unexpected failure: {:?}", response.message);

    let paths = resolve_paths(rig.root(), &rig.test_file(), "chromium", NAME);
    assert!(paths.golden.exists());
    assert!(paths.pass.exists(), "Passing capture not moved to pass location");
    assert!(!paths.fail.exists());
    assert!(!paths.diff.exists());
    assert!(rig.info.is_empty());
}

#[tokio::test]
async fn test_missing_golden_fails_without_diff() {
    let rig = Rig::new();

    let response = rig
        .handler(DiffMode::Compare)
        .handle(&rig.session(), &rig.request())
        .await
        .unwrap();

    assert!(!response.pass);
    assert_eq!(response.message.as_deref(), Some(MSG_NO_GOLDEN));

    let paths = resolve_paths(rig.root(), &rig.test_file(), "chromium", NAME);
    assert!(paths.fail.exists(), "Capture should stay at the fail location");
    assert!(!paths.diff.exists());
    assert!(!paths.pass.exists());
}

#[tokio::test]
async fn test_mismatch_records_diff_info() {
    let rig = Rig::new();
    let session = rig.session();

    rig.handler(DiffMode::Golden).handle(&session, &rig.request()).await.unwrap();
    rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();

    rig.driver.canvas().draw_rect(15, 15, 5, 5, [205, 32, 38]);
    let response = rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();

    assert!(!response.pass);
    assert_eq!(response.message.as_deref(), Some(MSG_MISMATCH));

    let paths = resolve_paths(rig.root(), &rig.test_file(), "chromium", NAME);
    assert!(paths.fail.exists());
    assert!(paths.diff.exists(), "Diff image not written");
    assert!(!paths.pass.exists(), "Stale pass image left behind");

    let info = rig
        .info
        .get(&TestIdentity::new("chromium", rig.test_file(), NAME))
        .expect("No diff info recorded");
    assert_eq!(info.pixels_diff, Some(25));

    let golden = info.golden.expect("No golden info");
    assert_eq!(golden.path.as_deref(), Some(".vdiff/test/golden/chromium/card/hover.png"));
    assert_eq!((golden.width, golden.height), (Some(40), Some(40)));
    assert_eq!(info.diff.as_deref(), Some(".vdiff/test/fail/chromium/card/hover-diff.png"));
}

#[tokio::test]
async fn test_failed_promotion_fails_the_assertion() {
    let rig = Rig::new();
    let session = rig.session();

    rig.handler(DiffMode::Golden).handle(&session, &rig.request()).await.unwrap();
    std::fs::write(rig.root().join(".vdiff/test/pass"), b"not a directory").unwrap();

    let response = rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();

    assert!(!response.pass, "Failed move must not pass");
    let message = response.message.unwrap_or_default();
    assert!(message.starts_with("Could not move passing screenshot"), "{message}");

    let paths = resolve_paths(rig.root(), &rig.test_file(), "chromium", NAME);
    assert!(paths.fail.exists(), "Capture should stay at the fail location");
}

#[tokio::test]
async fn test_dimension_mismatch_replaces_previous_diff() {
    let rig = Rig::new();
    let session = rig.session();
    let identity = TestIdentity::new("chromium", rig.test_file(), NAME);
    let paths = resolve_paths(rig.root(), &rig.test_file(), "chromium", NAME);

    rig.handler(DiffMode::Golden).handle(&session, &rig.request()).await.unwrap();
    rig.driver.canvas().draw_rect(15, 15, 5, 5, [205, 32, 38]);
    rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();
    assert_eq!(rig.info.get(&identity).unwrap().pixels_diff, Some(25));
    assert!(paths.diff.exists());

    let mut unpadded = rig.request();
    unpadded.opts.margin = Some(0.0);
    let response = rig.handler(DiffMode::Compare).handle(&session, &unpadded).await.unwrap();
    assert!(!response.pass);

    let info = rig.info.get(&identity).unwrap();
    let new = info.new.expect("No capture info");
    assert_eq!((new.width, new.height), (Some(20), Some(20)));
    assert_eq!(info.pixels_diff, None);
    assert_eq!(info.diff, None);
    assert!(!paths.diff.exists(), "Diff image from the previous comparison left behind");
}

/// Run one assertion per session, each on its own task
async fn run_sessions(handler: DiffHandler, sessions: &[Session], names: &[String]) -> Vec<bool> {
    let tasks = sessions.iter().zip(names).map(|(session, name)| {
        let handler = handler.clone();
        let session = session.clone();
        let request = request(name);
        tokio::spawn(async move { handler.handle(&session, &request).await })
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("Session task panicked").expect("Handler error").pass)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sessions_share_directories() {
    let dir = tempfile::tempdir().unwrap();
    let info = Arc::new(TestInfoStore::new());
    let test_file = dir.path().join("test/card.vdiff.js");

    let drivers: Vec<Arc<CanvasDriver>> = (0..8u8)
        .map(|i| {
            let driver = Arc::new(CanvasDriver::new(Canvas::new(100, 100)));
            driver.canvas().draw_rect(12, 12, 16, 16, [i * 30, 111, 191]);
            driver
        })
        .collect();
    let sessions: Vec<Session> = drivers
        .iter()
        .enumerate()
        .map(|(i, driver)| {
            Session::new(
                format!("s{i}"),
                BrowserInfo::new("chromium", "120"),
                &test_file,
                driver.clone(),
            )
        })
        .collect();
    let names: Vec<String> = (0..8).map(|i| format!("card state{i}")).collect();

    let golden = DiffHandler::new(dir.path(), DiffMode::Golden, info.clone());
    assert!(run_sessions(golden, &sessions, &names).await.iter().all(|pass| *pass));
    for (i, driver) in drivers.iter().enumerate() {
        if i % 2 == 1 {
            driver.canvas().draw_rect(15, 15, 5, 5, [205, 32, 38]);
        }
    }

    let compare = DiffHandler::new(dir.path(), DiffMode::Compare, info.clone());
    assert_eq!(run_sessions(compare, &sessions, &names).await, vec![true, false, true, false, true, false, true, false]);

    assert_eq!(info.len(), 4);
    for (i, name) in names.iter().enumerate() {
        let entry = info.get(&TestIdentity::new("chromium", &test_file, name.as_str()));
        if i % 2 == 0 {
            assert!(entry.is_none(), "{name} has info from another session");
        } else {
            let entry = entry.expect("No info for failing session");
            let new_path = entry.new.and_then(|n| n.path).unwrap_or_default();
            assert!(new_path.ends_with(&format!("state{i}.png")), "{new_path}");
            assert_eq!(entry.pixels_diff, Some(25));
        }
    }
}

#[tokio::test]
async fn test_channel_turns_mismatch_into_assertion_error() {
    let rig = Rig::new();
    let session = Arc::new(rig.session());
    let element = MemoryElement::new("d2l-card")
        .with_rect(Rect::new(10.0, 10.0, 20.0, 20.0))
        .into_ref();

    let golden = LocalChannel::new(
        Arc::new(VdiffPlugin::new(rig.handler(DiffMode::Golden))),
        session.clone(),
    );
    screenshot_and_compare(&golden, &element, NAME, Default::default())
        .await
        .expect("Golden run failed");

    let compare = LocalChannel::new(Arc::new(VdiffPlugin::new(rig.handler(DiffMode::Compare))), session);
    screenshot_and_compare(&compare, &element, NAME, Default::default())
        .await
        .expect("Unchanged page should pass");

    rig.driver.canvas().fill([0, 0, 0]);
    let err = screenshot_and_compare(&compare, &element, NAME, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Assertion(ref msg) if msg == MSG_MISMATCH), "{err}");
}

#[tokio::test]
async fn test_report_joins_recorded_info() {
    let rig = Rig::new();
    let session = rig.session();

    rig.handler(DiffMode::Golden).handle(&session, &rig.request()).await.unwrap();
    rig.driver.canvas().fill([0, 0, 0]);
    rig.handler(DiffMode::Compare).handle(&session, &rig.request()).await.unwrap();

    let results = vec![SessionResult {
        browser: BrowserInfo::new("Chromium", "120.0.6099"),
        test_file: rig.test_file(),
        test_results: Some(SuiteResult {
            name: String::new(),
            suites: vec![SuiteResult {
                name: "card".to_string(),
                suites: vec![],
                tests: vec![TestResult {
                    name: "hover".to_string(),
                    passed: false,
                    duration: Some(120),
                    error: None,
                }],
            }],
            tests: vec![],
        }),
    }];

    let report = build_report_data(rig.root(), &results, &rig.info, Duration::from_millis(75));
    assert_eq!(report.num_failed(), 1);
    assert_eq!(report.files[0].name, "test/card.vdiff.js");

    let test = &report.files[0].tests[0];
    assert_eq!(test.name, "card > hover");
    let info = &test.results[0].info;
    assert_eq!(info.pixels_diff, Some(40 * 40));
    assert_eq!(info.slow_duration, Some(120));

    let path = report.write(rig.root()).unwrap();
    assert!(path.starts_with(rig.root().join(".vdiff")));
}
